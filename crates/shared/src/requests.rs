//! Request bodies for the REST surface
//!
//! Enum-valued fields arrive as strings (`entityType`, `entityCategory`,
//! `explorationIntensity`, ...) and are parsed at the API boundary so a bad
//! value produces a validation error with the offending field named, never a
//! deserialization failure.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Create (or return) the entity pool for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePoolRequest {
    pub campaign_id: Uuid,
    pub theme_id: Uuid,
}

/// Rewards payload on an entity write.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRewardsData {
    #[serde(default)]
    pub experience: u32,
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub information: Vec<String>,
}

/// Insert or update one entity in a session's pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertEntityRequest {
    /// "core" or "bonus"; must agree with `category`
    pub entity_type: String,
    pub category: String,
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub milestone_id: Option<String>,
    #[serde(default)]
    pub progress_contribution: Option<u8>,
    #[serde(default)]
    pub rewards: EntityRewardsData,
    /// Create the pool if it does not exist yet (requires campaign/theme ids)
    #[serde(default)]
    pub create_pool: Option<CreatePoolRequest>,
}

/// Delete one entity from a session's pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveEntityRequest {
    pub entity_type: String,
    pub category: String,
    pub entity_id: String,
}

/// Best-effort bulk delete; entries not found are skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRemoveRequest {
    pub entities: Vec<RemoveEntityRequest>,
}

/// One record of a bulk mapping creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingRecord {
    pub location_id: Uuid,
    pub entity_id: String,
    pub entity_type: String,
    pub entity_category: String,
    #[serde(default)]
    pub always_available: Option<bool>,
    #[serde(default)]
    pub time_restriction: Option<String>,
    #[serde(default)]
    pub prerequisite_entities: Vec<String>,
}

/// Bulk mapping creation; the whole batch is rejected on any invalid record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMappingsRequest {
    pub session_id: Uuid,
    pub mappings: Vec<MappingRecord>,
}

/// GM override of a mapping's availability flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAvailabilityRequest {
    pub is_available: bool,
}

/// Trigger a dynamic-availability recompute for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDynamicAvailabilityRequest {
    /// Current in-game time of day: morning/afternoon/evening/night
    pub time_of_day: String,
}

/// Explore a location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExploreLocationRequest {
    pub session_id: Uuid,
    pub character_id: Uuid,
    pub exploration_intensity: String,
}

/// Start an exploration action against one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartExplorationRequest {
    pub session_id: Uuid,
    pub character_id: Uuid,
    pub target_entity_id: String,
    pub action_type: String,
    #[serde(default)]
    pub custom_description: Option<String>,
}

/// Supply the player's free-text approach.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInputRequest {
    pub execution_id: Uuid,
    pub character_id: Uuid,
    pub user_approach: String,
}

/// Resolve the pending skill check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillCheckRequest {
    pub execution_id: Uuid,
    pub character_id: Uuid,
    pub skill_type: String,
    #[serde(default)]
    pub target_number: Option<i32>,
    #[serde(default)]
    pub modifiers: Option<i32>,
}
