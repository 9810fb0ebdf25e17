//! Player experience masking layer.
//!
//! Everything handed to the player channel goes through here. The read
//! models in this module are the player-visible schema: they have no fields
//! for milestone bookkeeping, contributions, or availability internals, so
//! the hidden state cannot leak by construction. For arbitrary GM-/AI-
//! authored JSON there is additionally a runtime allow-list filter.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tablekeep_domain::{
    DomainError, EntityCategory, ExplorationActionType, LocationId, SessionId,
};

use crate::infrastructure::ports::{EntityPoolRepo, MappingRepo};
use crate::use_cases::{OpsError, ProgressOps};

/// Keys allowed through [`filter_player_visible`]. Everything else is
/// stripped, notably `progressContribution`, `milestoneId` and raw
/// availability flags.
const PLAYER_SAFE_FIELDS: &[&str] = &[
    "name",
    "category",
    "description",
    "discoveredAt",
    "actionType",
    "label",
    "hint",
    "locationId",
    "narrative",
    "experience",
    "items",
    "information",
];

/// An action the player can currently take, derived from available
/// undiscovered mappings - action metadata only, no entity internals.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableAction {
    pub location_id: LocationId,
    pub action_type: ExplorationActionType,
    pub label: String,
}

/// Safe-to-show subset of a discovered entity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredElement {
    pub name: String,
    pub category: EntityCategory,
    pub discovered_at: DateTime<Utc>,
}

/// The player-visible progress view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskedProgressInfo {
    /// Single coarse number; never the per-milestone breakdown
    pub exploration_progress: u8,
    pub available_actions: Vec<AvailableAction>,
    pub ambiguous_hints: Vec<String>,
    pub discovered_elements: Vec<DiscoveredElement>,
}

pub struct PlayerViewOps {
    pools: Arc<dyn EntityPoolRepo>,
    mappings: Arc<dyn MappingRepo>,
    progress: Arc<ProgressOps>,
}

impl PlayerViewOps {
    pub fn new(
        pools: Arc<dyn EntityPoolRepo>,
        mappings: Arc<dyn MappingRepo>,
        progress: Arc<ProgressOps>,
    ) -> Self {
        Self {
            pools,
            mappings,
            progress,
        }
    }

    pub async fn masked_progress_info(
        &self,
        session_id: SessionId,
    ) -> Result<MaskedProgressInfo, OpsError> {
        let pool = self
            .pools
            .get(session_id)
            .await?
            .ok_or_else(|| DomainError::not_found("EntityPool", session_id.to_string()))?;
        let mappings = self.mappings.list_for_session(session_id).await?;

        let completion = self
            .progress
            .compute_campaign_completion(pool.campaign_id())
            .await?;
        // Round down to the nearest 10 so the exact milestone math stays hidden
        let exploration_progress = completion.overall_percent / 10 * 10;

        let mut available_actions: Vec<AvailableAction> = Vec::new();
        let mut ambiguous_hints: Vec<String> = Vec::new();
        let mut discovered_elements: Vec<DiscoveredElement> = Vec::new();

        for mapping in &mappings {
            if let Some(discovered_at) = mapping.discovered_at() {
                let name = pool
                    .find(mapping.entity_category(), mapping.entity_id())
                    .map(|entity| entity.name.clone())
                    .unwrap_or_else(|| mapping.entity_id().to_string());
                discovered_elements.push(DiscoveredElement {
                    name,
                    category: mapping.entity_category(),
                    discovered_at,
                });
                continue;
            }
            // Undiscovered entities surface only as vague hints and action
            // metadata, and only while actually available
            if !mapping.is_available() {
                continue;
            }
            let action_type = suggested_action(mapping.entity_category());
            if !available_actions.iter().any(|action| {
                action.location_id == mapping.location_id() && action.action_type == action_type
            }) {
                available_actions.push(AvailableAction {
                    location_id: mapping.location_id(),
                    action_type,
                    label: action_label(action_type).to_string(),
                });
            }
            let hint = hint_for(mapping.entity_category()).to_string();
            if !ambiguous_hints.contains(&hint) {
                ambiguous_hints.push(hint);
            }
        }

        Ok(MaskedProgressInfo {
            exploration_progress,
            available_actions,
            ambiguous_hints,
            discovered_elements,
        })
    }
}

fn suggested_action(category: EntityCategory) -> ExplorationActionType {
    match category {
        EntityCategory::Enemy => ExplorationActionType::Combat,
        EntityCategory::Npc | EntityCategory::Quest => ExplorationActionType::Interact,
        EntityCategory::Event
        | EntityCategory::Item
        | EntityCategory::Practical
        | EntityCategory::Trophy
        | EntityCategory::Mystery => ExplorationActionType::Search,
    }
}

fn action_label(action_type: ExplorationActionType) -> &'static str {
    match action_type {
        ExplorationActionType::Search => "Search the area",
        ExplorationActionType::Interact => "Seek out company",
        ExplorationActionType::Combat => "Ready your weapons",
        ExplorationActionType::Custom => "Try something else",
    }
}

fn hint_for(category: EntityCategory) -> &'static str {
    match category {
        EntityCategory::Enemy => "Something dangerous lurks nearby.",
        EntityCategory::Event => "The air feels charged, as if something is about to happen.",
        EntityCategory::Npc => "You get the sense you are not alone here.",
        EntityCategory::Item => "Something of value may be hidden close by.",
        EntityCategory::Quest => "There is unfinished business in this place.",
        EntityCategory::Practical | EntityCategory::Trophy | EntityCategory::Mystery => {
            "A careful search might turn up something extra."
        }
    }
}

/// Allow-list filter for arbitrary GM-/AI-authored objects relayed to the
/// player channel. Unknown keys are stripped recursively; array elements are
/// filtered individually; scalars pass through.
pub fn filter_player_visible(content: &Value) -> Value {
    match content {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| PLAYER_SAFE_FIELDS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), filter_player_visible(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(filter_player_visible).collect()),
        other => other.clone(),
    }
}
