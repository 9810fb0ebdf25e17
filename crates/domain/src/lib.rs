extern crate self as tablekeep_domain;

pub mod entities;
pub mod error;
pub mod ids;
pub mod value_objects;

// Re-export all entities (explicit list in entities/mod.rs)
pub use entities::{
    approach_triggers_judgment, evaluate_check, validate_mapping_fields, AvailabilityRule,
    BonusEntities, CoreEntities, EntityCategory, EntityKind, EntityPool, EntityRewards,
    ExecutionPhase, ExplorationActionType, ExplorationExecution, ExplorationOutcome,
    LocationMapping, MilestoneContributionError, PoolEntity, SkillOutcome, TimeOfDay,
    UpsertOutcome,
};

pub use error::DomainError;

// Re-export ID types
pub use ids::{
    CampaignId, CharacterId, ExecutionId, LocationId, MappingId, SessionId, ThemeId,
};

// Re-export value objects
pub use value_objects::{
    campaign_completion, sum_progress, CampaignCompletion, ExplorationIntensity,
};
