//! Domain entities for the entity pool and exploration engine.

pub mod entity_pool;
pub mod exploration;
pub mod location_mapping;

pub use entity_pool::{
    BonusEntities, CoreEntities, EntityCategory, EntityKind, EntityPool, EntityRewards,
    MilestoneContributionError, PoolEntity, UpsertOutcome,
};
pub use exploration::{
    approach_triggers_judgment, evaluate_check, ExecutionPhase, ExplorationActionType,
    ExplorationExecution, ExplorationOutcome, SkillOutcome,
};
pub use location_mapping::{
    validate_mapping_fields, AvailabilityRule, LocationMapping, TimeOfDay,
};
