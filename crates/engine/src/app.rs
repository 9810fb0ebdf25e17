//! Application state and composition.

use std::sync::Arc;

use crate::infrastructure::ports::{
    ClockPort, EntityPoolRepo, ExecutionRepo, LlmPort, MappingRepo, ProgressNotifierPort,
    RandomPort,
};
use crate::use_cases;

/// Main application state.
///
/// Holds all use cases. Passed to HTTP handlers via Axum state.
pub struct App {
    pub use_cases: UseCases,
}

/// Container for all use cases.
pub struct UseCases {
    pub entity_pool: use_cases::EntityPoolOps,
    pub mapping: use_cases::MappingOps,
    pub exploration: use_cases::ExplorationFlowOps,
    pub progress: Arc<use_cases::ProgressOps>,
    pub player_view: use_cases::PlayerViewOps,
}

impl App {
    /// Create a new App with all dependencies wired up.
    pub fn new(
        pools: Arc<dyn EntityPoolRepo>,
        mappings: Arc<dyn MappingRepo>,
        executions: Arc<dyn ExecutionRepo>,
        llm: Arc<dyn LlmPort>,
        notifier: Arc<dyn ProgressNotifierPort>,
        clock: Arc<dyn ClockPort>,
        random: Arc<dyn RandomPort>,
    ) -> Self {
        let entity_pool = use_cases::EntityPoolOps::new(pools.clone(), clock.clone());
        let mapping = use_cases::MappingOps::new(
            mappings.clone(),
            pools.clone(),
            clock.clone(),
            notifier.clone(),
        );
        let exploration = use_cases::ExplorationFlowOps::new(
            executions,
            mappings.clone(),
            clock,
            random,
            llm,
            notifier,
        );
        let progress = Arc::new(use_cases::ProgressOps::new(pools.clone(), mappings.clone()));
        let player_view = use_cases::PlayerViewOps::new(pools, mappings, progress.clone());

        Self {
            use_cases: UseCases {
                entity_pool,
                mapping,
                exploration,
                progress,
                player_view,
            },
        }
    }
}
