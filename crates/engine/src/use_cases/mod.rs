//! Use cases - user story orchestration over the port traits.
//!
//! One Ops struct per component of the exploration engine. All dependencies
//! are injected as `Arc<dyn Port>` so tests can drive them with mocks or the
//! in-memory adapters.

pub mod entity_pool;
pub mod exploration;
pub mod mapping;
pub mod player_view;
pub mod progress;

pub use entity_pool::{EntityPoolOps, RemoveEntityInput, UpsertEntityInput};
pub use exploration::{ExplorationFlowOps, SkillCheckReport, UserInputAck};
pub use mapping::{EntityReference, ExplorationReport, MappingOps, MappingRecordInput};
pub use player_view::{
    filter_player_visible, AvailableAction, DiscoveredElement, MaskedProgressInfo, PlayerViewOps,
};
pub use progress::ProgressOps;

use tablekeep_domain::DomainError;

use crate::infrastructure::ports::RepoError;

/// Error type shared by all use cases: domain rejections plus port failures.
#[derive(Debug, thiserror::Error)]
pub enum OpsError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl OpsError {
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Domain(e) => e.is_not_found(),
            Self::Repo(e) => e.is_not_found(),
        }
    }
}
