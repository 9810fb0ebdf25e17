//! Repository port traits for session-state access.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tablekeep_domain::{
    CampaignId, EntityPool, ExecutionId, ExplorationExecution, LocationId, LocationMapping,
    MappingId, SessionId,
};

use super::error::RepoError;

// =============================================================================
// Entity Pool Storage
// =============================================================================

/// Whole-document store for the per-session entity pool aggregate.
///
/// Saves are guarded by optimistic versioning: `expected_version` is the
/// version the caller loaded (`None` for a fresh create). A mismatch fails
/// with [`RepoError::Conflict`] and the caller re-reads and re-applies.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntityPoolRepo: Send + Sync {
    async fn get(&self, session_id: SessionId) -> Result<Option<EntityPool>, RepoError>;
    async fn save(&self, pool: &EntityPool, expected_version: Option<u64>)
        -> Result<(), RepoError>;
    async fn delete(&self, session_id: SessionId) -> Result<(), RepoError>;
    async fn list_by_campaign(&self, campaign_id: CampaignId)
        -> Result<Vec<EntityPool>, RepoError>;
}

// =============================================================================
// Location-Entity Mappings
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MappingRepo: Send + Sync {
    /// Insert a batch atomically; callers validate before insertion.
    async fn insert_batch(&self, mappings: Vec<LocationMapping>) -> Result<(), RepoError>;
    async fn get(&self, mapping_id: MappingId) -> Result<Option<LocationMapping>, RepoError>;
    /// Replace an existing mapping; fails with NotFound if it was never inserted.
    async fn save(&self, mapping: &LocationMapping) -> Result<(), RepoError>;
    /// All mappings of a session, in insertion order.
    async fn list_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<LocationMapping>, RepoError>;
    /// Mappings at one location, in insertion order.
    async fn list_for_location(
        &self,
        location_id: LocationId,
        session_id: SessionId,
    ) -> Result<Vec<LocationMapping>, RepoError>;
    /// First mapping of an entity within a session, if any.
    async fn find_for_entity(
        &self,
        session_id: SessionId,
        entity_id: &str,
    ) -> Result<Option<LocationMapping>, RepoError>;
}

// =============================================================================
// Exploration Executions
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExecutionRepo: Send + Sync {
    async fn get(&self, execution_id: ExecutionId)
        -> Result<Option<ExplorationExecution>, RepoError>;
    /// Insert or replace.
    async fn save(&self, execution: &ExplorationExecution) -> Result<(), RepoError>;
    async fn delete(&self, execution_id: ExecutionId) -> Result<(), RepoError>;
    /// Drop non-terminal executions started before the cutoff; returns the
    /// number removed. Resolved executions are kept for result retrieval.
    async fn reap_stale(&self, cutoff: DateTime<Utc>) -> Result<u32, RepoError>;
}
