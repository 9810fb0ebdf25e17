//! In-memory location-entity mapping store.
//!
//! Mappings are kept per session in insertion order - the exploration
//! algorithm's deterministic priority depends on it - with a mapping-id
//! index for direct lookups.

use async_trait::async_trait;
use dashmap::DashMap;
use tablekeep_domain::{LocationId, LocationMapping, MappingId, SessionId};

use crate::infrastructure::ports::{MappingRepo, RepoError};

#[derive(Default)]
pub struct MemoryMappingRepo {
    by_session: DashMap<SessionId, Vec<LocationMapping>>,
    index: DashMap<MappingId, SessionId>,
}

impl MemoryMappingRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MappingRepo for MemoryMappingRepo {
    async fn insert_batch(&self, mappings: Vec<LocationMapping>) -> Result<(), RepoError> {
        for mapping in mappings {
            self.index.insert(mapping.mapping_id(), mapping.session_id());
            self.by_session
                .entry(mapping.session_id())
                .or_default()
                .push(mapping);
        }
        Ok(())
    }

    async fn get(&self, mapping_id: MappingId) -> Result<Option<LocationMapping>, RepoError> {
        let Some(session_id) = self.index.get(&mapping_id).map(|entry| *entry) else {
            return Ok(None);
        };
        Ok(self.by_session.get(&session_id).and_then(|mappings| {
            mappings
                .iter()
                .find(|m| m.mapping_id() == mapping_id)
                .cloned()
        }))
    }

    async fn save(&self, mapping: &LocationMapping) -> Result<(), RepoError> {
        let mut mappings = self
            .by_session
            .get_mut(&mapping.session_id())
            .ok_or_else(|| RepoError::not_found("LocationMapping", mapping.mapping_id()))?;
        let slot = mappings
            .iter_mut()
            .find(|m| m.mapping_id() == mapping.mapping_id())
            .ok_or_else(|| RepoError::not_found("LocationMapping", mapping.mapping_id()))?;
        *slot = mapping.clone();
        Ok(())
    }

    async fn list_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<LocationMapping>, RepoError> {
        Ok(self
            .by_session
            .get(&session_id)
            .map(|mappings| mappings.clone())
            .unwrap_or_default())
    }

    async fn list_for_location(
        &self,
        location_id: LocationId,
        session_id: SessionId,
    ) -> Result<Vec<LocationMapping>, RepoError> {
        Ok(self
            .by_session
            .get(&session_id)
            .map(|mappings| {
                mappings
                    .iter()
                    .filter(|m| m.location_id() == location_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_for_entity(
        &self,
        session_id: SessionId,
        entity_id: &str,
    ) -> Result<Option<LocationMapping>, RepoError> {
        Ok(self.by_session.get(&session_id).and_then(|mappings| {
            mappings.iter().find(|m| m.entity_id() == entity_id).cloned()
        }))
    }
}
