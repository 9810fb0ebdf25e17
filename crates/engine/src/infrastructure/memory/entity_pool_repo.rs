//! In-memory entity pool store.
//!
//! Whole-document storage keyed by session, with optimistic versioning on
//! save: the entry's current version must equal the version the caller
//! loaded, otherwise the write is stale and rejected.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tablekeep_domain::{CampaignId, EntityPool, SessionId};

use crate::infrastructure::ports::{EntityPoolRepo, RepoError};

#[derive(Default)]
pub struct MemoryEntityPoolRepo {
    pools: DashMap<SessionId, EntityPool>,
}

impl MemoryEntityPoolRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityPoolRepo for MemoryEntityPoolRepo {
    async fn get(&self, session_id: SessionId) -> Result<Option<EntityPool>, RepoError> {
        Ok(self.pools.get(&session_id).map(|entry| entry.clone()))
    }

    async fn save(
        &self,
        pool: &EntityPool,
        expected_version: Option<u64>,
    ) -> Result<(), RepoError> {
        let session_id = pool.session_id();
        match self.pools.entry(session_id) {
            Entry::Occupied(mut occupied) => {
                let found = occupied.get().version();
                match expected_version {
                    Some(expected) if expected == found => {
                        occupied.insert(pool.clone());
                        Ok(())
                    }
                    Some(expected) => {
                        Err(RepoError::conflict("EntityPool", session_id, expected, found))
                    }
                    // Fresh create raced with another writer
                    None => Err(RepoError::conflict("EntityPool", session_id, 0, found)),
                }
            }
            Entry::Vacant(vacant) => match expected_version {
                // The loaded document disappeared underneath the caller
                Some(expected) => {
                    Err(RepoError::conflict("EntityPool", session_id, expected, 0))
                }
                None => {
                    vacant.insert(pool.clone());
                    Ok(())
                }
            },
        }
    }

    async fn delete(&self, session_id: SessionId) -> Result<(), RepoError> {
        self.pools.remove(&session_id);
        Ok(())
    }

    async fn list_by_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<EntityPool>, RepoError> {
        Ok(self
            .pools
            .iter()
            .filter(|entry| entry.campaign_id() == campaign_id)
            .map(|entry| entry.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tablekeep_domain::{EntityCategory, PoolEntity, ThemeId};

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn pool(session_id: SessionId) -> EntityPool {
        EntityPool::new(session_id, CampaignId::new(), ThemeId::new(), now())
    }

    #[tokio::test]
    async fn create_then_get_roundtrips() {
        let repo = MemoryEntityPoolRepo::new();
        let session_id = SessionId::new();
        repo.save(&pool(session_id), None).await.unwrap();
        assert!(repo.get(session_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn stale_write_is_rejected() {
        let repo = MemoryEntityPoolRepo::new();
        let session_id = SessionId::new();
        let base = pool(session_id);
        repo.save(&base, None).await.unwrap();

        // Two writers load version 0; the first commits, the second is stale
        let mut first = repo.get(session_id).await.unwrap().unwrap();
        let mut second = repo.get(session_id).await.unwrap().unwrap();
        first
            .upsert(PoolEntity::new("Guard", EntityCategory::Npc, now()), now())
            .unwrap();
        second
            .upsert(PoolEntity::new("Thief", EntityCategory::Npc, now()), now())
            .unwrap();

        repo.save(&first, Some(0)).await.unwrap();
        let err = repo.save(&second, Some(0)).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn duplicate_create_is_a_conflict() {
        let repo = MemoryEntityPoolRepo::new();
        let session_id = SessionId::new();
        repo.save(&pool(session_id), None).await.unwrap();
        assert!(repo.save(&pool(session_id), None).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn list_by_campaign_filters() {
        let repo = MemoryEntityPoolRepo::new();
        let campaign_id = CampaignId::new();
        let in_campaign =
            EntityPool::new(SessionId::new(), campaign_id, ThemeId::new(), now());
        repo.save(&in_campaign, None).await.unwrap();
        repo.save(&pool(SessionId::new()), None).await.unwrap();

        let listed = repo.list_by_campaign(campaign_id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].session_id(), in_campaign.session_id());
    }
}
