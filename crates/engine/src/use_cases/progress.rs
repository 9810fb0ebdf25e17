//! Milestone progress calculator.
//!
//! Progress is derived on demand from the entity pools of a campaign and
//! their discovery state - nothing is stored. Contributions are clamped so
//! an authoring bug (contributions summing past 100) cannot corrupt the
//! player-visible signal.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tablekeep_domain::{campaign_completion, sum_progress, CampaignCompletion, CampaignId, SessionId};

use crate::infrastructure::ports::{EntityPoolRepo, MappingRepo};
use crate::use_cases::OpsError;

pub struct ProgressOps {
    pools: Arc<dyn EntityPoolRepo>,
    mappings: Arc<dyn MappingRepo>,
}

impl ProgressOps {
    pub fn new(pools: Arc<dyn EntityPoolRepo>, mappings: Arc<dyn MappingRepo>) -> Self {
        Self { pools, mappings }
    }

    /// Sum of contributions from discovered core entities of the milestone,
    /// clamped to 0..=100.
    pub async fn compute_progress(
        &self,
        campaign_id: CampaignId,
        milestone_id: &str,
    ) -> Result<u8, OpsError> {
        let pools = self.pools.list_by_campaign(campaign_id).await?;
        let mut contributions = Vec::new();
        for pool in &pools {
            let discovered = self.discovered_ids(pool.session_id()).await?;
            for entity in pool.iter_core() {
                if entity.milestone_id.as_deref() == Some(milestone_id)
                    && discovered.contains(entity.identity())
                {
                    contributions.push(u32::from(entity.progress_contribution.unwrap_or(0)));
                }
            }
        }
        Ok(sum_progress(contributions))
    }

    /// Campaign-level rollup over every authored milestone.
    pub async fn compute_campaign_completion(
        &self,
        campaign_id: CampaignId,
    ) -> Result<CampaignCompletion, OpsError> {
        let pools = self.pools.list_by_campaign(campaign_id).await?;
        let milestone_ids: BTreeSet<String> = pools
            .iter()
            .flat_map(|pool| pool.iter_core())
            .filter_map(|entity| entity.milestone_id.clone())
            .collect();

        let mut progress = Vec::with_capacity(milestone_ids.len());
        for milestone_id in &milestone_ids {
            progress.push(self.compute_progress(campaign_id, milestone_id).await?);
        }
        Ok(campaign_completion(&progress))
    }

    async fn discovered_ids(&self, session_id: SessionId) -> Result<HashSet<String>, OpsError> {
        Ok(self
            .mappings
            .list_for_session(session_id)
            .await?
            .into_iter()
            .filter(|mapping| mapping.is_discovered())
            .map(|mapping| mapping.entity_id().to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory::{MemoryEntityPoolRepo, MemoryMappingRepo};
    use chrono::{TimeZone, Utc};
    use tablekeep_domain::{
        EntityCategory, EntityPool, LocationId, LocationMapping, PoolEntity, ThemeId,
    };

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    struct Fixture {
        ops: ProgressOps,
        pools: Arc<MemoryEntityPoolRepo>,
        mappings: Arc<MemoryMappingRepo>,
        campaign_id: CampaignId,
        session_id: SessionId,
    }

    async fn fixture(entities: &[(&str, &str, u8)]) -> Fixture {
        let pools = Arc::new(MemoryEntityPoolRepo::new());
        let mappings = Arc::new(MemoryMappingRepo::new());
        let campaign_id = CampaignId::new();
        let session_id = SessionId::new();

        let mut pool = EntityPool::new(session_id, campaign_id, ThemeId::new(), now());
        for (id, milestone, contribution) in entities {
            pool.upsert(
                PoolEntity::new(id.to_string(), EntityCategory::Quest, now())
                    .with_id(id.to_string())
                    .with_milestone(milestone.to_string(), *contribution),
                now(),
            )
            .unwrap();
        }
        pools.save(&pool, None).await.unwrap();

        Fixture {
            ops: ProgressOps::new(pools.clone(), mappings.clone()),
            pools,
            mappings,
            campaign_id,
            session_id,
        }
    }

    async fn discover(fixture: &Fixture, entity_id: &str) {
        let mut mapping = LocationMapping::new(
            fixture.session_id,
            LocationId::new(),
            entity_id,
            EntityCategory::Quest,
            now(),
        );
        mapping.mark_discovered(now());
        fixture.mappings.insert_batch(vec![mapping]).await.unwrap();
    }

    #[tokio::test]
    async fn progress_counts_only_discovered_entities() {
        let fixture = fixture(&[("a", "m1", 60), ("b", "m1", 40)]).await;
        discover(&fixture, "a").await;

        let progress = fixture
            .ops
            .compute_progress(fixture.campaign_id, "m1")
            .await
            .unwrap();
        assert_eq!(progress, 60);
    }

    #[tokio::test]
    async fn progress_clamps_authoring_bugs_at_100() {
        // Contributions sum to 150; the calculator must not exceed 100
        let fixture = fixture(&[("a", "m1", 90), ("b", "m1", 60)]).await;
        discover(&fixture, "a").await;
        discover(&fixture, "b").await;

        let progress = fixture
            .ops
            .compute_progress(fixture.campaign_id, "m1")
            .await
            .unwrap();
        assert_eq!(progress, 100);
    }

    #[tokio::test]
    async fn unknown_milestone_is_zero() {
        let fixture = fixture(&[("a", "m1", 100)]).await;
        let progress = fixture
            .ops
            .compute_progress(fixture.campaign_id, "m9")
            .await
            .unwrap();
        assert_eq!(progress, 0);
    }

    #[tokio::test]
    async fn campaign_completion_rolls_up_milestones() {
        let fixture = fixture(&[("a", "m1", 100), ("b", "m2", 50), ("c", "m2", 50)]).await;
        discover(&fixture, "a").await;
        discover(&fixture, "b").await;

        let completion = fixture
            .ops
            .compute_campaign_completion(fixture.campaign_id)
            .await
            .unwrap();
        assert_eq!(completion.total_milestones, 2);
        assert_eq!(completion.completed_milestones, 1);
        assert_eq!(completion.overall_percent, 75);
    }

    #[tokio::test]
    async fn bonus_discoveries_do_not_move_progress() {
        let fixture = fixture(&[("a", "m1", 100)]).await;
        // Discover a bonus entity only
        let mut pool = fixture
            .pools
            .get(fixture.session_id)
            .await
            .unwrap()
            .unwrap();
        let version = pool.version();
        pool.upsert(
            PoolEntity::new("coin", EntityCategory::Practical, now()).with_id("coin"),
            now(),
        )
        .unwrap();
        fixture.pools.save(&pool, Some(version)).await.unwrap();

        let mut mapping = LocationMapping::new(
            fixture.session_id,
            LocationId::new(),
            "coin",
            EntityCategory::Practical,
            now(),
        );
        mapping.mark_discovered(now());
        fixture.mappings.insert_batch(vec![mapping]).await.unwrap();

        let progress = fixture
            .ops
            .compute_progress(fixture.campaign_id, "m1")
            .await
            .unwrap();
        assert_eq!(progress, 0);
    }
}
