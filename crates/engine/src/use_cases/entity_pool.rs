//! Entity pool store operations.
//!
//! The pool is a whole-document aggregate: every mutation reads the
//! document, applies the change, and writes the document back under
//! optimistic versioning. A conflicting concurrent write is retried once
//! from a fresh read before the conflict surfaces to the caller.

use std::collections::BTreeMap;
use std::sync::Arc;

use tablekeep_domain::{
    CampaignId, DomainError, EntityCategory, EntityKind, EntityPool, EntityRewards, PoolEntity,
    SessionId, ThemeId,
};

use crate::infrastructure::ports::{ClockPort, EntityPoolRepo};
use crate::use_cases::OpsError;

/// Input for inserting or updating one entity (field strings still raw).
#[derive(Debug, Clone)]
pub struct UpsertEntityInput {
    /// "core" or "bonus"; must agree with the category
    pub entity_type: String,
    pub category: String,
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub milestone_id: Option<String>,
    pub progress_contribution: Option<u8>,
    pub rewards: EntityRewards,
    /// Create the pool when absent instead of failing with NotFound
    pub create_pool: Option<(CampaignId, ThemeId)>,
}

/// Input for removing one entity.
#[derive(Debug, Clone)]
pub struct RemoveEntityInput {
    pub entity_type: String,
    pub category: String,
    pub entity_id: String,
}

/// Parse and cross-check the kind/category string pair of a request.
///
/// `prefix` scopes the detail keys for batch inputs ("entities[2].").
pub(crate) fn parse_kind_category(
    entity_type: &str,
    category: &str,
    prefix: &str,
) -> Result<(EntityKind, EntityCategory), DomainError> {
    let kind = EntityKind::parse(entity_type);
    let category = EntityCategory::parse(category);

    let mut details = BTreeMap::new();
    if let Err(e) = &kind {
        details.insert(format!("{prefix}entityType"), e.to_string());
    }
    if let Err(e) = &category {
        details.insert(format!("{prefix}entityCategory"), e.to_string());
    }
    if let (Ok(kind), Ok(category)) = (&kind, &category) {
        if category.kind() != *kind {
            details.insert(
                format!("{prefix}entityCategory"),
                format!(
                    "category '{}' is {} content but entityType says '{}'",
                    category,
                    category.kind(),
                    kind
                ),
            );
        }
    }
    if !details.is_empty() {
        return Err(DomainError::validation_with_details(
            "invalid entity type/category",
            details,
        ));
    }
    Ok((kind?, category?))
}

pub struct EntityPoolOps {
    pools: Arc<dyn EntityPoolRepo>,
    clock: Arc<dyn ClockPort>,
}

impl EntityPoolOps {
    pub fn new(pools: Arc<dyn EntityPoolRepo>, clock: Arc<dyn ClockPort>) -> Self {
        Self { pools, clock }
    }

    pub async fn get(&self, session_id: SessionId) -> Result<EntityPool, OpsError> {
        self.pools
            .get(session_id)
            .await?
            .ok_or_else(|| DomainError::not_found("EntityPool", session_id.to_string()).into())
    }

    /// Idempotent creation: an existing pool is returned unchanged.
    pub async fn create_if_absent(
        &self,
        session_id: SessionId,
        campaign_id: CampaignId,
        theme_id: ThemeId,
    ) -> Result<EntityPool, OpsError> {
        if let Some(existing) = self.pools.get(session_id).await? {
            return Ok(existing);
        }
        let pool = EntityPool::new(session_id, campaign_id, theme_id, self.clock.now());
        match self.pools.save(&pool, None).await {
            Ok(()) => Ok(pool),
            // Lost the creation race; the other writer's pool wins
            Err(e) if e.is_conflict() => Ok(self.get(session_id).await?),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn upsert_entity(
        &self,
        session_id: SessionId,
        input: UpsertEntityInput,
    ) -> Result<EntityPool, OpsError> {
        let (kind, category) = parse_kind_category(&input.entity_type, &input.category, "")?;
        if input.name.trim().is_empty() {
            let mut details = BTreeMap::new();
            details.insert("name".to_string(), "must not be empty".to_string());
            return Err(DomainError::validation_with_details("invalid entity", details).into());
        }
        if kind == EntityKind::Bonus
            && (input.milestone_id.is_some() || input.progress_contribution.is_some())
        {
            let mut details = BTreeMap::new();
            details.insert(
                "milestoneId".to_string(),
                "bonus entities cannot carry milestone progress".to_string(),
            );
            return Err(DomainError::validation_with_details("invalid entity", details).into());
        }

        self.with_pool_retry(session_id, input.create_pool, |pool, now| {
            let mut entity = PoolEntity::new(input.name.clone(), category, now)
                .with_rewards(input.rewards.clone());
            if let Some(id) = &input.id {
                entity = entity.with_id(id.clone());
            }
            if let Some(description) = &input.description {
                entity = entity.with_description(description.clone());
            }
            if let (Some(milestone_id), Some(contribution)) =
                (&input.milestone_id, input.progress_contribution)
            {
                entity = entity.with_milestone(milestone_id.clone(), contribution);
            } else if let Some(milestone_id) = &input.milestone_id {
                entity.milestone_id = Some(milestone_id.clone());
            }
            pool.upsert(entity, now)?;
            Ok(())
        })
        .await
    }

    pub async fn remove_entity(
        &self,
        session_id: SessionId,
        input: RemoveEntityInput,
    ) -> Result<PoolEntity, OpsError> {
        let (_, category) = parse_kind_category(&input.entity_type, &input.category, "")?;
        let mut removed = None;
        self.with_pool_retry(session_id, None, |pool, now| {
            removed = Some(pool.remove(category, &input.entity_id, now)?);
            Ok(())
        })
        .await?;
        // with_pool_retry only succeeds after the closure ran
        removed.ok_or_else(|| {
            DomainError::not_found("PoolEntity", input.entity_id.clone()).into()
        })
    }

    /// Best-effort bulk removal: entries not found are skipped, the set
    /// actually removed is returned. Malformed kind/category pairs still
    /// reject the whole request.
    pub async fn bulk_remove(
        &self,
        session_id: SessionId,
        inputs: Vec<RemoveEntityInput>,
    ) -> Result<Vec<PoolEntity>, OpsError> {
        let mut parsed = Vec::with_capacity(inputs.len());
        let mut details = BTreeMap::new();
        for (i, input) in inputs.iter().enumerate() {
            match parse_kind_category(&input.entity_type, &input.category, &format!("entities[{i}].")) {
                Ok((_, category)) => parsed.push((category, input.entity_id.clone())),
                Err(DomainError::Validation {
                    details: mut field_details,
                    ..
                }) => details.append(&mut field_details),
                Err(other) => return Err(other.into()),
            }
        }
        if !details.is_empty() {
            return Err(
                DomainError::validation_with_details("invalid bulk removal request", details)
                    .into(),
            );
        }

        let mut removed = Vec::new();
        self.with_pool_retry(session_id, None, |pool, now| {
            removed.clear();
            for (category, entity_id) in &parsed {
                match pool.remove(*category, entity_id, now) {
                    Ok(entity) => removed.push(entity),
                    // Best-effort: already absent is not an error
                    Err(e) if e.is_not_found() => {}
                    Err(e) => return Err(e),
                }
            }
            Ok(())
        })
        .await?;
        Ok(removed)
    }

    /// Read-modify-write with one retry on an optimistic-version conflict.
    async fn with_pool_retry(
        &self,
        session_id: SessionId,
        create: Option<(CampaignId, ThemeId)>,
        mut mutate: impl FnMut(&mut EntityPool, chrono::DateTime<chrono::Utc>) -> Result<(), DomainError>,
    ) -> Result<EntityPool, OpsError> {
        let mut retried = false;
        loop {
            let loaded = self.pools.get(session_id).await?;
            let (mut pool, expected) = match loaded {
                Some(pool) => {
                    let version = pool.version();
                    (pool, Some(version))
                }
                None => match create {
                    Some((campaign_id, theme_id)) => (
                        EntityPool::new(session_id, campaign_id, theme_id, self.clock.now()),
                        None,
                    ),
                    None => {
                        return Err(DomainError::not_found(
                            "EntityPool",
                            session_id.to_string(),
                        )
                        .into())
                    }
                },
            };

            mutate(&mut pool, self.clock.now())?;

            match self.pools.save(&pool, expected).await {
                Ok(()) => return Ok(pool),
                Err(e) if e.is_conflict() && !retried => {
                    tracing::debug!(session_id = %session_id, "Pool write conflicted, retrying");
                    retried = true;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::memory::MemoryEntityPoolRepo;
    use crate::infrastructure::ports::{MockEntityPoolRepo, RepoError};
    use chrono::{TimeZone, Utc};

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()))
    }

    fn ops() -> EntityPoolOps {
        EntityPoolOps::new(Arc::new(MemoryEntityPoolRepo::new()), clock())
    }

    fn upsert_input(name: &str, entity_type: &str, category: &str) -> UpsertEntityInput {
        UpsertEntityInput {
            entity_type: entity_type.to_string(),
            category: category.to_string(),
            id: None,
            name: name.to_string(),
            description: None,
            milestone_id: None,
            progress_contribution: None,
            rewards: EntityRewards::default(),
            create_pool: Some((CampaignId::new(), ThemeId::new())),
        }
    }

    #[tokio::test]
    async fn create_if_absent_is_idempotent() {
        let ops = ops();
        let session_id = SessionId::new();
        let campaign_id = CampaignId::new();
        let theme_id = ThemeId::new();

        let first = ops
            .create_if_absent(session_id, campaign_id, theme_id)
            .await
            .unwrap();
        let second = ops
            .create_if_absent(session_id, CampaignId::new(), ThemeId::new())
            .await
            .unwrap();
        // The existing pool is returned unchanged
        assert_eq!(second.campaign_id(), first.campaign_id());
        assert_eq!(second.version(), first.version());
    }

    #[tokio::test]
    async fn upsert_without_pool_and_without_create_is_not_found() {
        let ops = ops();
        let mut input = upsert_input("Bandit", "core", "enemy");
        input.create_pool = None;
        let err = ops.upsert_entity(SessionId::new(), input).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn upsert_creates_pool_on_request() {
        let ops = ops();
        let session_id = SessionId::new();
        let pool = ops
            .upsert_entity(session_id, upsert_input("Bandit", "core", "enemy"))
            .await
            .unwrap();
        assert_eq!(pool.entities(EntityCategory::Enemy).len(), 1);
        assert!(ops.get(session_id).await.is_ok());
    }

    #[tokio::test]
    async fn kind_category_mismatch_is_rejected() {
        let ops = ops();
        let err = ops
            .upsert_entity(SessionId::new(), upsert_input("Coin", "core", "practical"))
            .await
            .unwrap_err();
        match err {
            OpsError::Domain(DomainError::Validation { details, .. }) => {
                assert!(details.contains_key("entityCategory"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn bonus_entities_cannot_carry_milestones() {
        let ops = ops();
        let mut input = upsert_input("Medal", "bonus", "trophy");
        input.milestone_id = Some("m1".to_string());
        let err = ops.upsert_entity(SessionId::new(), input).await.unwrap_err();
        match err {
            OpsError::Domain(DomainError::Validation { details, .. }) => {
                assert!(details.contains_key("milestoneId"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn bulk_remove_skips_missing_entries() {
        let ops = ops();
        let session_id = SessionId::new();
        ops.upsert_entity(session_id, upsert_input("Bandit", "core", "enemy"))
            .await
            .unwrap();

        let removed = ops
            .bulk_remove(
                session_id,
                vec![
                    RemoveEntityInput {
                        entity_type: "core".to_string(),
                        category: "enemy".to_string(),
                        entity_id: "Bandit".to_string(),
                    },
                    RemoveEntityInput {
                        entity_type: "core".to_string(),
                        category: "enemy".to_string(),
                        entity_id: "Ghost".to_string(),
                    },
                ],
            )
            .await
            .unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].name, "Bandit");
    }

    #[tokio::test]
    async fn bulk_remove_rejects_malformed_records_up_front() {
        let ops = ops();
        let session_id = SessionId::new();
        ops.upsert_entity(session_id, upsert_input("Bandit", "core", "enemy"))
            .await
            .unwrap();

        let err = ops
            .bulk_remove(
                session_id,
                vec![RemoveEntityInput {
                    entity_type: "core".to_string(),
                    category: "dragon".to_string(),
                    entity_id: "Bandit".to_string(),
                }],
            )
            .await
            .unwrap_err();
        match err {
            OpsError::Domain(DomainError::Validation { details, .. }) => {
                assert!(details.contains_key("entities[0].entityCategory"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        // Nothing was removed
        let pool = ops.get(session_id).await.unwrap();
        assert_eq!(pool.entities(EntityCategory::Enemy).len(), 1);
    }

    #[tokio::test]
    async fn conflicting_write_is_retried_once() {
        let mut repo = MockEntityPoolRepo::new();
        let session_id = SessionId::new();
        let campaign_id = CampaignId::new();
        let theme_id = ThemeId::new();
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

        let stored = EntityPool::new(session_id, campaign_id, theme_id, now);
        repo.expect_get()
            .returning(move |_| Ok(Some(stored.clone())));

        let mut saves = 0;
        repo.expect_save().returning(move |pool, _| {
            saves += 1;
            if saves == 1 {
                Err(RepoError::conflict("EntityPool", pool.session_id(), 0, 1))
            } else {
                Ok(())
            }
        });

        let ops = EntityPoolOps::new(Arc::new(repo), clock());
        let mut input = upsert_input("Bandit", "core", "enemy");
        input.create_pool = None;
        let pool = ops.upsert_entity(session_id, input).await.unwrap();
        assert_eq!(pool.entities(EntityCategory::Enemy).len(), 1);
    }
}
