//! Location-entity mapping operations and the exploration algorithm.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tablekeep_domain::{
    validate_mapping_fields, AvailabilityRule, DomainError, EntityCategory, EntityKind,
    ExplorationIntensity, LocationId, LocationMapping, MappingId, SessionId, TimeOfDay,
};

use crate::infrastructure::ports::{
    ClockPort, EntityPoolRepo, MappingRepo, ProgressNotifierPort, ProgressUpdate,
};
use crate::use_cases::entity_pool::parse_kind_category;
use crate::use_cases::OpsError;

/// One record of a bulk mapping creation (enum fields still raw strings).
#[derive(Debug, Clone)]
pub struct MappingRecordInput {
    pub location_id: LocationId,
    pub entity_id: String,
    pub entity_type: String,
    pub entity_category: String,
    pub always_available: Option<bool>,
    pub time_restriction: Option<String>,
    pub prerequisite_entities: Vec<String>,
}

/// A mapping joined with the pool entity's display metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityReference {
    pub mapping_id: MappingId,
    pub entity_id: String,
    pub name: String,
    pub entity_type: EntityKind,
    pub category: EntityCategory,
    pub is_available: bool,
    pub discovered_at: Option<DateTime<Utc>>,
}

/// Result of one exploration pass over a location.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorationReport {
    pub location_id: LocationId,
    pub newly_discovered: Vec<EntityReference>,
    /// discovered / total, in percent; 100 for a location with no mappings
    pub exploration_level: u8,
    pub time_spent_minutes: u32,
    pub is_fully_explored: bool,
}

pub struct MappingOps {
    mappings: Arc<dyn MappingRepo>,
    pools: Arc<dyn EntityPoolRepo>,
    clock: Arc<dyn ClockPort>,
    notifier: Arc<dyn ProgressNotifierPort>,
}

impl MappingOps {
    pub fn new(
        mappings: Arc<dyn MappingRepo>,
        pools: Arc<dyn EntityPoolRepo>,
        clock: Arc<dyn ClockPort>,
        notifier: Arc<dyn ProgressNotifierPort>,
    ) -> Self {
        Self {
            mappings,
            pools,
            clock,
            notifier,
        }
    }

    /// Batch creation; the whole batch is rejected when any record is
    /// invalid, so a partial insert can never happen.
    pub async fn create_mappings(
        &self,
        session_id: SessionId,
        records: Vec<MappingRecordInput>,
    ) -> Result<Vec<LocationMapping>, OpsError> {
        if records.is_empty() {
            return Err(DomainError::validation("mappings must not be empty").into());
        }

        let now = self.clock.now();
        let mut details = BTreeMap::new();
        let mut built = Vec::with_capacity(records.len());

        for (i, record) in records.iter().enumerate() {
            let prefix = format!("mappings[{i}].");
            let parsed =
                match parse_kind_category(&record.entity_type, &record.entity_category, &prefix) {
                    Ok(parsed) => Some(parsed),
                    Err(DomainError::Validation {
                        details: mut field_details,
                        ..
                    }) => {
                        details.append(&mut field_details);
                        None
                    }
                    Err(other) => return Err(other.into()),
                };

            let time_restriction = match &record.time_restriction {
                Some(raw) => match TimeOfDay::parse(raw) {
                    Ok(time) => Some(time),
                    Err(e) => {
                        details.insert(format!("{prefix}timeRestriction"), e.to_string());
                        None
                    }
                },
                None => None,
            };

            let Some((kind, category)) = parsed else {
                continue;
            };
            if let Err((field, reason)) = validate_mapping_fields(&record.entity_id, kind, category)
            {
                details.insert(format!("{prefix}{field}"), reason);
                continue;
            }

            let gated =
                time_restriction.is_some() || !record.prerequisite_entities.is_empty();
            let rule = AvailabilityRule {
                always_available: record.always_available.unwrap_or(!gated),
                time_restriction,
                prerequisite_entities: record.prerequisite_entities.clone(),
            };
            built.push(
                LocationMapping::new(
                    session_id,
                    record.location_id,
                    record.entity_id.clone(),
                    category,
                    now,
                )
                .with_availability_rule(rule),
            );
        }

        if !details.is_empty() {
            return Err(DomainError::validation_with_details(
                "invalid mapping records",
                details,
            )
            .into());
        }

        self.mappings.insert_batch(built.clone()).await?;
        Ok(built)
    }

    /// All mappings of a location joined with entity metadata.
    pub async fn available_entities_for_location(
        &self,
        location_id: LocationId,
        session_id: SessionId,
    ) -> Result<Vec<EntityReference>, OpsError> {
        let mappings = self.mappings.list_for_location(location_id, session_id).await?;
        let pool = self.pools.get(session_id).await?;
        Ok(mappings
            .iter()
            .map(|mapping| to_reference(mapping, pool.as_ref()))
            .collect())
    }

    /// Direct availability override from GM tools.
    pub async fn update_availability(
        &self,
        mapping_id: MappingId,
        is_available: bool,
    ) -> Result<LocationMapping, OpsError> {
        let mut mapping = self.get_mapping(mapping_id).await?;
        mapping.set_available(is_available);
        self.mappings.save(&mapping).await?;
        Ok(mapping)
    }

    /// Idempotent discovery mark: the first call stamps `discovered_at`,
    /// later calls leave the timestamp untouched.
    pub async fn mark_discovered(&self, mapping_id: MappingId) -> Result<LocationMapping, OpsError> {
        let mut mapping = self.get_mapping(mapping_id).await?;
        let newly = mapping.mark_discovered(self.clock.now());
        self.mappings.save(&mapping).await?;
        if newly {
            self.notifier
                .notify(ProgressUpdate::EntityDiscovered {
                    session_id: mapping.session_id(),
                    entity_id: mapping.entity_id().to_string(),
                })
                .await;
        }
        Ok(mapping)
    }

    /// Recompute `is_available` for every mapping of the session against its
    /// time window and prerequisites. Returns the number of mappings whose
    /// flag changed. Discoveries are never retracted.
    pub async fn update_dynamic_availability(
        &self,
        session_id: SessionId,
        time_of_day: TimeOfDay,
    ) -> Result<usize, OpsError> {
        let mappings = self.mappings.list_for_session(session_id).await?;
        let discovered: HashSet<String> = mappings
            .iter()
            .filter(|m| m.is_discovered())
            .map(|m| m.entity_id().to_string())
            .collect();
        let discovered_refs: HashSet<&str> = discovered.iter().map(String::as_str).collect();

        let mut changed = 0;
        for mut mapping in mappings {
            let before = mapping.is_available();
            mapping.recompute_availability(time_of_day, &discovered_refs);
            if mapping.is_available() != before {
                self.mappings.save(&mapping).await?;
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// One exploration pass: discover up to the intensity's cap of the
    /// location's undiscovered, available entities, core entities first,
    /// then insertion order.
    pub async fn explore_location(
        &self,
        location_id: LocationId,
        character_id: tablekeep_domain::CharacterId,
        session_id: SessionId,
        intensity: ExplorationIntensity,
    ) -> Result<ExplorationReport, OpsError> {
        tracing::debug!(
            location_id = %location_id,
            character_id = %character_id,
            intensity = %intensity,
            "Exploring location"
        );
        let now = self.clock.now();
        let mappings = self.mappings.list_for_location(location_id, session_id).await?;
        let total = mappings.len();
        let pool = self.pools.get(session_id).await?;

        // Stable priority: core before bonus, insertion order within each
        let mut candidates: Vec<LocationMapping> = mappings
            .iter()
            .filter(|m| m.is_available() && !m.is_discovered())
            .cloned()
            .collect();
        candidates.sort_by_key(|m| match m.entity_kind() {
            EntityKind::Core => 0,
            EntityKind::Bonus => 1,
        });

        let cap = intensity.discovery_cap().unwrap_or(candidates.len());
        let mut newly_discovered = Vec::new();
        for mut mapping in candidates.into_iter().take(cap) {
            mapping.mark_discovered(now);
            self.mappings.save(&mapping).await?;
            newly_discovered.push(to_reference(&mapping, pool.as_ref()));
        }

        // Evaluate after this call's mutations
        let after = self.mappings.list_for_location(location_id, session_id).await?;
        let discovered_count = after.iter().filter(|m| m.is_discovered()).count();
        let exploration_level = if total == 0 {
            100
        } else {
            (discovered_count * 100 / total) as u8
        };
        let is_fully_explored = exploration_level >= 100 && discovered_count == total;

        self.notifier
            .notify(ProgressUpdate::LocationExplored {
                session_id,
                location_id,
                exploration_level,
                newly_discovered: newly_discovered
                    .iter()
                    .map(|reference| reference.entity_id.clone())
                    .collect(),
            })
            .await;

        Ok(ExplorationReport {
            location_id,
            newly_discovered,
            exploration_level,
            time_spent_minutes: intensity.time_cost_minutes(),
            is_fully_explored,
        })
    }

    async fn get_mapping(&self, mapping_id: MappingId) -> Result<LocationMapping, OpsError> {
        self.mappings
            .get(mapping_id)
            .await?
            .ok_or_else(|| {
                DomainError::not_found("LocationMapping", mapping_id.to_string()).into()
            })
    }
}

fn to_reference(
    mapping: &LocationMapping,
    pool: Option<&tablekeep_domain::EntityPool>,
) -> EntityReference {
    let name = pool
        .and_then(|p| p.find(mapping.entity_category(), mapping.entity_id()))
        .map(|entity| entity.name.clone())
        .unwrap_or_else(|| mapping.entity_id().to_string());
    EntityReference {
        mapping_id: mapping.mapping_id(),
        entity_id: mapping.entity_id().to_string(),
        name,
        entity_type: mapping.entity_kind(),
        category: mapping.entity_category(),
        is_available: mapping.is_available(),
        discovered_at: mapping.discovered_at(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::memory::{MemoryEntityPoolRepo, MemoryMappingRepo};
    use crate::infrastructure::notifier::TracingNotifier;
    use chrono::TimeZone;

    fn ops() -> (MappingOps, Arc<MemoryMappingRepo>) {
        let mappings = Arc::new(MemoryMappingRepo::new());
        let ops = MappingOps::new(
            mappings.clone(),
            Arc::new(MemoryEntityPoolRepo::new()),
            Arc::new(FixedClock(
                Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            )),
            Arc::new(TracingNotifier::new()),
        );
        (ops, mappings)
    }

    fn record(location_id: LocationId, entity_id: &str, category: &str, kind: &str) -> MappingRecordInput {
        MappingRecordInput {
            location_id,
            entity_id: entity_id.to_string(),
            entity_type: kind.to_string(),
            entity_category: category.to_string(),
            always_available: None,
            time_restriction: None,
            prerequisite_entities: Vec::new(),
        }
    }

    #[tokio::test]
    async fn batch_with_one_bad_record_inserts_nothing() {
        let (ops, repo) = ops();
        let session_id = SessionId::new();
        let location_id = LocationId::new();

        let mut records = vec![
            record(location_id, "e1", "enemy", "core"),
            record(location_id, "e2", "event", "core"),
            record(location_id, "e3", "npc", "core"),
            record(location_id, "e4", "item", "core"),
            record(location_id, "e5", "quest", "core"),
        ];
        records.push(record(location_id, "e6", "wisp", "bonus"));

        let err = ops.create_mappings(session_id, records).await.unwrap_err();
        match err {
            OpsError::Domain(DomainError::Validation { details, .. }) => {
                assert!(details.contains_key("mappings[5].entityCategory"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(repo.list_for_session(session_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn gated_mappings_start_unavailable() {
        let (ops, _) = ops();
        let session_id = SessionId::new();
        let location_id = LocationId::new();

        let mut gated = record(location_id, "e1", "item", "core");
        gated.prerequisite_entities = vec!["e0".to_string()];
        let open = record(location_id, "e2", "item", "core");

        let created = ops
            .create_mappings(session_id, vec![gated, open])
            .await
            .unwrap();
        assert!(!created[0].is_available());
        assert!(created[1].is_available());
    }

    #[tokio::test]
    async fn dynamic_recompute_opens_mappings_whose_prerequisites_arrived() {
        let (ops, _) = ops();
        let session_id = SessionId::new();
        let location_id = LocationId::new();

        let mut gated = record(location_id, "treasure", "item", "core");
        gated.prerequisite_entities = vec!["key".to_string()];
        let created = ops
            .create_mappings(
                session_id,
                vec![record(location_id, "key", "item", "core"), gated],
            )
            .await
            .unwrap();

        // Nothing discovered yet: the gated mapping stays closed
        let changed = ops
            .update_dynamic_availability(session_id, TimeOfDay::Morning)
            .await
            .unwrap();
        assert_eq!(changed, 0);

        ops.mark_discovered(created[0].mapping_id()).await.unwrap();
        let changed = ops
            .update_dynamic_availability(session_id, TimeOfDay::Morning)
            .await
            .unwrap();
        assert_eq!(changed, 1);

        let refreshed = ops
            .available_entities_for_location(location_id, session_id)
            .await
            .unwrap();
        assert!(refreshed.iter().all(|r| r.is_available));
    }

    #[tokio::test]
    async fn closed_time_window_does_not_retract_discovery() {
        let (ops, _) = ops();
        let session_id = SessionId::new();
        let location_id = LocationId::new();

        let mut nocturnal = record(location_id, "ghost", "event", "core");
        nocturnal.time_restriction = Some("night".to_string());
        let created = ops.create_mappings(session_id, vec![nocturnal]).await.unwrap();

        ops.mark_discovered(created[0].mapping_id()).await.unwrap();
        ops.update_dynamic_availability(session_id, TimeOfDay::Morning)
            .await
            .unwrap();

        let refreshed = ops
            .available_entities_for_location(location_id, session_id)
            .await
            .unwrap();
        assert!(refreshed[0].is_available);
        assert!(refreshed[0].discovered_at.is_some());
    }

    #[tokio::test]
    async fn mark_discovered_twice_keeps_the_first_timestamp() {
        let (ops, _) = ops();
        let session_id = SessionId::new();
        let created = ops
            .create_mappings(
                session_id,
                vec![record(LocationId::new(), "e1", "npc", "core")],
            )
            .await
            .unwrap();

        let first = ops.mark_discovered(created[0].mapping_id()).await.unwrap();
        let second = ops.mark_discovered(created[0].mapping_id()).await.unwrap();
        assert_eq!(first.discovered_at(), second.discovered_at());
    }

    #[tokio::test]
    async fn thorough_exploration_discovers_core_entities_first() {
        let (ops, _) = ops();
        let session_id = SessionId::new();
        let location_id = LocationId::new();

        // Bonus entities inserted before core: priority must still favor core
        ops.create_mappings(
            session_id,
            vec![
                record(location_id, "coin", "practical", "bonus"),
                record(location_id, "medal", "trophy", "bonus"),
                record(location_id, "bandit", "enemy", "core"),
                record(location_id, "ledger", "item", "core"),
            ],
        )
        .await
        .unwrap();

        let report = ops
            .explore_location(
                location_id,
                tablekeep_domain::CharacterId::new(),
                session_id,
                ExplorationIntensity::Thorough,
            )
            .await
            .unwrap();

        assert_eq!(report.newly_discovered.len(), 3);
        assert_eq!(report.newly_discovered[0].entity_id, "bandit");
        assert_eq!(report.newly_discovered[1].entity_id, "ledger");
        assert_eq!(report.newly_discovered[2].entity_id, "coin");
        assert_eq!(report.exploration_level, 75);
        assert!(!report.is_fully_explored);
    }

    #[tokio::test]
    async fn exhaustive_exploration_clears_the_location() {
        let (ops, _) = ops();
        let session_id = SessionId::new();
        let location_id = LocationId::new();
        ops.create_mappings(
            session_id,
            vec![
                record(location_id, "a", "enemy", "core"),
                record(location_id, "b", "event", "core"),
                record(location_id, "c", "practical", "bonus"),
                record(location_id, "d", "mystery", "bonus"),
            ],
        )
        .await
        .unwrap();

        let report = ops
            .explore_location(
                location_id,
                tablekeep_domain::CharacterId::new(),
                session_id,
                ExplorationIntensity::Exhaustive,
            )
            .await
            .unwrap();
        assert_eq!(report.newly_discovered.len(), 4);
        assert_eq!(report.exploration_level, 100);
        assert!(report.is_fully_explored);
    }

    #[tokio::test]
    async fn exploration_level_never_decreases() {
        let (ops, _) = ops();
        let session_id = SessionId::new();
        let location_id = LocationId::new();
        ops.create_mappings(
            session_id,
            vec![
                record(location_id, "a", "enemy", "core"),
                record(location_id, "b", "event", "core"),
                record(location_id, "c", "item", "core"),
            ],
        )
        .await
        .unwrap();

        let mut last_level = 0;
        for _ in 0..4 {
            let report = ops
                .explore_location(
                    location_id,
                    tablekeep_domain::CharacterId::new(),
                    session_id,
                    ExplorationIntensity::Light,
                )
                .await
                .unwrap();
            assert!(report.exploration_level >= last_level);
            last_level = report.exploration_level;
        }
        assert_eq!(last_level, 100);
    }

    #[tokio::test]
    async fn empty_location_reports_fully_explored() {
        let (ops, _) = ops();
        let report = ops
            .explore_location(
                LocationId::new(),
                tablekeep_domain::CharacterId::new(),
                SessionId::new(),
                ExplorationIntensity::Light,
            )
            .await
            .unwrap();
        assert_eq!(report.exploration_level, 100);
        assert!(report.is_fully_explored);
        assert!(report.newly_discovered.is_empty());
    }
}
