//! Location-entity mapping - where content can be discovered
//!
//! A mapping is the many-to-many edge between a location and a pool entity,
//! scoped to a session. It carries the availability gate (time window and
//! prerequisite entities) and the discovery timestamp, which is set exactly
//! once and never retracted.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::entity_pool::{EntityCategory, EntityKind};
use crate::error::DomainError;
use crate::ids::{LocationId, MappingId, SessionId};

/// Coarse in-game time of day used by availability windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "morning" => Ok(Self::Morning),
            "afternoon" => Ok(Self::Afternoon),
            "evening" => Ok(Self::Evening),
            "night" => Ok(Self::Night),
            other => Err(DomainError::parse(format!("Unknown time of day: {other}"))),
        }
    }
}

/// When a mapping can be discovered.
///
/// `always_available` short-circuits both gates; otherwise the current time
/// of day must match the restriction (when one is set) and every
/// prerequisite entity must already be discovered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRule {
    pub always_available: bool,
    /// Time window the mapping is open in, if restricted
    pub time_restriction: Option<TimeOfDay>,
    /// Entity identities that must be discovered first
    pub prerequisite_entities: Vec<String>,
}

impl AvailabilityRule {
    pub fn always() -> Self {
        Self {
            always_available: true,
            time_restriction: None,
            prerequisite_entities: Vec::new(),
        }
    }

    pub fn with_time_restriction(mut self, time: TimeOfDay) -> Self {
        self.time_restriction = Some(time);
        self.always_available = false;
        self
    }

    pub fn with_prerequisite(mut self, entity_id: impl Into<String>) -> Self {
        self.prerequisite_entities.push(entity_id.into());
        self.always_available = false;
        self
    }

    /// Evaluate the rule against the current time and discovered set.
    pub fn is_open(&self, time: TimeOfDay, discovered: &HashSet<&str>) -> bool {
        if self.always_available {
            return true;
        }
        if let Some(window) = self.time_restriction {
            if window != time {
                return false;
            }
        }
        self.prerequisite_entities
            .iter()
            .all(|prerequisite| discovered.contains(prerequisite.as_str()))
    }
}

/// The association between a location and a discoverable entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationMapping {
    mapping_id: MappingId,
    session_id: SessionId,
    location_id: LocationId,
    entity_id: String,
    entity_kind: EntityKind,
    entity_category: EntityCategory,
    is_available: bool,
    availability: AvailabilityRule,
    /// Set exactly once on first discovery; monotonic, never unset
    discovered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl LocationMapping {
    pub fn new(
        session_id: SessionId,
        location_id: LocationId,
        entity_id: impl Into<String>,
        entity_category: EntityCategory,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            mapping_id: MappingId::new(),
            session_id,
            location_id,
            entity_id: entity_id.into(),
            entity_kind: entity_category.kind(),
            entity_category,
            is_available: true,
            availability: AvailabilityRule::always(),
            discovered_at: None,
            created_at: now,
        }
    }

    // === Accessors ===

    pub fn mapping_id(&self) -> MappingId {
        self.mapping_id
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn location_id(&self) -> LocationId {
        self.location_id
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn entity_kind(&self) -> EntityKind {
        self.entity_kind
    }

    pub fn entity_category(&self) -> EntityCategory {
        self.entity_category
    }

    pub fn is_available(&self) -> bool {
        self.is_available
    }

    pub fn availability(&self) -> &AvailabilityRule {
        &self.availability
    }

    pub fn discovered_at(&self) -> Option<DateTime<Utc>> {
        self.discovered_at
    }

    pub fn is_discovered(&self) -> bool {
        self.discovered_at.is_some()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    // === Builders ===

    pub fn with_availability_rule(mut self, rule: AvailabilityRule) -> Self {
        self.is_available = rule.always_available;
        self.availability = rule;
        self
    }

    pub fn with_available(mut self, available: bool) -> Self {
        self.is_available = available;
        self
    }

    // === Mutations ===

    /// Direct availability override (GM tools or dynamic recompute).
    ///
    /// A discovered mapping stays available regardless of the requested
    /// value - discovery is never retracted.
    pub fn set_available(&mut self, available: bool) {
        if self.is_discovered() {
            self.is_available = true;
            return;
        }
        self.is_available = available;
    }

    /// Mark discovered, stamping `discovered_at` on the first call only.
    ///
    /// Returns `true` when this call performed the discovery. Forces
    /// `is_available = true`: a discovered entity is definitionally
    /// available.
    pub fn mark_discovered(&mut self, now: DateTime<Utc>) -> bool {
        self.is_available = true;
        if self.discovered_at.is_some() {
            return false;
        }
        self.discovered_at = Some(now);
        true
    }

    /// Recompute `is_available` from the availability rule.
    pub fn recompute_availability(&mut self, time: TimeOfDay, discovered: &HashSet<&str>) {
        self.set_available(self.availability.is_open(time, discovered));
    }
}

/// Validate the raw pieces of a mapping record before construction.
///
/// Returns the offending field name and reason on failure so batch creation
/// can reject the whole batch with a per-field details map.
pub fn validate_mapping_fields(
    entity_id: &str,
    kind: EntityKind,
    category: EntityCategory,
) -> Result<(), (String, String)> {
    if entity_id.trim().is_empty() {
        return Err(("entityId".to_string(), "must not be empty".to_string()));
    }
    if category.kind() != kind {
        return Err((
            "entityCategory".to_string(),
            format!(
                "category '{}' is {} content but entityType says '{}'",
                category,
                category.kind(),
                kind
            ),
        ));
    }
    Ok(())
}
