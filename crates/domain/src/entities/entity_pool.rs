//! Entity pool aggregate - the discoverable content of one game session
//!
//! A pool holds two families of entities: core entities count toward
//! milestone completion, bonus entities are flavor and reward only. Within a
//! category an entity is identified by its `id`, falling back to `name` when
//! the authoring source (GM tooling or AI generation) did not assign one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::{CampaignId, SessionId, ThemeId};

/// Whether an entity counts toward milestone progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    /// Required for milestone completion
    Core,
    /// Flavor/reward only, no milestone effect
    Bonus,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Bonus => "bonus",
        }
    }

    /// Parse a kind from a string (case-insensitive).
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "core" => Ok(Self::Core),
            "bonus" => Ok(Self::Bonus),
            other => Err(DomainError::parse(format!("Unknown entity kind: {other}"))),
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Category of a discoverable entity.
///
/// The category determines which collection of the pool the entity lives in
/// and, by extension, whether it is core or bonus content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityCategory {
    /// Hostile encounter (core)
    Enemy,
    /// Scripted happening (core)
    Event,
    /// Non-player character (core)
    Npc,
    /// Significant object (core)
    Item,
    /// Side objective (core)
    Quest,
    /// Useful reward: consumables, currency (bonus)
    Practical,
    /// Trophy item with no mechanical effect (bonus)
    Trophy,
    /// Mystery item whose nature is revealed later (bonus)
    Mystery,
}

impl EntityCategory {
    /// All categories, core first, in canonical order.
    pub const ALL: [EntityCategory; 8] = [
        Self::Enemy,
        Self::Event,
        Self::Npc,
        Self::Item,
        Self::Quest,
        Self::Practical,
        Self::Trophy,
        Self::Mystery,
    ];

    /// The kind implied by this category.
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Enemy | Self::Event | Self::Npc | Self::Item | Self::Quest => EntityKind::Core,
            Self::Practical | Self::Trophy | Self::Mystery => EntityKind::Bonus,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enemy => "enemy",
            Self::Event => "event",
            Self::Npc => "npc",
            Self::Item => "item",
            Self::Quest => "quest",
            Self::Practical => "practical",
            Self::Trophy => "trophy",
            Self::Mystery => "mystery",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Enemy => "Enemy",
            Self::Event => "Event",
            Self::Npc => "NPC",
            Self::Item => "Item",
            Self::Quest => "Quest",
            Self::Practical => "Practical Reward",
            Self::Trophy => "Trophy",
            Self::Mystery => "Mystery Item",
        }
    }

    /// Parse a category from a string (case-insensitive).
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enemy" => Ok(Self::Enemy),
            "event" => Ok(Self::Event),
            "npc" => Ok(Self::Npc),
            "item" => Ok(Self::Item),
            "quest" => Ok(Self::Quest),
            "practical" => Ok(Self::Practical),
            "trophy" => Ok(Self::Trophy),
            "mystery" => Ok(Self::Mystery),
            other => Err(DomainError::parse(format!(
                "Unknown entity category: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rewards granted when an entity is discovered/resolved.
///
/// Simple data struct with public fields (no invariants to protect).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRewards {
    /// Experience points granted
    pub experience: u32,
    /// Item names granted
    pub items: Vec<String>,
    /// Information strings revealed to the party
    pub information: Vec<String>,
}

impl EntityRewards {
    pub fn experience(xp: u32) -> Self {
        Self {
            experience: xp,
            ..Default::default()
        }
    }

    pub fn with_item(mut self, item: impl Into<String>) -> Self {
        self.items.push(item.into());
        self
    }

    pub fn with_information(mut self, info: impl Into<String>) -> Self {
        self.information.push(info.into());
        self
    }
}

/// One discoverable unit of content, core or bonus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolEntity {
    /// Authored identifier; `name` is the identity fallback when absent
    pub id: Option<String>,
    pub name: String,
    pub category: EntityCategory,
    pub description: String,
    /// Milestone this entity contributes to (core entities only)
    pub milestone_id: Option<String>,
    /// Integer percentage contributed toward the milestone (core entities only).
    /// Authoring invariant: contributions per milestone sum to 100.
    pub progress_contribution: Option<u8>,
    pub rewards: EntityRewards,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PoolEntity {
    pub fn new(name: impl Into<String>, category: EntityCategory, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            name: name.into(),
            category,
            description: String::new(),
            milestone_id: None,
            progress_contribution: None,
            rewards: EntityRewards::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Stable identity within the containing category: `id`, else `name`.
    pub fn identity(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }

    pub fn kind(&self) -> EntityKind {
        self.category.kind()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_milestone(mut self, milestone_id: impl Into<String>, contribution: u8) -> Self {
        self.milestone_id = Some(milestone_id.into());
        self.progress_contribution = Some(contribution);
        self
    }

    pub fn with_rewards(mut self, rewards: EntityRewards) -> Self {
        self.rewards = rewards;
        self
    }

    /// Shallow merge of an incoming entity into this one, incoming wins.
    ///
    /// Optional fields only overwrite when the incoming value is present;
    /// `created_at` is preserved and `updated_at` is stamped.
    pub fn merge_from(&mut self, incoming: PoolEntity, now: DateTime<Utc>) {
        self.name = incoming.name;
        if !incoming.description.is_empty() {
            self.description = incoming.description;
        }
        if incoming.id.is_some() {
            self.id = incoming.id;
        }
        if incoming.milestone_id.is_some() {
            self.milestone_id = incoming.milestone_id;
        }
        if incoming.progress_contribution.is_some() {
            self.progress_contribution = incoming.progress_contribution;
        }
        self.rewards = incoming.rewards;
        self.updated_at = now;
    }
}

/// Core entity collections, one ordered sequence per category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreEntities {
    pub enemies: Vec<PoolEntity>,
    pub events: Vec<PoolEntity>,
    pub npcs: Vec<PoolEntity>,
    pub items: Vec<PoolEntity>,
    pub quests: Vec<PoolEntity>,
}

/// Bonus entity collections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusEntities {
    pub practical_rewards: Vec<PoolEntity>,
    pub trophy_items: Vec<PoolEntity>,
    pub mystery_items: Vec<PoolEntity>,
}

/// Outcome of an upsert into the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// A milestone whose authored core-entity contributions do not sum to 100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneContributionError {
    pub milestone_id: String,
    pub total: u32,
}

/// The per-session pool of discoverable content.
///
/// Exactly one live instance per session; created lazily on first write and
/// deleted only with the owning session. Every mutation stamps
/// `last_updated` and bumps `version` (optimistic concurrency - see the
/// engine's pool repository).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityPool {
    session_id: SessionId,
    campaign_id: CampaignId,
    theme_id: ThemeId,
    core: CoreEntities,
    bonus: BonusEntities,
    version: u64,
    created_at: DateTime<Utc>,
    last_updated: DateTime<Utc>,
}

impl EntityPool {
    pub fn new(
        session_id: SessionId,
        campaign_id: CampaignId,
        theme_id: ThemeId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id,
            campaign_id,
            theme_id,
            core: CoreEntities::default(),
            bonus: BonusEntities::default(),
            version: 0,
            created_at: now,
            last_updated: now,
        }
    }

    // === Accessors ===

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn campaign_id(&self) -> CampaignId {
        self.campaign_id
    }

    pub fn theme_id(&self) -> ThemeId {
        self.theme_id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    pub fn core(&self) -> &CoreEntities {
        &self.core
    }

    pub fn bonus(&self) -> &BonusEntities {
        &self.bonus
    }

    /// The ordered sequence for one category.
    pub fn entities(&self, category: EntityCategory) -> &[PoolEntity] {
        match category {
            EntityCategory::Enemy => &self.core.enemies,
            EntityCategory::Event => &self.core.events,
            EntityCategory::Npc => &self.core.npcs,
            EntityCategory::Item => &self.core.items,
            EntityCategory::Quest => &self.core.quests,
            EntityCategory::Practical => &self.bonus.practical_rewards,
            EntityCategory::Trophy => &self.bonus.trophy_items,
            EntityCategory::Mystery => &self.bonus.mystery_items,
        }
    }

    fn entities_mut(&mut self, category: EntityCategory) -> &mut Vec<PoolEntity> {
        match category {
            EntityCategory::Enemy => &mut self.core.enemies,
            EntityCategory::Event => &mut self.core.events,
            EntityCategory::Npc => &mut self.core.npcs,
            EntityCategory::Item => &mut self.core.items,
            EntityCategory::Quest => &mut self.core.quests,
            EntityCategory::Practical => &mut self.bonus.practical_rewards,
            EntityCategory::Trophy => &mut self.bonus.trophy_items,
            EntityCategory::Mystery => &mut self.bonus.mystery_items,
        }
    }

    /// Iterate over every entity in the pool, core categories first.
    pub fn iter_all(&self) -> impl Iterator<Item = &PoolEntity> {
        EntityCategory::ALL
            .iter()
            .flat_map(|category| self.entities(*category).iter())
    }

    /// Iterate over all core entities.
    pub fn iter_core(&self) -> impl Iterator<Item = &PoolEntity> {
        self.iter_all().filter(|e| e.kind() == EntityKind::Core)
    }

    pub fn find(&self, category: EntityCategory, entity_id: &str) -> Option<&PoolEntity> {
        self.entities(category)
            .iter()
            .find(|e| e.identity() == entity_id)
    }

    /// Look up an entity by identity across all categories.
    pub fn find_anywhere(&self, entity_id: &str) -> Option<&PoolEntity> {
        self.iter_all().find(|e| e.identity() == entity_id)
    }

    // === Mutations ===

    /// Insert the entity into its category, or shallow-merge into the
    /// existing entity with the same identity (incoming wins).
    ///
    /// Identity uniqueness within a category holds by construction: a
    /// duplicate identity always merges instead of inserting.
    pub fn upsert(
        &mut self,
        entity: PoolEntity,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome, DomainError> {
        if entity.name.trim().is_empty() {
            return Err(DomainError::validation("entity name cannot be empty"));
        }
        let category = entity.category;
        let identity = entity.identity().to_string();
        let collection = self.entities_mut(category);
        let outcome = match collection.iter_mut().find(|e| e.identity() == identity) {
            Some(existing) => {
                existing.merge_from(entity, now);
                UpsertOutcome::Updated
            }
            None => {
                collection.push(entity);
                UpsertOutcome::Inserted
            }
        };
        self.touch(now);
        Ok(outcome)
    }

    /// Remove an entity from a category by identity.
    pub fn remove(
        &mut self,
        category: EntityCategory,
        entity_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PoolEntity, DomainError> {
        let collection = self.entities_mut(category);
        let index = collection
            .iter()
            .position(|e| e.identity() == entity_id)
            .ok_or_else(|| DomainError::not_found("PoolEntity", entity_id))?;
        let removed = collection.remove(index);
        self.touch(now);
        Ok(removed)
    }

    /// Stamp `last_updated` and bump the optimistic version.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_updated = now;
        self.version += 1;
    }

    /// Authoring lint: milestones whose core-entity contributions do not sum
    /// to 100. Never enforced at runtime - the progress calculator clamps
    /// instead - but surfaced to GM tooling.
    pub fn milestone_contribution_errors(&self) -> Vec<MilestoneContributionError> {
        let mut totals: std::collections::BTreeMap<&str, u32> = std::collections::BTreeMap::new();
        for entity in self.iter_core() {
            if let (Some(milestone_id), Some(contribution)) =
                (entity.milestone_id.as_deref(), entity.progress_contribution)
            {
                *totals.entry(milestone_id).or_insert(0) += u32::from(contribution);
            }
        }
        totals
            .into_iter()
            .filter(|(_, total)| *total != 100)
            .map(|(milestone_id, total)| MilestoneContributionError {
                milestone_id: milestone_id.to_string(),
                total,
            })
            .collect()
    }
}
