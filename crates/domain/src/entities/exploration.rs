//! Exploration action execution - one player's interaction with one entity
//!
//! An execution moves strictly forward through its phases:
//! `Started -> AwaitingInput -> SkillCheckPending -> Resolved`, with a
//! direct `Started -> SkillCheckPending` shortcut for action types that take
//! no free-text approach. Transitions are checked centrally in
//! [`ExecutionPhase::can_advance_to`]; a resolved execution is immutable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::{CharacterId, ExecutionId, SessionId};

/// What the player is attempting against the target entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExplorationActionType {
    /// Sweep an area for the target; no approach text
    Search,
    /// Engage the target directly; the player describes their approach
    Interact,
    /// Fight the target; no approach text
    Combat,
    /// Freeform action described by the player
    Custom,
}

impl ExplorationActionType {
    /// Whether this action collects a free-text approach before the check.
    pub fn requires_player_input(&self) -> bool {
        match self {
            Self::Interact | Self::Custom => true,
            Self::Search | Self::Combat => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Interact => "interact",
            Self::Combat => "combat",
            Self::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "search" => Ok(Self::Search),
            "interact" => Ok(Self::Interact),
            "combat" => Ok(Self::Combat),
            "custom" => Ok(Self::Custom),
            other => Err(DomainError::parse(format!("Unknown action type: {other}"))),
        }
    }
}

impl std::fmt::Display for ExplorationActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Phase of an exploration execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionPhase {
    Started,
    AwaitingInput,
    SkillCheckPending,
    Resolved,
}

impl ExecutionPhase {
    /// The transition table. Phases only ever move forward.
    pub fn can_advance_to(&self, next: ExecutionPhase) -> bool {
        matches!(
            (self, next),
            (Self::Started, Self::AwaitingInput)
                | (Self::Started, Self::SkillCheckPending)
                | (Self::AwaitingInput, Self::SkillCheckPending)
                | (Self::SkillCheckPending, Self::Resolved)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::AwaitingInput => "awaitingInput",
            Self::SkillCheckPending => "skillCheckPending",
            Self::Resolved => "resolved",
        }
    }
}

impl std::fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Success/failure classification of a skill check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SkillOutcome {
    Success,
    Failure,
}

impl SkillOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Evaluate a d20-style roll against a target number.
///
/// A natural 20 always succeeds and a natural 1 always fails; otherwise
/// roll + modifier must meet the target.
pub fn evaluate_check(roll: i32, modifier: i32, target_number: i32) -> SkillOutcome {
    if roll >= 20 {
        SkillOutcome::Success
    } else if roll <= 1 {
        SkillOutcome::Failure
    } else if roll + modifier >= target_number {
        SkillOutcome::Success
    } else {
        SkillOutcome::Failure
    }
}

/// Is a free-text approach substantial enough to trigger automatic
/// judgment, versus requiring an explicit skill-check call?
pub fn approach_triggers_judgment(approach: &str) -> bool {
    approach.split_whitespace().count() >= 8
}

/// Final result of an exploration execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorationOutcome {
    pub outcome: SkillOutcome,
    /// Narrative text shown to the player
    pub narrative: String,
    pub roll: i32,
    pub modifier: i32,
    pub target_number: i32,
}

/// Transient state for one in-progress exploration action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorationExecution {
    execution_id: ExecutionId,
    session_id: SessionId,
    character_id: CharacterId,
    target_entity_id: String,
    action_type: ExplorationActionType,
    custom_description: Option<String>,
    phase: ExecutionPhase,
    /// Player-supplied approach text, consumed once by the skill check
    user_approach: Option<String>,
    result: Option<ExplorationOutcome>,
    started_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

impl ExplorationExecution {
    pub fn new(
        session_id: SessionId,
        character_id: CharacterId,
        target_entity_id: impl Into<String>,
        action_type: ExplorationActionType,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            execution_id: ExecutionId::new(),
            session_id,
            character_id,
            target_entity_id: target_entity_id.into(),
            action_type,
            custom_description: None,
            phase: ExecutionPhase::Started,
            user_approach: None,
            result: None,
            started_at: now,
            resolved_at: None,
        }
    }

    // === Accessors ===

    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn character_id(&self) -> CharacterId {
        self.character_id
    }

    pub fn target_entity_id(&self) -> &str {
        &self.target_entity_id
    }

    pub fn action_type(&self) -> ExplorationActionType {
        self.action_type
    }

    pub fn custom_description(&self) -> Option<&str> {
        self.custom_description.as_deref()
    }

    pub fn phase(&self) -> ExecutionPhase {
        self.phase
    }

    pub fn user_approach(&self) -> Option<&str> {
        self.user_approach.as_deref()
    }

    pub fn result(&self) -> Option<&ExplorationOutcome> {
        self.result.as_ref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
        self.resolved_at
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    // === Builders ===

    pub fn with_custom_description(mut self, description: impl Into<String>) -> Self {
        self.custom_description = Some(description.into());
        self
    }

    // === Transitions ===

    /// Advance to the next phase, rejecting anything outside the table.
    pub fn advance_to(&mut self, next: ExecutionPhase) -> Result<(), DomainError> {
        if !self.phase.can_advance_to(next) {
            return Err(DomainError::invalid_phase(format!(
                "{} -> {}",
                self.phase, next
            )));
        }
        self.phase = next;
        Ok(())
    }

    /// Move out of `Started` according to the action type.
    pub fn begin(&mut self) -> Result<(), DomainError> {
        if self.action_type.requires_player_input() {
            self.advance_to(ExecutionPhase::AwaitingInput)
        } else {
            self.advance_to(ExecutionPhase::SkillCheckPending)
        }
    }

    /// Record the player's approach; only valid from `AwaitingInput`.
    pub fn provide_approach(&mut self, approach: impl Into<String>) -> Result<(), DomainError> {
        self.advance_to(ExecutionPhase::SkillCheckPending)?;
        self.user_approach = Some(approach.into());
        Ok(())
    }

    /// Consume the approach text (at most once).
    pub fn take_approach(&mut self) -> Option<String> {
        self.user_approach.take()
    }

    /// Resolve the execution; only valid from `SkillCheckPending`.
    pub fn resolve(
        &mut self,
        outcome: ExplorationOutcome,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.advance_to(ExecutionPhase::Resolved)?;
        self.result = Some(outcome);
        self.resolved_at = Some(now);
        Ok(())
    }
}
