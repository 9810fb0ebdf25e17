//! Exploration action flow - driving one execution from start to resolution.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tablekeep_domain::{
    approach_triggers_judgment, evaluate_check, CharacterId, DomainError, ExecutionId,
    ExecutionPhase, ExplorationActionType, ExplorationExecution, ExplorationOutcome, SessionId,
    SkillOutcome,
};

use crate::infrastructure::ports::{
    ClockPort, ExecutionRepo, LlmPort, LlmRequest, MappingRepo, ProgressNotifierPort,
    ProgressUpdate, RandomPort,
};
use crate::use_cases::OpsError;

/// Target number used when the caller does not supply one.
pub const DEFAULT_TARGET_NUMBER: i32 = 12;

/// Non-terminal executions older than this are eligible for reaping.
pub const EXECUTION_TTL_MINUTES: i64 = 30;

/// Acknowledgement of a player's free-text approach.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInputAck {
    pub execution_id: ExecutionId,
    pub phase: ExecutionPhase,
    /// Whether the approach is substantial enough for automatic judgment
    pub judgment_triggered: bool,
}

/// Result of resolving the pending skill check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillCheckReport {
    pub execution_id: ExecutionId,
    pub outcome: SkillOutcome,
    pub roll: i32,
    pub modifier: i32,
    pub total: i32,
    pub target_number: i32,
    pub narrative: String,
    /// Whether the success marked the target entity's mapping discovered
    pub entity_discovered: bool,
}

pub struct ExplorationFlowOps {
    executions: Arc<dyn ExecutionRepo>,
    mappings: Arc<dyn MappingRepo>,
    clock: Arc<dyn ClockPort>,
    random: Arc<dyn RandomPort>,
    llm: Arc<dyn LlmPort>,
    notifier: Arc<dyn ProgressNotifierPort>,
}

impl ExplorationFlowOps {
    pub fn new(
        executions: Arc<dyn ExecutionRepo>,
        mappings: Arc<dyn MappingRepo>,
        clock: Arc<dyn ClockPort>,
        random: Arc<dyn RandomPort>,
        llm: Arc<dyn LlmPort>,
        notifier: Arc<dyn ProgressNotifierPort>,
    ) -> Self {
        Self {
            executions,
            mappings,
            clock,
            random,
            llm,
            notifier,
        }
    }

    /// Start an exploration action against one entity.
    ///
    /// The execution leaves `Started` immediately: action types that take a
    /// free-text approach move to `AwaitingInput`, the rest go straight to
    /// `SkillCheckPending`.
    pub async fn start_action(
        &self,
        session_id: SessionId,
        character_id: CharacterId,
        target_entity_id: String,
        action_type: String,
        custom_description: Option<String>,
    ) -> Result<ExplorationExecution, OpsError> {
        let mut details = BTreeMap::new();
        if target_entity_id.trim().is_empty() {
            details.insert("targetEntityId".to_string(), "must not be empty".to_string());
        }
        let action_type = match ExplorationActionType::parse(&action_type) {
            Ok(action_type) => Some(action_type),
            Err(e) => {
                details.insert("actionType".to_string(), e.to_string());
                None
            }
        };
        let Some(action_type) = action_type else {
            return Err(
                DomainError::validation_with_details("invalid exploration action", details).into(),
            );
        };
        if !details.is_empty() {
            return Err(
                DomainError::validation_with_details("invalid exploration action", details).into(),
            );
        }

        let mut execution = ExplorationExecution::new(
            session_id,
            character_id,
            target_entity_id,
            action_type,
            self.clock.now(),
        );
        if let Some(description) = custom_description {
            execution = execution.with_custom_description(description);
        }
        execution.begin()?;
        self.executions.save(&execution).await?;
        Ok(execution)
    }

    /// Record the player's approach text; valid only from `AwaitingInput`.
    pub async fn provide_user_input(
        &self,
        execution_id: ExecutionId,
        character_id: CharacterId,
        user_approach: String,
    ) -> Result<UserInputAck, OpsError> {
        if user_approach.trim().is_empty() {
            let mut details = BTreeMap::new();
            details.insert("userApproach".to_string(), "must not be empty".to_string());
            return Err(
                DomainError::validation_with_details("invalid user input", details).into(),
            );
        }

        let mut execution = self.get_execution(execution_id).await?;
        self.check_character(&execution, character_id)?;

        execution.provide_approach(user_approach.clone())?;
        self.executions.save(&execution).await?;

        Ok(UserInputAck {
            execution_id,
            phase: execution.phase(),
            judgment_triggered: approach_triggers_judgment(&user_approach),
        })
    }

    /// Resolve the pending skill check; valid only from `SkillCheckPending`.
    ///
    /// On success the target entity's mapping (when one exists) is marked
    /// discovered. Narrative text comes from the LLM collaborator, with a
    /// deterministic fallback when the call fails.
    pub async fn execute_skill_check(
        &self,
        execution_id: ExecutionId,
        character_id: CharacterId,
        skill_type: String,
        target_number: Option<i32>,
        modifiers: Option<i32>,
    ) -> Result<SkillCheckReport, OpsError> {
        if skill_type.trim().is_empty() {
            let mut details = BTreeMap::new();
            details.insert("skillType".to_string(), "must not be empty".to_string());
            return Err(
                DomainError::validation_with_details("invalid skill check", details).into(),
            );
        }

        let mut execution = self.get_execution(execution_id).await?;
        self.check_character(&execution, character_id)?;

        // Guard before rolling dice or calling the LLM; resolve() re-checks
        if !execution.phase().can_advance_to(ExecutionPhase::Resolved) {
            return Err(DomainError::invalid_phase(format!(
                "{} -> {}",
                execution.phase(),
                ExecutionPhase::Resolved
            ))
            .into());
        }

        let roll = self.random.gen_range(1, 20);
        let modifier = modifiers.unwrap_or(0);
        let target_number = target_number.unwrap_or(DEFAULT_TARGET_NUMBER);
        let outcome = evaluate_check(roll, modifier, target_number);

        let approach = execution.take_approach();
        let narrative = self
            .narrative_for(&execution, &skill_type, approach.as_deref(), outcome)
            .await;

        let mut entity_discovered = false;
        if outcome.is_success() {
            if let Some(mut mapping) = self
                .mappings
                .find_for_entity(execution.session_id(), execution.target_entity_id())
                .await?
            {
                entity_discovered = mapping.mark_discovered(self.clock.now());
                self.mappings.save(&mapping).await?;
                if entity_discovered {
                    self.notifier
                        .notify(ProgressUpdate::EntityDiscovered {
                            session_id: execution.session_id(),
                            entity_id: mapping.entity_id().to_string(),
                        })
                        .await;
                }
            }
        }

        execution.resolve(
            ExplorationOutcome {
                outcome,
                narrative: narrative.clone(),
                roll,
                modifier,
                target_number,
            },
            self.clock.now(),
        )?;
        self.executions.save(&execution).await?;

        Ok(SkillCheckReport {
            execution_id,
            outcome,
            roll,
            modifier,
            total: roll + modifier,
            target_number,
            narrative,
            entity_discovered,
        })
    }

    /// Drop abandoned executions older than [`EXECUTION_TTL_MINUTES`].
    pub async fn reap_stale(&self) -> Result<u32, OpsError> {
        let cutoff = self.clock.now() - chrono::Duration::minutes(EXECUTION_TTL_MINUTES);
        Ok(self.executions.reap_stale(cutoff).await?)
    }

    async fn get_execution(
        &self,
        execution_id: ExecutionId,
    ) -> Result<ExplorationExecution, OpsError> {
        self.executions
            .get(execution_id)
            .await?
            .ok_or_else(|| {
                DomainError::not_found("ExplorationExecution", execution_id.to_string()).into()
            })
    }

    fn check_character(
        &self,
        execution: &ExplorationExecution,
        character_id: CharacterId,
    ) -> Result<(), DomainError> {
        if execution.character_id() != character_id {
            let mut details = BTreeMap::new();
            details.insert(
                "characterId".to_string(),
                "does not match the execution's character".to_string(),
            );
            return Err(DomainError::validation_with_details(
                "character mismatch",
                details,
            ));
        }
        Ok(())
    }

    async fn narrative_for(
        &self,
        execution: &ExplorationExecution,
        skill_type: &str,
        approach: Option<&str>,
        outcome: SkillOutcome,
    ) -> String {
        let result = if outcome.is_success() { "succeeds" } else { "fails" };
        let mut prompt = format!(
            "A player attempts a {} action ({} check) against '{}' and {}.",
            execution.action_type(),
            skill_type,
            execution.target_entity_id(),
            result,
        );
        if let Some(approach) = approach {
            prompt.push_str(&format!(" Their approach: {approach}."));
        }
        if let Some(description) = execution.custom_description() {
            prompt.push_str(&format!(" Action description: {description}."));
        }
        prompt.push_str(" Narrate the result in two sentences, second person, present tense.");

        let request = LlmRequest::new(prompt)
            .with_system_prompt("You narrate a tabletop RPG session for the game master.")
            .with_temperature(0.8)
            .with_max_tokens(160);

        match self.llm.generate(request).await {
            Ok(response) if !response.content.trim().is_empty() => {
                response.content.trim().to_string()
            }
            Ok(_) => fallback_narrative(outcome, skill_type),
            Err(e) => {
                tracing::warn!(error = %e, "Narrative generation failed, using fallback");
                fallback_narrative(outcome, skill_type)
            }
        }
    }
}

fn fallback_narrative(outcome: SkillOutcome, skill_type: &str) -> String {
    match outcome {
        SkillOutcome::Success => format!(
            "Your {skill_type} attempt pays off, and the effort reveals what you were after."
        ),
        SkillOutcome::Failure => format!(
            "Despite your best {skill_type} effort, the attempt comes up short this time."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::{FixedClock, FixedRandom};
    use crate::infrastructure::memory::{MemoryExecutionRepo, MemoryMappingRepo};
    use crate::infrastructure::notifier::TracingNotifier;
    use crate::infrastructure::ports::{LlmError, LlmResponse, MockLlmPort};
    use chrono::{TimeZone, Utc};
    use tablekeep_domain::{EntityCategory, LocationId, LocationMapping};

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn failing_llm() -> Arc<MockLlmPort> {
        let mut llm = MockLlmPort::new();
        llm.expect_generate()
            .returning(|_| Err(LlmError::RequestFailed("offline".to_string())));
        Arc::new(llm)
    }

    fn ops_with(
        roll: i32,
        llm: Arc<MockLlmPort>,
    ) -> (ExplorationFlowOps, Arc<MemoryMappingRepo>) {
        let mappings = Arc::new(MemoryMappingRepo::new());
        let ops = ExplorationFlowOps::new(
            Arc::new(MemoryExecutionRepo::new()),
            mappings.clone(),
            Arc::new(FixedClock(now())),
            Arc::new(FixedRandom(roll)),
            llm,
            Arc::new(TracingNotifier::new()),
        );
        (ops, mappings)
    }

    async fn seed_mapping(mappings: &MemoryMappingRepo, session_id: SessionId) {
        mappings
            .insert_batch(vec![LocationMapping::new(
                session_id,
                LocationId::new(),
                "shrine",
                EntityCategory::Event,
                now(),
            )])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn start_rejects_unknown_action_type() {
        let (ops, _) = ops_with(10, failing_llm());
        let err = ops
            .start_action(
                SessionId::new(),
                CharacterId::new(),
                "shrine".to_string(),
                "juggle".to_string(),
                None,
            )
            .await
            .unwrap_err();
        match err {
            OpsError::Domain(DomainError::Validation { details, .. }) => {
                assert!(details.contains_key("actionType"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn start_rejects_empty_target() {
        let (ops, _) = ops_with(10, failing_llm());
        let err = ops
            .start_action(
                SessionId::new(),
                CharacterId::new(),
                "  ".to_string(),
                "interact".to_string(),
                None,
            )
            .await
            .unwrap_err();
        match err {
            OpsError::Domain(DomainError::Validation { details, .. }) => {
                assert!(details.contains_key("targetEntityId"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn successful_check_discovers_the_mapped_entity() {
        let (ops, mappings) = ops_with(18, failing_llm());
        let session_id = SessionId::new();
        let character_id = CharacterId::new();
        seed_mapping(&mappings, session_id).await;

        let execution = ops
            .start_action(
                session_id,
                character_id,
                "shrine".to_string(),
                "search".to_string(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(execution.phase(), ExecutionPhase::SkillCheckPending);

        let report = ops
            .execute_skill_check(
                execution.execution_id(),
                character_id,
                "perception".to_string(),
                Some(12),
                Some(0),
            )
            .await
            .unwrap();

        assert_eq!(report.outcome, SkillOutcome::Success);
        assert!(report.entity_discovered);
        assert!(!report.narrative.is_empty());

        let mapping = mappings
            .find_for_entity(session_id, "shrine")
            .await
            .unwrap()
            .unwrap();
        assert!(mapping.is_discovered());
    }

    #[tokio::test]
    async fn failed_check_leaves_the_mapping_undiscovered() {
        let (ops, mappings) = ops_with(3, failing_llm());
        let session_id = SessionId::new();
        let character_id = CharacterId::new();
        seed_mapping(&mappings, session_id).await;

        let execution = ops
            .start_action(
                session_id,
                character_id,
                "shrine".to_string(),
                "search".to_string(),
                None,
            )
            .await
            .unwrap();
        let report = ops
            .execute_skill_check(
                execution.execution_id(),
                character_id,
                "perception".to_string(),
                Some(15),
                Some(0),
            )
            .await
            .unwrap();

        assert_eq!(report.outcome, SkillOutcome::Failure);
        assert!(!report.entity_discovered);
        let mapping = mappings
            .find_for_entity(session_id, "shrine")
            .await
            .unwrap()
            .unwrap();
        assert!(!mapping.is_discovered());
    }

    #[tokio::test]
    async fn input_flow_reports_judgment_trigger() {
        let (ops, _) = ops_with(10, failing_llm());
        let session_id = SessionId::new();
        let character_id = CharacterId::new();

        let execution = ops
            .start_action(
                session_id,
                character_id,
                "shrine".to_string(),
                "interact".to_string(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(execution.phase(), ExecutionPhase::AwaitingInput);

        let ack = ops
            .provide_user_input(
                execution.execution_id(),
                character_id,
                "I trace the carvings with chalk and press each sigil in the order they glow"
                    .to_string(),
            )
            .await
            .unwrap();
        assert!(ack.judgment_triggered);
        assert_eq!(ack.phase, ExecutionPhase::SkillCheckPending);
    }

    #[tokio::test]
    async fn input_on_resolved_execution_is_invalid_state() {
        let (ops, _) = ops_with(18, failing_llm());
        let session_id = SessionId::new();
        let character_id = CharacterId::new();

        let execution = ops
            .start_action(
                session_id,
                character_id,
                "shrine".to_string(),
                "search".to_string(),
                None,
            )
            .await
            .unwrap();
        ops.execute_skill_check(
            execution.execution_id(),
            character_id,
            "perception".to_string(),
            None,
            None,
        )
        .await
        .unwrap();

        let err = ops
            .provide_user_input(
                execution.execution_id(),
                character_id,
                "one more idea".to_string(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OpsError::Domain(DomainError::InvalidPhase(_))
        ));
    }

    #[tokio::test]
    async fn skill_check_twice_is_invalid_state() {
        let (ops, _) = ops_with(18, failing_llm());
        let session_id = SessionId::new();
        let character_id = CharacterId::new();
        let execution = ops
            .start_action(
                session_id,
                character_id,
                "shrine".to_string(),
                "combat".to_string(),
                None,
            )
            .await
            .unwrap();

        ops.execute_skill_check(
            execution.execution_id(),
            character_id,
            "melee".to_string(),
            None,
            None,
        )
        .await
        .unwrap();
        let err = ops
            .execute_skill_check(
                execution.execution_id(),
                character_id,
                "melee".to_string(),
                None,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OpsError::Domain(DomainError::InvalidPhase(_))
        ));
    }

    #[tokio::test]
    async fn llm_narrative_is_used_when_available() {
        let mut llm = MockLlmPort::new();
        llm.expect_generate().returning(|_| {
            Ok(LlmResponse {
                content: "The shrine hums as your fingers find the hidden seam.".to_string(),
            })
        });
        let (ops, mappings) = ops_with(18, Arc::new(llm));
        let session_id = SessionId::new();
        let character_id = CharacterId::new();
        seed_mapping(&mappings, session_id).await;

        let execution = ops
            .start_action(
                session_id,
                character_id,
                "shrine".to_string(),
                "search".to_string(),
                None,
            )
            .await
            .unwrap();
        let report = ops
            .execute_skill_check(
                execution.execution_id(),
                character_id,
                "perception".to_string(),
                None,
                None,
            )
            .await
            .unwrap();
        assert_eq!(
            report.narrative,
            "The shrine hums as your fingers find the hidden seam."
        );
    }

    #[tokio::test]
    async fn character_mismatch_is_a_validation_error() {
        let (ops, _) = ops_with(10, failing_llm());
        let execution = ops
            .start_action(
                SessionId::new(),
                CharacterId::new(),
                "shrine".to_string(),
                "interact".to_string(),
                None,
            )
            .await
            .unwrap();

        let err = ops
            .provide_user_input(
                execution.execution_id(),
                CharacterId::new(),
                "an imposter's plan".to_string(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OpsError::Domain(DomainError::Validation { .. })
        ));
    }
}
