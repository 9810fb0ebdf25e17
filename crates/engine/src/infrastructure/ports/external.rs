//! External service port traits (clock, randomness, LLM, progress channel).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tablekeep_domain::{CampaignId, LocationId, SessionId};

use super::error::LlmError;

// =============================================================================
// Clock & Randomness
// =============================================================================

#[cfg_attr(test, mockall::automock)]
pub trait ClockPort: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[cfg_attr(test, mockall::automock)]
pub trait RandomPort: Send + Sync {
    /// Inclusive range roll.
    fn gen_range(&self, min: i32, max: i32) -> i32;
}

// =============================================================================
// LLM Narrative Generation
// =============================================================================

/// Request for a single narrative generation.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// System prompt / framing
    pub system_prompt: Option<String>,
    /// The user-role prompt
    pub prompt: String,
    /// Temperature for response generation (0.0 - 2.0)
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: None,
            prompt: prompt.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Response from the LLM.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// The generated text content
    pub content: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmPort: Send + Sync {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError>;
}

// =============================================================================
// Progress Notification Channel
// =============================================================================

/// Events pushed toward the GM-facing notification channel.
///
/// The fanout transport (WebSocket) is a collaborator outside this core;
/// adapters decide delivery.
#[derive(Debug, Clone)]
pub enum ProgressUpdate {
    LocationExplored {
        session_id: SessionId,
        location_id: LocationId,
        exploration_level: u8,
        newly_discovered: Vec<String>,
    },
    EntityDiscovered {
        session_id: SessionId,
        entity_id: String,
    },
    MilestoneAdvanced {
        campaign_id: CampaignId,
        milestone_id: String,
        progress: u8,
    },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProgressNotifierPort: Send + Sync {
    async fn notify(&self, update: ProgressUpdate);
}
