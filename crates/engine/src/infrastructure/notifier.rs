//! Progress notifier adapter.
//!
//! The real fanout channel (WebSocket to connected GM/player clients) is a
//! collaborator outside this core. This adapter records the events in the
//! structured log so a deployment without a channel still has a trail.

use async_trait::async_trait;

use crate::infrastructure::ports::{ProgressNotifierPort, ProgressUpdate};

pub struct TracingNotifier;

impl TracingNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TracingNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProgressNotifierPort for TracingNotifier {
    async fn notify(&self, update: ProgressUpdate) {
        match update {
            ProgressUpdate::LocationExplored {
                session_id,
                location_id,
                exploration_level,
                newly_discovered,
            } => {
                tracing::info!(
                    session_id = %session_id,
                    location_id = %location_id,
                    exploration_level,
                    discovered = newly_discovered.len(),
                    "Location explored"
                );
            }
            ProgressUpdate::EntityDiscovered {
                session_id,
                entity_id,
            } => {
                tracing::info!(session_id = %session_id, entity_id = %entity_id, "Entity discovered");
            }
            ProgressUpdate::MilestoneAdvanced {
                campaign_id,
                milestone_id,
                progress,
            } => {
                tracing::info!(
                    campaign_id = %campaign_id,
                    milestone_id = %milestone_id,
                    progress,
                    "Milestone advanced"
                );
            }
        }
    }
}
