//! Milestone and campaign progress computation
//!
//! Progress is derived, never stored: the sum of `progress_contribution`
//! over discovered core entities, defensively clamped so a data-authoring
//! bug cannot push the player-visible signal past 100.

use serde::{Deserialize, Serialize};

/// Sum contributions and clamp to 0..=100.
pub fn sum_progress(contributions: impl IntoIterator<Item = u32>) -> u8 {
    let total: u32 = contributions.into_iter().sum();
    total.min(100) as u8
}

/// Campaign-level completion summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignCompletion {
    pub total_milestones: usize,
    /// Milestones at exactly 100%
    pub completed_milestones: usize,
    pub overall_percent: u8,
}

/// Aggregate per-milestone progress values into a campaign summary.
///
/// `overall_percent` is the floor of the mean milestone progress; a campaign
/// with no authored milestones reports 0.
pub fn campaign_completion(milestone_progress: &[u8]) -> CampaignCompletion {
    let total_milestones = milestone_progress.len();
    if total_milestones == 0 {
        return CampaignCompletion {
            total_milestones: 0,
            completed_milestones: 0,
            overall_percent: 0,
        };
    }
    let completed_milestones = milestone_progress.iter().filter(|p| **p >= 100).count();
    let sum: u32 = milestone_progress.iter().map(|p| u32::from(*p)).sum();
    CampaignCompletion {
        total_milestones,
        completed_milestones,
        overall_percent: (sum / total_milestones as u32) as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_and_clamps() {
        assert_eq!(sum_progress([30, 40]), 70);
        assert_eq!(sum_progress([60, 60, 30]), 100);
        assert_eq!(sum_progress([]), 0);
    }

    #[test]
    fn campaign_summary_counts_completed() {
        let completion = campaign_completion(&[100, 50, 0]);
        assert_eq!(completion.total_milestones, 3);
        assert_eq!(completion.completed_milestones, 1);
        assert_eq!(completion.overall_percent, 50);
    }

    #[test]
    fn empty_campaign_reports_zero() {
        let completion = campaign_completion(&[]);
        assert_eq!(completion.total_milestones, 0);
        assert_eq!(completion.overall_percent, 0);
    }
}
