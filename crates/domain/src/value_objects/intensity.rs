//! Exploration intensity - breadth of a single exploration pass
//!
//! Intensity trades discovery breadth for simulated time cost: a light pass
//! surfaces one entity cheaply, an exhaustive sweep surfaces everything
//! still available at a high time cost.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExplorationIntensity {
    Light,
    Thorough,
    Exhaustive,
}

impl ExplorationIntensity {
    /// Maximum number of entities one pass may newly discover.
    /// `None` means unbounded (everything still available).
    pub fn discovery_cap(&self) -> Option<usize> {
        match self {
            Self::Light => Some(1),
            Self::Thorough => Some(3),
            Self::Exhaustive => None,
        }
    }

    /// Simulated in-game time cost of the pass, in minutes.
    pub fn time_cost_minutes(&self) -> u32 {
        match self {
            Self::Light => 30,
            Self::Thorough => 120,
            Self::Exhaustive => 360,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Thorough => "thorough",
            Self::Exhaustive => "exhaustive",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "thorough" => Ok(Self::Thorough),
            "exhaustive" => Ok(Self::Exhaustive),
            other => Err(DomainError::parse(format!(
                "Unknown exploration intensity: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for ExplorationIntensity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_scale_with_intensity() {
        assert_eq!(ExplorationIntensity::Light.discovery_cap(), Some(1));
        assert_eq!(ExplorationIntensity::Thorough.discovery_cap(), Some(3));
        assert_eq!(ExplorationIntensity::Exhaustive.discovery_cap(), None);
    }

    #[test]
    fn time_cost_scales_with_intensity() {
        assert!(
            ExplorationIntensity::Light.time_cost_minutes()
                < ExplorationIntensity::Thorough.time_cost_minutes()
        );
        assert!(
            ExplorationIntensity::Thorough.time_cost_minutes()
                < ExplorationIntensity::Exhaustive.time_cost_minutes()
        );
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(
            ExplorationIntensity::parse("Thorough").ok(),
            Some(ExplorationIntensity::Thorough)
        );
        assert!(ExplorationIntensity::parse("frantic").is_err());
    }
}
