//! Run phases and their lifecycle

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle phase of a run.
///
/// Active phases run in the fixed order warmup, baseline, trip, recovery and
/// then enter `Complete`. `Error` and `Canceled` are terminal and reachable
/// from any active phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Warmup,
    Baseline,
    Trip,
    Recovery,
    Complete,
    Error,
    Canceled,
}

impl Phase {
    /// The four timed phases in execution order
    pub const ACTIVE: [Phase; 4] = [Phase::Warmup, Phase::Baseline, Phase::Trip, Phase::Recovery];

    /// Whether the run can no longer change once in this phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Complete | Phase::Error | Phase::Canceled)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// The phase that follows this one in the normal lifecycle
    pub fn next(&self) -> Option<Phase> {
        match self {
            Phase::Warmup => Some(Phase::Baseline),
            Phase::Baseline => Some(Phase::Trip),
            Phase::Trip => Some(Phase::Recovery),
            Phase::Recovery => Some(Phase::Complete),
            Phase::Complete | Phase::Error | Phase::Canceled => None,
        }
    }

    /// Check whether moving from `self` to `next` is a legal lifecycle step
    pub fn can_transition_to(&self, next: Phase) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Phase::Error | Phase::Canceled => true,
            other => self.next() == Some(other),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Warmup => "warmup",
            Phase::Baseline => "baseline",
            Phase::Trip => "trip",
            Phase::Recovery => "recovery",
            Phase::Complete => "complete",
            Phase::Error => "error",
            Phase::Canceled => "canceled",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "warmup" => Ok(Phase::Warmup),
            "baseline" => Ok(Phase::Baseline),
            "trip" => Ok(Phase::Trip),
            "recovery" => Ok(Phase::Recovery),
            "complete" => Ok(Phase::Complete),
            "error" => Ok(Phase::Error),
            "canceled" | "cancelled" => Ok(Phase::Canceled),
            _ => Err(format!("Invalid phase: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_order() {
        let mut phase = Phase::Warmup;
        let mut seen = vec![phase];
        while let Some(next) = phase.next() {
            assert!(phase.can_transition_to(next));
            phase = next;
            seen.push(phase);
        }
        assert_eq!(
            seen,
            vec![
                Phase::Warmup,
                Phase::Baseline,
                Phase::Trip,
                Phase::Recovery,
                Phase::Complete
            ]
        );
    }

    #[test]
    fn test_terminal_phases_are_reachable_from_active_only() {
        for phase in Phase::ACTIVE {
            assert!(phase.can_transition_to(Phase::Error));
            assert!(phase.can_transition_to(Phase::Canceled));
        }
        assert!(!Phase::Complete.can_transition_to(Phase::Error));
        assert!(!Phase::Canceled.can_transition_to(Phase::Warmup));
        assert!(!Phase::Warmup.can_transition_to(Phase::Trip));
        assert!(!Phase::Baseline.can_transition_to(Phase::Complete));
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Phase::Trip).unwrap(), "\"trip\"");
        let parsed: Phase = serde_json::from_str("\"canceled\"").unwrap();
        assert_eq!(parsed, Phase::Canceled);
        assert_eq!("Recovery".parse::<Phase>().unwrap(), Phase::Recovery);
        assert!("sideways".parse::<Phase>().is_err());
    }
}
