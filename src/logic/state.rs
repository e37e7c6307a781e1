//! Isolation states and transition causes.
//!
//! The state ladder is ordered: comparisons on `IsolationState` use the
//! confinement ordering, so `Restricted < Quarantined` holds and "escalation"
//! means moving to a strictly greater state.

use serde::{Deserialize, Serialize};

// ============================================================================
// ISOLATION STATE
// ============================================================================

/// Confinement level of a monitored process.
///
/// `Quarantined` is terminal: the machine never leaves it except through an
/// explicit operator release, which is itself a logged transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IsolationState {
    Normal,
    Observed,
    Restricted,
    Isolated,
    Quarantined,
}

impl IsolationState {
    /// Position on the ladder, 0 = unrestricted.
    pub fn rank(&self) -> u8 {
        match self {
            IsolationState::Normal => 0,
            IsolationState::Observed => 1,
            IsolationState::Restricted => 2,
            IsolationState::Isolated => 3,
            IsolationState::Quarantined => 4,
        }
    }

    /// Terminal states only exit via operator action.
    pub fn is_terminal(&self) -> bool {
        matches!(self, IsolationState::Quarantined)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationState::Normal => "NORMAL",
            IsolationState::Observed => "OBSERVED",
            IsolationState::Restricted => "RESTRICTED",
            IsolationState::Isolated => "ISOLATED",
            IsolationState::Quarantined => "QUARANTINED",
        }
    }
}

impl std::fmt::Display for IsolationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TRANSITION CAUSE
// ============================================================================

/// Why a transition happened. Recorded verbatim in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionCause {
    /// Severity crossed an escalation threshold
    SeverityThreshold,
    /// Token budget exhausted or insufficient for the computed jump
    BudgetExhausted,
    /// Operator forced the process into quarantine
    OperatorQuarantine,
    /// Operator released the process from quarantine
    OperatorRelease,
    /// Scorer or baseline store was unavailable; escalated on principle
    SensorFailure,
}

impl TransitionCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionCause::SeverityThreshold => "SEVERITY_THRESHOLD",
            TransitionCause::BudgetExhausted => "BUDGET_EXHAUSTED",
            TransitionCause::OperatorQuarantine => "OPERATOR_QUARANTINE",
            TransitionCause::OperatorRelease => "OPERATOR_RELEASE",
            TransitionCause::SensorFailure => "SENSOR_FAILURE",
        }
    }
}

impl std::fmt::Display for TransitionCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladder_is_ordered() {
        assert!(IsolationState::Normal < IsolationState::Observed);
        assert!(IsolationState::Observed < IsolationState::Restricted);
        assert!(IsolationState::Restricted < IsolationState::Isolated);
        assert!(IsolationState::Isolated < IsolationState::Quarantined);
    }

    #[test]
    fn test_only_quarantine_is_terminal() {
        for s in [
            IsolationState::Normal,
            IsolationState::Observed,
            IsolationState::Restricted,
            IsolationState::Isolated,
        ] {
            assert!(!s.is_terminal());
        }
        assert!(IsolationState::Quarantined.is_terminal());
    }

    #[test]
    fn test_rank_matches_ordering() {
        let all = [
            IsolationState::Normal,
            IsolationState::Observed,
            IsolationState::Restricted,
            IsolationState::Isolated,
            IsolationState::Quarantined,
        ];
        for w in all.windows(2) {
            assert_eq!(w[0].rank() + 1, w[1].rank());
        }
    }
}
