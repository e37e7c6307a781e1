//! Isolation State Machine - per-process confinement ladder.
//!
//! Each evaluation maps a severity score onto a target state through the
//! configured thresholds and pays for the escalation out of the token
//! budget. Fail-safe ordering: an exhausted or insufficient budget always
//! wins over the gentler computed target and forces QUARANTINED.
//!
//! Downgrades never happen on their own. A lower severity leaves the state
//! where it is; only an explicit operator release moves a process down the
//! ladder, and that release is itself a logged transition.

use serde::{Deserialize, Serialize};

use crate::logic::budget::TokenBudget;
use crate::logic::config::{EngineConfig, EscalationThresholds};
use crate::logic::state::{IsolationState, TransitionCause};

// ============================================================================
// TRANSITION
// ============================================================================

/// Outcome of one evaluation that changed state. Exactly one ledger entry
/// is written per `Transition` by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub from: IsolationState,
    pub to: IsolationState,
    pub severity: f64,
    pub tokens_remaining: f64,
    pub cause: TransitionCause,
}

// ============================================================================
// MACHINE
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationMachine {
    state: IsolationState,
    budget: TokenBudget,
    thresholds: EscalationThresholds,
    tokens_per_step: f64,
}

impl IsolationMachine {
    pub fn new(config: &EngineConfig, now_nanos: i64) -> Self {
        Self {
            state: IsolationState::Normal,
            budget: TokenBudget::new(config.token_capacity, config.token_refill_per_sec, now_nanos),
            thresholds: config.thresholds,
            tokens_per_step: config.tokens_per_step,
        }
    }

    pub fn state(&self) -> IsolationState {
        self.state
    }

    pub fn tokens_remaining(&self) -> f64 {
        self.budget.remaining()
    }

    /// Map a severity score onto the ladder via the threshold set.
    fn target_state(&self, severity: f64) -> IsolationState {
        let t = &self.thresholds;
        if severity >= t.quarantined {
            IsolationState::Quarantined
        } else if severity >= t.isolated {
            IsolationState::Isolated
        } else if severity >= t.restricted {
            IsolationState::Restricted
        } else if severity >= t.observed {
            IsolationState::Observed
        } else {
            IsolationState::Normal
        }
    }

    /// One tick: refill the budget, then either escalate toward the computed
    /// target or force quarantine when the budget cannot cover the jump.
    ///
    /// `cause` is `SeverityThreshold` for ordinary scoring ticks and
    /// `SensorFailure` when the severity was substituted because the scorer
    /// or baseline store was unavailable.
    pub fn evaluate(
        &mut self,
        severity: f64,
        cause: TransitionCause,
        now_nanos: i64,
    ) -> Option<Transition> {
        if self.state.is_terminal() {
            return None;
        }

        self.budget.refill(now_nanos);

        // Exhausted budget ends the negotiation regardless of the score.
        if self.budget.is_exhausted() {
            return Some(self.force(severity, TransitionCause::BudgetExhausted));
        }

        let target = self.target_state(severity);
        if target <= self.state {
            // No silent downgrade, no entry for holding steady.
            return None;
        }

        let steps = (target.rank() - self.state.rank()) as f64;
        let cost = steps * self.tokens_per_step;
        if self.budget.try_consume(cost) {
            let from = self.state;
            self.state = target;
            Some(Transition {
                from,
                to: target,
                severity,
                tokens_remaining: self.budget.remaining(),
                cause,
            })
        } else {
            // Cannot pay for the gentle path; fail safe instead.
            Some(self.force(severity, TransitionCause::BudgetExhausted))
        }
    }

    fn force(&mut self, severity: f64, cause: TransitionCause) -> Transition {
        let from = self.state;
        self.state = IsolationState::Quarantined;
        self.budget.drain();
        Transition {
            from,
            to: IsolationState::Quarantined,
            severity,
            tokens_remaining: self.budget.remaining(),
            cause,
        }
    }

    /// Operator-forced quarantine. No-op when already quarantined.
    pub fn operator_quarantine(&mut self) -> Option<Transition> {
        if self.state.is_terminal() {
            return None;
        }
        Some(self.force(0.0, TransitionCause::OperatorQuarantine))
    }

    /// Operator release: the only exit from QUARANTINED. Resets the budget
    /// so the released process is not immediately re-quarantined by an
    /// empty bucket.
    pub fn operator_release(&mut self, now_nanos: i64) -> Option<Transition> {
        if self.state != IsolationState::Quarantined {
            return None;
        }
        self.state = IsolationState::Normal;
        self.budget.reset(now_nanos);
        Some(Transition {
            from: IsolationState::Quarantined,
            to: IsolationState::Normal,
            severity: 0.0,
            tokens_remaining: self.budget.remaining(),
            cause: TransitionCause::OperatorRelease,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
