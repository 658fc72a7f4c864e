//! Multi-factor response decision engine.
//!
//! [`DecisionEngine::decide`] builds a [`DecisionContext`], runs the six
//! factor analyzers, combines them with fixed weights, and archives the
//! verdict in a bounded history. It never fails: inconsistent input falls
//! back to [`IntelligentDecision::fallback`].

pub mod calculator;
pub mod context;
pub mod factors;
pub mod history;

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info_span, warn};

use crate::config::DecisionConfig;
use crate::models::decision::{DecisionOutcome, IntelligentDecision};
use crate::Result;

pub use context::{BusinessHours, DecisionContext, EngagementTier, RawContext};
pub use factors::{FactorScore, FactorScores};
pub use history::{DecisionHistory, DecisionInsights, DecisionRecord};

/// A decision together with its history record id.
#[derive(Debug, Clone)]
pub struct TrackedDecision {
    /// History record id, for attaching an outcome later.
    pub id: String,
    /// The decision.
    pub decision: IntelligentDecision,
}

/// Decision engine owning its own history buffer.
///
/// Safe to share across tasks behind an `Arc`.
pub struct DecisionEngine {
    hours: BusinessHours,
    history: Mutex<DecisionHistory>,
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new(&DecisionConfig::default())
    }
}

impl DecisionEngine {
    /// Construct an engine from configuration.
    #[must_use]
    pub fn new(config: &DecisionConfig) -> Self {
        Self {
            hours: BusinessHours::from(config),
            history: Mutex::new(DecisionHistory::new(config.history_capacity)),
        }
    }

    /// Decide whether and how to answer `message` from `lead_id`.
    #[must_use]
    pub fn decide(&self, lead_id: &str, message: &str, raw: RawContext) -> IntelligentDecision {
        self.decide_tracked(lead_id, message, raw).decision
    }

    /// Like [`decide`](Self::decide), also returning the history record id.
    #[must_use]
    pub fn decide_tracked(&self, lead_id: &str, message: &str, raw: RawContext) -> TrackedDecision {
        let ctx = DecisionContext::build_with_hours(message, raw, self.hours);
        let scores = FactorScores::analyze(&ctx);
        self.decide_scored(lead_id, ctx, &scores)
    }

    /// Decide from precomputed factor scores.
    ///
    /// Scores that are not finite or fall outside `[0, 1]`, or a blank
    /// `lead_id`, produce the conservative fallback.
    #[must_use]
    pub fn decide_scored(
        &self,
        lead_id: &str,
        ctx: DecisionContext,
        scores: &FactorScores,
    ) -> TrackedDecision {
        let _span = info_span!("decide", lead_id = %lead_id).entered();

        let checked = if lead_id.trim().is_empty() {
            Err("missing conversation key".to_owned())
        } else {
            scores.validate()
        };

        let decision = match checked {
            Ok(()) => calculator::calculate(scores, &ctx),
            Err(reason) => {
                warn!(
                    %reason,
                    factors = ?scores,
                    hour = ctx.time.hour,
                    message_count = ctx.conversation.message_count,
                    "falling back to conservative decision"
                );
                IntelligentDecision::fallback()
            }
        };

        debug!(
            should_respond = decision.should_respond,
            confidence = decision.confidence,
            urgency = ?decision.urgency_level,
            action = ?decision.recommended_action,
            "decision made"
        );

        let id = self.lock().record(lead_id, decision.clone(), ctx);
        TrackedDecision { id, decision }
    }

    /// Attach an observed outcome to a past decision.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the decision is no longer retained.
    pub fn record_outcome(&self, decision_id: &str, outcome: DecisionOutcome) -> Result<()> {
        self.lock().record_outcome(decision_id, outcome)
    }

    /// Aggregate statistics over retained decisions.
    #[must_use]
    pub fn insights(&self) -> DecisionInsights {
        self.lock().insights()
    }

    /// Up to `n` most recent decisions, newest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<DecisionRecord> {
        self.lock().recent(n)
    }

    fn lock(&self) -> MutexGuard<'_, DecisionHistory> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
