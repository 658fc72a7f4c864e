//! Decision engine output types.

use serde::{Deserialize, Serialize};

/// How fast a response should go out.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    /// No time pressure.
    Low,
    /// Normal turnaround.
    Medium,
    /// Customer is waiting on an answer.
    High,
}

/// What the automation scheduler should do with the verdict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    /// Generate and send a reply right away.
    RespondImmediately,
    /// Reply through the normal automation cadence.
    RespondNormally,
    /// Defer the reply by the suggested delay.
    ScheduleResponse,
}

/// Verdict produced for one inbound message or follow-up tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct IntelligentDecision {
    /// Whether an automated reply should be sent.
    pub should_respond: bool,
    /// Weighted factor total in `[0, 1]`.
    pub confidence: f64,
    /// Human-readable narrative, tier statement first.
    pub reasoning: Vec<String>,
    /// Action for the scheduler.
    pub recommended_action: RecommendedAction,
    /// Urgency tier.
    pub urgency_level: UrgencyLevel,
    /// Minutes to wait before replying, when deferring.
    pub suggested_delay_minutes: Option<u32>,
    /// Set when the engine could not score the message and fell back.
    #[serde(default)]
    pub fallback: bool,
}

impl IntelligentDecision {
    /// Reasoning line attached to fallback decisions.
    pub const FALLBACK_REASON: &'static str = "Fallback decision due to analysis error";

    /// Conservative decision used when scoring fails. Still responds.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            should_respond: true,
            confidence: 0.5,
            reasoning: vec![Self::FALLBACK_REASON.to_owned()],
            recommended_action: RecommendedAction::RespondNormally,
            urgency_level: UrgencyLevel::Medium,
            suggested_delay_minutes: None,
            fallback: true,
        }
    }
}

/// Result observed after acting on a decision, attached later.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOutcome {
    /// Customer replied after the automated message.
    Engaged,
    /// Lead converted (appointment booked or sale).
    Converted,
    /// Customer never replied.
    NoReply,
    /// Customer asked to stop receiving messages.
    OptedOut,
}

impl DecisionOutcome {
    /// Whether this outcome counts toward the success rate.
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Engaged | Self::Converted)
    }
}
