//! Weighted combination of factor scores into a decision.

use crate::models::decision::{IntelligentDecision, RecommendedAction, UrgencyLevel};

use super::context::DecisionContext;
use super::factors::{FactorScores, Indicator};

/// Per-factor weights. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorWeights {
    /// Message urgency.
    pub urgency: f64,
    /// Response expectation.
    pub response_expectation: f64,
    /// Conversation momentum.
    pub momentum: f64,
    /// Customer engagement.
    pub engagement: f64,
    /// Business priority.
    pub business_priority: f64,
    /// Time appropriateness.
    pub time_appropriateness: f64,
}

/// Fixed production weights.
pub const WEIGHTS: FactorWeights = FactorWeights {
    urgency: 0.25,
    response_expectation: 0.25,
    momentum: 0.15,
    engagement: 0.15,
    business_priority: 0.10,
    time_appropriateness: 0.10,
};

/// Totals above this respond.
pub const RESPOND_THRESHOLD: f64 = 0.6;
/// Totals above this are reported as high priority.
pub const HIGH_PRIORITY_THRESHOLD: f64 = 0.8;
/// Totals below this are low urgency.
pub const LOW_URGENCY_THRESHOLD: f64 = 0.5;
/// Urgency-factor scores above this make the decision high urgency.
pub const HIGH_URGENCY_THRESHOLD: f64 = 0.7;
/// Deferral inside business hours.
pub const BUSINESS_HOURS_DELAY_MINUTES: u32 = 30;
/// Deferral outside business hours.
pub const AFTER_HOURS_DELAY_MINUTES: u32 = 480;

const MAX_REASON_INDICATORS: usize = 3;

impl FactorWeights {
    /// Sum of all weights.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.urgency
            + self.response_expectation
            + self.momentum
            + self.engagement
            + self.business_priority
            + self.time_appropriateness
    }

    /// Weighted total of `scores`.
    #[must_use]
    pub fn total(&self, scores: &FactorScores) -> f64 {
        self.urgency * scores.urgency.score
            + self.response_expectation * scores.response_expectation.score
            + self.momentum * scores.momentum.score
            + self.engagement * scores.engagement.score
            + self.business_priority * scores.business_priority.score
            + self.time_appropriateness * scores.time_appropriateness.score
    }
}

/// Turn factor scores into a decision. Pure and infallible.
#[must_use]
pub fn calculate(scores: &FactorScores, ctx: &DecisionContext) -> IntelligentDecision {
    let total = WEIGHTS.total(scores);
    let should_respond = total > RESPOND_THRESHOLD;
    let business_hours = ctx.time.is_business_hours;

    let urgency_level = if scores.urgency.score > HIGH_URGENCY_THRESHOLD {
        UrgencyLevel::High
    } else if total < LOW_URGENCY_THRESHOLD {
        UrgencyLevel::Low
    } else {
        UrgencyLevel::Medium
    };

    let recommended_action = match urgency_level {
        UrgencyLevel::High => RecommendedAction::RespondImmediately,
        UrgencyLevel::Low => RecommendedAction::ScheduleResponse,
        UrgencyLevel::Medium if !business_hours => RecommendedAction::ScheduleResponse,
        UrgencyLevel::Medium => RecommendedAction::RespondNormally,
    };

    let suggested_delay_minutes =
        if !should_respond || recommended_action == RecommendedAction::ScheduleResponse {
            Some(if business_hours {
                BUSINESS_HOURS_DELAY_MINUTES
            } else {
                AFTER_HOURS_DELAY_MINUTES
            })
        } else {
            None
        };

    IntelligentDecision {
        should_respond,
        confidence: total,
        reasoning: reasoning(total, scores),
        recommended_action,
        urgency_level,
        suggested_delay_minutes,
        fallback: false,
    }
}

fn reasoning(total: f64, scores: &FactorScores) -> Vec<String> {
    let tier = if total > HIGH_PRIORITY_THRESHOLD {
        "High priority message requiring prompt response"
    } else if total > RESPOND_THRESHOLD {
        "Standard priority message warranting a response"
    } else {
        "Low priority message; response can wait"
    };

    let mut seen: Vec<Indicator> = Vec::with_capacity(MAX_REASON_INDICATORS);
    for (_, factor) in scores.named() {
        for indicator in &factor.indicators {
            if seen.len() == MAX_REASON_INDICATORS {
                break;
            }
            if !seen.contains(indicator) {
                seen.push(*indicator);
            }
        }
    }

    std::iter::once(tier.to_owned())
        .chain(seen.into_iter().map(|i| i.phrase().to_owned()))
        .collect()
}
