//! Independent factor analyzers.
//!
//! Each analyzer is a pure function of the [`DecisionContext`] returning a
//! [`FactorScore`] clamped to `[0, 1]`. Analyzers share no state and may run
//! in any order.

use serde::Serialize;

use super::context::{DecisionContext, EngagementTier};

/// Words that signal time pressure. Each match adds to the urgency score.
pub const URGENCY_KEYWORDS: &[&str] = &[
    "urgent",
    "asap",
    "today",
    "immediately",
    "right away",
    "emergency",
    "quickly",
    "deadline",
    "tonight",
];

/// Markers that the customer is asking something. Only the first counts.
pub const QUESTION_MARKERS: &[&str] = &[
    "?", "what", "when", "where", "how", "which", "can you", "could you", "do you", "is it",
    "are you",
];

/// Phrases that ask the dealership to do something. Only the first counts.
pub const REQUEST_PHRASES: &[&str] = &[
    "can you",
    "could you",
    "please",
    "need",
    "want",
    "looking for",
    "interested in",
    "would like",
    "send me",
    "let me know",
];

/// Signal observed by an analyzer.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    /// Urgency keyword present.
    UrgencyKeyword,
    /// Question marker present.
    QuestionAsked,
    /// Message longer than 100 characters.
    DetailedMessage,
    /// Conversation has prior messages.
    ActiveConversation,
    /// Engagement tier is high.
    HighEngagement,
    /// Engagement tier is medium.
    MediumEngagement,
    /// Event inside business hours.
    BusinessHours,
    /// Event outside business hours.
    AfterHours,
    /// Event on a weekend.
    Weekend,
    /// More than three prior messages.
    FrequentMessages,
    /// Vehicle interest is specific.
    VehicleInterest,
    /// More than two prior messages.
    EstablishedConversation,
    /// Message contains a question mark.
    DirectQuestion,
    /// Message contains a request phrase.
    ExplicitRequest,
}

impl Indicator {
    /// Stable tag form.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::UrgencyKeyword => "urgency_keyword",
            Self::QuestionAsked => "question_asked",
            Self::DetailedMessage => "detailed_message",
            Self::ActiveConversation => "active_conversation",
            Self::HighEngagement => "high_engagement",
            Self::MediumEngagement => "medium_engagement",
            Self::BusinessHours => "business_hours",
            Self::AfterHours => "after_hours",
            Self::Weekend => "weekend",
            Self::FrequentMessages => "frequent_messages",
            Self::VehicleInterest => "vehicle_interest",
            Self::EstablishedConversation => "established_conversation",
            Self::DirectQuestion => "direct_question",
            Self::ExplicitRequest => "explicit_request",
        }
    }

    /// Readable phrase used in decision reasoning.
    #[must_use]
    pub fn phrase(self) -> &'static str {
        match self {
            Self::UrgencyKeyword => "Urgent language detected",
            Self::QuestionAsked => "Customer asked a question",
            Self::DetailedMessage => "Detailed message from customer",
            Self::ActiveConversation => "Conversation is active",
            Self::HighEngagement => "Highly engaged customer",
            Self::MediumEngagement => "Moderately engaged customer",
            Self::BusinessHours => "Within business hours",
            Self::AfterHours => "Outside business hours",
            Self::Weekend => "Weekend timing",
            Self::FrequentMessages => "Customer messages frequently",
            Self::VehicleInterest => "Specific vehicle interest",
            Self::EstablishedConversation => "Established conversation",
            Self::DirectQuestion => "Direct question expects an answer",
            Self::ExplicitRequest => "Customer made an explicit request",
        }
    }
}

/// One analyzer's output.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FactorScore {
    /// Score in `[0, 1]`.
    pub score: f64,
    /// Signals that moved the score, in detection order, without repeats.
    pub indicators: Vec<Indicator>,
}

impl FactorScore {
    fn new(base: f64) -> Self {
        Self {
            score: base,
            indicators: Vec::new(),
        }
    }

    fn add(&mut self, delta: f64, indicator: Indicator) {
        self.score += delta;
        if !self.indicators.contains(&indicator) {
            self.indicators.push(indicator);
        }
    }

    fn clamped(mut self) -> Self {
        self.score = self.score.clamp(0.0, 1.0);
        self
    }
}

/// Scores from all six analyzers.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FactorScores {
    /// Message urgency.
    pub urgency: FactorScore,
    /// Conversation momentum.
    pub momentum: FactorScore,
    /// Time appropriateness.
    pub time_appropriateness: FactorScore,
    /// Customer engagement.
    pub engagement: FactorScore,
    /// Business priority.
    pub business_priority: FactorScore,
    /// Response expectation.
    pub response_expectation: FactorScore,
}

impl FactorScores {
    /// Run every analyzer against `ctx`.
    #[must_use]
    pub fn analyze(ctx: &DecisionContext) -> Self {
        Self {
            urgency: message_urgency(ctx),
            momentum: conversation_momentum(ctx),
            time_appropriateness: time_appropriateness(ctx),
            engagement: customer_engagement(ctx),
            business_priority: business_priority(ctx),
            response_expectation: response_expectation(ctx),
        }
    }

    /// Named view over all factors, in reasoning priority order.
    #[must_use]
    pub fn named(&self) -> [(&'static str, &FactorScore); 6] {
        [
            ("urgency", &self.urgency),
            ("response_expectation", &self.response_expectation),
            ("momentum", &self.momentum),
            ("engagement", &self.engagement),
            ("business_priority", &self.business_priority),
            ("time_appropriateness", &self.time_appropriateness),
        ]
    }

    /// Check that every score is finite and inside `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns a description of the first offending factor.
    pub fn validate(&self) -> std::result::Result<(), String> {
        for (name, factor) in self.named() {
            if !factor.score.is_finite() || !(0.0..=1.0).contains(&factor.score) {
                return Err(format!("factor {name} out of range: {}", factor.score));
            }
        }
        Ok(())
    }
}

/// Urgency keywords, question markers and message length.
#[must_use]
pub fn message_urgency(ctx: &DecisionContext) -> FactorScore {
    let text = ctx.message.to_lowercase();
    let mut factor = FactorScore::new(0.0);

    for keyword in URGENCY_KEYWORDS {
        if text.contains(keyword) {
            factor.add(0.3, Indicator::UrgencyKeyword);
        }
    }

    if QUESTION_MARKERS.iter().any(|marker| text.contains(marker)) {
        factor.add(0.2, Indicator::QuestionAsked);
    }

    if ctx.message.chars().count() > 100 {
        factor.add(0.1, Indicator::DetailedMessage);
    }

    factor.clamped()
}

/// Prior activity and engagement tier.
#[must_use]
pub fn conversation_momentum(ctx: &DecisionContext) -> FactorScore {
    let mut factor = FactorScore::new(0.5);

    if !ctx.history.is_empty() {
        factor.add(0.2, Indicator::ActiveConversation);
    }

    match ctx.conversation.engagement {
        EngagementTier::High => factor.add(0.3, Indicator::HighEngagement),
        EngagementTier::Medium => factor.add(0.1, Indicator::MediumEngagement),
        EngagementTier::Low => {}
    }

    factor.clamped()
}

/// Business hours and weekend.
#[must_use]
pub fn time_appropriateness(ctx: &DecisionContext) -> FactorScore {
    let mut factor = FactorScore::new(0.5);

    if ctx.time.is_business_hours {
        factor.add(0.3, Indicator::BusinessHours);
    } else {
        factor.add(-0.2, Indicator::AfterHours);
    }

    if ctx.time.is_weekend() {
        factor.add(-0.1, Indicator::Weekend);
    }

    factor.clamped()
}

/// Message volume and engagement tier.
#[must_use]
pub fn customer_engagement(ctx: &DecisionContext) -> FactorScore {
    let mut factor = FactorScore::new(0.5);

    if ctx.conversation.message_count > 3 {
        factor.add(0.2, Indicator::FrequentMessages);
    }

    if ctx.conversation.engagement == EngagementTier::High {
        factor.add(0.3, Indicator::HighEngagement);
    }

    factor.clamped()
}

/// Specific vehicle interest and conversation depth.
#[must_use]
pub fn business_priority(ctx: &DecisionContext) -> FactorScore {
    let mut factor = FactorScore::new(0.5);

    let vehicle_len = ctx
        .lead
        .vehicle_interest
        .as_deref()
        .map_or(0, |v| v.chars().count());
    if vehicle_len > 10 {
        factor.add(0.2, Indicator::VehicleInterest);
    }

    if ctx.conversation.message_count > 2 {
        factor.add(0.2, Indicator::EstablishedConversation);
    }

    factor.clamped()
}

/// Question marks and request phrases.
#[must_use]
pub fn response_expectation(ctx: &DecisionContext) -> FactorScore {
    let text = ctx.message.to_lowercase();
    let mut factor = FactorScore::new(0.5);

    if text.contains('?') {
        factor.add(0.4, Indicator::DirectQuestion);
    }

    if REQUEST_PHRASES.iter().any(|phrase| text.contains(phrase)) {
        factor.add(0.2, Indicator::ExplicitRequest);
    }

    factor.clamped()
}
