//! Normalized decision input built once per inbound event.

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use serde::Serialize;

use crate::config::DecisionConfig;
use crate::models::lead::LeadProfile;
use crate::models::message::Message;

/// Coarse engagement bucket derived from history length.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EngagementTier {
    /// More than five prior messages.
    High,
    /// Three to five prior messages.
    Medium,
    /// Two or fewer prior messages.
    Low,
}

impl EngagementTier {
    /// Bucket a history length.
    #[must_use]
    pub fn from_history_len(len: usize) -> Self {
        if len > 5 {
            Self::High
        } else if len > 2 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Business-hours window in local time, `[start, end)` on weekdays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessHours {
    /// First business hour (inclusive).
    pub start: u32,
    /// Closing hour (exclusive).
    pub end: u32,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self { start: 8, end: 18 }
    }
}

impl From<&DecisionConfig> for BusinessHours {
    fn from(config: &DecisionConfig) -> Self {
        Self {
            start: config.business_hours_start,
            end: config.business_hours_end,
        }
    }
}

impl BusinessHours {
    /// Whether `(weekday, hour)` falls inside business hours.
    #[must_use]
    pub fn contains(&self, weekday: Weekday, hour: u32) -> bool {
        !is_weekend(weekday) && (self.start..self.end).contains(&hour)
    }
}

/// Saturday or Sunday.
#[must_use]
pub fn is_weekend(weekday: Weekday) -> bool {
    matches!(weekday, Weekday::Sat | Weekday::Sun)
}

/// When the triggering event happened, in dealership-local time.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct TimeContext {
    /// Hour of day, 0..=23.
    pub hour: u32,
    /// Day of week.
    pub weekday: Weekday,
    /// Inside the business-hours window.
    pub is_business_hours: bool,
}

impl TimeContext {
    /// Whether the event fell on a weekend.
    #[must_use]
    pub fn is_weekend(&self) -> bool {
        is_weekend(self.weekday)
    }
}

/// Conversation-level signals.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ConversationContext {
    /// Number of prior messages in the conversation.
    pub message_count: usize,
    /// Engagement bucket.
    pub engagement: EngagementTier,
}

/// Raw inputs supplied by the caller.
#[derive(Debug, Clone)]
pub struct RawContext {
    /// Prior conversation, oldest first, excluding the triggering message.
    pub history: Vec<Message>,
    /// Lead profile fragment.
    pub lead: LeadProfile,
    /// Dealership-local time of the event.
    pub local_time: NaiveDateTime,
}

impl RawContext {
    /// Bundle raw inputs.
    #[must_use]
    pub fn new(history: Vec<Message>, lead: LeadProfile, local_time: NaiveDateTime) -> Self {
        Self {
            history,
            lead,
            local_time,
        }
    }
}

/// Immutable snapshot consumed by the factor analyzers.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DecisionContext {
    /// Triggering message text.
    pub message: String,
    /// Prior messages, most recent last.
    pub history: Vec<Message>,
    /// Lead profile fragment.
    pub lead: LeadProfile,
    /// Time-of-event signals.
    pub time: TimeContext,
    /// Conversation signals.
    pub conversation: ConversationContext,
}

impl DecisionContext {
    /// Build a context with the default business-hours window.
    #[must_use]
    pub fn build(message: &str, raw: RawContext) -> Self {
        Self::build_with_hours(message, raw, BusinessHours::default())
    }

    /// Build a context using an explicit business-hours window.
    #[must_use]
    pub fn build_with_hours(message: &str, raw: RawContext, hours: BusinessHours) -> Self {
        let hour = raw.local_time.hour();
        let weekday = raw.local_time.weekday();
        let message_count = raw.history.len();

        Self {
            message: message.to_owned(),
            time: TimeContext {
                hour,
                weekday,
                is_business_hours: hours.contains(weekday, hour),
            },
            conversation: ConversationContext {
                message_count,
                engagement: EngagementTier::from_history_len(message_count),
            },
            history: raw.history,
            lead: raw.lead,
        }
    }
}
