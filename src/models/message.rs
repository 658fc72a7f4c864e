//! Conversation message model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which side of the conversation produced a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Customer-originated message.
    Inbound,
    /// Message sent by the dealership (agent or automation).
    Outbound,
}

impl Direction {
    /// Stable storage representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "inbound" => Some(Self::Inbound),
            "outbound" => Some(Self::Outbound),
            _ => None,
        }
    }
}

/// Delivery status reported by the messaging provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Queued but not yet handed to the provider.
    Pending,
    /// Accepted by the provider.
    Sent,
    /// Confirmed delivered to the handset.
    Delivered,
    /// Provider reported a delivery failure.
    Failed,
    /// Inbound message received from the customer.
    Received,
}

impl DeliveryStatus {
    /// Stable storage representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::Received => "received",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "sent" => Some(Self::Sent),
            "delivered" => Some(Self::Delivered),
            "failed" => Some(Self::Failed),
            "received" => Some(Self::Received),
            _ => None,
        }
    }
}

/// A single conversation entry between a lead and the dealership.
///
/// Bodies are immutable once persisted. Only `read_at` changes, and only
/// from `None` to `Some`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Message {
    /// Unique record identifier.
    pub id: String,
    /// Owning lead (conversation key).
    pub lead_id: String,
    /// Message text.
    pub body: String,
    /// Inbound or outbound.
    pub direction: Direction,
    /// When the message was sent or received.
    pub sent_at: DateTime<Utc>,
    /// Provider delivery status.
    pub status: DeliveryStatus,
    /// Whether the automation produced this message.
    pub auto_generated: bool,
    /// When a dealership user first saw the message.
    pub read_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Construct an inbound customer message received now.
    #[must_use]
    pub fn inbound(lead_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            lead_id: lead_id.into(),
            body: body.into(),
            direction: Direction::Inbound,
            sent_at: Utc::now(),
            status: DeliveryStatus::Received,
            auto_generated: false,
            read_at: None,
        }
    }

    /// Construct an outbound message sent now.
    #[must_use]
    pub fn outbound(
        lead_id: impl Into<String>,
        body: impl Into<String>,
        auto_generated: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            lead_id: lead_id.into(),
            body: body.into(),
            direction: Direction::Outbound,
            sent_at: Utc::now(),
            status: DeliveryStatus::Sent,
            auto_generated,
            read_at: None,
        }
    }

    /// Override the sent timestamp.
    #[must_use]
    pub fn at(mut self, sent_at: DateTime<Utc>) -> Self {
        self.sent_at = sent_at;
        self
    }

    /// Whether this is an inbound message nobody has read yet.
    #[must_use]
    pub fn is_unread_inbound(&self) -> bool {
        self.direction == Direction::Inbound && self.read_at.is_none()
    }
}
