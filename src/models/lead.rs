//! Lead profile fragment consumed by the decision pipeline.

use serde::{Deserialize, Serialize};

/// The subset of a lead record the responder needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LeadProfile {
    /// Display name, if known.
    pub name: Option<String>,
    /// Free-text vehicle interest (e.g. `2024 Honda Accord EX-L`).
    pub vehicle_interest: Option<String>,
}

impl LeadProfile {
    /// Construct a profile from optional name and vehicle interest.
    #[must_use]
    pub fn new(name: Option<String>, vehicle_interest: Option<String>) -> Self {
        Self {
            name,
            vehicle_interest,
        }
    }

    /// First name for greetings, ignoring blank values.
    #[must_use]
    pub fn first_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .and_then(|name| name.split_whitespace().next())
    }

    /// Vehicle interest with surrounding whitespace removed, ignoring blanks.
    #[must_use]
    pub fn vehicle(&self) -> Option<&str> {
        self.vehicle_interest
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}
