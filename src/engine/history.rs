//! Bounded decision history and aggregate insights.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::decision::{DecisionOutcome, IntelligentDecision};
use crate::{AppError, Result};

use super::context::DecisionContext;

const TOP_REASONS: usize = 5;

/// One archived decision.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionRecord {
    /// Record identifier used to attach an outcome later.
    pub id: String,
    /// Conversation the decision was made for.
    pub lead_id: String,
    /// The decision.
    pub decision: IntelligentDecision,
    /// Input the decision was made from.
    pub context: DecisionContext,
    /// When the decision was recorded.
    pub timestamp: DateTime<Utc>,
    /// Observed result, attached after the fact.
    pub outcome: Option<DecisionOutcome>,
}

/// A reasoning line and how often it appeared.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReasonCount {
    /// Reasoning text.
    pub reason: String,
    /// Occurrences across retained decisions.
    pub count: usize,
}

/// Aggregate statistics over retained decisions.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DecisionInsights {
    /// Decisions retained.
    pub total_decisions: usize,
    /// Decisions that said respond.
    pub respond_count: usize,
    /// Decisions that said wait.
    pub wait_count: usize,
    /// Conservative fallbacks among them.
    pub fallback_count: usize,
    /// Mean confidence; zero when empty.
    pub average_confidence: f64,
    /// Five most frequent reasoning lines, ties in first-seen order.
    pub top_reasons: Vec<ReasonCount>,
    /// Decisions with an attached outcome.
    pub outcomes_recorded: usize,
    /// Share of recorded outcomes that succeeded; `None` without outcomes.
    pub success_rate: Option<f64>,
}

/// Ring buffer of recent decisions; the oldest entry is evicted first.
pub struct DecisionHistory {
    capacity: usize,
    entries: VecDeque<DecisionRecord>,
}

impl DecisionHistory {
    /// Create an empty history holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a decision, evicting the oldest when full. Returns its id.
    pub fn record(
        &mut self,
        lead_id: &str,
        decision: IntelligentDecision,
        context: DecisionContext,
    ) -> String {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }

        let id = Uuid::new_v4().to_string();
        self.entries.push_back(DecisionRecord {
            id: id.clone(),
            lead_id: lead_id.to_owned(),
            decision,
            context,
            timestamp: Utc::now(),
            outcome: None,
        });
        id
    }

    /// Attach an outcome to a retained decision.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if `id` was never recorded or has been
    /// evicted.
    pub fn record_outcome(&mut self, id: &str, outcome: DecisionOutcome) -> Result<()> {
        let record = self
            .entries
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::NotFound(format!("decision {id} not in history")))?;
        record.outcome = Some(outcome);
        Ok(())
    }

    /// Number of retained decisions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no decisions are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Up to `n` most recent records, newest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<DecisionRecord> {
        self.entries.iter().rev().take(n).cloned().collect()
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &DecisionRecord> {
        self.entries.iter()
    }

    /// Compute aggregate statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // counts are bounded by capacity
    pub fn insights(&self) -> DecisionInsights {
        let total = self.entries.len();
        let respond_count = self
            .entries
            .iter()
            .filter(|r| r.decision.should_respond)
            .count();
        let fallback_count = self.entries.iter().filter(|r| r.decision.fallback).count();

        let average_confidence = if total == 0 {
            0.0
        } else {
            self.entries
                .iter()
                .map(|r| r.decision.confidence)
                .sum::<f64>()
                / total as f64
        };

        let outcomes: Vec<DecisionOutcome> =
            self.entries.iter().filter_map(|r| r.outcome).collect();
        let success_rate = if outcomes.is_empty() {
            None
        } else {
            let successes = outcomes.iter().filter(|o| o.is_success()).count();
            Some(successes as f64 / outcomes.len() as f64)
        };

        DecisionInsights {
            total_decisions: total,
            respond_count,
            wait_count: total - respond_count,
            fallback_count,
            average_confidence,
            top_reasons: self.top_reasons(),
            outcomes_recorded: outcomes.len(),
            success_rate,
        }
    }

    fn top_reasons(&self) -> Vec<ReasonCount> {
        let mut order: Vec<&str> = Vec::new();
        let mut counts: HashMap<&str, usize> = HashMap::new();

        for reason in self.entries.iter().flat_map(|r| &r.decision.reasoning) {
            let count = counts.entry(reason.as_str()).or_insert(0);
            if *count == 0 {
                order.push(reason.as_str());
            }
            *count += 1;
        }

        let mut ranked: Vec<ReasonCount> = order
            .into_iter()
            .map(|reason| ReasonCount {
                reason: reason.to_owned(),
                count: counts.get(reason).copied().unwrap_or_default(),
            })
            .collect();
        // Stable sort keeps first-seen order among equal counts.
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        ranked.truncate(TOP_REASONS);
        ranked
    }
}
