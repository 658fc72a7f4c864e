//! End-to-end handling of one inbound customer message.
//!
//! [`AutoResponder`] loads the conversation, asks the [`DecisionEngine`]
//! for a verdict, and when the verdict says to act now, generates a reply,
//! persists it as an automated outbound message, and refreshes the
//! conversation view.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};

use crate::config::LoaderConfig;
use crate::engine::{DecisionEngine, RawContext};
use crate::loader::{MessageLoader, MessageStore};
use crate::models::decision::{IntelligentDecision, RecommendedAction};
use crate::models::lead::LeadProfile;
use crate::models::message::{Direction, Message};
use crate::{AppError, Result};

/// Which lead details the generator is allowed to use.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct PersonalizationFlags {
    /// Greet the customer by name.
    pub use_name: bool,
    /// Mention the vehicle they asked about.
    pub mention_vehicle: bool,
}

impl PersonalizationFlags {
    /// Approve each flag only when the lead carries the matching detail.
    #[must_use]
    pub fn approved_for(lead: &LeadProfile) -> Self {
        Self {
            use_name: lead.first_name().is_some(),
            mention_vehicle: lead.vehicle().is_some(),
        }
    }
}

/// Input handed to a [`ReplyGenerator`].
#[derive(Debug, Clone, Serialize)]
pub struct ReplyRequest {
    /// Conversation key.
    pub lead_id: String,
    /// Lead profile fragment.
    pub lead: LeadProfile,
    /// Customer message being answered.
    pub message: String,
    /// Prior conversation, oldest first.
    pub history: Vec<Message>,
    /// Approved personalization.
    pub flags: PersonalizationFlags,
    /// Decision that triggered the reply.
    pub decision: IntelligentDecision,
}

/// Produces reply text for an approved decision.
pub trait ReplyGenerator: Send + Sync {
    /// Generate a reply.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Generation` on failure; the responder substitutes
    /// [`fallback_reply`].
    fn generate<'a>(
        &'a self,
        request: &'a ReplyRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
}

/// Reply used when generation fails.
#[must_use]
pub fn fallback_reply(lead: &LeadProfile, flags: PersonalizationFlags) -> String {
    match lead.first_name().filter(|_| flags.use_name) {
        Some(name) => format!(
            "Hi {name}, thanks for reaching out! A member of our sales team will get back to you shortly."
        ),
        None => "Thanks for reaching out! A member of our sales team will get back to you shortly."
            .to_owned(),
    }
}

/// Deterministic template-based generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateGenerator;

impl ReplyGenerator for TemplateGenerator {
    fn generate<'a>(
        &'a self,
        request: &'a ReplyRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let greeting = match request.lead.first_name().filter(|_| request.flags.use_name) {
                Some(name) => format!("Hi {name}!"),
                None => "Hi there!".to_owned(),
            };
            let subject = match request.lead.vehicle().filter(|_| request.flags.mention_vehicle) {
                Some(vehicle) => format!(" about the {vehicle}"),
                None => String::new(),
            };
            let body = if request.message.contains('?') {
                format!("Great question{subject}. Let me get you the details right away.")
            } else {
                format!("Thanks for your message{subject}. We're happy to help.")
            };
            Ok(format!("{greeting} {body}"))
        })
    }
}

/// What the responder did with an inbound message.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResponderOutcome {
    /// A reply was generated and persisted.
    Replied {
        /// History record id of the decision.
        decision_id: String,
        /// The decision.
        decision: IntelligentDecision,
        /// The persisted reply.
        reply: Message,
    },
    /// The reply should be sent later.
    Scheduled {
        /// History record id of the decision.
        decision_id: String,
        /// The decision.
        decision: IntelligentDecision,
        /// Minutes to wait.
        delay_minutes: u32,
    },
    /// No reply is warranted.
    Skipped {
        /// History record id of the decision.
        decision_id: String,
        /// The decision.
        decision: IntelligentDecision,
    },
}

impl ResponderOutcome {
    /// The decision behind this outcome.
    #[must_use]
    pub fn decision(&self) -> &IntelligentDecision {
        match self {
            Self::Replied { decision, .. }
            | Self::Scheduled { decision, .. }
            | Self::Skipped { decision, .. } => decision,
        }
    }
}

/// Orchestrates load → decide → generate → persist → refresh.
///
/// Each lead gets its own [`MessageLoader`], so events for different leads
/// run independently. A newer event for the same lead supersedes an older
/// one still loading.
pub struct AutoResponder {
    store: Arc<dyn MessageStore>,
    loader_config: LoaderConfig,
    loaders: Mutex<HashMap<String, Arc<MessageLoader>>>,
    engine: Arc<DecisionEngine>,
    generator: Arc<dyn ReplyGenerator>,
}

impl AutoResponder {
    /// Wire a responder from its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn MessageStore>,
        loader_config: &LoaderConfig,
        engine: Arc<DecisionEngine>,
        generator: Arc<dyn ReplyGenerator>,
    ) -> Self {
        Self {
            store,
            loader_config: loader_config.clone(),
            loaders: Mutex::new(HashMap::new()),
            engine,
            generator,
        }
    }

    /// The loader backing the conversation view for `lead_id`, created on
    /// first use.
    #[must_use]
    pub fn loader(&self, lead_id: &str) -> Arc<MessageLoader> {
        let mut loaders = self.loaders.lock().unwrap_or_else(PoisonError::into_inner);
        let loader = loaders.entry(lead_id.trim().to_owned()).or_insert_with(|| {
            Arc::new(MessageLoader::new(
                Arc::clone(&self.store),
                &self.loader_config,
            ))
        });
        Arc::clone(loader)
    }

    /// Handle one inbound message from `lead_id`.
    ///
    /// # Errors
    ///
    /// Propagates loader errors (`Validation`, `Cancelled`,
    /// `LoadExhausted`) and store errors when persisting the reply.
    pub async fn handle_inbound(
        &self,
        lead_id: &str,
        lead: &LeadProfile,
        message: &str,
        local_time: NaiveDateTime,
    ) -> Result<ResponderOutcome> {
        let span = info_span!("handle_inbound", lead_id = %lead_id);
        self.handle(lead_id, lead, message, local_time)
            .instrument(span)
            .await
    }

    async fn handle(
        &self,
        lead_id: &str,
        lead: &LeadProfile,
        message: &str,
        local_time: NaiveDateTime,
    ) -> Result<ResponderOutcome> {
        if lead_id.trim().is_empty() {
            return Err(AppError::Validation("conversation key is required".into()));
        }

        let loader = self.loader(lead_id);
        let mut history = loader.load(lead_id, loader.default_options()).await?;
        drop_trigger(&mut history, message);

        let raw = RawContext::new(history.clone(), lead.clone(), local_time);
        let tracked = self.engine.decide_tracked(lead_id, message, raw);
        let decision_id = tracked.id;
        let decision = tracked.decision;

        if !decision.should_respond {
            info!(confidence = decision.confidence, "no automated reply warranted");
            return Ok(ResponderOutcome::Skipped {
                decision_id,
                decision,
            });
        }

        if decision.recommended_action == RecommendedAction::ScheduleResponse {
            let delay_minutes = decision.suggested_delay_minutes.unwrap_or_default();
            info!(delay_minutes, "automated reply scheduled");
            return Ok(ResponderOutcome::Scheduled {
                decision_id,
                decision,
                delay_minutes,
            });
        }

        let flags = PersonalizationFlags::approved_for(lead);
        let request = ReplyRequest {
            lead_id: lead_id.to_owned(),
            lead: lead.clone(),
            message: message.to_owned(),
            history,
            flags,
            decision: decision.clone(),
        };
        let text = match self.generator.generate(&request).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!("generator returned an empty reply; using fallback");
                fallback_reply(lead, flags)
            }
            Err(err) => {
                warn!(%err, "reply generation failed; using fallback");
                fallback_reply(lead, flags)
            }
        };

        let reply = Message::outbound(lead_id, text, true);
        self.store.append(reply.clone()).await?;
        info!(reply_id = %reply.id, "automated reply persisted");

        if let Err(err) = loader.force_reload(lead_id).await {
            warn!(%err, "conversation refresh after reply failed");
        }

        Ok(ResponderOutcome::Replied {
            decision_id,
            decision,
            reply,
        })
    }
}

/// Remove the triggering message when the inbound path already stored it
/// as the newest inbound entry.
fn drop_trigger(history: &mut Vec<Message>, message: &str) {
    let newest_inbound = history
        .iter()
        .rposition(|m| m.direction == Direction::Inbound);
    if let Some(idx) = newest_inbound {
        if idx == history.len() - 1 && history[idx].body == message {
            history.remove(idx);
        }
    }
}
