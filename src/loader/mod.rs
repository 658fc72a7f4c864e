//! Resilient conversation loading.
//!
//! The [`MessageStore`] trait decouples the loader from the backing
//! conversation log. [`MessageLoader`] wraps a store with a short-TTL
//! cache, per-attempt timeouts, capped exponential backoff and
//! supersede-on-new-call cancellation. Successful loads hand unread
//! inbound messages to a detached read-state task.

pub mod backoff;
pub mod cache;
pub mod message_loader;
pub mod read_state;

use std::future::Future;
use std::pin::Pin;

use crate::models::message::Message;
use crate::persistence::message_repo::MessageRecord;
use crate::Result;

pub use message_loader::{LoadOptions, LoadingState, MessageLoader};

/// Boxed future returned by [`MessageStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Query/update interface over the persisted conversation log.
pub trait MessageStore: Send + Sync {
    /// Fetch every row belonging to `lead_id`, sorted by `sent_at` ascending.
    ///
    /// # Errors
    ///
    /// Returns a store error; the loader retries retryable errors.
    fn fetch_messages(&self, lead_id: &str) -> StoreFuture<'_, Vec<MessageRecord>>;

    /// Mark the given messages read. Best effort; returns rows updated.
    ///
    /// # Errors
    ///
    /// Returns a store error; callers log it and move on.
    fn mark_read(&self, ids: Vec<String>) -> StoreFuture<'_, u64>;

    /// Persist a new message (used when sending an automated reply).
    ///
    /// # Errors
    ///
    /// Returns a store error if the write fails.
    fn append(&self, message: Message) -> StoreFuture<'_, ()>;
}
