//! Best-effort read-state marking after a conversation load.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info_span, warn, Instrument};

use crate::models::message::Message;

use super::MessageStore;

/// Spawn a detached task marking unread inbound `messages` as read.
///
/// Returns `None` when nothing needs marking. Failures are logged and
/// never reach the caller; the load path does not await the handle.
#[must_use]
pub fn spawn_mark_read(
    store: Arc<dyn MessageStore>,
    lead_id: &str,
    messages: &[Message],
) -> Option<JoinHandle<()>> {
    let ids: Vec<String> = messages
        .iter()
        .filter(|m| m.is_unread_inbound())
        .map(|m| m.id.clone())
        .collect();

    if ids.is_empty() {
        return None;
    }

    let span = info_span!("mark_read", lead_id = %lead_id, count = ids.len());
    Some(tokio::spawn(
        async move {
            match store.mark_read(ids).await {
                Ok(updated) => debug!(updated, "inbound messages marked read"),
                Err(err) => warn!(%err, "failed to mark messages read"),
            }
        }
        .instrument(span),
    ))
}
