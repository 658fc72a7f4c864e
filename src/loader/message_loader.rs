//! Conversation loader with caching, timeout, retry and cancellation.
//!
//! Each [`MessageLoader`] allows one active load at a time. Starting a new
//! load cancels the previous one; a generation counter makes sure a
//! superseded load never writes the cache or the [`LoadingState`], even if
//! its store query completes late.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::LoaderConfig;
use crate::models::message::Message;
use crate::persistence::message_repo::MessageRecord;
use crate::{AppError, Result};

use super::backoff::Backoff;
use super::cache::MessageCache;
use super::read_state;
use super::MessageStore;

/// Per-call load options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Serve a fresh cached snapshot without touching the store.
    pub use_cache: bool,
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Timeout applied to each store query.
    pub timeout: Duration,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::from_config(&LoaderConfig::default())
    }
}

impl LoadOptions {
    /// Options taken from loader configuration, cache enabled.
    #[must_use]
    pub fn from_config(config: &LoaderConfig) -> Self {
        Self {
            use_cache: true,
            max_retries: config.max_retries,
            timeout: config.timeout(),
        }
    }

    /// Same options with caching switched on or off.
    #[must_use]
    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }
}

/// Observable loader status for UI and automation callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadingState {
    /// A load is in flight.
    pub is_loading: bool,
    /// Message of the last terminal failure, cleared on each new load.
    pub last_error: Option<String>,
    /// When the last successful load completed.
    pub last_loaded_at: Option<DateTime<Utc>>,
    /// Consecutive terminal failures since the last success.
    pub retry_count: u32,
}

struct LoaderInner {
    cache: MessageCache,
    state: LoadingState,
    active: Option<CancellationToken>,
    generation: u64,
}

/// Resilient loader for one conversation view.
pub struct MessageLoader {
    store: Arc<dyn MessageStore>,
    backoff: Backoff,
    defaults: LoadOptions,
    inner: Mutex<LoaderInner>,
}

impl MessageLoader {
    /// Construct a loader over `store` using `config` for defaults.
    #[must_use]
    pub fn new(store: Arc<dyn MessageStore>, config: &LoaderConfig) -> Self {
        Self {
            store,
            backoff: Backoff::from_config(config),
            defaults: LoadOptions::from_config(config),
            inner: Mutex::new(LoaderInner {
                cache: MessageCache::new(config.cache_ttl()),
                state: LoadingState::default(),
                active: None,
                generation: 0,
            }),
        }
    }

    /// Default options for this loader.
    #[must_use]
    pub fn default_options(&self) -> LoadOptions {
        self.defaults
    }

    /// Load the conversation for `lead_id`, cancelling any in-flight load.
    ///
    /// # Errors
    ///
    /// - `AppError::Validation` if `lead_id` is blank.
    /// - `AppError::Cancelled` if superseded, cancelled, or timed out.
    /// - `AppError::LoadExhausted` once retries are used up.
    pub async fn load(&self, lead_id: &str, options: LoadOptions) -> Result<Vec<Message>> {
        self.run(lead_id, options, CancellationToken::new()).await
    }

    /// Like [`load`](Self::load) but also cancelled when `scope` is.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load).
    pub async fn load_scoped(
        &self,
        lead_id: &str,
        options: LoadOptions,
        scope: &CancellationToken,
    ) -> Result<Vec<Message>> {
        self.run(lead_id, options, scope.child_token()).await
    }

    /// Drop the cached snapshot for `lead_id` and load from the store.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load).
    pub async fn force_reload(&self, lead_id: &str) -> Result<Vec<Message>> {
        self.lock().cache.invalidate(lead_id.trim());
        self.run(
            lead_id,
            self.defaults.with_cache(false),
            CancellationToken::new(),
        )
        .await
    }

    /// Evict one cached conversation, or all of them when `lead_id` is `None`.
    pub fn clear_cache(&self, lead_id: Option<&str>) {
        let mut inner = self.lock();
        match lead_id {
            Some(key) => {
                inner.cache.invalidate(key.trim());
            }
            None => inner.cache.clear(),
        }
    }

    /// Cancel the in-flight load, if any.
    pub fn cancel(&self) {
        if let Some(token) = self.lock().active.take() {
            token.cancel();
        }
    }

    /// Snapshot of the current loading state.
    #[must_use]
    pub fn loading_state(&self) -> LoadingState {
        self.lock().state.clone()
    }

    async fn run(
        &self,
        lead_id: &str,
        options: LoadOptions,
        token: CancellationToken,
    ) -> Result<Vec<Message>> {
        let key = lead_id.trim();
        if key.is_empty() {
            return Err(AppError::Validation("conversation key is required".into()));
        }

        let generation = match self.begin(key, options, &token) {
            Begin::Cached(messages) => {
                debug!(lead_id = key, count = messages.len(), "conversation served from cache");
                return Ok(messages);
            }
            Begin::Started(generation) => generation,
        };

        let mut attempt: u32 = 0;
        loop {
            // A query that has already finished is handed to the commit
            // guard in `complete_success`, which rejects it if superseded.
            let result = tokio::select! {
                biased;
                fetched = tokio::time::timeout(options.timeout, self.store.fetch_messages(key)) => {
                    match fetched {
                        Ok(rows) => rows.and_then(into_messages),
                        Err(_) => Err(AppError::Cancelled(format!(
                            "load for {key} timed out after {} ms",
                            options.timeout.as_millis()
                        ))),
                    }
                }
                () = token.cancelled() => Err(AppError::Cancelled(format!("load for {key} was cancelled"))),
            };

            match result {
                Ok(messages) => return self.complete_success(key, generation, &token, messages),
                Err(err) if err.is_cancelled() => {
                    debug!(lead_id = key, %err, "conversation load cancelled");
                    self.complete_cancelled(generation);
                    return Err(err);
                }
                Err(err) if err.is_retryable() && attempt < options.max_retries => {
                    let delay = self.backoff.delay(attempt);
                    warn!(lead_id = key, attempt, ?delay, %err, "conversation load failed; retrying");
                    tokio::select! {
                        () = token.cancelled() => {
                            self.complete_cancelled(generation);
                            return Err(AppError::Cancelled(format!(
                                "load for {key} was cancelled during backoff"
                            )));
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(err) => {
                    let attempts = attempt + 1;
                    warn!(lead_id = key, attempts, %err, "conversation load failed");
                    self.complete_failure(generation, &err);
                    return Err(AppError::LoadExhausted {
                        attempts,
                        last_error: err.to_string(),
                    });
                }
            }
        }
    }

    fn begin(&self, key: &str, options: LoadOptions, token: &CancellationToken) -> Begin {
        let mut inner = self.lock();

        if let Some(previous) = inner.active.take() {
            previous.cancel();
        }
        inner.generation += 1;

        if options.use_cache {
            if let Some(messages) = inner.cache.get(key) {
                inner.state.is_loading = false;
                inner.state.last_error = None;
                return Begin::Cached(messages);
            }
        }

        inner.active = Some(token.clone());
        inner.state.is_loading = true;
        inner.state.last_error = None;
        Begin::Started(inner.generation)
    }

    fn complete_success(
        &self,
        key: &str,
        generation: u64,
        token: &CancellationToken,
        messages: Vec<Message>,
    ) -> Result<Vec<Message>> {
        {
            let mut inner = self.lock();
            if inner.generation != generation {
                debug!(lead_id = key, "discarding result of superseded load");
                return Err(AppError::Cancelled(format!(
                    "load for {key} was superseded"
                )));
            }
            if token.is_cancelled() {
                inner.active = None;
                inner.state.is_loading = false;
                return Err(AppError::Cancelled(format!("load for {key} was cancelled")));
            }
            inner.cache.insert(key, messages.clone());
            inner.active = None;
            inner.state = LoadingState {
                is_loading: false,
                last_error: None,
                last_loaded_at: Some(Utc::now()),
                retry_count: 0,
            };
        }

        info!(lead_id = key, count = messages.len(), "conversation loaded");
        // Detached: read-state marking never blocks or fails the load.
        drop(read_state::spawn_mark_read(Arc::clone(&self.store), key, &messages));
        Ok(messages)
    }

    fn complete_cancelled(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation == generation {
            inner.active = None;
            inner.state.is_loading = false;
        }
    }

    fn complete_failure(&self, generation: u64, err: &AppError) {
        let mut inner = self.lock();
        if inner.generation == generation {
            inner.active = None;
            inner.state.is_loading = false;
            inner.state.retry_count += 1;
            inner.state.last_error = Some(err.to_string());
        }
    }

    fn lock(&self) -> MutexGuard<'_, LoaderInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for MessageLoader {
    fn drop(&mut self) {
        self.cancel();
    }
}

enum Begin {
    Cached(Vec<Message>),
    Started(u64),
}

fn into_messages(rows: Vec<MessageRecord>) -> Result<Vec<Message>> {
    rows.into_iter().map(MessageRecord::into_message).collect()
}
