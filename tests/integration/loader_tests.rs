//! Integration tests for `MessageLoader` caching, retry, timeout and
//! cancellation behaviour.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use lead_responder::config::LoaderConfig;
use lead_responder::loader::{LoadOptions, MessageLoader, MessageStore, StoreFuture};
use lead_responder::models::message::Message;
use lead_responder::persistence::message_repo::MessageRecord;
use lead_responder::{AppError, Result};

use super::test_helpers::{conversation, fast_loader_config, FakeStore};

fn loader_over(store: &Arc<FakeStore>, config: &LoaderConfig) -> MessageLoader {
    let store: Arc<dyn MessageStore> = Arc::clone(store) as Arc<dyn MessageStore>;
    MessageLoader::new(store, config)
}

fn setup(n: usize) -> (Arc<FakeStore>, MessageLoader) {
    let store = Arc::new(FakeStore::with_messages(conversation("lead-1", n)));
    let loader = loader_over(&store, &fast_loader_config());
    (store, loader)
}

#[tokio::test(start_paused = true)]
async fn load_returns_messages_in_order() {
    let (_store, loader) = setup(4);
    let messages = loader
        .load("lead-1", LoadOptions::default())
        .await
        .expect("load");

    assert_eq!(messages.len(), 4);
    assert!(messages.windows(2).all(|w| w[0].sent_at <= w[1].sent_at));

    let state = loader.loading_state();
    assert!(!state.is_loading);
    assert!(state.last_error.is_none());
    assert!(state.last_loaded_at.is_some());
    assert_eq!(state.retry_count, 0);
}

#[tokio::test(start_paused = true)]
async fn blank_key_is_rejected_before_io() {
    let (store, loader) = setup(1);
    let err = loader
        .load("   ", LoadOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(store.fetch_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn second_load_within_ttl_hits_cache() {
    let (store, loader) = setup(3);
    let first = loader.load("lead-1", LoadOptions::default()).await.expect("first");
    let second = loader.load("lead-1", LoadOptions::default()).await.expect("second");

    assert_eq!(store.fetch_calls(), 1);
    assert_eq!(first, second);
}

#[tokio::test(start_paused = true)]
async fn stale_cache_entry_triggers_fetch() {
    let (store, loader) = setup(3);
    loader.load("lead-1", LoadOptions::default()).await.expect("first");

    tokio::time::advance(Duration::from_secs(11)).await;
    loader.load("lead-1", LoadOptions::default()).await.expect("second");

    assert_eq!(store.fetch_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn use_cache_false_always_fetches() {
    let (store, loader) = setup(2);
    let options = LoadOptions::default().with_cache(false);
    loader.load("lead-1", options).await.expect("first");
    loader.load("lead-1", options).await.expect("second");

    assert_eq!(store.fetch_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn force_reload_bypasses_and_refreshes_cache() {
    let (store, loader) = setup(2);
    loader.load("lead-1", LoadOptions::default()).await.expect("first");

    store.push(Message::inbound("lead-1", "new"));
    let reloaded = loader.force_reload("lead-1").await.expect("reload");
    assert_eq!(reloaded.len(), 3);
    assert_eq!(store.fetch_calls(), 2);

    // The refreshed snapshot is cached again.
    let cached = loader.load("lead-1", LoadOptions::default()).await.expect("cached");
    assert_eq!(cached, reloaded);
    assert_eq!(store.fetch_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn clear_cache_evicts_one_or_all() {
    let store = Arc::new(FakeStore::with_messages(
        conversation("lead-1", 2)
            .into_iter()
            .chain(conversation("lead-2", 2))
            .collect(),
    ));
    let loader = loader_over(&store, &fast_loader_config());
    loader.load("lead-1", LoadOptions::default()).await.expect("lead-1");
    loader.load("lead-2", LoadOptions::default()).await.expect("lead-2");
    assert_eq!(store.fetch_calls(), 2);

    loader.clear_cache(Some("lead-1"));
    loader.load("lead-1", LoadOptions::default()).await.expect("lead-1 again");
    loader.load("lead-2", LoadOptions::default()).await.expect("lead-2 cached");
    assert_eq!(store.fetch_calls(), 3);

    loader.clear_cache(None);
    loader.load("lead-1", LoadOptions::default()).await.expect("lead-1");
    loader.load("lead-2", LoadOptions::default()).await.expect("lead-2");
    assert_eq!(store.fetch_calls(), 5);
}

#[tokio::test(start_paused = true)]
async fn always_failing_store_is_tried_exactly_four_times() {
    let (store, loader) = setup(2);
    store.always_fail();

    let err = loader
        .load("lead-1", LoadOptions::default())
        .await
        .unwrap_err();

    assert_eq!(store.fetch_calls(), 4);
    match err {
        AppError::LoadExhausted {
            attempts,
            last_error,
        } => {
            assert_eq!(attempts, 4);
            assert!(last_error.contains("connection reset"));
        }
        other => panic!("expected LoadExhausted, got {other:?}"),
    }

    let state = loader.loading_state();
    assert!(!state.is_loading);
    assert_eq!(state.retry_count, 1);
    assert!(state.last_error.is_some());
}

#[tokio::test(start_paused = true)]
async fn retries_wait_with_exponential_backoff() {
    let (store, loader) = setup(2);
    store.always_fail();

    let started = tokio::time::Instant::now();
    let _ = loader.load("lead-1", LoadOptions::default()).await;

    // 1s + 2s + 4s between the four attempts.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(7), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(8), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn transient_failures_recover_within_retry_budget() {
    let (store, loader) = setup(3);
    store.fail_next(2);

    let messages = loader
        .load("lead-1", LoadOptions::default())
        .await
        .expect("recovers");
    assert_eq!(messages.len(), 3);
    assert_eq!(store.fetch_calls(), 3);
    assert_eq!(loader.loading_state().retry_count, 0);
}

#[tokio::test(start_paused = true)]
async fn failure_is_not_cached() {
    let (store, loader) = setup(2);
    store.fail_next(1);

    let options = LoadOptions {
        max_retries: 0,
        ..LoadOptions::default()
    };
    assert!(loader.load("lead-1", options).await.is_err());
    loader.load("lead-1", options).await.expect("second succeeds");
    assert_eq!(store.fetch_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn consecutive_failures_increment_retry_count_and_success_resets_it() {
    let (store, loader) = setup(2);
    store.always_fail();
    let options = LoadOptions {
        max_retries: 0,
        ..LoadOptions::default()
    };

    let _ = loader.load("lead-1", options).await;
    let _ = loader.load("lead-1", options).await;
    assert_eq!(loader.loading_state().retry_count, 2);

    store.fail_next(0);
    loader.load("lead-1", options).await.expect("success");
    let state = loader.loading_state();
    assert_eq!(state.retry_count, 0);
    assert!(state.last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn timeout_surfaces_cancelled_without_retry() {
    let (store, loader) = setup(2);
    store.set_fetch_delay(Duration::from_secs(30));

    let err = loader
        .load("lead-1", LoadOptions::default())
        .await
        .unwrap_err();

    assert!(err.is_cancelled(), "expected cancellation, got {err:?}");
    assert!(err.to_string().contains("timed out"));
    assert_eq!(store.fetch_calls(), 1);
    assert!(!loader.loading_state().is_loading);
}

#[tokio::test(start_paused = true)]
async fn new_load_supersedes_in_flight_load() {
    let store = Arc::new(FakeStore::with_messages(conversation("lead-1", 3)));
    store.set_fetch_delay(Duration::from_millis(100));
    let loader = Arc::new(loader_over(&store, &fast_loader_config()));

    let first = tokio::spawn({
        let loader = Arc::clone(&loader);
        async move { loader.load("lead-1", LoadOptions::default()).await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    let second = loader
        .load("lead-1", LoadOptions::default())
        .await
        .expect("second load completes");
    let first = first.await.expect("join");

    assert!(matches!(first, Err(ref e) if e.is_cancelled()), "got {first:?}");
    assert_eq!(second.len(), 3);

    let state = loader.loading_state();
    assert!(!state.is_loading);
    assert!(state.last_error.is_none());
    assert!(state.last_loaded_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn superseded_load_never_retries() {
    let store = Arc::new(FakeStore::with_messages(conversation("lead-1", 1)));
    store.always_fail();
    let loader = Arc::new(loader_over(&store, &fast_loader_config()));

    let first = tokio::spawn({
        let loader = Arc::clone(&loader);
        async move { loader.load("lead-1", LoadOptions::default()).await }
    });
    // Let the first attempt fail and enter backoff.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(store.fetch_calls(), 1);

    store.fail_next(0);
    loader
        .load("lead-1", LoadOptions::default())
        .await
        .expect("second succeeds");

    let first = first.await.expect("join");
    assert!(matches!(first, Err(ref e) if e.is_cancelled()));
    assert_eq!(store.fetch_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn explicit_cancel_aborts_in_flight_load() {
    let store = Arc::new(FakeStore::with_messages(conversation("lead-1", 1)));
    store.set_fetch_delay(Duration::from_secs(5));
    let loader = Arc::new(loader_over(&store, &fast_loader_config()));

    let pending = tokio::spawn({
        let loader = Arc::clone(&loader);
        async move { loader.load("lead-1", LoadOptions::default()).await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    loader.cancel();

    let result = pending.await.expect("join");
    assert!(matches!(result, Err(ref e) if e.is_cancelled()));
    assert!(!loader.loading_state().is_loading);
}

#[tokio::test(start_paused = true)]
async fn caller_scope_cancellation_propagates() {
    let store = Arc::new(FakeStore::with_messages(conversation("lead-1", 1)));
    store.set_fetch_delay(Duration::from_secs(5));
    let loader = Arc::new(loader_over(&store, &fast_loader_config()));
    let scope = CancellationToken::new();

    let pending = tokio::spawn({
        let loader = Arc::clone(&loader);
        let scope = scope.clone();
        async move {
            loader
                .load_scoped("lead-1", LoadOptions::default(), &scope)
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    scope.cancel();

    let result = pending.await.expect("join");
    assert!(matches!(result, Err(ref e) if e.is_cancelled()));
}

#[tokio::test(start_paused = true)]
async fn cancelled_load_does_not_populate_cache() {
    let (store, loader) = setup(2);
    store.set_fetch_delay(Duration::from_secs(30));
    let _ = loader.load("lead-1", LoadOptions::default()).await;

    store.set_fetch_delay(Duration::ZERO);
    loader.load("lead-1", LoadOptions::default()).await.expect("load");
    assert_eq!(store.fetch_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn separate_loaders_are_independent() {
    let store = Arc::new(FakeStore::with_messages(
        conversation("lead-1", 2)
            .into_iter()
            .chain(conversation("lead-2", 3))
            .collect(),
    ));
    store.set_fetch_delay(Duration::from_millis(50));
    let a = loader_over(&store, &fast_loader_config());
    let b = loader_over(&store, &fast_loader_config());

    let (ra, rb) = tokio::join!(
        a.load("lead-1", LoadOptions::default()),
        b.load("lead-2", LoadOptions::default())
    );
    assert_eq!(ra.expect("a").len(), 2);
    assert_eq!(rb.expect("b").len(), 3);
}

#[tokio::test(start_paused = true)]
async fn already_cancelled_scope_never_commits() {
    let (store, loader) = setup(2);
    let scope = CancellationToken::new();
    scope.cancel();

    let err = loader
        .load_scoped("lead-1", LoadOptions::default(), &scope)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert!(!loader.loading_state().is_loading);
    assert!(loader.loading_state().last_loaded_at.is_none());

    loader.load("lead-1", LoadOptions::default()).await.expect("load");
    assert_eq!(store.fetch_calls(), 2);
}

// ─── Late results ──────────────────────────────────────────────────

/// Store whose first query starts a newer load on the same loader and
/// only returns once that load has begun querying, so the first query
/// finishes after it has been superseded.
struct LateResultStore {
    rows: Vec<MessageRecord>,
    calls: AtomicUsize,
    loader: OnceLock<Weak<MessageLoader>>,
    newer: Mutex<Option<tokio::task::JoinHandle<Result<Vec<Message>>>>>,
}

impl LateResultStore {
    fn new(messages: &[Message]) -> Self {
        Self {
            rows: messages.iter().map(MessageRecord::from).collect(),
            calls: AtomicUsize::new(0),
            loader: OnceLock::new(),
            newer: Mutex::new(None),
        }
    }
}

impl MessageStore for LateResultStore {
    fn fetch_messages(&self, _lead_id: &str) -> StoreFuture<'_, Vec<MessageRecord>> {
        Box::pin(async move {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call > 0 {
                return Ok(self.rows.clone());
            }

            let loader = self
                .loader
                .get()
                .and_then(Weak::upgrade)
                .expect("loader registered");
            let handle = tokio::spawn(async move {
                loader
                    .load("lead-1", LoadOptions::default().with_cache(false))
                    .await
            });
            *self.newer.lock().unwrap() = Some(handle);

            // Block without yielding so this query completes in the same
            // poll that observes the newer load.
            for _ in 0..5_000 {
                if self.calls.load(Ordering::SeqCst) > 1 {
                    break;
                }
                std::thread::sleep(Duration::from_millis(1));
            }
            assert!(self.calls.load(Ordering::SeqCst) > 1, "newer load never started");

            // Stale snapshot: only the oldest row.
            Ok(self.rows[..1].to_vec())
        })
    }

    fn mark_read(&self, _ids: Vec<String>) -> StoreFuture<'_, u64> {
        Box::pin(async { Ok(0) })
    }

    fn append(&self, _message: Message) -> StoreFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn superseded_result_does_not_commit() {
    let store = Arc::new(LateResultStore::new(&conversation("lead-1", 3)));
    let loader = Arc::new(MessageLoader::new(
        Arc::clone(&store) as Arc<dyn MessageStore>,
        &fast_loader_config(),
    ));
    store
        .loader
        .set(Arc::downgrade(&loader))
        .expect("register loader once");

    let stale = loader.load("lead-1", LoadOptions::default()).await;
    assert!(matches!(stale, Err(ref e) if e.is_cancelled()), "got {stale:?}");

    let newer = store
        .newer
        .lock()
        .unwrap()
        .take()
        .expect("newer load spawned");
    let fresh = newer.await.expect("join").expect("newer load succeeds");
    assert_eq!(fresh.len(), 3);

    let state = loader.loading_state();
    assert!(!state.is_loading);
    assert!(state.last_error.is_none());
    assert!(state.last_loaded_at.is_some());
    assert_eq!(state.retry_count, 0);

    // The cache holds the newer snapshot, not the stale one.
    let cached = loader
        .load("lead-1", LoadOptions::default())
        .await
        .expect("cached load");
    assert_eq!(cached, fresh);
    assert_eq!(store.calls.load(Ordering::SeqCst), 2);
}
