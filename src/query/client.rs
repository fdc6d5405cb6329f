//! The keyed cache shared by every query handle.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::handle::QueryHandle;
use super::key::QueryKey;
use crate::error::FetchError;

/// Type-erased cached value
pub(crate) type AnyValue = Arc<dyn Any + Send + Sync>;
pub(crate) type FetchResult = Result<AnyValue, FetchError>;
pub(crate) type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

/// Longest wait between two retry attempts
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Per-query caching and retry settings, fixed when the query is declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
  /// Data younger than this is served without a request
  pub stale_time: Duration,
  /// Entries without observers for this long are evicted
  pub idle_evict: Duration,
  /// Attempts after the first failed one
  pub retry_count: u32,
  /// False disables retries entirely
  pub retryable: bool,
  /// Delay before the first retry, doubled for each further one
  pub retry_delay: Duration,
}

impl Default for QueryOptions {
  fn default() -> Self {
    Self {
      stale_time: Duration::from_secs(5 * 60),
      idle_evict: Duration::from_secs(10 * 60),
      retry_count: 2,
      retryable: true,
      retry_delay: Duration::from_secs(1),
    }
  }
}

impl QueryOptions {
  fn backoff(&self, attempt: u32) -> Duration {
    self
      .retry_delay
      .saturating_mul(1u32 << attempt.min(16))
      .min(MAX_RETRY_DELAY)
  }
}

/// Lifecycle state of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
  Fresh,
  Stale,
  Fetching,
  Error,
}

/// What an in-flight request will do to the entry when it lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FetchKind {
  /// Replaces the value (first load or refetch)
  Load,
  /// Appends a page to an infinite query
  NextPage,
}

struct InFlight {
  generation: u64,
  kind: FetchKind,
  future: SharedFetch,
}

pub(crate) struct CacheEntry {
  value: Option<AnyValue>,
  fetched_at: Option<Instant>,
  invalidated: bool,
  error: Option<(FetchKind, FetchError)>,
  in_flight: Option<InFlight>,
  /// Bumped on every dispatch; only the latest dispatch may write back
  generation: u64,
  observers: usize,
  idle_since: Instant,
  options: QueryOptions,
}

impl CacheEntry {
  fn new(options: QueryOptions) -> Self {
    Self {
      value: None,
      fetched_at: None,
      invalidated: false,
      error: None,
      in_flight: None,
      generation: 0,
      observers: 0,
      idle_since: Instant::now(),
      options,
    }
  }

  pub(crate) fn value(&self) -> Option<&AnyValue> {
    self.value.as_ref()
  }

  pub(crate) fn is_stale(&self, now: Instant) -> bool {
    match self.fetched_at {
      Some(at) => self.invalidated || now.duration_since(at) >= self.options.stale_time,
      None => true,
    }
  }

  pub(crate) fn is_fetching(&self) -> bool {
    self.in_flight.is_some()
  }

  pub(crate) fn fetch_kind(&self) -> Option<FetchKind> {
    self.in_flight.as_ref().map(|f| f.kind)
  }

  pub(crate) fn error(&self) -> Option<(FetchKind, &FetchError)> {
    self.error.as_ref().map(|(kind, err)| (*kind, err))
  }

  pub(crate) fn status(&self, now: Instant) -> EntryStatus {
    if self.in_flight.is_some() {
      EntryStatus::Fetching
    } else if self.error.is_some() {
      EntryStatus::Error
    } else if self.is_stale(now) {
      EntryStatus::Stale
    } else {
      EntryStatus::Fresh
    }
  }
}

type EntryMap = HashMap<QueryKey, CacheEntry>;

/// Cache of query results keyed by [`QueryKey`].
///
/// Constructed once and handed to every view; clones share the same map.
/// At most one request per key is in flight at any time.
#[derive(Clone, Default)]
pub struct QueryClient {
  entries: Arc<Mutex<EntryMap>>,
}

impl QueryClient {
  pub fn new() -> Self {
    Self::default()
  }

  /// Declare a single-value query and observe it until the handle drops.
  ///
  /// Starts a request when the key has no data or stale data and nothing is
  /// in flight; otherwise the handle attaches to what is there.
  pub fn query<T, F, Fut>(&self, key: QueryKey, fetcher: F, options: QueryOptions) -> QueryHandle<T>
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
  {
    let observer = self.observe(&key, options);
    let fetcher = erase(fetcher);
    let attempt = fetcher.clone();
    self.ensure(&key, false, |_| retrying(move || attempt(), options, key.clone()));
    QueryHandle::new(observer, fetcher, options)
  }

  /// Resolve a query without keeping an observer, following the same
  /// dedup and staleness rules as [`QueryClient::query`].
  pub async fn fetch_query<T, F, Fut>(
    &self,
    key: QueryKey,
    fetcher: F,
    options: QueryOptions,
  ) -> Result<Arc<T>, FetchError>
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
  {
    // Observe while waiting so the request is not abandoned under us
    let _observer = self.observe(&key, options);
    let fetcher = erase(fetcher);

    let value = match self.ensure(&key, false, |_| retrying(move || fetcher(), options, key.clone())) {
      Some(pending) => pending.await?,
      None => self
        .with_entry(&key, |e| e.value().cloned())
        .flatten()
        .ok_or_else(|| FetchError::Malformed {
          reason: format!("no cached value for {}", key),
        })?,
    };

    value.downcast::<T>().map_err(|_| FetchError::Malformed {
      reason: format!("cached value for {} has a different type", key),
    })
  }

  /// Mark an entry stale so the next observer refetches it.
  pub fn invalidate(&self, key: &QueryKey) {
    if let Some(entry) = self.entries.lock().get_mut(key) {
      entry.invalidated = true;
    }
  }

  /// Drop entries that have had no observers for longer than their idle
  /// window. Returns how many were removed.
  pub fn evict_idle(&self) -> usize {
    let now = Instant::now();
    let mut entries = self.entries.lock();
    let before = entries.len();

    entries.retain(|key, entry| {
      let keep = entry.observers > 0
        || entry.in_flight.is_some()
        || now.duration_since(entry.idle_since) < entry.options.idle_evict;
      if !keep {
        debug!(%key, "evicting idle entry");
      }
      keep
    });

    before - entries.len()
  }

  pub fn status(&self, key: &QueryKey) -> Option<EntryStatus> {
    let now = Instant::now();
    self.with_entry(key, |e| e.status(now))
  }

  pub fn len(&self) -> usize {
    self.entries.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.lock().is_empty()
  }

  // ==========================================================================
  // Crate-internal building blocks for the handles
  // ==========================================================================

  pub(crate) fn observe(&self, key: &QueryKey, options: QueryOptions) -> Observer {
    let mut entries = self.entries.lock();
    let entry = entries
      .entry(key.clone())
      .or_insert_with(|| CacheEntry::new(options));
    entry.options = options;
    entry.observers += 1;

    Observer {
      client: self.clone(),
      key: key.clone(),
    }
  }

  fn detach(&self, key: &QueryKey) {
    let mut entries = self.entries.lock();
    if let Some(entry) = entries.get_mut(key) {
      entry.observers = entry.observers.saturating_sub(1);
      if entry.observers == 0 {
        entry.idle_since = Instant::now();
        if entry.in_flight.take().is_some() {
          // The request keeps running; its result is discarded on arrival
          debug!(%key, "abandoning in-flight request");
        }
      }
    }
  }

  pub(crate) fn with_entry<R>(&self, key: &QueryKey, f: impl FnOnce(&CacheEntry) -> R) -> Option<R> {
    self.entries.lock().get(key).map(f)
  }

  pub(crate) fn in_flight(&self, key: &QueryKey) -> Option<SharedFetch> {
    self
      .entries
      .lock()
      .get(key)
      .and_then(|e| e.in_flight.as_ref().map(|f| f.future.clone()))
  }

  /// Start a load for `key` unless one is unnecessary.
  ///
  /// Without `force`, joins the in-flight request if there is one and does
  /// nothing while the data is fresh. With `force`, always dispatches; an
  /// earlier in-flight request is superseded. `make` receives the current
  /// value and builds the request future.
  pub(crate) fn ensure(
    &self,
    key: &QueryKey,
    force: bool,
    make: impl FnOnce(Option<AnyValue>) -> BoxFuture<'static, FetchResult>,
  ) -> Option<SharedFetch> {
    let now = Instant::now();
    let mut entries = self.entries.lock();
    let entry = entries
      .entry(key.clone())
      .or_insert_with(|| CacheEntry::new(QueryOptions::default()));

    if !force {
      if let Some(in_flight) = &entry.in_flight {
        debug!(%key, "joining in-flight request");
        return Some(in_flight.future.clone());
      }
      if entry.value.is_some() && !entry.is_stale(now) {
        return None;
      }
    }

    let fetch = make(entry.value.clone());
    Some(self.dispatch(key, entry, FetchKind::Load, fetch))
  }

  /// Start an append for an infinite query. No-op while anything is in
  /// flight for the key. `make` returns None when there is nothing to fetch.
  pub(crate) fn dispatch_next(
    &self,
    key: &QueryKey,
    make: impl FnOnce(&AnyValue) -> Option<BoxFuture<'static, FetchResult>>,
  ) -> bool {
    let mut entries = self.entries.lock();
    let Some(entry) = entries.get_mut(key) else {
      return false;
    };
    if entry.in_flight.is_some() {
      return false;
    }
    let Some(fetch) = entry.value.as_ref().and_then(make) else {
      return false;
    };

    self.dispatch(key, entry, FetchKind::NextPage, fetch);
    true
  }

  fn dispatch(
    &self,
    key: &QueryKey,
    entry: &mut CacheEntry,
    kind: FetchKind,
    fetch: BoxFuture<'static, FetchResult>,
  ) -> SharedFetch {
    entry.generation += 1;
    entry.error = None;
    let generation = entry.generation;
    debug!(%key, generation, ?kind, "dispatching request");

    // The write-back runs inside the shared future, so every waiter sees
    // the entry already updated when its await returns.
    let map: Weak<Mutex<EntryMap>> = Arc::downgrade(&self.entries);
    let settle_key = key.clone();
    let future = async move {
      let result = fetch.await;
      if let Some(map) = map.upgrade() {
        settle(&mut map.lock(), &settle_key, generation, &result);
      }
      result
    }
    .boxed()
    .shared();

    entry.in_flight = Some(InFlight {
      generation,
      kind,
      future: future.clone(),
    });
    tokio::spawn(future.clone());
    future
  }
}

/// Apply a finished request to its entry, unless the entry was evicted,
/// the request abandoned, or a newer dispatch superseded it.
fn settle(entries: &mut EntryMap, key: &QueryKey, generation: u64, result: &FetchResult) {
  let Some(entry) = entries.get_mut(key) else {
    debug!(%key, "discarding result for evicted entry");
    return;
  };
  let kind = match &entry.in_flight {
    Some(in_flight) if in_flight.generation == generation => in_flight.kind,
    _ => {
      debug!(%key, generation, "discarding superseded result");
      return;
    }
  };
  entry.in_flight = None;

  match result {
    Ok(value) => {
      entry.value = Some(Arc::clone(value));
      entry.fetched_at = Some(Instant::now());
      entry.invalidated = false;
      entry.error = None;
    }
    Err(err) => {
      warn!(%key, error = %err, "query failed");
      entry.error = Some((kind, err.clone()));
    }
  }
}

/// Registration of interest in a key. Dropping the last observer starts the
/// idle-eviction clock and abandons any in-flight request.
pub(crate) struct Observer {
  client: QueryClient,
  key: QueryKey,
}

impl Observer {
  pub(crate) fn client(&self) -> &QueryClient {
    &self.client
  }

  pub(crate) fn key(&self) -> &QueryKey {
    &self.key
  }
}

impl Drop for Observer {
  fn drop(&mut self) {
    self.client.detach(&self.key);
  }
}

pub(crate) type ErasedFetcher = Arc<dyn Fn() -> BoxFuture<'static, FetchResult> + Send + Sync>;

fn erase<T, F, Fut>(fetcher: F) -> ErasedFetcher
where
  T: Send + Sync + 'static,
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
{
  Arc::new(move || {
    let fut = fetcher();
    async move { fut.await.map(|v| Arc::new(v) as AnyValue) }.boxed()
  })
}

/// Run `attempt` until it succeeds, the error is not retryable, or the
/// retry budget is spent.
pub(crate) fn retrying<T, F>(
  attempt: F,
  options: QueryOptions,
  key: QueryKey,
) -> BoxFuture<'static, Result<T, FetchError>>
where
  T: Send + 'static,
  F: Fn() -> BoxFuture<'static, Result<T, FetchError>> + Send + Sync + 'static,
{
  async move {
    let mut retries = 0;
    loop {
      match attempt().await {
        Ok(value) => return Ok(value),
        Err(err) if options.retryable && err.is_retryable() && retries < options.retry_count => {
          let delay = options.backoff(retries);
          retries += 1;
          debug!(%key, retries, ?delay, error = %err, "retrying");
          if !delay.is_zero() {
            tokio::time::sleep(delay).await;
          }
        }
        Err(err) => return Err(err),
      }
    }
  }
  .boxed()
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};

  fn opts() -> QueryOptions {
    QueryOptions {
      retry_delay: Duration::ZERO,
      ..QueryOptions::default()
    }
  }

  #[test]
  fn test_backoff_doubles_and_caps() {
    let options = QueryOptions::default();
    assert_eq!(options.backoff(0), Duration::from_secs(1));
    assert_eq!(options.backoff(1), Duration::from_secs(2));
    assert_eq!(options.backoff(2), Duration::from_secs(4));
    assert_eq!(options.backoff(10), MAX_RETRY_DELAY);
    assert_eq!(options.backoff(40), MAX_RETRY_DELAY);
  }

  #[tokio::test]
  async fn test_fetch_query_caches_fresh_value() {
    let client = QueryClient::new();
    let calls = Arc::new(AtomicU32::new(0));

    for _ in 0..3 {
      let calls = calls.clone();
      let value = client
        .fetch_query(
          QueryKey::detail("25"),
          move || {
            let calls = calls.clone();
            async move { Ok::<_, FetchError>(calls.fetch_add(1, Ordering::SeqCst)) }
          },
          opts(),
        )
        .await
        .unwrap();
      assert_eq!(*value, 0);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_concurrent_fetch_query_shares_request() {
    let client = QueryClient::new();
    let calls = Arc::new(AtomicU32::new(0));

    let fetch = |calls: Arc<AtomicU32>| {
      move || {
        let calls = calls.clone();
        async move {
          calls.fetch_add(1, Ordering::SeqCst);
          tokio::time::sleep(Duration::from_millis(20)).await;
          Ok::<_, FetchError>("bulbasaur".to_string())
        }
      }
    };

    let (a, b) = tokio::join!(
      client.fetch_query(QueryKey::detail("1"), fetch(calls.clone()), opts()),
      client.fetch_query(QueryKey::detail("1"), fetch(calls.clone()), opts()),
    );

    assert_eq!(*a.unwrap(), "bulbasaur");
    assert_eq!(*b.unwrap(), "bulbasaur");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_retries_then_fails() {
    let client = QueryClient::new();
    let calls = Arc::new(AtomicU32::new(0));
    let counted = calls.clone();

    let result = client
      .fetch_query(
        QueryKey::List { page: 1, limit: 20 },
        move || {
          let calls = counted.clone();
          async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<u32, _>(FetchError::network("503 Service Unavailable"))
          }
        },
        opts(),
      )
      .await;

    assert_eq!(result.unwrap_err(), FetchError::network("503 Service Unavailable"));
    // First attempt plus two retries
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(
      client.status(&QueryKey::List { page: 1, limit: 20 }),
      Some(EntryStatus::Error)
    );
  }

  #[tokio::test]
  async fn test_retry_recovers() {
    let client = QueryClient::new();
    let calls = Arc::new(AtomicU32::new(0));
    let counted = calls.clone();

    let value = client
      .fetch_query(
        QueryKey::detail("7"),
        move || {
          let calls = counted.clone();
          async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
              Err(FetchError::network("502 Bad Gateway"))
            } else {
              Ok("squirtle")
            }
          }
        },
        opts(),
      )
      .await
      .unwrap();

    assert_eq!(*value, "squirtle");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn test_not_found_is_never_retried() {
    let client = QueryClient::new();
    let calls = Arc::new(AtomicU32::new(0));
    let counted = calls.clone();

    let err = client
      .fetch_query(
        QueryKey::search("agumon"),
        move || {
          let calls = counted.clone();
          async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<u32, _>(FetchError::NotFound {
              query: "agumon".to_string(),
            })
          }
        },
        QueryOptions {
          retryable: false,
          ..opts()
        },
      )
      .await
      .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_non_retryable_query_skips_network_retries() {
    let client = QueryClient::new();
    let calls = Arc::new(AtomicU32::new(0));
    let counted = calls.clone();

    let _ = client
      .fetch_query(
        QueryKey::search("25"),
        move || {
          let calls = counted.clone();
          async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<u32, _>(FetchError::network("500 Internal Server Error"))
          }
        },
        QueryOptions {
          retryable: false,
          ..opts()
        },
      )
      .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_idle_entries_evicted() {
    let client = QueryClient::new();
    let options = QueryOptions {
      idle_evict: Duration::from_secs(60),
      ..opts()
    };

    client
      .fetch_query(QueryKey::detail("1"), || async { Ok::<_, FetchError>(1u32) }, options)
      .await
      .unwrap();
    assert_eq!(client.len(), 1);

    tokio::time::advance(Duration::from_secs(30)).await;
    assert_eq!(client.evict_idle(), 0);

    tokio::time::advance(Duration::from_secs(31)).await;
    assert_eq!(client.evict_idle(), 1);
    assert!(client.is_empty());
  }

  #[tokio::test]
  async fn test_invalidate_forces_refetch() {
    let client = QueryClient::new();
    let calls = Arc::new(AtomicU32::new(0));
    let key = QueryKey::detail("4");

    let fetch = |calls: Arc<AtomicU32>| {
      move || {
        let calls = calls.clone();
        async move { Ok::<_, FetchError>(calls.fetch_add(1, Ordering::SeqCst)) }
      }
    };

    client.fetch_query(key.clone(), fetch(calls.clone()), opts()).await.unwrap();
    client.invalidate(&key);
    assert_eq!(client.status(&key), Some(EntryStatus::Stale));

    let value = client.fetch_query(key.clone(), fetch(calls.clone()), opts()).await.unwrap();
    assert_eq!(*value, 1);
    assert_eq!(client.status(&key), Some(EntryStatus::Fresh));
  }
}
