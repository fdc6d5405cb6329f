use std::marker::PhantomData;
use std::sync::Arc;
use tokio::time::Instant;

use super::client::{retrying, EntryStatus, ErasedFetcher, Observer, QueryOptions};
use super::key::QueryKey;
use crate::error::FetchError;

/// Snapshot of a query as seen by its observer
#[derive(Debug)]
pub struct QueryState<T> {
  pub data: Option<Arc<T>>,
  pub error: Option<FetchError>,
  pub status: EntryStatus,
}

impl<T> QueryState<T> {
  /// Nothing to show yet and a request is running
  pub fn is_loading(&self) -> bool {
    self.data.is_none() && self.status == EntryStatus::Fetching
  }

  pub fn is_fetching(&self) -> bool {
    self.status == EntryStatus::Fetching
  }

  pub fn is_stale(&self) -> bool {
    self.data.is_some() && self.status == EntryStatus::Stale
  }

  pub fn is_error(&self) -> bool {
    self.error.is_some()
  }
}

/// An observer's view of one cached query.
///
/// Holding the handle keeps the entry alive; dropping it detaches.
pub struct QueryHandle<T> {
  observer: Observer,
  fetcher: ErasedFetcher,
  options: QueryOptions,
  _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> QueryHandle<T> {
  pub(crate) fn new(observer: Observer, fetcher: ErasedFetcher, options: QueryOptions) -> Self {
    Self {
      observer,
      fetcher,
      options,
      _marker: PhantomData,
    }
  }

  pub fn key(&self) -> &QueryKey {
    self.observer.key()
  }

  /// Read the current state of the entry
  pub fn state(&self) -> QueryState<T> {
    let now = Instant::now();
    self
      .observer
      .client()
      .with_entry(self.key(), |entry| QueryState {
        data: entry
          .value()
          .cloned()
          .and_then(|v| v.downcast::<T>().ok()),
        error: entry.error().map(|(_, err)| err.clone()),
        status: entry.status(now),
      })
      .unwrap_or(QueryState {
        data: None,
        error: None,
        status: EntryStatus::Stale,
      })
  }

  pub fn data(&self) -> Option<Arc<T>> {
    self.state().data
  }

  pub fn is_loading(&self) -> bool {
    self.state().is_loading()
  }

  pub fn is_fetching(&self) -> bool {
    self.state().is_fetching()
  }

  pub fn is_stale(&self) -> bool {
    self.state().is_stale()
  }

  pub fn is_error(&self) -> bool {
    self.state().is_error()
  }

  pub fn error(&self) -> Option<FetchError> {
    self.state().error
  }

  /// Refetch now, superseding any request already in flight for the key.
  /// Current data stays visible until the new result lands.
  pub fn refetch(&self) {
    let fetcher = self.fetcher.clone();
    let key = self.key().clone();
    let options = self.options;
    self
      .observer
      .client()
      .ensure(self.key(), true, move |_| retrying(move || fetcher(), options, key));
  }

  /// Wait until nothing is in flight for the key
  pub async fn settled(&self) {
    while let Some(pending) = self.observer.client().in_flight(self.key()) {
      let _ = pending.await;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::query::QueryClient;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::time::Duration;

  fn opts() -> QueryOptions {
    QueryOptions {
      retry_delay: Duration::ZERO,
      ..QueryOptions::default()
    }
  }

  /// Fetcher counting its calls, each one sleeping `delay` then returning
  /// the call index.
  fn counting(
    calls: &Arc<AtomicU32>,
    delay: Duration,
  ) -> impl Fn() -> futures::future::BoxFuture<'static, Result<u32, FetchError>> + Send + Sync + 'static
  {
    let calls = calls.clone();
    move || {
      let calls = calls.clone();
      Box::pin(async move {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(delay).await;
        Ok(n)
      })
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_identical_keys_share_one_request() {
    let client = QueryClient::new();
    let calls = Arc::new(AtomicU32::new(0));
    let key = QueryKey::List { page: 1, limit: 20 };

    let a = client.query(key.clone(), counting(&calls, Duration::from_millis(50)), opts());
    let b = client.query(key.clone(), counting(&calls, Duration::from_millis(50)), opts());
    assert!(a.is_loading());
    assert!(b.is_loading() && !b.is_error());

    a.settled().await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.data().as_deref(), Some(&0));
    assert_eq!(b.data().as_deref(), Some(&0));
  }

  #[tokio::test(start_paused = true)]
  async fn test_fresh_data_served_without_request() {
    let client = QueryClient::new();
    let calls = Arc::new(AtomicU32::new(0));
    let key = QueryKey::detail("25");

    let first = client.query(key.clone(), counting(&calls, Duration::ZERO), opts());
    first.settled().await;

    let second = client.query(key.clone(), counting(&calls, Duration::ZERO), opts());
    let state = second.state();
    assert_eq!(state.status, EntryStatus::Fresh);
    assert!(!state.is_fetching());
    assert_eq!(state.data.as_deref(), Some(&0));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_stale_data_shown_while_refetching() {
    let client = QueryClient::new();
    let calls = Arc::new(AtomicU32::new(0));
    let key = QueryKey::detail("25");
    let options = QueryOptions {
      stale_time: Duration::from_secs(60),
      ..opts()
    };

    let first = client.query(key.clone(), counting(&calls, Duration::from_millis(10)), options);
    first.settled().await;

    tokio::time::advance(Duration::from_secs(61)).await;
    assert!(first.state().is_stale());

    // Mounting another observer on stale data refetches in the background
    let second = client.query(key.clone(), counting(&calls, Duration::from_millis(10)), options);
    let state = second.state();
    assert!(state.is_fetching());
    assert!(!state.is_loading());
    assert_eq!(state.data.as_deref(), Some(&0));

    second.settled().await;
    assert_eq!(second.data().as_deref(), Some(&1));
    assert_eq!(first.data().as_deref(), Some(&1));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_refetch_supersedes_in_flight_request() {
    let client = QueryClient::new();
    let calls = Arc::new(AtomicU32::new(0));
    let calls_for_fetch = calls.clone();

    // First call is slow, second fast: the slow one lands last
    let fetcher = move || {
      let calls = calls_for_fetch.clone();
      async move {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        let delay = if n == 0 { 100 } else { 10 };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok::<_, FetchError>(n)
      }
    };

    let handle = client.query(QueryKey::search("eevee"), fetcher, opts());
    // Let the first request start before superseding it
    tokio::time::sleep(Duration::from_millis(1)).await;
    handle.refetch();
    handle.settled().await;
    assert_eq!(handle.data().as_deref(), Some(&1));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(handle.data().as_deref(), Some(&1));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_result_discarded_after_last_observer_leaves() {
    let client = QueryClient::new();
    let calls = Arc::new(AtomicU32::new(0));
    let key = QueryKey::search("pikachu");

    let handle = client.query(key.clone(), counting(&calls, Duration::from_millis(50)), opts());
    drop(handle);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.status(&key), Some(EntryStatus::Stale));
    assert!(client
      .with_entry(&key, |e| e.value().is_none())
      .unwrap_or(false));
  }

  #[tokio::test(start_paused = true)]
  async fn test_error_keeps_previous_data() {
    let client = QueryClient::new();
    let calls = Arc::new(AtomicU32::new(0));
    let calls_for_fetch = calls.clone();

    let fetcher = move || {
      let calls = calls_for_fetch.clone();
      async move {
        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
          Ok(7u32)
        } else {
          Err(FetchError::network("500 Internal Server Error"))
        }
      }
    };

    let handle = client.query(QueryKey::detail("7"), fetcher, opts());
    handle.settled().await;
    handle.refetch();
    handle.settled().await;

    let state = handle.state();
    assert!(state.is_error());
    assert_eq!(state.status, EntryStatus::Error);
    assert_eq!(state.data.as_deref(), Some(&7));
    // One success, then one attempt plus two retries
    assert_eq!(calls.load(Ordering::SeqCst), 4);
  }
}
