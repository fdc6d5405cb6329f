//! Cursor-chained queries: an ordered sequence of pages under one key.

use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;

use super::client::{retrying, AnyValue, FetchKind, FetchResult, Observer, QueryClient, QueryOptions};
use super::key::QueryKey;
use crate::error::FetchError;

type PageFetcher<T, C> = Arc<dyn Fn(C) -> BoxFuture<'static, Result<T, FetchError>> + Send + Sync>;
type CursorFn<T, C> = Arc<dyn Fn(&T) -> Option<C> + Send + Sync>;

/// Pages fetched so far. Replaced wholesale whenever a page is added.
pub struct InfiniteData<T, C> {
  pages: Vec<Arc<T>>,
  next_cursor: Option<C>,
  /// Set once a last page produced no cursor; never cleared
  exhausted: bool,
}

impl<T, C: Clone> Clone for InfiniteData<T, C> {
  fn clone(&self) -> Self {
    Self {
      pages: self.pages.clone(),
      next_cursor: self.next_cursor.clone(),
      exhausted: self.exhausted,
    }
  }
}

impl<T, C> InfiniteData<T, C> {
  pub fn pages(&self) -> &[Arc<T>] {
    &self.pages
  }

  pub fn has_next_page(&self) -> bool {
    !self.exhausted && self.next_cursor.is_some()
  }
}

/// Snapshot of an infinite query
pub struct InfiniteState<T, C> {
  pub data: Option<Arc<InfiniteData<T, C>>>,
  error: Option<(FetchKind, FetchError)>,
  fetching: Option<FetchKind>,
}

impl<T, C> InfiniteState<T, C> {
  pub fn pages(&self) -> &[Arc<T>] {
    self.data.as_deref().map(|d| d.pages()).unwrap_or(&[])
  }

  pub fn has_next_page(&self) -> bool {
    self.data.as_deref().is_some_and(|d| d.has_next_page())
  }

  /// No pages yet and the first one is on its way
  pub fn is_loading(&self) -> bool {
    self.data.is_none() && self.fetching == Some(FetchKind::Load)
  }

  pub fn is_fetching(&self) -> bool {
    self.fetching.is_some()
  }

  pub fn is_fetching_next_page(&self) -> bool {
    self.fetching == Some(FetchKind::NextPage)
  }

  /// Loading (or reloading) the sequence failed
  pub fn is_error(&self) -> bool {
    matches!(self.error, Some((FetchKind::Load, _)))
  }

  /// Appending a page failed; earlier pages are untouched
  pub fn is_fetch_next_page_error(&self) -> bool {
    matches!(self.error, Some((FetchKind::NextPage, _)))
  }

  pub fn error(&self) -> Option<&FetchError> {
    self.error.as_ref().map(|(_, err)| err)
  }
}

/// An observer's view of one infinite query
pub struct InfiniteQueryHandle<T, C> {
  observer: Observer,
  initial_cursor: C,
  fetch_page: PageFetcher<T, C>,
  next_cursor: CursorFn<T, C>,
  options: QueryOptions,
}

impl QueryClient {
  /// Declare an infinite query starting at `initial_cursor`.
  ///
  /// `get_next_cursor` is applied to the most recently fetched page; None
  /// ends the sequence.
  pub fn infinite_query<T, C, F, Fut, N>(
    &self,
    key: QueryKey,
    initial_cursor: C,
    fetch_page: F,
    get_next_cursor: N,
    options: QueryOptions,
  ) -> InfiniteQueryHandle<T, C>
  where
    T: Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
    F: Fn(C) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    N: Fn(&T) -> Option<C> + Send + Sync + 'static,
  {
    let observer = self.observe(&key, options);
    let handle = InfiniteQueryHandle {
      observer,
      initial_cursor,
      fetch_page: Arc::new(move |cursor| fetch_page(cursor).boxed()),
      next_cursor: Arc::new(get_next_cursor),
      options,
    };
    handle.load(false);
    handle
  }
}

impl<T, C> InfiniteQueryHandle<T, C>
where
  T: Send + Sync + 'static,
  C: Clone + Send + Sync + 'static,
{
  pub fn key(&self) -> &QueryKey {
    self.observer.key()
  }

  pub fn state(&self) -> InfiniteState<T, C> {
    self
      .observer
      .client()
      .with_entry(self.key(), |entry| InfiniteState {
        data: entry
          .value()
          .cloned()
          .and_then(|v| v.downcast::<InfiniteData<T, C>>().ok()),
        error: entry.error().map(|(kind, err)| (kind, err.clone())),
        fetching: entry.fetch_kind(),
      })
      .unwrap_or(InfiniteState {
        data: None,
        error: None,
        fetching: None,
      })
  }

  pub fn pages(&self) -> Vec<Arc<T>> {
    self.state().pages().to_vec()
  }

  pub fn has_next_page(&self) -> bool {
    self.state().has_next_page()
  }

  pub fn is_fetching_next_page(&self) -> bool {
    self.state().is_fetching_next_page()
  }

  pub fn is_fetch_next_page_error(&self) -> bool {
    self.state().is_fetch_next_page_error()
  }

  /// Append the next page. Does nothing (and returns false) while any
  /// request for the key is in flight or when there is no next page.
  pub fn fetch_next_page(&self) -> bool {
    let fetch_page = self.fetch_page.clone();
    let next_cursor = self.next_cursor.clone();
    let options = self.options;
    let key = self.key().clone();

    self
      .observer
      .client()
      .dispatch_next(self.key(), move |value: &AnyValue| {
        let data = Arc::clone(value).downcast::<InfiniteData<T, C>>().ok()?;
        if !data.has_next_page() {
          return None;
        }
        let cursor = data.next_cursor.clone()?;

        Some(
          async move {
            let page = retrying(move || fetch_page(cursor.clone()), options, key).await?;
            let mut next = InfiniteData::clone(&data);
            next.next_cursor = next_cursor(&page);
            next.exhausted = next.next_cursor.is_none();
            next.pages.push(Arc::new(page));
            Ok(Arc::new(next) as AnyValue)
          }
          .boxed(),
        )
      })
  }

  /// Refetch every loaded page in order. Loaded pages stay visible until
  /// the whole sequence has been replaced.
  pub fn refetch(&self) {
    self.load(true);
  }

  /// Wait until nothing is in flight for the key
  pub async fn settled(&self) {
    while let Some(pending) = self.observer.client().in_flight(self.key()) {
      let _ = pending.await;
    }
  }

  fn load(&self, force: bool) {
    let initial_cursor = self.initial_cursor.clone();
    let fetch_page = self.fetch_page.clone();
    let next_cursor = self.next_cursor.clone();
    let options = self.options;
    let key = self.key().clone();

    self.observer.client().ensure(self.key(), force, move |prev| {
      load_pages(prev, initial_cursor, fetch_page, next_cursor, options, key)
    });
  }
}

/// Fetch pages from the start until as many pages as `prev` held have been
/// loaded (at least one), or the sequence ends.
fn load_pages<T, C>(
  prev: Option<AnyValue>,
  initial_cursor: C,
  fetch_page: PageFetcher<T, C>,
  next_cursor: CursorFn<T, C>,
  options: QueryOptions,
  key: QueryKey,
) -> BoxFuture<'static, FetchResult>
where
  T: Send + Sync + 'static,
  C: Clone + Send + Sync + 'static,
{
  let prev = prev.and_then(|v| v.downcast::<InfiniteData<T, C>>().ok());

  async move {
    let target = prev.as_ref().map_or(1, |d| d.pages.len().max(1));
    let mut pages = Vec::with_capacity(target);
    let mut cursor = Some(initial_cursor);

    while pages.len() < target {
      let Some(current) = cursor.take() else {
        break;
      };
      let fetch = fetch_page.clone();
      let page = retrying(move || fetch(current.clone()), options, key.clone()).await?;
      cursor = next_cursor(&page);
      pages.push(Arc::new(page));
    }

    let exhausted = prev.as_ref().is_some_and(|d| d.exhausted) || cursor.is_none();
    Ok(Arc::new(InfiniteData {
      pages,
      next_cursor: cursor,
      exhausted,
    }) as AnyValue)
  }
  .boxed()
}
