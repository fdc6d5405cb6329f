use crate::api::api_types::{ApiListResponse, ApiPokemon};
use crate::api::types::{ItemDetail, ItemRef, ListingPage, PageData};
use crate::config::ApiConfig;
use crate::error::FetchError;
use color_eyre::{eyre::eyre, Result};
use futures::future::try_join_all;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// PokéAPI client wrapper
///
/// Pure transport: every call is a single attempt. Retrying is up to the
/// query layer.
#[derive(Clone)]
pub struct CatalogClient {
  http: reqwest::Client,
  base_url: Url,
}

impl CatalogClient {
  pub fn new(config: &ApiConfig) -> Result<Self> {
    let base_url = Url::parse(&config.base_url)
      .map_err(|e| eyre!("Invalid API base URL '{}': {}", config.base_url, e))?;
    if base_url.cannot_be_a_base() {
      return Err(eyre!("Invalid API base URL '{}'", config.base_url));
    }

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .user_agent(concat!("dexterm/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base_url })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  /// Fetch one page of the listing
  pub async fn fetch_listing(&self, limit: u32, offset: u32) -> Result<ListingPage, FetchError> {
    let mut url = self.endpoint(&["pokemon"]);
    url
      .query_pairs_mut()
      .append_pair("limit", &limit.to_string())
      .append_pair("offset", &offset.to_string());

    let response: ApiListResponse = self.get_json(url, None).await?;
    Ok(response.into_listing(limit, offset))
  }

  /// Fetch a single entry by numeric id or exact name
  pub async fn fetch_detail(&self, id_or_name: &str) -> Result<ItemDetail, FetchError> {
    let lookup = id_or_name.trim().to_lowercase();
    let url = self.endpoint(&["pokemon", &lookup]);

    let response: ApiPokemon = self.get_json(url, Some(&lookup)).await?;
    Ok(response.into_detail())
  }

  /// Fetch details for every ref concurrently. The first failure fails the
  /// whole batch.
  pub async fn fetch_details_for_refs(
    &self,
    refs: &[ItemRef],
  ) -> Result<Vec<ItemDetail>, FetchError> {
    let requests = refs.iter().map(|r| {
      let key = r.lookup_key();
      async move { self.fetch_detail(&key).await }
    });
    try_join_all(requests).await
  }

  /// Fetch a listing page together with the details of its entries
  pub async fn fetch_page(&self, limit: u32, offset: u32) -> Result<PageData, FetchError> {
    let listing = self.fetch_listing(limit, offset).await?;
    let items = self.fetch_details_for_refs(&listing.items).await?;

    Ok(PageData {
      items,
      total_count: listing.total_count,
      next_cursor: listing.next_cursor,
    })
  }

  fn endpoint(&self, segments: &[&str]) -> Url {
    let mut url = self.base_url.clone();
    // Checked in new(): the base URL can always take path segments
    if let Ok(mut path) = url.path_segments_mut() {
      path.pop_if_empty().extend(segments);
    }
    url
  }

  /// GET `url` and decode the body. With `not_found` set, a 404 is reported
  /// as a lookup miss for that query instead of a network error.
  async fn get_json<T: DeserializeOwned>(
    &self,
    url: Url,
    not_found: Option<&str>,
  ) -> Result<T, FetchError> {
    debug!(%url, "GET");

    let response = self.http.get(url.clone()).send().await.map_err(|e| {
      warn!(%url, error = %e, "request failed");
      FetchError::from(e)
    })?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
      if let Some(query) = not_found {
        debug!(%url, "not found");
        return Err(FetchError::NotFound {
          query: query.to_string(),
        });
      }
    }
    if !status.is_success() {
      warn!(%url, %status, "unexpected status");
      return Err(FetchError::network(status_text(status)));
    }

    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| {
      warn!(%url, error = %e, "malformed response");
      FetchError::from(e)
    })
  }
}

fn status_text(status: StatusCode) -> String {
  match status.canonical_reason() {
    Some(reason) => format!("{} {}", status.as_u16(), reason),
    None => status.as_u16().to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::io::{AsyncReadExt, AsyncWriteExt};
  use tokio::net::TcpListener;

  /// Serve canned responses keyed by request path (including the query
  /// string) on a loopback port. Unknown paths get a 404.
  async fn serve(routes: Vec<(&'static str, u16, &'static str)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
      while let Ok((mut socket, _)) = listener.accept().await {
        let routes = routes.clone();
        tokio::spawn(async move {
          let mut buf = vec![0u8; 8192];
          let mut read = 0;
          while read < buf.len() {
            let n = socket.read(&mut buf[read..]).await.unwrap_or(0);
            if n == 0 {
              break;
            }
            read += n;
            if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
              break;
            }
          }

          let request = String::from_utf8_lossy(&buf[..read]).to_string();
          let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
          let (status, body) = routes
            .iter()
            .find(|(p, _, _)| *p == path)
            .map(|(_, s, b)| (*s, *b))
            .unwrap_or((404, r#"{"detail":"Not found."}"#));
          let reason = StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown");

          let response = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            reason,
            body.len(),
            body
          );
          let _ = socket.write_all(response.as_bytes()).await;
          let _ = socket.shutdown().await;
        });
      }
    });

    format!("http://{}/api/v2", addr)
  }

  fn client(base_url: String) -> CatalogClient {
    CatalogClient::new(&ApiConfig {
      base_url,
      timeout_secs: 5,
    })
    .unwrap()
  }

  const LIST: &str = r#"{"count":3,"next":null,"previous":null,"results":[
    {"name":"bulbasaur","url":"https://pokeapi.co/api/v2/pokemon/1/"},
    {"name":"ivysaur","url":"https://pokeapi.co/api/v2/pokemon/2/"}
  ]}"#;
  const BULBASAUR: &str = r#"{"id":1,"name":"bulbasaur","height":7,"weight":69,
    "sprites":{"front_default":null,"other":{"official-artwork":{"front_default":"https://img/1.png"}}},
    "types":[{"slot":1,"type":{"name":"grass","url":""}}]}"#;
  const IVYSAUR: &str = r#"{"id":2,"name":"ivysaur","height":10,"weight":130,
    "sprites":{"front_default":null},"types":[]}"#;

  #[test]
  fn test_rejects_invalid_base_url() {
    assert!(CatalogClient::new(&ApiConfig {
      base_url: "not a url".to_string(),
      timeout_secs: 5,
    })
    .is_err());
  }

  #[test]
  fn test_endpoint_appends_segments() {
    let c = client("https://pokeapi.co/api/v2".to_string());
    assert_eq!(
      c.endpoint(&["pokemon", "25"]).as_str(),
      "https://pokeapi.co/api/v2/pokemon/25"
    );

    let c = client("https://pokeapi.co/api/v2/".to_string());
    assert_eq!(
      c.endpoint(&["pokemon"]).as_str(),
      "https://pokeapi.co/api/v2/pokemon"
    );
  }

  #[tokio::test]
  async fn test_fetch_listing() {
    let base = serve(vec![("/api/v2/pokemon?limit=2&offset=0", 200, LIST)]).await;
    let page = client(base).fetch_listing(2, 0).await.unwrap();

    assert_eq!(page.total_count, 3);
    assert_eq!(page.next_cursor, Some(2));
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].display_name, "bulbasaur");
  }

  #[tokio::test]
  async fn test_listing_server_error_is_network_error() {
    let base = serve(vec![("/api/v2/pokemon?limit=20&offset=0", 500, "oops")]).await;
    let err = client(base).fetch_listing(20, 0).await.unwrap_err();

    assert_eq!(err, FetchError::network("500 Internal Server Error"));
    assert!(err.is_retryable());
  }

  #[tokio::test]
  async fn test_detail_not_found() {
    let base = serve(vec![]).await;
    let err = client(base).fetch_detail("MissingNo ").await.unwrap_err();

    assert_eq!(
      err,
      FetchError::NotFound {
        query: "missingno".to_string()
      }
    );
  }

  #[tokio::test]
  async fn test_detail_malformed_body() {
    let base = serve(vec![("/api/v2/pokemon/1", 200, r#"{"name":"bulbasaur"}"#)]).await;
    let err = client(base).fetch_detail("1").await.unwrap_err();

    assert!(matches!(err, FetchError::Malformed { .. }));
  }

  #[tokio::test]
  async fn test_fetch_page_joins_details() {
    let base = serve(vec![
      ("/api/v2/pokemon?limit=2&offset=0", 200, LIST),
      ("/api/v2/pokemon/1", 200, BULBASAUR),
      ("/api/v2/pokemon/2", 200, IVYSAUR),
    ])
    .await;
    let page = client(base).fetch_page(2, 0).await.unwrap();

    let ids: Vec<u32> = page.items.iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(page.items[0].image_url, "https://img/1.png");
    assert_eq!(page.total_count, 3);
    assert_eq!(page.next_cursor, Some(2));
  }

  #[tokio::test]
  async fn test_details_for_refs_fails_fast() {
    let base = serve(vec![("/api/v2/pokemon/1", 200, BULBASAUR)]).await;
    let refs = vec![
      ItemRef {
        display_name: "bulbasaur".to_string(),
        detail_locator: "https://pokeapi.co/api/v2/pokemon/1/".to_string(),
      },
      ItemRef {
        display_name: "ivysaur".to_string(),
        detail_locator: "https://pokeapi.co/api/v2/pokemon/2/".to_string(),
      },
    ];

    let err = client(base).fetch_details_for_refs(&refs).await.unwrap_err();
    assert!(err.is_not_found());
  }
}
