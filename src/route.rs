//! Locations inside the app, expressed as shareable path strings.

use std::fmt;
use url::form_urlencoded;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
  /// `/` or `/?page=N`
  Paginated { page: u32 },
  /// `/load-more`, optionally `?q=term`
  LoadMore { query: Option<String> },
  /// `/pokemon/{id}`
  Detail { id: String },
  /// Anything else
  NotFound { path: String },
}

impl Route {
  pub fn root() -> Self {
    Route::Paginated { page: 1 }
  }

  /// Parse a path with an optional query string. Never fails: unknown
  /// paths become [`Route::NotFound`].
  pub fn parse(input: &str) -> Self {
    let input = input.trim();
    let (path, query) = match input.split_once('?') {
      Some((path, query)) => (path, query),
      None => (input, ""),
    };
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match segments.as_slice() {
      [] => {
        let page = param(query, "page")
          .and_then(|p| p.parse::<u32>().ok())
          .filter(|p| *p > 0)
          .unwrap_or(1);
        Route::Paginated { page }
      }
      ["load-more"] => Route::LoadMore {
        query: param(query, "q")
          .map(|q| q.trim().to_string())
          .filter(|q| !q.is_empty()),
      },
      ["pokemon", id] => Route::Detail { id: id.to_string() },
      _ => Route::NotFound {
        path: input.to_string(),
      },
    }
  }

  pub fn to_path(&self) -> String {
    match self {
      Route::Paginated { page } if *page <= 1 => "/".to_string(),
      Route::Paginated { page } => format!("/?page={}", page),
      Route::LoadMore { query: None } => "/load-more".to_string(),
      Route::LoadMore { query: Some(q) } => {
        let encoded = form_urlencoded::Serializer::new(String::new())
          .append_pair("q", q)
          .finish();
        format!("/load-more?{}", encoded)
      }
      Route::Detail { id } => format!("/pokemon/{}", id),
      Route::NotFound { path } => path.clone(),
    }
  }
}

impl fmt::Display for Route {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.to_path())
  }
}

fn param(query: &str, name: &str) -> Option<String> {
  form_urlencoded::parse(query.as_bytes())
    .find(|(key, _)| key == name)
    .map(|(_, value)| value.into_owned())
}
