//! Typed failures produced by the catalog client and surfaced by queries.

use thiserror::Error;

/// Failure of a single remote fetch.
///
/// Cloneable so that every caller attached to a deduplicated request
/// receives the same error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
  /// Non-2xx status or transport failure
  #[error("Network error: {status_text}")]
  Network { status_text: String },

  /// Lookup by id or name matched nothing
  #[error("No entry found for '{query}'")]
  NotFound { query: String },

  /// Response body did not have the expected shape
  #[error("Malformed response: {reason}")]
  Malformed { reason: String },
}

impl FetchError {
  pub fn network(status_text: impl Into<String>) -> Self {
    Self::Network {
      status_text: status_text.into(),
    }
  }

  /// Whether repeating the same request could succeed.
  pub fn is_retryable(&self) -> bool {
    matches!(self, FetchError::Network { .. })
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, FetchError::NotFound { .. })
  }
}

impl From<reqwest::Error> for FetchError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_timeout() {
      FetchError::network("request timed out")
    } else if err.is_connect() {
      FetchError::network(format!("connection failed: {}", err))
    } else {
      FetchError::network(err.to_string())
    }
  }
}

impl From<serde_json::Error> for FetchError {
  fn from(err: serde_json::Error) -> Self {
    FetchError::Malformed {
      reason: err.to_string(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_only_network_errors_retry() {
    assert!(FetchError::network("503 Service Unavailable").is_retryable());
    assert!(!FetchError::NotFound {
      query: "missingno".to_string()
    }
    .is_retryable());
    assert!(!FetchError::Malformed {
      reason: "missing field `id`".to_string()
    }
    .is_retryable());
  }

  #[test]
  fn test_malformed_from_json_error() {
    let err = serde_json::from_str::<u32>("not json").unwrap_err();
    let fetch: FetchError = err.into();
    assert!(matches!(fetch, FetchError::Malformed { .. }));
  }
}
