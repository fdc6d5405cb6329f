use std::fmt;

/// Identifies one query's parameters. Equal keys share one cache entry and
/// one in-flight request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
  /// One page of the paginated listing (1-based page number)
  List { page: u32, limit: u32 },
  /// The load-more listing, all pages chained under one key
  Infinite { limit: u32 },
  /// A single entry by id or name
  Detail { id_or_name: String },
  /// Exact-match search by name or id
  Search { term: String },
}

impl QueryKey {
  pub fn detail(id_or_name: &str) -> Self {
    Self::Detail {
      id_or_name: normalize(id_or_name),
    }
  }

  pub fn search(term: &str) -> Self {
    Self::Search {
      term: normalize(term),
    }
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::List { page, limit } => write!(f, "list:{}:{}", page, limit),
      Self::Infinite { limit } => write!(f, "infinite:{}", limit),
      Self::Detail { id_or_name } => write!(f, "detail:{}", id_or_name),
      Self::Search { term } => write!(f, "search:{}", term),
    }
  }
}

/// Trim and lowercase so "Pikachu " and "pikachu" share an entry.
fn normalize(s: &str) -> String {
  s.trim().to_lowercase()
}
