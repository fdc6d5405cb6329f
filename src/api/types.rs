/// One page of the listing endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPage {
  pub items: Vec<ItemRef>,
  pub total_count: u32,
  /// Offset of the following page, absent on the last page
  pub next_cursor: Option<u32>,
}

/// Reference to an entry as returned by the listing endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRef {
  pub display_name: String,
  pub detail_locator: String,
}

impl ItemRef {
  /// Numeric id taken from the trailing path segment of the locator
  /// (`https://pokeapi.co/api/v2/pokemon/25/` -> 25).
  pub fn id(&self) -> Option<u32> {
    extract_id(&self.detail_locator)
  }

  /// Path segment to use for the detail request: the id when the locator
  /// carries one, otherwise the display name.
  pub fn lookup_key(&self) -> String {
    match self.id() {
      Some(id) => id.to_string(),
      None => self.display_name.clone(),
    }
  }
}

/// Full entry details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDetail {
  pub id: u32,
  pub name: String,
  pub image_url: String,
  pub height_deci: u32,
  pub weight_deci: u32,
  pub categories: Vec<CategoryTag>,
}

/// Type tag of an entry (e.g. "electric")
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTag {
  pub name: String,
}

/// A listing page joined with the details of every entry on it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageData {
  pub items: Vec<ItemDetail>,
  pub total_count: u32,
  pub next_cursor: Option<u32>,
}

/// Offset of the page after `offset`, or None when it would start past the end.
pub fn next_cursor(limit: u32, offset: u32, total_count: u32) -> Option<u32> {
  let next = offset.saturating_add(limit);
  (next < total_count).then_some(next)
}

fn extract_id(locator: &str) -> Option<u32> {
  locator
    .trim_end_matches('/')
    .rsplit('/')
    .next()
    .and_then(|segment| segment.parse().ok())
}
