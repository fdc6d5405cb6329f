//! Serde-deserializable types matching PokéAPI responses.
//!
//! Kept apart from the domain types so the wire shape can carry whatever
//! nesting the API uses while the rest of the app sees flat structs.

use serde::Deserialize;

use super::types::{next_cursor, CategoryTag, ItemDetail, ItemRef, ListingPage};

// ============================================================================
// Listing endpoint: GET /pokemon?limit=&offset=
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiNamedResource {
  pub name: String,
  pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiListResponse {
  pub count: u32,
  #[serde(default)]
  pub results: Vec<ApiNamedResource>,
}

// ============================================================================
// Detail endpoint: GET /pokemon/{idOrName}
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ApiArtwork {
  pub front_default: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiOtherSprites {
  #[serde(rename = "official-artwork", default)]
  pub official_artwork: ApiArtwork,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiSprites {
  pub front_default: Option<String>,
  #[serde(default)]
  pub other: ApiOtherSprites,
}

#[derive(Debug, Deserialize)]
pub struct ApiTypeSlot {
  pub slot: u32,
  #[serde(rename = "type")]
  pub type_ref: ApiNamedResource,
}

#[derive(Debug, Deserialize)]
pub struct ApiPokemon {
  pub id: u32,
  pub name: String,
  #[serde(default)]
  pub sprites: ApiSprites,
  #[serde(default)]
  pub height: u32,
  #[serde(default)]
  pub weight: u32,
  #[serde(default)]
  pub types: Vec<ApiTypeSlot>,
}

// ============================================================================
// Conversions to domain types
// ============================================================================

impl ApiListResponse {
  pub fn into_listing(self, limit: u32, offset: u32) -> ListingPage {
    ListingPage {
      next_cursor: next_cursor(limit, offset, self.count),
      total_count: self.count,
      items: self
        .results
        .into_iter()
        .map(|r| ItemRef {
          display_name: r.name,
          detail_locator: r.url,
        })
        .collect(),
    }
  }
}

impl ApiPokemon {
  pub fn into_detail(self) -> ItemDetail {
    let mut types = self.types;
    types.sort_by_key(|t| t.slot);

    // Official artwork first, the small default sprite as fallback
    let image_url = self
      .sprites
      .other
      .official_artwork
      .front_default
      .or(self.sprites.front_default)
      .unwrap_or_default();

    ItemDetail {
      id: self.id,
      name: self.name,
      image_url,
      height_deci: self.height,
      weight_deci: self.weight,
      categories: types
        .into_iter()
        .map(|t| CategoryTag {
          name: t.type_ref.name,
        })
        .collect(),
    }
  }
}
