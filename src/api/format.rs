//! Display formatting for catalog entries.

/// `7` -> `"#007"`, `1025` -> `"#1025"`
pub fn format_id(id: u32) -> String {
  format!("#{:03}", id)
}

/// Capitalize the first letter: `"pikachu"` -> `"Pikachu"`
pub fn format_name(name: &str) -> String {
  let mut chars = name.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}

/// Decimetres to metres with one decimal: `4` -> `"0.4 m"`
pub fn format_height(height_deci: u32) -> String {
  format!("{}.{} m", height_deci / 10, height_deci % 10)
}

/// Hectograms to kilograms with one decimal: `60` -> `"6.0 kg"`
pub fn format_weight(weight_deci: u32) -> String {
  format!("{}.{} kg", weight_deci / 10, weight_deci % 10)
}
