use ratatui::layout::{Constraint, Flex, Layout, Rect};
use ratatui::style::Color;

/// Truncate to at most `max_len` characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Display color for a type name
pub fn category_color(name: &str) -> Color {
  match name {
    "fire" | "fighting" => Color::Red,
    "water" => Color::Blue,
    "electric" | "ground" | "rock" => Color::Yellow,
    "grass" | "bug" => Color::Green,
    "ice" => Color::Cyan,
    "poison" | "ghost" => Color::Magenta,
    "flying" | "dragon" => Color::LightBlue,
    "psychic" | "fairy" => Color::LightMagenta,
    "steel" => Color::Gray,
    "dark" => Color::DarkGray,
    _ => Color::White,
  }
}

/// Placeholder bar shown while an entry loads
pub fn skeleton_line(width: usize) -> String {
  "░".repeat(width)
}

/// A `width` x `height` rect centered in `area`
pub fn centered(area: Rect, width: u16, height: u16) -> Rect {
  let [row] = Layout::vertical([Constraint::Length(height)])
    .flex(Flex::Center)
    .areas(area);
  let [cell] = Layout::horizontal([Constraint::Length(width)])
    .flex(Flex::Center)
    .areas(row);
  cell
}
