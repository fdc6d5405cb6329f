use crate::api::CatalogClient;
use crate::config::Config;
use crate::query::QueryClient;
use crate::route::Route;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use std::sync::Arc;

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8, // Lower = shown first
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

/// What every view needs to declare queries. Cheap to clone.
#[derive(Clone)]
pub struct ViewContext {
  pub queries: QueryClient,
  pub catalog: CatalogClient,
  pub config: Arc<Config>,
}

/// Actions that a view can request in response to user input
pub enum ViewAction {
  /// No action needed
  None,
  /// Push a new view onto the stack
  Push(Box<dyn View>),
  /// Pop current view from stack (go back)
  Pop,
  /// Replace the whole stack with the view for this route
  Open(Route),
}

/// Trait for view behavior
///
/// Views handle their own input modes (search, etc.) and return actions for
/// the App to execute: App → View → Components.
///
/// Views hold query handles and read a fresh snapshot from them on every
/// render, so a view never stores fetched data itself.
pub trait View {
  /// Handle a key event, returning an action for App to execute
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  /// Render the view to the frame
  fn render(&mut self, frame: &mut Frame, area: Rect);

  /// Get the breadcrumb label for this view
  fn breadcrumb_label(&self) -> String;

  /// The location this view shows, for the header and `:open`
  fn route(&self) -> Route;

  /// True while the view is editing text and wants every key
  fn captures_input(&self) -> bool {
    false
  }

  /// Get keyboard shortcuts to display in the header
  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
