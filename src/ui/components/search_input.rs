use super::input::{InputResult, TextInput};
use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Events emitted by the search bar that the parent view acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
  /// Enter pressed; the trimmed term, empty when the bar was cleared
  Submitted(String),
  /// Esc pressed while no edit was active and a term is applied
  Cleared,
}

/// Search bar: `/` starts editing, Enter applies the term, Esc abandons the
/// edit (or, when not editing, clears the applied term).
#[derive(Debug, Clone, Default)]
pub struct SearchInput {
  input: TextInput,
  active: bool,
  applied: Option<String>,
}

impl SearchInput {
  pub fn new(applied: Option<String>) -> Self {
    Self {
      input: TextInput::new(),
      active: false,
      applied,
    }
  }

  /// Whether keystrokes currently go to the bar
  pub fn is_active(&self) -> bool {
    self.active
  }

  /// The term currently applied to the view
  pub fn applied(&self) -> Option<&str> {
    self.applied.as_deref()
  }

  pub fn activate(&mut self) {
    self.active = true;
    self.input = TextInput::with_value(self.applied.as_deref().unwrap_or(""));
  }

  /// Call this regardless of active state - it handles activation too
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<SearchEvent> {
    if !self.active {
      return match key.code {
        KeyCode::Char('/') => {
          self.activate();
          KeyResult::Handled
        }
        KeyCode::Esc if self.applied.is_some() => {
          self.applied = None;
          KeyResult::Event(SearchEvent::Cleared)
        }
        _ => KeyResult::NotHandled,
      };
    }

    match self.input.handle_key(key) {
      InputResult::Submitted(value) => {
        self.active = false;
        let term = value.trim().to_string();
        self.applied = (!term.is_empty()).then(|| term.clone());
        KeyResult::Event(SearchEvent::Submitted(term))
      }
      InputResult::Cancelled => {
        self.active = false;
        KeyResult::Handled
      }
      InputResult::Consumed => KeyResult::Handled,
      // Swallow everything else so view shortcuts don't fire mid-edit
      InputResult::NotHandled => KeyResult::Handled,
    }
  }

  /// One-line search bar
  pub fn render(&self, frame: &mut Frame, area: Rect) {
    let label = Span::styled(" Search: ", Style::default().fg(Color::DarkGray));

    let line = if self.active {
      let value = self.input.value();
      let split = value
        .char_indices()
        .nth(self.input.cursor_position())
        .map(|(i, _)| i)
        .unwrap_or(value.len());
      Line::from(vec![
        label,
        Span::styled("/", Style::default().fg(Color::Yellow)),
        Span::raw(&value[..split]),
        Span::styled("_", Style::default().fg(Color::Yellow)), // Cursor
        Span::raw(&value[split..]),
      ])
    } else if let Some(term) = &self.applied {
      Line::from(vec![
        label,
        Span::styled(term.as_str(), Style::default().fg(Color::Yellow).bold()),
        Span::styled("  (Esc to clear)", Style::default().fg(Color::DarkGray)),
      ])
    } else {
      Line::from(vec![
        label,
        Span::styled(
          "by exact name or ID... press / to search",
          Style::default().fg(Color::DarkGray).italic(),
        ),
      ])
    };

    frame.render_widget(Paragraph::new(line), area);
  }
}
