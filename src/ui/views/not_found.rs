use crate::route::Route;
use crate::ui::renderfns::centered;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

/// Shown for any path no route matches
pub struct NotFoundView {
  path: String,
}

impl NotFoundView {
  pub fn new(path: String) -> Self {
    Self { path }
  }
}

impl View for NotFoundView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Enter | KeyCode::Char('H') => ViewAction::Open(Route::root()),
      KeyCode::Char('e') => ViewAction::Open(Route::LoadMore { query: None }),
      KeyCode::Char('q') | KeyCode::Esc => ViewAction::Pop,
      _ => ViewAction::None,
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let panel = centered(area, area.width.min(60), area.height.min(11));
    let block = Block::default()
      .title(" Pokémon Not Found! ")
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow));

    let key = Style::default().fg(Color::Cyan);
    let dim = Style::default().fg(Color::DarkGray);
    let text = vec![
      Line::styled("404", Style::default().fg(Color::Yellow).bold()),
      Line::raw(""),
      Line::raw(
        "This Pokémon seems to have fled! The page you're looking for doesn't exist or has been moved.",
      ),
      Line::raw(""),
      Line::styled(self.path.as_str(), dim),
      Line::raw(""),
      Line::from(vec![
        Span::styled("[H]", key),
        Span::styled(" Back to Home   ", dim),
        Span::styled("[e]", key),
        Span::styled(" Explore Pokémon", dim),
      ]),
    ];

    let paragraph = Paragraph::new(text)
      .block(block)
      .alignment(Alignment::Center)
      .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, panel);
  }

  fn breadcrumb_label(&self) -> String {
    "Not Found".to_string()
  }

  fn route(&self) -> Route {
    Route::NotFound {
      path: self.path.clone(),
    }
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("H", "home").with_priority(20),
      ShortcutInfo::new("e", "explore").with_priority(30),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
