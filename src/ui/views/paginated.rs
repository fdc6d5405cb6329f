use crate::api::PageData;
use crate::query::{QueryHandle, QueryKey};
use crate::route::Route;
use crate::ui::ensure_valid_selection;
use crate::ui::pagination::{clamp_page, page_numbers, total_pages, PageItem};
use crate::ui::renderfns::{card_line, draw_error_panel, skeleton_items};
use crate::ui::view::{ShortcutInfo, View, ViewAction, ViewContext};
use crate::ui::views::DetailView;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use tracing::debug;

/// Page numbers shown around the current one
const PAGE_WINDOW: u32 = 5;

/// Page-at-a-time listing
pub struct PaginatedListView {
  ctx: ViewContext,
  page: u32,
  /// Last known page count; None until the first page arrives
  total_pages: Option<u32>,
  query: QueryHandle<PageData>,
  list_state: ListState,
}

impl PaginatedListView {
  pub fn new(ctx: ViewContext, page: u32) -> Self {
    let page = page.max(1);
    let query = list_query(&ctx, page);
    Self {
      ctx,
      page,
      total_pages: None,
      query,
      list_state: ListState::default(),
    }
  }

  fn page_size(&self) -> u32 {
    self.ctx.config.page_size.get()
  }

  /// Switch to `page`, clamped to the known range. The previous page's
  /// handle is dropped, so its entry starts idling.
  fn go_to(&mut self, page: u32) {
    let page = match self.total_pages {
      Some(total) => clamp_page(page, total),
      None => page.max(1),
    };
    if page == self.page {
      return;
    }
    debug!(from = self.page, to = page, "changing page");
    self.page = page;
    self.query = list_query(&self.ctx, page);
    self.list_state.select(Some(0));
  }

  fn selected_id(&self) -> Option<u32> {
    let data = self.query.data()?;
    let idx = self.list_state.selected()?;
    data.items.get(idx).map(|item| item.id)
  }

  fn render_pagination(&self, frame: &mut Frame, area: Rect, shown: usize) {
    let Some(total) = self.total_pages else {
      return;
    };

    let dim = Style::default().fg(Color::DarkGray);
    let arrow = |enabled: bool| {
      if enabled {
        Style::default().fg(Color::Cyan)
      } else {
        dim
      }
    };

    let mut spans = vec![Span::styled("‹ prev ", arrow(self.page > 1))];
    for item in page_numbers(self.page, total, PAGE_WINDOW) {
      spans.push(match item {
        PageItem::Page(p) if p == self.page => Span::styled(
          format!(" [{}] ", p),
          Style::default().fg(Color::Yellow).bold(),
        ),
        PageItem::Page(p) => Span::styled(format!(" {} ", p), Style::default().fg(Color::White)),
        PageItem::Ellipsis => Span::styled(" … ", dim),
      });
    }
    spans.push(Span::styled(" next ›", arrow(self.page < total)));

    let lines = vec![
      Line::from(spans),
      Line::styled(
        format!("Page {} of {} ({} Pokémon shown)", self.page, total, shown),
        dim,
      ),
    ];
    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), area);
  }
}

fn list_query(ctx: &ViewContext, page: u32) -> QueryHandle<PageData> {
  let limit = ctx.config.page_size.get();
  let offset = (page - 1).saturating_mul(limit);
  let catalog = ctx.catalog.clone();
  ctx.queries.query(
    QueryKey::List { page, limit },
    move || {
      let catalog = catalog.clone();
      async move { catalog.fetch_page(limit, offset).await }
    },
    ctx.config.queries.list_options(),
  )
}

impl View for PaginatedListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Left | KeyCode::Char('h') => self.go_to(self.page.saturating_sub(1)),
      KeyCode::Right | KeyCode::Char('l') => self.go_to(self.page.saturating_add(1)),
      KeyCode::Char('g') => self.go_to(1),
      KeyCode::Char('G') => {
        if let Some(total) = self.total_pages {
          self.go_to(total);
        }
      }
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Enter => {
        if let Some(id) = self.selected_id() {
          return ViewAction::Push(Box::new(DetailView::new(&self.ctx, &id.to_string())));
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let state = self.query.state();

    if let Some(data) = &state.data {
      let total = total_pages(data.total_count, self.page_size());
      self.total_pages = Some(total);
      // A route past the end lands on the last page
      if total > 0 && self.page > total {
        self.go_to(total);
        return;
      }
    }

    if let Some(err) = &state.error {
      draw_error_panel(
        frame,
        area,
        &err.to_string(),
        &[("r", "Try Again"), ("g", "First Page"), ("q", "Back")],
      );
      return;
    }

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Min(3),    // Cards
        Constraint::Length(2), // Page numbers
      ])
      .split(area);

    let (title, items): (String, Vec<ListItem>) = match &state.data {
      Some(data) => {
        let suffix = if state.is_fetching() { " (refreshing...)" } else { "" };
        let items: Vec<ListItem> = data
          .items
          .iter()
          .map(|item| ListItem::new(card_line(item)))
          .collect();
        (format!(" Pokémon · Page {}{} ", self.page, suffix), items)
      }
      None => (
        format!(" Pokémon · Page {} (loading...) ", self.page),
        skeleton_items(self.page_size() as usize),
      ),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if let Some(data) = &state.data {
      ensure_valid_selection(&mut self.list_state, data.items.len());
      if data.items.is_empty() {
        let paragraph = Paragraph::new("No Pokémon on this page.")
          .block(block)
          .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(paragraph, chunks[0]);
        return;
      }
    }

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    match &state.data {
      Some(data) => {
        frame.render_stateful_widget(list, chunks[0], &mut self.list_state);
        self.render_pagination(frame, chunks[1], data.items.len());
      }
      None => frame.render_widget(list, chunks[0]),
    }
  }

  fn breadcrumb_label(&self) -> String {
    format!("Page {}", self.page)
  }

  fn route(&self) -> Route {
    Route::Paginated { page: self.page }
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("←/→", "page").with_priority(20),
      ShortcutInfo::new("g/G", "first/last").with_priority(30),
      ShortcutInfo::new("enter", "details").with_priority(40),
      ShortcutInfo::new("r", "refresh").with_priority(50),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::CatalogClient;
  use crate::config::Config;
  use crate::query::QueryClient;
  use crossterm::event::KeyModifiers;
  use std::sync::Arc;

  fn ctx() -> ViewContext {
    let mut config = Config::default();
    // Nothing listens here; requests fail without leaving the machine
    config.api.base_url = "http://127.0.0.1:9/api/v2".to_string();
    ViewContext {
      queries: QueryClient::new(),
      catalog: CatalogClient::new(&config.api).unwrap(),
      config: Arc::new(config),
    }
  }

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[tokio::test]
  async fn test_page_keys_clamp_to_known_range() {
    let mut view = PaginatedListView::new(ctx(), 1);
    view.total_pages = Some(66);

    view.handle_key(key(KeyCode::Left));
    assert_eq!(view.route(), Route::Paginated { page: 1 });

    view.handle_key(key(KeyCode::Char('l')));
    assert_eq!(view.route(), Route::Paginated { page: 2 });

    view.handle_key(key(KeyCode::Char('G')));
    assert_eq!(view.route(), Route::Paginated { page: 66 });

    view.handle_key(key(KeyCode::Right));
    assert_eq!(view.route(), Route::Paginated { page: 66 });

    view.handle_key(key(KeyCode::Char('g')));
    assert_eq!(view.route(), Route::Paginated { page: 1 });
  }

  #[tokio::test]
  async fn test_next_page_stops_at_largest_page_number() {
    let mut view = PaginatedListView::new(ctx(), u32::MAX);
    assert!(view.total_pages.is_none());

    view.handle_key(key(KeyCode::Right));
    view.handle_key(key(KeyCode::Char('l')));
    assert_eq!(view.route(), Route::Paginated { page: u32::MAX });
  }

  #[tokio::test]
  async fn test_each_page_has_its_own_key() {
    let view_ctx = ctx();
    let mut view = PaginatedListView::new(view_ctx.clone(), 1);
    assert_eq!(view.query.key(), &QueryKey::List { page: 1, limit: 20 });

    view.handle_key(key(KeyCode::Right));
    assert_eq!(view.query.key(), &QueryKey::List { page: 2, limit: 20 });
    assert_eq!(view_ctx.queries.len(), 2);
  }
}
