use crate::api::{ItemDetail, PageData};
use crate::query::{InfiniteQueryHandle, InfiniteState, QueryHandle, QueryKey};
use crate::route::Route;
use crate::ui::components::{KeyResult, SearchEvent, SearchInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{card_line, draw_error_panel, skeleton_items};
use crate::ui::view::{ShortcutInfo, View, ViewAction, ViewContext};
use crate::ui::views::DetailView;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use tracing::debug;

const NOT_FOUND_HINT: &str =
  "Pokémon not found. Try searching by exact name (e.g., \"pikachu\") or ID (e.g., \"25\")";

/// Growing listing with an exact-match search on top
pub struct LoadMoreView {
  ctx: ViewContext,
  pages: InfiniteQueryHandle<PageData, u32>,
  search: SearchInput,
  /// Lookup for the applied search term, if any
  found: Option<QueryHandle<ItemDetail>>,
  list_state: ListState,
}

impl LoadMoreView {
  pub fn new(ctx: ViewContext, term: Option<String>) -> Self {
    let pages = infinite_query(&ctx);
    let found = term.as_deref().map(|t| search_query(&ctx, t));
    Self {
      ctx,
      pages,
      search: SearchInput::new(term),
      found,
      list_state: ListState::default(),
    }
  }

  fn apply_search(&mut self, term: &str) {
    debug!(term, "applying search");
    self.found = (!term.is_empty()).then(|| search_query(&self.ctx, term));
    self.list_state.select(Some(0));
  }

  fn selected_id(&self) -> Option<u32> {
    let idx = self.list_state.selected()?;
    match &self.found {
      Some(found) => found.data().filter(|_| idx == 0).map(|item| item.id),
      None => {
        let state = self.pages.state();
        let items = loaded_items(&state);
        items.get(idx).map(|item| item.id)
      }
    }
  }

  /// Enter on a card opens it; Enter on the trailing row loads more
  fn activate_selected(&mut self) -> ViewAction {
    if let Some(id) = self.selected_id() {
      return ViewAction::Push(Box::new(DetailView::new(&self.ctx, &id.to_string())));
    }
    if self.found.is_none() {
      self.pages.fetch_next_page();
    }
    ViewAction::None
  }

  fn render_search_result(&mut self, frame: &mut Frame, area: Rect, found: &QueryHandle<ItemDetail>) {
    let state = found.state();

    if let Some(err) = &state.error {
      let message = if err.is_not_found() {
        NOT_FOUND_HINT.to_string()
      } else {
        err.to_string()
      };
      draw_error_panel(frame, area, &message, &[("/", "Search Again"), ("esc", "Clear")]);
      return;
    }

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(1), Constraint::Min(3)])
      .split(area);

    let block = Block::default()
      .title(" Search ")
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    match &state.data {
      Some(item) => {
        let info = Line::from(vec![
          Span::styled(" Found ", Style::default().fg(Color::DarkGray)),
          Span::styled("1", Style::default().fg(Color::White).bold()),
          Span::styled(" Pokémon", Style::default().fg(Color::DarkGray)),
        ]);
        frame.render_widget(Paragraph::new(info), chunks[0]);

        ensure_valid_selection(&mut self.list_state, 1);
        let list = List::new(vec![ListItem::new(card_line(item))])
          .block(block)
          .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
          .highlight_symbol("> ");
        frame.render_stateful_widget(list, chunks[1], &mut self.list_state);
      }
      None => {
        frame.render_widget(List::new(skeleton_items(1)).block(block), chunks[1]);
      }
    }
  }

  fn render_pages(&mut self, frame: &mut Frame, area: Rect) {
    let state = self.pages.state();
    let items = loaded_items(&state);

    if state.is_error() && items.is_empty() {
      let message = state
        .error()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "Failed to load Pokémon data".to_string());
      draw_error_panel(frame, area, &message, &[("r", "Try Again"), ("q", "Back")]);
      return;
    }

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Min(3),    // Cards
        Constraint::Length(2), // Load more / end of list
      ])
      .split(area);

    let suffix = if state.is_fetching() && !state.is_fetching_next_page() && !items.is_empty() {
      " (refreshing...)"
    } else {
      ""
    };
    let block = Block::default()
      .title(format!(" Pokémon{} ", suffix))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if state.is_loading() {
      let skeleton = List::new(skeleton_items(self.ctx.config.page_size.get() as usize)).block(block);
      frame.render_widget(skeleton, chunks[0]);
      return;
    }

    let mut rows: Vec<ListItem> = items.iter().map(|item| ListItem::new(card_line(item))).collect();
    if state.has_next_page() {
      let label = if state.is_fetching_next_page() {
        "  Loading..."
      } else {
        "  ▼ Load More"
      };
      rows.push(ListItem::new(Line::styled(label, Style::default().fg(Color::Cyan))));
    }
    ensure_valid_selection(&mut self.list_state, rows.len());

    let list = List::new(rows)
      .block(block)
      .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, chunks[0], &mut self.list_state);

    frame.render_widget(
      Paragraph::new(status_lines(&state, items.len())).alignment(Alignment::Center),
      chunks[1],
    );
  }
}

fn infinite_query(ctx: &ViewContext) -> InfiniteQueryHandle<PageData, u32> {
  let limit = ctx.config.page_size.get();
  let catalog = ctx.catalog.clone();
  ctx.queries.infinite_query(
    QueryKey::Infinite { limit },
    0,
    move |offset| {
      let catalog = catalog.clone();
      async move { catalog.fetch_page(limit, offset).await }
    },
    |page: &PageData| page.next_cursor,
    ctx.config.queries.list_options(),
  )
}

fn search_query(ctx: &ViewContext, term: &str) -> QueryHandle<ItemDetail> {
  let catalog = ctx.catalog.clone();
  let lookup = term.to_string();
  ctx.queries.query(
    QueryKey::search(term),
    move || {
      let catalog = catalog.clone();
      let lookup = lookup.clone();
      async move { catalog.fetch_detail(&lookup).await }
    },
    ctx.config.queries.search_options(),
  )
}

fn loaded_items(state: &InfiniteState<PageData, u32>) -> Vec<&ItemDetail> {
  state.pages().iter().flat_map(|page| page.items.iter()).collect()
}

/// The two lines under the cards: load-more state, then the count
fn status_lines(state: &InfiniteState<PageData, u32>, shown: usize) -> Vec<Line<'static>> {
  let total = state.pages().first().map(|p| p.total_count).unwrap_or(0);
  let dim = Style::default().fg(Color::DarkGray);

  // A failed reload keeps the loaded cards, so its error shows inline too
  let inline_error = state.error().filter(|_| shown > 0);
  let first = if let Some(err) = inline_error {
    Line::from(vec![
      Span::styled(err.to_string(), Style::default().fg(Color::Red)),
      Span::styled("  [r]", Style::default().fg(Color::Cyan)),
      Span::styled(" Try Again", dim),
    ])
  } else if state.is_fetching_next_page() {
    Line::styled("Loading...", Style::default().fg(Color::Cyan))
  } else if state.has_next_page() {
    Line::from(vec![
      Span::styled("[n]", Style::default().fg(Color::Cyan)),
      Span::styled(" Load More", dim),
    ])
  } else if shown > 0 {
    Line::styled(
      format!("You've reached the end! All {} Pokémon loaded.", total),
      Style::default().fg(Color::Green),
    )
  } else {
    Line::raw("")
  };

  vec![first, Line::styled(format!("Showing {} of {} Pokemon", shown, total), dim)]
}

impl View for LoadMoreView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.search.handle_key(key) {
      KeyResult::Event(SearchEvent::Submitted(term)) => {
        self.apply_search(&term);
        return ViewAction::None;
      }
      KeyResult::Event(SearchEvent::Cleared) => {
        self.apply_search("");
        return ViewAction::None;
      }
      KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Enter => return self.activate_selected(),
      KeyCode::Char('n') if self.found.is_none() => {
        self.pages.fetch_next_page();
      }
      KeyCode::Char('r') if self.found.is_none() => {
        if self.pages.state().is_fetch_next_page_error() {
          self.pages.fetch_next_page();
        } else {
          self.pages.refetch();
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(1), // Search bar
        Constraint::Min(3),    // Results
      ])
      .split(area);

    self.search.render(frame, chunks[0]);

    match self.found.take() {
      Some(found) => {
        self.render_search_result(frame, chunks[1], &found);
        self.found = Some(found);
      }
      None => self.render_pages(frame, chunks[1]),
    }
  }

  fn breadcrumb_label(&self) -> String {
    match self.search.applied() {
      Some(term) => format!("Search \"{}\"", term),
      None => "Load More".to_string(),
    }
  }

  fn route(&self) -> Route {
    Route::LoadMore {
      query: self.search.applied().map(str::to_string),
    }
  }

  fn captures_input(&self) -> bool {
    self.search.is_active()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    if self.search.is_active() {
      return vec![
        ShortcutInfo::new("enter", "search").with_priority(10),
        ShortcutInfo::new("esc", "cancel").with_priority(20),
      ];
    }
    let mut shortcuts = vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "search").with_priority(20),
      ShortcutInfo::new("enter", "details").with_priority(40),
      ShortcutInfo::new("q", "back").with_priority(90),
    ];
    if self.found.is_none() {
      shortcuts.push(ShortcutInfo::new("n", "load more").with_priority(30));
      shortcuts.push(ShortcutInfo::new("r", "refresh").with_priority(50));
    } else {
      shortcuts.push(ShortcutInfo::new("esc", "clear search").with_priority(30));
    }
    shortcuts
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::CatalogClient;
  use crate::config::Config;
  use crate::query::QueryClient;
  use crate::error::FetchError;
  use crate::query::QueryOptions;
  use crossterm::event::KeyModifiers;
  use std::sync::atomic::{AtomicBool, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  fn ctx() -> ViewContext {
    let mut config = Config::default();
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

  fn search_for(view: &mut LoadMoreView, term: &str) {
    view.handle_key(key(KeyCode::Char('/')));
    for c in term.chars() {
      view.handle_key(key(KeyCode::Char(c)));
    }
    view.handle_key(key(KeyCode::Enter));
  }

  #[tokio::test]
  async fn test_search_switches_to_search_key() {
    let mut view = LoadMoreView::new(ctx(), None);
    assert!(view.found.is_none());

    search_for(&mut view, "Pikachu");
    let found = view.found.as_ref().map(|f| f.key().clone());
    assert_eq!(found, Some(QueryKey::search("pikachu")));
    assert_eq!(
      view.route(),
      Route::LoadMore {
        query: Some("Pikachu".to_string())
      }
    );
  }

  #[tokio::test]
  async fn test_esc_clears_search_before_leaving() {
    let mut view = LoadMoreView::new(ctx(), Some("25".to_string()));
    assert!(view.found.is_some());

    assert!(matches!(view.handle_key(key(KeyCode::Esc)), ViewAction::None));
    assert!(view.found.is_none());
    assert_eq!(view.route(), Route::LoadMore { query: None });

    assert!(matches!(view.handle_key(key(KeyCode::Esc)), ViewAction::Pop));
  }

  #[tokio::test]
  async fn test_typing_is_captured_while_searching() {
    let mut view = LoadMoreView::new(ctx(), None);
    view.handle_key(key(KeyCode::Char('/')));
    assert!(view.captures_input());
    // 'q' goes into the search bar instead of popping the view
    assert!(matches!(view.handle_key(key(KeyCode::Char('q'))), ViewAction::None));
  }

  fn line_text(line: &Line) -> String {
    line.spans.iter().map(|span| span.content.as_ref()).collect()
  }

  #[tokio::test(start_paused = true)]
  async fn test_failed_reload_shows_inline_error_over_loaded_cards() {
    let client = QueryClient::new();
    let failing = Arc::new(AtomicBool::new(false));
    let fail_for_fetch = failing.clone();

    let pages = client.infinite_query(
      QueryKey::Infinite { limit: 1 },
      0u32,
      move |offset| {
        let fail = fail_for_fetch.load(Ordering::SeqCst);
        async move {
          if fail {
            return Err(FetchError::Network {
              status_text: "503 Service Unavailable".to_string(),
            });
          }
          Ok(PageData {
            items: vec![ItemDetail {
              id: offset + 1,
              name: "bulbasaur".to_string(),
              image_url: String::new(),
              height_deci: 7,
              weight_deci: 69,
              categories: Vec::new(),
            }],
            total_count: 10,
            next_cursor: Some(offset + 1),
          })
        }
      },
      |page: &PageData| page.next_cursor,
      QueryOptions {
        retry_count: 0,
        retry_delay: Duration::ZERO,
        ..QueryOptions::default()
      },
    );
    pages.settled().await;

    failing.store(true, Ordering::SeqCst);
    pages.refetch();
    pages.settled().await;

    let state = pages.state();
    assert!(state.is_error());
    assert_eq!(state.pages().len(), 1);

    let lines = status_lines(&state, loaded_items(&state).len());
    let first = line_text(&lines[0]);
    assert!(first.contains("503 Service Unavailable"), "got {:?}", first);
    assert!(first.contains("Try Again"));
    assert_eq!(line_text(&lines[1]), "Showing 1 of 10 Pokemon");
  }
}
