use crate::api::CatalogClient;
use crate::commands::{self, CommandAction};
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::query::QueryClient;
use crate::route::Route;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::renderfns::{draw_error_panel, draw_footer, draw_header, host_label};
use crate::ui::view::{View, ViewAction, ViewContext};
use crate::ui::views::{self, DetailView};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use ratatui::widgets::Clear;
use std::any::Any;
use std::cell::Cell;
use std::io::{stdout, Stdout};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

const TICK_RATE: Duration = Duration::from_millis(250);

thread_local! {
  /// Set while a view renders; panics there are caught and shown in-app
  static RENDERING: Cell<bool> = const { Cell::new(false) };
}

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// `:` command line
  command: CommandInput,

  /// Shared by every view to declare queries
  ctx: ViewContext,

  /// API host for the header
  host: String,

  /// Feedback for the last command, cleared on the next key
  status: Option<String>,

  /// Set when a view panicked while rendering
  crashed: Option<String>,

  should_quit: bool,
}

impl App {
  pub fn new(config: Config, route: Route) -> Result<Self> {
    let catalog = CatalogClient::new(&config.api)?;
    let host = host_label(catalog.base_url());
    let ctx = ViewContext {
      queries: QueryClient::new(),
      catalog,
      config: Arc::new(config),
    };

    info!(%route, "opening initial route");
    let root = views::for_route(route, &ctx);

    Ok(Self {
      view_stack: vec![root],
      command: CommandInput::new(),
      ctx,
      host,
      status: None,
      crashed: None,
      should_quit: false,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    install_panic_hook();
    let mut tui = Tui::enter()?;
    let mut events = EventHandler::new(TICK_RATE);

    while !self.should_quit {
      tui.terminal.draw(|frame| self.draw(frame))?;

      match events.next().await {
        Some(Event::Key(key)) => self.handle_key(key),
        Some(Event::Tick) => self.tick(),
        Some(Event::Resize) => {}
        None => break,
      }
    }

    info!("exiting");
    Ok(())
  }

  fn tick(&mut self) {
    let evicted = self.ctx.queries.evict_idle();
    if evicted > 0 {
      debug!(evicted, remaining = self.ctx.queries.len(), "evicted idle queries");
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    if self.crashed.is_some() {
      match key.code {
        KeyCode::Char('r') => {
          self.crashed = None;
          self.open(Route::root());
        }
        KeyCode::Char('q') => self.should_quit = true,
        _ => {}
      }
      return;
    }

    self.status = None;

    let capturing = self.view_stack.last().is_some_and(|v| v.captures_input());
    if !capturing {
      match self.command.handle_key(key) {
        KeyResult::Event(CommandEvent::Submitted(line)) => {
          self.execute_command(&line);
          return;
        }
        KeyResult::Event(CommandEvent::Cancelled) | KeyResult::Handled => return,
        KeyResult::NotHandled => {}
      }
    }

    let action = match self.view_stack.last_mut() {
      Some(view) => view.handle_key(key),
      None => ViewAction::Open(Route::root()),
    };
    self.apply(action);
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => {
        debug!(route = %view.route(), "pushing view");
        self.view_stack.push(view);
      }
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
      ViewAction::Open(route) => self.open(route),
    }
  }

  /// Replace the whole stack. Dropped views release their queries.
  fn open(&mut self, route: Route) {
    info!(%route, "opening route");
    self.view_stack = vec![views::for_route(route, &self.ctx)];
  }

  fn execute_command(&mut self, line: &str) {
    debug!(line, "executing command");
    match commands::parse(line) {
      Ok(CommandAction::Open(route)) => self.open(route),
      Ok(CommandAction::Show(id)) => {
        let view = DetailView::new(&self.ctx, &id);
        self.apply(ViewAction::Push(Box::new(view)));
      }
      Ok(CommandAction::Quit) => self.should_quit = true,
      Err(message) => self.status = Some(message),
    }
  }

  fn draw(&mut self, frame: &mut Frame) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(1), // Header
        Constraint::Min(1),    // Main content
        Constraint::Length(1), // Footer
      ])
      .split(frame.area());

    let breadcrumb: Vec<String> = self.view_stack.iter().map(|v| v.breadcrumb_label()).collect();

    if self.crashed.is_none() {
      if let Some(view) = self.view_stack.last_mut() {
        draw_header(
          frame,
          chunks[0],
          &self.host,
          &view.route().to_path(),
          &view.shortcuts(),
        );

        RENDERING.with(|r| r.set(true));
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| view.render(frame, chunks[1])));
        RENDERING.with(|r| r.set(false));

        if let Err(payload) = outcome {
          let message = panic_message(payload.as_ref());
          error!(route = %view.route(), %message, "view panicked while rendering");
          self.crashed = Some(message);
        }
      }
    }

    if let Some(message) = &self.crashed {
      draw_header(frame, chunks[0], &self.host, "", &[]);
      frame.render_widget(Clear, chunks[1]);
      draw_error_panel(
        frame,
        chunks[1],
        &format!("Something went wrong. {}", message),
        &[("r", "Reload"), ("q", "Quit")],
      );
    }

    draw_footer(frame, chunks[2], &breadcrumb, self.status.as_deref());
    self.command.render_overlay(frame, chunks[1]);
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    s.to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "unknown panic".to_string()
  }
}

/// Log every panic. Panics outside a view render also restore the terminal
/// before the previous hook reports them.
fn install_panic_hook() {
  let previous = panic::take_hook();
  panic::set_hook(Box::new(move |info| {
    error!("{}", info);
    if RENDERING.with(Cell::get) {
      return;
    }
    restore_terminal();
    previous(info);
  }));
}

fn restore_terminal() {
  let _ = disable_raw_mode();
  let _ = stdout().execute(LeaveAlternateScreen);
}

/// Raw-mode alternate screen, restored on drop
struct Tui {
  terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl Tui {
  fn enter() -> Result<Self> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    Ok(Self { terminal })
  }
}

impl Drop for Tui {
  fn drop(&mut self) {
    restore_terminal();
    let _ = self.terminal.show_cursor();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use ratatui::backend::TestBackend;

  fn app(route: &str) -> App {
    let mut config = Config::default();
    config.api.base_url = "http://127.0.0.1:9/api/v2".to_string();
    App::new(config, Route::parse(route)).unwrap()
  }

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn command(app: &mut App, line: &str) {
    app.handle_key(key(KeyCode::Char(':')));
    for c in line.chars() {
      app.handle_key(key(KeyCode::Char(c)));
    }
    app.handle_key(key(KeyCode::Enter));
  }

  fn current_route(app: &App) -> Option<Route> {
    app.view_stack.last().map(|v| v.route())
  }

  struct PanickingView;

  impl View for PanickingView {
    fn handle_key(&mut self, _key: KeyEvent) -> ViewAction {
      ViewAction::None
    }

    fn render(&mut self, _frame: &mut Frame, _area: Rect) {
      panic!("render exploded");
    }

    fn breadcrumb_label(&self) -> String {
      "Boom".to_string()
    }

    fn route(&self) -> Route {
      Route::NotFound {
        path: "/boom".to_string(),
      }
    }
  }

  #[tokio::test]
  async fn test_command_pushes_detail_and_back_pops() {
    let mut app = app("/");
    command(&mut app, "pokemon 25");
    assert_eq!(app.view_stack.len(), 2);
    assert_eq!(
      current_route(&app),
      Some(Route::Detail {
        id: "25".to_string()
      })
    );

    app.handle_key(key(KeyCode::Esc));
    assert_eq!(app.view_stack.len(), 1);
    assert_eq!(current_route(&app), Some(Route::root()));

    app.handle_key(key(KeyCode::Char('q')));
    assert!(app.should_quit);
  }

  #[tokio::test]
  async fn test_open_replaces_stack() {
    let mut app = app("/pokemon/1");
    command(&mut app, "pokemon 4");
    command(&mut app, "open /nowhere");
    assert_eq!(app.view_stack.len(), 1);
    assert_eq!(
      current_route(&app),
      Some(Route::NotFound {
        path: "/nowhere".to_string()
      })
    );
  }

  #[tokio::test]
  async fn test_unknown_command_sets_status() {
    let mut app = app("/load-more");
    command(&mut app, "teleport");
    assert_eq!(app.status.as_deref(), Some("Unknown command: teleport"));
    assert_eq!(current_route(&app), Some(Route::LoadMore { query: None }));

    app.handle_key(key(KeyCode::Char('j')));
    assert!(app.status.is_none());
  }

  #[tokio::test]
  async fn test_render_panic_shows_error_screen_and_reloads() {
    let mut app = app("/");
    app.view_stack.push(Box::new(PanickingView));

    let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
    terminal.draw(|frame| app.draw(frame)).unwrap();
    assert_eq!(app.crashed.as_deref(), Some("render exploded"));

    // Drawing again keeps the error screen without re-rendering the view
    terminal.draw(|frame| app.draw(frame)).unwrap();

    app.handle_key(key(KeyCode::Char('r')));
    assert!(app.crashed.is_none());
    assert_eq!(app.view_stack.len(), 1);
    assert_eq!(current_route(&app), Some(Route::root()));
  }
}
