use crate::api::format::{format_height, format_id, format_name, format_weight};
use crate::api::ItemDetail;
use crate::query::{QueryHandle, QueryKey};
use crate::route::Route;
use crate::ui::renderfns::{category_color, draw_error_panel, skeleton_line};
use crate::ui::view::{ShortcutInfo, View, ViewAction, ViewContext};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

/// One entry by id or name
pub struct DetailView {
  id: String,
  query: QueryHandle<ItemDetail>,
}

impl DetailView {
  pub fn new(ctx: &ViewContext, id: &str) -> Self {
    let catalog = ctx.catalog.clone();
    let lookup = id.to_string();
    let query = ctx.queries.query(
      QueryKey::detail(id),
      move || {
        let catalog = catalog.clone();
        let lookup = lookup.clone();
        async move { catalog.fetch_detail(&lookup).await }
      },
      ctx.config.queries.detail_options(),
    );

    Self {
      id: id.to_string(),
      query,
    }
  }

  fn render_skeleton(&self, frame: &mut Frame, area: Rect) {
    let style = Style::default().fg(Color::DarkGray);
    let lines: Vec<Line> = [4, 14, 0, 12, 10, 10, 40]
      .iter()
      .map(|w| Line::styled(skeleton_line(*w), style))
      .collect();
    frame.render_widget(Paragraph::new(lines), area);
  }

  fn render_detail(&self, frame: &mut Frame, area: Rect, item: &ItemDetail) {
    let label = Style::default().fg(Color::DarkGray);

    let mut types = vec![Span::styled(format!("{:<9}", "Type"), label)];
    for tag in &item.categories {
      types.push(Span::styled(
        format!(" {} ", tag.name),
        Style::default().fg(Color::Black).bg(category_color(&tag.name)),
      ));
      types.push(Span::raw(" "));
    }

    let image = if item.image_url.is_empty() {
      Span::styled("no artwork", label.italic())
    } else {
      Span::styled(item.image_url.clone(), Style::default().fg(Color::Blue).underlined())
    };

    let lines = vec![
      Line::styled(format_id(item.id), label),
      Line::styled(format_name(&item.name), Style::default().fg(Color::White).bold()),
      Line::raw(""),
      Line::from(types),
      Line::from(vec![
        Span::styled(format!("{:<9}", "Height"), label),
        Span::raw(format_height(item.height_deci)),
      ]),
      Line::from(vec![
        Span::styled(format!("{:<9}", "Weight"), label),
        Span::raw(format_weight(item.weight_deci)),
      ]),
      Line::from(vec![Span::styled(format!("{:<9}", "Artwork"), label), image]),
    ];
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
  }
}

impl View for DetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => {
        self.query.refetch();
        ViewAction::None
      }
      KeyCode::Char('H') => ViewAction::Open(Route::root()),
      KeyCode::Char('q') | KeyCode::Esc => ViewAction::Pop,
      _ => ViewAction::None,
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let state = self.query.state();

    if let Some(err) = &state.error {
      let message = if err.is_not_found() {
        format!("No Pokémon called '{}'.", self.id)
      } else {
        err.to_string()
      };
      let hints: &[(&str, &str)] = if err.is_not_found() {
        &[("H", "Back to Home"), ("q", "Back")]
      } else {
        &[("r", "Try Again"), ("H", "Back to Home"), ("q", "Back")]
      };
      draw_error_panel(frame, area, &message, hints);
      return;
    }

    let title = match &state.data {
      Some(item) if state.is_fetching() => {
        format!(" {} {} (refreshing...) ", format_id(item.id), format_name(&item.name))
      }
      Some(item) => format!(" {} {} ", format_id(item.id), format_name(&item.name)),
      None => format!(" {} (loading...) ", self.id),
    };
    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    let inner = block.inner(area).inner(Margin::new(2, 1));
    frame.render_widget(block, area);

    match &state.data {
      Some(item) => self.render_detail(frame, inner, item),
      None => self.render_skeleton(frame, inner),
    }
  }

  fn breadcrumb_label(&self) -> String {
    match self.query.data() {
      Some(item) => format_name(&item.name),
      None => self.id.clone(),
    }
  }

  fn route(&self) -> Route {
    Route::Detail {
      id: self.id.clone(),
    }
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("r", "refresh").with_priority(20),
      ShortcutInfo::new("H", "home").with_priority(80),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
