use super::utils::{category_color, centered, skeleton_line, truncate};
use crate::api::format::{format_id, format_name};
use crate::api::ItemDetail;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, ListItem, Paragraph, Wrap};

/// One row of a listing: `#025  Pikachu         electric`
pub fn card_line(item: &ItemDetail) -> Line<'static> {
  let mut spans = vec![
    Span::styled(format!("{:<6}", format_id(item.id)), Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!("{:<18}", truncate(&format_name(&item.name), 17)),
      Style::default().fg(Color::White).bold(),
    ),
  ];
  for tag in &item.categories {
    spans.push(Span::styled(
      format!("{} ", tag.name),
      Style::default().fg(category_color(&tag.name)),
    ));
  }
  Line::from(spans)
}

/// Placeholder rows shown while a page loads
pub fn skeleton_items(count: usize) -> Vec<ListItem<'static>> {
  (0..count)
    .map(|i| {
      let style = Style::default().fg(Color::DarkGray);
      ListItem::new(Line::from(vec![
        Span::styled(format!("{:<6}", skeleton_line(4)), style),
        Span::styled(format!("{:<18}", skeleton_line(8 + i % 3 * 2)), style),
        Span::styled(skeleton_line(7), style),
      ]))
    })
    .collect()
}

/// Centered error box. `hints` are (key, label) pairs such as ("r", "Try Again").
pub fn draw_error_panel(frame: &mut Frame, area: Rect, message: &str, hints: &[(&str, &str)]) {
  let panel = centered(area, area.width.min(64), area.height.min(9));
  frame.render_widget(Clear, panel);

  let block = Block::default()
    .title(" Oops! Something went wrong ")
    .title_alignment(Alignment::Center)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Red));

  let mut hint_spans = Vec::new();
  for (i, (key, label)) in hints.iter().enumerate() {
    if i > 0 {
      hint_spans.push(Span::raw("   "));
    }
    hint_spans.push(Span::styled(format!("[{}]", key), Style::default().fg(Color::Cyan)));
    hint_spans.push(Span::styled(format!(" {}", label), Style::default().fg(Color::DarkGray)));
  }

  let text = vec![
    Line::raw(""),
    Line::styled(message.to_string(), Style::default().fg(Color::White)),
    Line::raw(""),
    Line::from(hint_spans),
  ];
  let paragraph = Paragraph::new(text)
    .block(block)
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true });
  frame.render_widget(paragraph, panel);
}
