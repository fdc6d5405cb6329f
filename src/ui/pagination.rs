//! Page-number windowing for the paginated listing footer.

/// One slot in the page-number bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
  Page(u32),
  Ellipsis,
}

pub fn total_pages(total_count: u32, page_size: u32) -> u32 {
  if page_size == 0 {
    return 0;
  }
  total_count.div_ceil(page_size)
}

/// Clamp a requested page into `1..=total_pages` (page 1 when there are none)
pub fn clamp_page(page: u32, total_pages: u32) -> u32 {
  page.clamp(1, total_pages.max(1))
}

/// Page numbers around `current`, at most `window` of them, always including
/// the first and last page with an ellipsis over any gap.
pub fn page_numbers(current: u32, total_pages: u32, window: u32) -> Vec<PageItem> {
  let half = window / 2;

  let mut start = current.saturating_sub(half).max(1);
  let mut end = (current + half).min(total_pages);
  if current <= half {
    end = window.min(total_pages);
  }
  if current + half >= total_pages {
    start = (total_pages + 1).saturating_sub(window).max(1);
  }

  let mut items = Vec::new();
  if start > 1 {
    items.push(PageItem::Page(1));
    if start > 2 {
      items.push(PageItem::Ellipsis);
    }
  }
  items.extend((start..=end).map(PageItem::Page));
  if end < total_pages {
    if end + 1 < total_pages {
      items.push(PageItem::Ellipsis);
    }
    items.push(PageItem::Page(total_pages));
  }
  items
}
