mod detail;
mod load_more;
mod not_found;
mod paginated;

pub use detail::DetailView;
pub use load_more::LoadMoreView;
pub use not_found::NotFoundView;
pub use paginated::PaginatedListView;

use crate::route::Route;
use crate::ui::view::{View, ViewContext};

/// Build the view that shows `route`
pub fn for_route(route: Route, ctx: &ViewContext) -> Box<dyn View> {
  match route {
    Route::Paginated { page } => Box::new(PaginatedListView::new(ctx.clone(), page)),
    Route::LoadMore { query } => Box::new(LoadMoreView::new(ctx.clone(), query)),
    Route::Detail { id } => Box::new(DetailView::new(ctx, &id)),
    Route::NotFound { path } => Box::new(NotFoundView::new(path)),
  }
}
