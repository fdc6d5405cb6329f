pub mod cards;
pub mod footer;
pub mod header;
pub mod utils;

pub use cards::{card_line, draw_error_panel, skeleton_items};
pub use footer::draw_footer;
pub use header::{draw_header, host_label};
pub use utils::{category_color, centered, skeleton_line, truncate};
