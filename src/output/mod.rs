//! Report rendering.
//!
//! This module turns an initialized diagram into text:
//! - [`markdown`] - Long-form markdown document
//! - [`terminal`] - Short entity listing
//! - [`templates`] - Embedded handlebars templates and helpers

mod markdown;
mod templates;
mod terminal;
mod view;

pub use markdown::{render_markdown, render_markdown_at};
pub use templates::md_link;
pub use terminal::render_listing;
pub use view::ReportView;
