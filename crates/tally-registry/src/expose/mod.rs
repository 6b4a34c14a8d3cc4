//! Exposition of gathered families.
//!
//! - `text`: Prometheus text format (0.0.4)

pub mod text;

use tally_core::error::TallyError;

use crate::registry::Gatherer;

pub use text::{render_text, TEXT_CONTENT_TYPE};

/// Gather and render in one step. Collection errors are returned alongside
/// the body; whatever could be collected is still rendered.
pub async fn render(gatherer: &dyn Gatherer) -> (String, Vec<TallyError>) {
    let gathered = gatherer.gather().await;
    (render_text(&gathered.families), gathered.errors)
}
