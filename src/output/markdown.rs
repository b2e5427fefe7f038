//! Long-form markdown report written by `generate`.

use super::templates::{registry, DOC_TEMPLATE};
use super::view::ReportView;
use crate::error::Result;
use crate::processing::PolicyDiagram;

/// Render the markdown report for an initialized diagram.
pub fn render_markdown<G>(diagram: &PolicyDiagram<G>) -> Result<String> {
    let generated_at = chrono::Utc::now().format("%Y-%m-%d %H:%M UTC").to_string();
    render_markdown_at(diagram, generated_at)
}

pub fn render_markdown_at<G>(diagram: &PolicyDiagram<G>, generated_at: String) -> Result<String> {
    log::info!(
        "#Start render_markdown() {} used definitions, {} used definition sets",
        diagram.used_definitions.len(),
        diagram.used_definition_sets.len()
    );
    let view = ReportView::build(diagram, generated_at);
    let handlebars = registry()?;
    Ok(handlebars.render(DOC_TEMPLATE, &view)?)
}
