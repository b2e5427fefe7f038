//! Embedded handlebars templates and their helpers.

use crate::error::Result;
use handlebars::Handlebars;

pub const DOC_TEMPLATE: &str = "doc";
pub const SHOW_TEMPLATE: &str = "show";

const DOC_TEMPLATE_SOURCE: &str = include_str!("../../templates/doc.md.hbs");
const SHOW_TEMPLATE_SOURCE: &str = include_str!("../../templates/show.txt.hbs");

/// Anchor slug for a heading: lowercase, spaces become hyphens.
pub fn md_link(label: &str) -> String {
    label.to_lowercase().replace(' ', "-")
}

/// Text safe inside a markdown table cell: `|` is escaped.
pub fn md_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

/// Registry with both templates and the `mdlink` and `mdcell` helpers.
///
/// Strict mode turns references to missing fields into render errors, and
/// escaping is off because the output is markdown and plain text.
pub fn registry() -> Result<Handlebars<'static>> {
    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(true);
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars.register_helper("mdlink", Box::new(mdlink_helper));
    handlebars.register_helper("mdcell", Box::new(mdcell_helper));
    handlebars.register_template_string(DOC_TEMPLATE, DOC_TEMPLATE_SOURCE)?;
    handlebars.register_template_string(SHOW_TEMPLATE, SHOW_TEMPLATE_SOURCE)?;
    Ok(handlebars)
}

fn mdlink_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    let param = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("");
    out.write(&md_link(param))?;
    Ok(())
}

fn mdcell_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    let param = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("");
    out.write(&md_cell(param))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_md_link() {
        assert_eq!(md_link("Allowed locations"), "allowed-locations");
        assert_eq!(md_link("Audit VMs  without"), "audit-vms--without");
        assert_eq!(md_link("already-slug"), "already-slug");
    }

    #[test]
    fn test_md_cell_escapes_pipes() {
        assert_eq!(md_cell("Corp | Prod"), "Corp \\| Prod");
        assert_eq!(md_cell("plain"), "plain");
    }

    #[test]
    fn test_registry_registers_both_templates() {
        let handlebars = registry().expect("templates should parse");
        assert!(handlebars.has_template(DOC_TEMPLATE));
        assert!(handlebars.has_template(SHOW_TEMPLATE));
    }

    #[test]
    fn test_mdlink_helper_in_template() {
        let handlebars = registry().expect("templates should parse");
        let out = handlebars
            .render_template("[{{name}}](#{{mdlink name}})", &json!({"name": "Deny Public IP"}))
            .expect("render");
        assert_eq!(out, "[Deny Public IP](#deny-public-ip)");
    }

    #[test]
    fn test_strict_mode_rejects_missing_field() {
        let handlebars = registry().expect("templates should parse");
        assert!(handlebars
            .render_template("{{missing}}", &json!({}))
            .is_err());
    }

    #[test]
    fn test_no_html_escaping() {
        let handlebars = registry().expect("templates should parse");
        let out = handlebars
            .render_template("{{v}}", &json!({"v": "a & <b>"}))
            .expect("render");
        assert_eq!(out, "a & <b>");
    }
}
