//! Short entity listing printed by `show`.

use super::templates::{registry, SHOW_TEMPLATE};
use super::view::ReportView;
use crate::error::Result;
use crate::processing::PolicyDiagram;

pub fn render_listing<G>(diagram: &PolicyDiagram<G>) -> Result<String> {
    let view = ReportView::build(diagram, String::new());
    let handlebars = registry()?;
    Ok(handlebars.render(SHOW_TEMPLATE, &view)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::{InMemoryGateway, Tenant};

    #[tokio::test]
    async fn test_listing_names_every_entity() {
        let tenant = Tenant::default()
            .with_management_group("root", None)
            .with_management_group("platform", Some("root"))
            .with_subscription("sub1", Some("platform"));
        let mut diagram = PolicyDiagram::new(InMemoryGateway::new(tenant));
        diagram.initialize("root").await.expect("initialize");

        let listing = render_listing(&diagram).expect("render");
        assert!(listing.starts_with("Entities under root:"));
        assert!(listing.contains("  Management group: platform (PLATFORM)"));
        assert!(listing.contains("  Subscription: sub1 (SUB1)"));
        assert!(listing.contains("3 entities, 0 assignments"));
    }
}
