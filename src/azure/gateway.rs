//! Remote policy gateway abstraction.
//!
//! Every listing is a stream of pages. Callers drain a stream completely
//! before issuing the next call.

use crate::error::Result;
use crate::models::{Assignment, Definition, DefinitionSet, Entity};
use futures::stream::BoxStream;
use futures::TryStreamExt;
use std::fmt;

/// Stream of result pages from a paginated list operation.
pub type Pages<'a, T> = BoxStream<'a, Result<Vec<T>>>;

/// Hierarchy search mode for [`PolicyGateway::list_entities`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntitySearch {
    /// The matched node plus its direct children.
    ParentAndFirstLevelChildren,
}

impl EntitySearch {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntitySearch::ParentAndFirstLevelChildren => "ParentAndFirstLevelChildren",
        }
    }
}

/// Filter applied to scoped listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeFilter {
    /// Only items bound directly at the scope, nothing inherited.
    AtExactScope,
    /// Everything visible at the scope, inherited items included.
    Unfiltered,
}

impl ScopeFilter {
    /// Value of the `$filter` query parameter, if any.
    pub fn odata_filter(&self) -> Option<&'static str> {
        match self {
            ScopeFilter::AtExactScope => Some("atExactScope()"),
            ScopeFilter::Unfiltered => None,
        }
    }
}

/// Scope of a policy listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    /// Management group, by name.
    ManagementGroup(&'a str),
    /// Subscription, by subscription id.
    Subscription(&'a str),
}

impl Scope<'_> {
    /// ARM resource id of the scope, matching [`Entity::id`].
    pub fn resource_id(&self) -> String {
        match self {
            Scope::ManagementGroup(name) => {
                format!("/providers/Microsoft.Management/managementGroups/{name}")
            }
            Scope::Subscription(id) => format!("/subscriptions/{id}"),
        }
    }
}

impl<'a> Scope<'a> {
    pub fn for_entity(entity: &'a Entity) -> Scope<'a> {
        if entity.is_management_group() {
            Scope::ManagementGroup(&entity.name)
        } else {
            Scope::Subscription(&entity.name)
        }
    }
}

impl fmt::Display for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resource_id())
    }
}

/// Data source for management-group entities and policy resources.
pub trait PolicyGateway {
    /// Entities matching `name`, shaped by `search`.
    fn list_entities(&self, name: &str, search: EntitySearch) -> Pages<'_, Entity>;

    fn list_assignments(&self, scope: Scope<'_>, filter: ScopeFilter) -> Pages<'_, Assignment>;

    fn list_definitions(&self, scope: Scope<'_>, filter: ScopeFilter) -> Pages<'_, Definition>;

    fn list_definition_sets(
        &self,
        scope: Scope<'_>,
        filter: ScopeFilter,
    ) -> Pages<'_, DefinitionSet>;

    /// Platform built-in definitions (unscoped).
    fn list_built_in_definitions(&self) -> Pages<'_, Definition>;

    /// Platform built-in definition sets (unscoped).
    fn list_built_in_definition_sets(&self) -> Pages<'_, DefinitionSet>;
}

/// Drain a page stream into one vector.
pub async fn collect_pages<T>(mut pages: Pages<'_, T>) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut count_blocks = 0;
    while let Some(page) = pages.try_next().await? {
        count_blocks += 1;
        items.extend(page);
    }
    log::trace!("drained {count_blocks} page(s), {} item(s)", items.len());
    Ok(items)
}
