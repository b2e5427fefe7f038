//! In-memory [`PolicyGateway`] over a fixed tenant.
//!
//! Used by the test suite. Honours the hierarchy search, the exact-scope
//! filter versus inheritance, and pagination. Every call is recorded, and a
//! predicate can make selected calls fail.

use super::gateway::{EntitySearch, Pages, PolicyGateway, Scope, ScopeFilter};
use crate::error::{AzDocsError, Result};
use crate::models::{
    Assignment, AssignmentProperties, Definition, DefinitionProperties, DefinitionReference,
    DefinitionSet, DefinitionSetProperties, Entity, EntityKind, EntityProperties, ParentRef,
};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

/// Tenant content served by [`InMemoryGateway`].
#[derive(Deserialize, Debug, Default, Clone)]
pub struct Tenant {
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// Assignments, bound at `properties.scope`.
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    /// Tenant-defined definitions keyed by the scope resource id they live at.
    #[serde(default)]
    pub definitions: BTreeMap<String, Vec<Definition>>,
    #[serde(default)]
    pub definition_sets: BTreeMap<String, Vec<DefinitionSet>>,
    #[serde(default)]
    pub built_in_definitions: Vec<Definition>,
    #[serde(default)]
    pub built_in_definition_sets: Vec<DefinitionSet>,
}

impl Tenant {
    pub fn with_management_group(mut self, name: &str, parent: Option<&str>) -> Self {
        self.entities.push(entity(
            EntityKind::ManagementGroup,
            name,
            Scope::ManagementGroup(name).resource_id(),
            parent,
        ));
        self
    }

    pub fn with_subscription(mut self, id: &str, parent: Option<&str>) -> Self {
        self.entities.push(entity(
            EntityKind::Subscription,
            id,
            Scope::Subscription(id).resource_id(),
            parent,
        ));
        self
    }

    /// Assignment named `name` bound at `scope_id`, targeting `target_id`.
    pub fn with_assignment(mut self, name: &str, scope_id: &str, target_id: &str) -> Self {
        self.assignments.push(Assignment {
            id: format!("{scope_id}/providers/Microsoft.Authorization/policyAssignments/{name}"),
            name: name.to_string(),
            properties: AssignmentProperties {
                display_name: Some(name.to_string()),
                policy_definition_id: target_id.to_string(),
                scope: scope_id.to_string(),
                description: None,
                enforcement_mode: Some("Default".to_string()),
                not_scopes: Vec::new(),
            },
        });
        self
    }

    /// Definition at `scope_id`, or a built-in when `scope_id` is `None`.
    pub fn with_definition(mut self, scope_id: Option<&str>, id: &str, display_name: &str) -> Self {
        let definition = Definition {
            id: id.to_string(),
            name: last_segment(id),
            properties: DefinitionProperties {
                display_name: Some(display_name.to_string()),
                policy_type: Some(policy_type(scope_id).to_string()),
                ..Default::default()
            },
        };
        match scope_id {
            Some(scope_id) => self
                .definitions
                .entry(scope_id.to_string())
                .or_default()
                .push(definition),
            None => self.built_in_definitions.push(definition),
        }
        self
    }

    /// Definition set at `scope_id` (built-in when `None`) referencing `members`.
    pub fn with_definition_set(
        mut self,
        scope_id: Option<&str>,
        id: &str,
        display_name: &str,
        members: &[&str],
    ) -> Self {
        let set = DefinitionSet {
            id: id.to_string(),
            name: last_segment(id),
            properties: DefinitionSetProperties {
                display_name: Some(display_name.to_string()),
                policy_type: Some(policy_type(scope_id).to_string()),
                policy_definitions: members
                    .iter()
                    .map(|m| DefinitionReference {
                        policy_definition_id: m.to_string(),
                        policy_definition_reference_id: Some(last_segment(m)),
                    })
                    .collect(),
                ..Default::default()
            },
        };
        match scope_id {
            Some(scope_id) => self
                .definition_sets
                .entry(scope_id.to_string())
                .or_default()
                .push(set),
            None => self.built_in_definition_sets.push(set),
        }
        self
    }

    /// `scope_id` followed by its ancestors, nearest first.
    fn scope_chain(&self, scope_id: &str) -> Vec<String> {
        let mut chain = vec![scope_id.to_string()];
        let mut seen = HashSet::from([scope_id.to_string()]);
        let mut current = scope_id.to_string();
        while let Some(parent) = self
            .entities
            .iter()
            .find(|e| e.id == current)
            .and_then(|e| e.parent_id())
        {
            if !seen.insert(parent.to_string()) {
                break;
            }
            chain.push(parent.to_string());
            current = parent.to_string();
        }
        chain
    }

    fn visible_scopes(&self, scope: Scope<'_>, filter: ScopeFilter) -> Vec<String> {
        match filter {
            ScopeFilter::AtExactScope => vec![scope.resource_id()],
            ScopeFilter::Unfiltered => self.scope_chain(&scope.resource_id()),
        }
    }
}

fn entity(kind: EntityKind, name: &str, id: String, parent: Option<&str>) -> Entity {
    Entity {
        id,
        name: name.to_string(),
        kind,
        properties: Some(EntityProperties {
            tenant_id: None,
            display_name: Some(name.to_uppercase()),
            parent: parent.map(|p| ParentRef {
                id: Some(Scope::ManagementGroup(p).resource_id()),
            }),
        }),
    }
}

fn last_segment(id: &str) -> String {
    id.rsplit('/').next().unwrap_or(id).to_string()
}

fn policy_type(scope_id: Option<&str>) -> &'static str {
    if scope_id.is_some() {
        "Custom"
    } else {
        "BuiltIn"
    }
}

/// One recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Entities(String),
    /// Scope resource id and filter.
    Assignments(String, ScopeFilter),
    Definitions(String, ScopeFilter),
    DefinitionSets(String, ScopeFilter),
    BuiltInDefinitions,
    BuiltInDefinitionSets,
}

type FailWhen = Box<dyn Fn(&GatewayCall) -> bool + Send + Sync>;

pub struct InMemoryGateway {
    tenant: Tenant,
    page_size: usize,
    calls: Mutex<Vec<GatewayCall>>,
    fail_when: Option<FailWhen>,
}

impl InMemoryGateway {
    pub fn new(tenant: Tenant) -> Self {
        InMemoryGateway {
            tenant,
            page_size: 2,
            calls: Mutex::new(Vec::new()),
            fail_when: None,
        }
    }

    /// Load a tenant from a JSON fixture file.
    pub fn from_file(path: &str) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| AzDocsError::Io {
            path: path.to_string(),
            source,
        })?;
        let mut deserializer = serde_json::Deserializer::from_str(&json);
        let tenant: Tenant = serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
            AzDocsError::Parse {
                operation: format!("load {path}"),
                path: e.path().to_string(),
                message: e.inner().to_string(),
            }
        })?;
        Ok(Self::new(tenant))
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Make every call matching `predicate` return an error.
    pub fn failing_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&GatewayCall) -> bool + Send + Sync + 'static,
    {
        self.fail_when = Some(Box::new(predicate));
        self
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: GatewayCall) -> Result<()> {
        let fail = self.fail_when.as_ref().is_some_and(|f| f(&call));
        let message = format!("{call:?}");
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        if fail {
            return Err(AzDocsError::gateway("in-memory gateway", message));
        }
        Ok(())
    }

    fn serve<T: Send + 'static>(
        &self,
        call: GatewayCall,
        items: impl FnOnce() -> Vec<T>,
    ) -> Pages<'static, T> {
        if let Err(e) = self.record(call) {
            return stream::once(async move { Err::<Vec<T>, _>(e) }).boxed();
        }
        let mut items = items();
        let mut pages = Vec::new();
        while items.len() > self.page_size {
            let rest = items.split_off(self.page_size);
            pages.push(Ok(items));
            items = rest;
        }
        pages.push(Ok(items));
        stream::iter(pages).boxed()
    }

    fn scoped<T>(
        &self,
        by_scope: impl Fn(&str) -> Vec<T>,
        scope: Scope<'_>,
        filter: ScopeFilter,
    ) -> Vec<T> {
        self.tenant
            .visible_scopes(scope, filter)
            .iter()
            .flat_map(|s| by_scope(s.as_str()))
            .collect()
    }
}

impl PolicyGateway for InMemoryGateway {
    fn list_entities(&self, name: &str, search: EntitySearch) -> Pages<'_, Entity> {
        let EntitySearch::ParentAndFirstLevelChildren = search;
        self.serve(GatewayCall::Entities(name.to_string()), || {
            let matched: Vec<&Entity> = self
                .tenant
                .entities
                .iter()
                .filter(|e| e.name == name)
                .collect();
            let mut found: Vec<Entity> = matched.iter().map(|e| (*e).clone()).collect();
            for parent in &matched {
                found.extend(
                    self.tenant
                        .entities
                        .iter()
                        .filter(|e| e.parent_id() == Some(parent.id.as_str()))
                        .cloned(),
                );
            }
            found
        })
    }

    fn list_assignments(&self, scope: Scope<'_>, filter: ScopeFilter) -> Pages<'_, Assignment> {
        let call = GatewayCall::Assignments(scope.resource_id(), filter);
        self.serve(call, || {
            self.scoped(
                |s| {
                    self.tenant
                        .assignments
                        .iter()
                        .filter(|a| a.scope() == s)
                        .cloned()
                        .collect()
                },
                scope,
                filter,
            )
        })
    }

    fn list_definitions(&self, scope: Scope<'_>, filter: ScopeFilter) -> Pages<'_, Definition> {
        let call = GatewayCall::Definitions(scope.resource_id(), filter);
        self.serve(call, || {
            self.scoped(
                |s| self.tenant.definitions.get(s).cloned().unwrap_or_default(),
                scope,
                filter,
            )
        })
    }

    fn list_definition_sets(
        &self,
        scope: Scope<'_>,
        filter: ScopeFilter,
    ) -> Pages<'_, DefinitionSet> {
        let call = GatewayCall::DefinitionSets(scope.resource_id(), filter);
        self.serve(call, || {
            self.scoped(
                |s| self.tenant.definition_sets.get(s).cloned().unwrap_or_default(),
                scope,
                filter,
            )
        })
    }

    fn list_built_in_definitions(&self) -> Pages<'_, Definition> {
        self.serve(GatewayCall::BuiltInDefinitions, || {
            self.tenant.built_in_definitions.clone()
        })
    }

    fn list_built_in_definition_sets(&self) -> Pages<'_, DefinitionSet> {
        self.serve(GatewayCall::BuiltInDefinitionSets, || {
            self.tenant.built_in_definition_sets.clone()
        })
    }
}
