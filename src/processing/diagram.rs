//! Policy aggregation model.
//!
//! [`PolicyDiagram::initialize`] builds the cross-referenced view in four
//! phases: entity discovery, assignment discovery, definition discovery and
//! usage computation. Every id-keyed map merges with last write wins.

use crate::azure::{collect_pages, EntitySearch, PolicyGateway, Scope, ScopeFilter};
use crate::error::Result;
use crate::models::{Assignment, Definition, DefinitionSet, Entity, UsedDefinitionSet};
use colored::Colorize;
use std::collections::{BTreeMap, HashSet, VecDeque};

pub struct PolicyDiagram<G> {
    gateway: G,
    pub base_management_group: String,
    /// Hierarchy nodes keyed by entity id.
    pub entities: BTreeMap<String, Entity>,
    /// Assignments keyed by assignment id.
    pub assignments: BTreeMap<String, Assignment>,
    /// Built-in and tenant-defined definitions keyed by id.
    pub definitions: BTreeMap<String, Definition>,
    pub definition_sets: BTreeMap<String, DefinitionSet>,
    /// Definitions targeted by at least one assignment.
    pub used_definitions: BTreeMap<String, Definition>,
    pub used_definition_sets: BTreeMap<String, UsedDefinitionSet>,
    /// Definition id -> scope of every assignment targeting it (not deduplicated).
    pub definition_scopes: BTreeMap<String, Vec<String>>,
    /// Definition set id -> scope of every assignment targeting it (not deduplicated).
    pub definition_set_scopes: BTreeMap<String, Vec<String>>,
}

impl<G: PolicyGateway> PolicyDiagram<G> {
    pub fn new(gateway: G) -> Self {
        PolicyDiagram {
            gateway,
            base_management_group: String::new(),
            entities: BTreeMap::new(),
            assignments: BTreeMap::new(),
            definitions: BTreeMap::new(),
            definition_sets: BTreeMap::new(),
            used_definitions: BTreeMap::new(),
            used_definition_sets: BTreeMap::new(),
            definition_scopes: BTreeMap::new(),
            definition_set_scopes: BTreeMap::new(),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Run all four phases in order, stopping at the first error.
    ///
    /// Collections are cleared first. After an error the model is partially
    /// populated and must not be rendered.
    pub async fn initialize(&mut self, base_management_group: &str) -> Result<()> {
        log::info!(
            "#Start initialize() base management group {}",
            base_management_group.on_blue()
        );
        self.clear();
        self.base_management_group = base_management_group.to_string();

        self.discover_entities(base_management_group).await?;
        self.discover_assignments().await?;
        self.discover_definitions().await?;
        self.compute_utilization();

        log::info!(
            "# Used definitions = {}, used definition sets = {}",
            self.used_definitions.len(),
            self.used_definition_sets.len()
        );
        Ok(())
    }

    fn clear(&mut self) {
        self.entities.clear();
        self.assignments.clear();
        self.definitions.clear();
        self.definition_sets.clear();
        self.used_definitions.clear();
        self.used_definition_sets.clear();
        self.definition_scopes.clear();
        self.definition_set_scopes.clear();
    }

    /// Phase 1: walk the hierarchy from `base`, one level per query.
    ///
    /// Management groups are queued once per entity id; subscriptions are
    /// never queried.
    pub async fn discover_entities(&mut self, base: &str) -> Result<()> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut pending: VecDeque<String> = VecDeque::from([base.to_string()]);

        while let Some(query) = pending.pop_front() {
            log::debug!("get entities name eq '{query}'");
            let search = EntitySearch::ParentAndFirstLevelChildren;
            let found = collect_pages(self.gateway.list_entities(&query, search)).await?;

            for entity in found {
                if entity.is_management_group() {
                    if entity.name == query {
                        visited.insert(entity.id.clone());
                    } else if visited.insert(entity.id.clone()) {
                        pending.push_back(entity.name.clone());
                    } else {
                        log::warn!(
                            "skip already visited management group {} (child of {query})",
                            entity.id.yellow()
                        );
                    }
                }
                self.entities.insert(entity.id.clone(), entity);
            }
        }

        log::info!("Phase 1: found {} entities", self.entities.len());
        Ok(())
    }

    /// Phase 2: assignments bound at each entity.
    ///
    /// Management groups use the exact-scope filter; subscriptions return
    /// everything visible at the subscription.
    pub async fn discover_assignments(&mut self) -> Result<()> {
        for entity in self.entities.values() {
            let filter = if entity.is_management_group() {
                ScopeFilter::AtExactScope
            } else {
                ScopeFilter::Unfiltered
            };
            let scope = Scope::for_entity(entity);
            log::debug!("get assignments for {scope}");
            let found = collect_pages(self.gateway.list_assignments(scope, filter)).await?;
            for assignment in found {
                self.assignments.insert(assignment.id.clone(), assignment);
            }
        }

        if self.assignments.is_empty() {
            log::warn!("Phase 2: no assignments found");
        } else {
            log::info!("Phase 2: {} assignments found", self.assignments.len());
        }
        Ok(())
    }

    /// Phase 3: built-ins once, then exact-scope definitions per entity.
    pub async fn discover_definitions(&mut self) -> Result<()> {
        let built_in = collect_pages(self.gateway.list_built_in_definitions()).await?;
        let built_in_sets = collect_pages(self.gateway.list_built_in_definition_sets()).await?;
        log::info!(
            "Phase 3: {} built-in definitions, {} built-in definition sets",
            built_in.len(),
            built_in_sets.len()
        );
        merge(&mut self.definitions, built_in, |d| &d.id);
        merge(&mut self.definition_sets, built_in_sets, |s| &s.id);

        for entity in self.entities.values() {
            let scope = Scope::for_entity(entity);
            let filter = ScopeFilter::AtExactScope;
            let definitions = collect_pages(self.gateway.list_definitions(scope, filter)).await?;
            let sets = collect_pages(self.gateway.list_definition_sets(scope, filter)).await?;
            log::debug!(
                "{scope}: {} definitions, {} definition sets",
                definitions.len(),
                sets.len()
            );
            merge(&mut self.definitions, definitions, |d| &d.id);
            merge(&mut self.definition_sets, sets, |s| &s.id);
        }

        log::info!(
            "Phase 3: {} definitions, {} definition sets in total",
            self.definitions.len(),
            self.definition_sets.len()
        );
        Ok(())
    }

    /// Phase 4: which definitions and sets are assigned, and where.
    ///
    /// The target id of each assignment is looked up in both collections.
    /// A set's members are resolved the first time the set is seen.
    pub fn compute_utilization(&mut self) {
        for assignment in self.assignments.values() {
            let target = assignment.target_id();
            let scope = assignment.scope();

            if let Some(definition) = self.definitions.get(target) {
                self.used_definitions
                    .insert(definition.id.clone(), definition.clone());
                self.definition_scopes
                    .entry(definition.id.clone())
                    .or_default()
                    .push(scope.to_string());
            }

            if let Some(set) = self.definition_sets.get(target) {
                let definitions = &self.definitions;
                self.used_definition_sets
                    .entry(set.id.clone())
                    .or_insert_with(|| UsedDefinitionSet::resolve(set, definitions));
                self.definition_set_scopes
                    .entry(set.id.clone())
                    .or_default()
                    .push(scope.to_string());
            }
        }
    }
}

impl<G> PolicyDiagram<G> {
    /// Assignments bound exactly at `entity_id`.
    pub fn assignments_at(&self, entity_id: &str) -> impl Iterator<Item = &Assignment> + '_ {
        let entity_id = entity_id.to_string();
        self.assignments
            .values()
            .filter(move |a| a.scope() == entity_id)
    }
}

/// Insert `items` keyed by `key`; a later item replaces an earlier one.
fn merge<T>(target: &mut BTreeMap<String, T>, items: Vec<T>, key: impl Fn(&T) -> &String) {
    for item in items {
        target.insert(key(&item).clone(), item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::{GatewayCall, InMemoryGateway, Tenant};

    const ROOT: &str = "/providers/Microsoft.Management/managementGroups/root";
    const SUB1: &str = "/subscriptions/sub1";

    fn mg(name: &str) -> String {
        Scope::ManagementGroup(name).resource_id()
    }

    /// root -> {a -> {a1}, b, sub1}
    fn hierarchy() -> Tenant {
        Tenant::default()
            .with_management_group("root", None)
            .with_management_group("a", Some("root"))
            .with_management_group("b", Some("root"))
            .with_subscription("sub1", Some("root"))
            .with_management_group("a1", Some("a"))
    }

    async fn initialized(tenant: Tenant) -> PolicyDiagram<InMemoryGateway> {
        let mut diagram = PolicyDiagram::new(InMemoryGateway::new(tenant));
        diagram
            .initialize("root")
            .await
            .expect("initialize should succeed");
        diagram
    }

    #[tokio::test]
    async fn test_entity_discovery_closure() {
        let diagram = initialized(hierarchy()).await;
        assert_eq!(diagram.entities.len(), 5);
        let expected = [ROOT.to_string(), SUB1.to_string(), mg("a"), mg("b"), mg("a1")];
        for id in &expected {
            assert!(diagram.entities.contains_key(id.as_str()), "missing {id}");
        }
    }

    #[tokio::test]
    async fn test_subscriptions_are_never_queried_for_children() {
        let diagram = initialized(hierarchy()).await;
        let queried: Vec<String> = diagram
            .gateway()
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                GatewayCall::Entities(name) => Some(name),
                _ => None,
            })
            .collect();
        assert_eq!(queried, vec!["root", "a", "b", "a1"]);
    }

    #[tokio::test]
    async fn test_group_reported_as_own_child_terminates() {
        // "loop" lists itself as parent
        let mut tenant = Tenant::default()
            .with_management_group("root", None)
            .with_management_group("loop", Some("root"));
        tenant.entities.push(tenant.entities[1].clone());
        if let Some(p) = tenant.entities[2].properties.as_mut() {
            p.parent = Some(crate::models::ParentRef { id: Some(mg("loop")) });
        }

        let diagram = initialized(tenant).await;
        assert_eq!(diagram.entities.len(), 2);
    }

    #[tokio::test]
    async fn test_cycle_between_groups_terminates() {
        // x and y claim each other as children; each is queried once.
        let mut tenant = Tenant::default()
            .with_management_group("root", None)
            .with_management_group("x", Some("root"))
            .with_management_group("y", Some("x"));
        let mut x_under_y = tenant.entities[1].clone();
        if let Some(p) = x_under_y.properties.as_mut() {
            p.parent = Some(crate::models::ParentRef { id: Some(mg("y")) });
        }
        tenant.entities.push(x_under_y);

        let diagram = initialized(tenant).await;
        assert_eq!(diagram.entities.len(), 3);
        let entity_calls = diagram
            .gateway()
            .calls()
            .into_iter()
            .filter(|c| matches!(c, GatewayCall::Entities(_)))
            .count();
        assert_eq!(entity_calls, 3);
    }

    #[tokio::test]
    async fn test_assignment_filters_per_entity_kind() {
        let diagram = initialized(hierarchy()).await;
        let calls = diagram.gateway().calls();
        assert!(calls.contains(&GatewayCall::Assignments(
            ROOT.to_string(),
            ScopeFilter::AtExactScope
        )));
        assert!(calls.contains(&GatewayCall::Assignments(
            SUB1.to_string(),
            ScopeFilter::Unfiltered
        )));
        assert!(calls
            .iter()
            .filter(|c| matches!(c, GatewayCall::Definitions(..) | GatewayCall::DefinitionSets(..)))
            .all(|c| matches!(
                c,
                GatewayCall::Definitions(_, ScopeFilter::AtExactScope)
                    | GatewayCall::DefinitionSets(_, ScopeFilter::AtExactScope)
            )));
    }

    #[tokio::test]
    async fn test_management_group_assignments_exclude_inherited() {
        let tenant = hierarchy()
            .with_assignment("root-only", ROOT, "def-1")
            .with_assignment("a-only", &mg("a"), "def-1");
        let diagram = initialized(tenant).await;

        // the query id is a temporary; the iterator must not borrow it
        let at_a: Vec<&str> = diagram
            .assignments_at(&mg("a"))
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(at_a, vec!["a-only"]);
        assert_eq!(diagram.assignments_at(ROOT).count(), 1);
        // sub1 sees root-only by inheritance; the id collapses to one entry
        assert_eq!(diagram.assignments.len(), 2);
    }

    #[tokio::test]
    async fn test_built_ins_fetched_exactly_once() {
        let diagram = initialized(hierarchy()).await;
        let calls = diagram.gateway().calls();
        let count = |wanted: GatewayCall| calls.iter().filter(|c| **c == wanted).count();
        assert_eq!(count(GatewayCall::BuiltInDefinitions), 1);
        assert_eq!(count(GatewayCall::BuiltInDefinitionSets), 1);
    }

    #[tokio::test]
    async fn test_definition_collision_last_write_wins() {
        // Entities are visited in id order: /providers/... before /subscriptions/...
        let tenant = hierarchy()
            .with_definition(Some(ROOT), "custom-1", "From root")
            .with_definition(Some(SUB1), "custom-1", "From sub1");
        let diagram = initialized(tenant).await;

        assert_eq!(diagram.definitions.len(), 1);
        assert_eq!(
            diagram.definitions["custom-1"].display_name(),
            "From sub1"
        );
    }

    #[tokio::test]
    async fn test_tenant_definition_overrides_built_in() {
        let tenant = hierarchy()
            .with_definition(None, "def-1", "Built-in")
            .with_definition(Some(&mg("a1")), "def-1", "Custom");
        let diagram = initialized(tenant).await;
        assert_eq!(diagram.definitions["def-1"].display_name(), "Custom");
    }

    #[tokio::test]
    async fn test_used_definition_set_drops_unresolved_members() {
        let tenant = hierarchy()
            .with_definition(None, "present", "Present")
            .with_definition_set(None, "set-1", "Set one", &["present", "absent"])
            .with_assignment("assign-set", ROOT, "set-1");
        let diagram = initialized(tenant).await;

        assert_eq!(diagram.used_definition_sets.len(), 1);
        let used = &diagram.used_definition_sets["set-1"];
        assert_eq!(used.definitions.len(), 1);
        assert_eq!(used.definitions[0].id, "present");
        assert_eq!(diagram.definition_set_scopes["set-1"], vec![ROOT.to_string()]);
        assert!(diagram.used_definitions.is_empty());
    }

    #[tokio::test]
    async fn test_target_matching_both_collections_is_recorded_twice() {
        let tenant = hierarchy()
            .with_definition(None, "shared-id", "As definition")
            .with_definition_set(None, "shared-id", "As set", &[])
            .with_assignment("assign", SUB1, "shared-id");
        let diagram = initialized(tenant).await;

        assert!(diagram.used_definitions.contains_key("shared-id"));
        assert!(diagram.used_definition_sets.contains_key("shared-id"));
        assert_eq!(diagram.definition_scopes["shared-id"], vec![SUB1.to_string()]);
        assert_eq!(diagram.definition_set_scopes["shared-id"], vec![SUB1.to_string()]);
    }

    #[tokio::test]
    async fn test_usage_scopes_are_not_deduplicated() {
        let tenant = hierarchy()
            .with_definition(None, "def-1", "One")
            .with_assignment("first", SUB1, "def-1")
            .with_assignment("second", SUB1, "def-1");
        let diagram = initialized(tenant).await;
        assert_eq!(
            diagram.definition_scopes["def-1"],
            vec![SUB1.to_string(), SUB1.to_string()]
        );
    }

    #[tokio::test]
    async fn test_unknown_target_is_ignored() {
        let tenant = hierarchy().with_assignment("orphan", SUB1, "nowhere");
        let diagram = initialized(tenant).await;
        assert_eq!(diagram.assignments.len(), 1);
        assert!(diagram.used_definitions.is_empty());
        assert!(diagram.used_definition_sets.is_empty());
    }

    #[tokio::test]
    async fn test_entity_failure_skips_later_phases() {
        let gateway = InMemoryGateway::new(hierarchy())
            .failing_when(|c| matches!(c, GatewayCall::Entities(name) if name == "a"));
        let mut diagram = PolicyDiagram::new(gateway);
        assert!(diagram.initialize("root").await.is_err());

        let calls = diagram.gateway().calls();
        assert!(calls.iter().all(|c| matches!(c, GatewayCall::Entities(_))));
        assert!(diagram.assignments.is_empty());
        assert!(diagram.definitions.is_empty());
        assert!(diagram.used_definitions.is_empty());
    }

    #[tokio::test]
    async fn test_assignment_failure_aborts_run() {
        let gateway = InMemoryGateway::new(hierarchy())
            .failing_when(|c| matches!(c, GatewayCall::Assignments(scope, _) if scope == SUB1));
        let mut diagram = PolicyDiagram::new(gateway);
        let err = diagram.initialize("root").await.expect_err("should abort");
        assert!(err.to_string().contains("Assignments"));

        let calls = diagram.gateway().calls();
        assert!(!calls.contains(&GatewayCall::BuiltInDefinitions));
    }

    #[tokio::test]
    async fn test_initialize_twice_is_idempotent() {
        let tenant = hierarchy()
            .with_definition(None, "def-1", "One")
            .with_definition_set(None, "set-1", "Set", &["def-1"])
            .with_assignment("a1", SUB1, "def-1")
            .with_assignment("a2", ROOT, "set-1");
        let mut diagram = PolicyDiagram::new(InMemoryGateway::new(tenant));
        diagram.initialize("root").await.expect("first run");
        let entities = diagram.entities.clone();
        let assignments = diagram.assignments.clone();
        let definitions = diagram.definitions.clone();
        let used_sets = diagram.used_definition_sets.clone();
        let scopes = diagram.definition_scopes.clone();
        let set_scopes = diagram.definition_set_scopes.clone();

        diagram.initialize("root").await.expect("second run");
        assert_eq!(diagram.entities, entities);
        assert_eq!(diagram.assignments, assignments);
        assert_eq!(diagram.definitions, definitions);
        assert_eq!(diagram.used_definition_sets, used_sets);
        assert_eq!(diagram.definition_scopes, scopes);
        assert_eq!(diagram.definition_set_scopes, set_scopes);
    }

    #[tokio::test]
    async fn test_end_to_end_single_subscription() {
        let tenant = Tenant::default()
            .with_management_group("root", None)
            .with_subscription("sub1", Some("root"))
            .with_definition(None, "def-1", "Allowed locations")
            .with_assignment("allowed-locations", SUB1, "def-1");
        let diagram = initialized(tenant).await;

        let ids: Vec<&str> = diagram.entities.keys().map(|k| k.as_str()).collect();
        assert_eq!(ids, vec![ROOT, SUB1]);
        let used: Vec<&str> = diagram.used_definitions.keys().map(|k| k.as_str()).collect();
        assert_eq!(used, vec!["def-1"]);
        assert_eq!(diagram.definition_scopes["def-1"], vec![SUB1.to_string()]);
    }
}
