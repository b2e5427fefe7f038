//! Serializable view of an initialized [`PolicyDiagram`] for the templates.

use super::templates::md_link;
use crate::models::{Entity, EntityKind};
use crate::processing::PolicyDiagram;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Anchors of the fixed report sections.
const SECTION_ANCHORS: [&str; 4] = [
    "contents",
    "policy-definitions",
    "policy-definition-sets",
    "entities",
];

#[derive(Serialize, Debug)]
pub struct ReportView<'a> {
    pub base_management_group: &'a str,
    pub generated_at: String,
    pub summary: Summary,
    pub definitions: Vec<DefinitionView<'a>>,
    pub definition_sets: Vec<DefinitionSetView<'a>>,
    pub entities: Vec<EntityView<'a>>,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct Summary {
    pub entities: usize,
    pub management_groups: usize,
    pub subscriptions: usize,
    pub assignments: usize,
    pub definitions: usize,
    pub definition_sets: usize,
    pub used_definitions: usize,
    pub used_definition_sets: usize,
}

#[derive(Serialize, Debug)]
pub struct DefinitionView<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub display_name: &'a str,
    /// Label whose `mdlink` slug anchors this section; unique in the report.
    pub anchor_label: String,
    pub description: Option<&'a str>,
    pub category: Option<&'a str>,
    pub policy_type: Option<&'a str>,
    pub assignment_count: usize,
    pub scopes: Vec<ScopeView<'a>>,
}

#[derive(Serialize, Debug)]
pub struct DefinitionSetView<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub display_name: &'a str,
    pub anchor_label: String,
    pub description: Option<&'a str>,
    pub category: Option<&'a str>,
    pub policy_type: Option<&'a str>,
    pub assignment_count: usize,
    pub scopes: Vec<ScopeView<'a>>,
    pub members: Vec<MemberView<'a>>,
    /// Member references that did not resolve to a known definition.
    pub unresolved_members: usize,
}

#[derive(Serialize, Debug)]
pub struct MemberView<'a> {
    pub id: &'a str,
    pub display_name: &'a str,
    /// Anchor of the member's own section when it is also assigned directly.
    pub anchor_label: Option<String>,
}

/// One scope of a usage list with the number of assignments bound there.
#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct ScopeView<'a> {
    pub id: &'a str,
    pub display_name: &'a str,
    pub kind: String,
    pub count: usize,
}

#[derive(Serialize, Debug)]
pub struct EntityView<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub display_name: &'a str,
    pub kind: String,
    /// Assignments bound exactly at this entity.
    pub assignment_count: usize,
}

impl<'a> ReportView<'a> {
    pub fn build<G>(diagram: &'a PolicyDiagram<G>, generated_at: String) -> Self {
        let entities = &diagram.entities;

        let mut definitions: Vec<DefinitionView<'a>> = diagram
            .used_definitions
            .values()
            .map(|d| {
                let scopes = scope_list(diagram.definition_scopes.get(&d.id), entities);
                DefinitionView {
                    id: &d.id,
                    name: &d.name,
                    display_name: d.display_name(),
                    anchor_label: String::new(),
                    description: d.properties.description.as_deref(),
                    category: d.category(),
                    policy_type: d.properties.policy_type.as_deref(),
                    assignment_count: scopes.iter().map(|s| s.count).sum(),
                    scopes,
                }
            })
            .collect();
        definitions.sort_by(|a, b| (a.display_name, a.id).cmp(&(b.display_name, b.id)));

        let mut definition_sets: Vec<DefinitionSetView<'a>> = diagram
            .used_definition_sets
            .values()
            .map(|used| {
                let set = &used.set;
                let scopes = scope_list(diagram.definition_set_scopes.get(&set.id), entities);
                DefinitionSetView {
                    id: &set.id,
                    name: &set.name,
                    display_name: set.display_name(),
                    anchor_label: String::new(),
                    description: set.properties.description.as_deref(),
                    category: set.category(),
                    policy_type: set.properties.policy_type.as_deref(),
                    assignment_count: scopes.iter().map(|s| s.count).sum(),
                    scopes,
                    members: used
                        .definitions
                        .iter()
                        .map(|d| MemberView {
                            id: &d.id,
                            display_name: d.display_name(),
                            anchor_label: None,
                        })
                        .collect(),
                    unresolved_members: set.properties.policy_definitions.len()
                        - used.definitions.len(),
                }
            })
            .collect();
        definition_sets.sort_by(|a, b| (a.display_name, a.id).cmp(&(b.display_name, b.id)));

        let mut anchors = Anchors::new();
        for definition in &mut definitions {
            definition.anchor_label = anchors.claim(definition.display_name, definition.name);
        }
        for set in &mut definition_sets {
            set.anchor_label = anchors.claim(set.display_name, set.name);
        }
        // only directly assigned definitions have a section to link to
        let sections: HashMap<&str, &str> = definitions
            .iter()
            .map(|d| (d.id, d.anchor_label.as_str()))
            .collect();
        for member in definition_sets.iter_mut().flat_map(|s| s.members.iter_mut()) {
            member.anchor_label = sections.get(member.id).map(|label| label.to_string());
        }

        let entity_views = entities
            .values()
            .map(|e| EntityView {
                id: &e.id,
                name: &e.name,
                display_name: e.display_name(),
                kind: e.kind.to_string(),
                assignment_count: diagram.assignments_at(&e.id).count(),
            })
            .collect();

        let count_kind = |kind: EntityKind| entities.values().filter(|e| e.kind == kind).count();
        let summary = Summary {
            entities: entities.len(),
            management_groups: count_kind(EntityKind::ManagementGroup),
            subscriptions: count_kind(EntityKind::Subscription),
            assignments: diagram.assignments.len(),
            definitions: diagram.definitions.len(),
            definition_sets: diagram.definition_sets.len(),
            used_definitions: diagram.used_definitions.len(),
            used_definition_sets: diagram.used_definition_sets.len(),
        };

        ReportView {
            base_management_group: &diagram.base_management_group,
            generated_at,
            summary,
            definitions,
            definition_sets,
            entities: entity_views,
        }
    }
}

/// Hands out heading labels whose `mdlink` slugs are unique within a report.
struct Anchors {
    taken: HashSet<String>,
}

impl Anchors {
    fn new() -> Self {
        Anchors {
            taken: SECTION_ANCHORS.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// `display_name`, or `display_name` plus `name` when that slug is taken.
    fn claim(&mut self, display_name: &str, name: &str) -> String {
        let mut label = display_name.to_string();
        let mut attempt = 1;
        while !self.taken.insert(md_link(&label)) {
            label = match attempt {
                1 => format!("{display_name} {name}"),
                n => format!("{display_name} {name} {n}"),
            };
            attempt += 1;
        }
        label
    }
}

/// Collapse a usage list into distinct scopes with counts, first-seen order.
fn scope_list<'a>(
    scopes: Option<&'a Vec<String>>,
    entities: &'a BTreeMap<String, Entity>,
) -> Vec<ScopeView<'a>> {
    let mut views: Vec<ScopeView<'a>> = Vec::new();
    for scope in scopes.into_iter().flatten() {
        if let Some(view) = views.iter_mut().find(|v| v.id == scope.as_str()) {
            view.count += 1;
            continue;
        }
        let (display_name, kind) = match entities.get(scope) {
            Some(entity) => (entity.display_name(), entity.kind.to_string()),
            None => (scope.as_str(), "Scope".to_string()),
        };
        views.push(ScopeView {
            id: scope,
            display_name,
            kind,
            count: 1,
        });
    }
    views
}
