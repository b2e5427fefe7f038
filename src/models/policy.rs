//! Policy assignments, definitions and definition sets.
//!
//! Field names follow the `Microsoft.Authorization` REST payloads; only the
//! properties used for aggregation and rendering are kept.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Binds a definition or definition set to a scope.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Assignment {
    pub id: String,
    pub name: String,
    pub properties: AssignmentProperties,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentProperties {
    pub display_name: Option<String>,
    /// Id of the assigned definition or definition set.
    pub policy_definition_id: String,
    /// Resource id of the entity the assignment is bound to.
    pub scope: String,
    pub description: Option<String>,
    pub enforcement_mode: Option<String>,
    #[serde(default)]
    pub not_scopes: Vec<String>,
}

impl Assignment {
    pub fn target_id(&self) -> &str {
        &self.properties.policy_definition_id
    }

    pub fn scope(&self) -> &str {
        &self.properties.scope
    }
}

/// A single policy rule.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Definition {
    pub id: String,
    pub name: String,
    pub properties: DefinitionProperties,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionProperties {
    pub display_name: Option<String>,
    pub description: Option<String>,
    /// `BuiltIn`, `Custom` or `Static`.
    pub policy_type: Option<String>,
    pub mode: Option<String>,
    pub metadata: Option<Value>,
}

/// A named bundle of definitions (policy initiative).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DefinitionSet {
    pub id: String,
    pub name: String,
    pub properties: DefinitionSetProperties,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionSetProperties {
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub policy_type: Option<String>,
    pub metadata: Option<Value>,
    #[serde(default)]
    pub policy_definitions: Vec<DefinitionReference>,
}

/// Member entry of a definition set.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionReference {
    pub policy_definition_id: String,
    pub policy_definition_reference_id: Option<String>,
}

fn metadata_category(metadata: Option<&Value>) -> Option<&str> {
    metadata?.get("category")?.as_str()
}

impl Definition {
    pub fn display_name(&self) -> &str {
        self.properties.display_name.as_deref().unwrap_or(&self.name)
    }

    pub fn category(&self) -> Option<&str> {
        metadata_category(self.properties.metadata.as_ref())
    }
}

impl DefinitionSet {
    pub fn display_name(&self) -> &str {
        self.properties.display_name.as_deref().unwrap_or(&self.name)
    }

    pub fn category(&self) -> Option<&str> {
        metadata_category(self.properties.metadata.as_ref())
    }
}

/// A definition set that is assigned somewhere, with its members resolved.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UsedDefinitionSet {
    pub set: DefinitionSet,
    /// Members found in the definitions collection, in reference order.
    pub definitions: Vec<Definition>,
}

impl UsedDefinitionSet {
    /// Resolve member references; ids missing from `definitions` are dropped.
    pub fn resolve(set: &DefinitionSet, definitions: &BTreeMap<String, Definition>) -> Self {
        let resolved = set
            .properties
            .policy_definitions
            .iter()
            .filter_map(|r| definitions.get(&r.policy_definition_id))
            .cloned()
            .collect();
        UsedDefinitionSet {
            set: set.clone(),
            definitions: resolved,
        }
    }
}
