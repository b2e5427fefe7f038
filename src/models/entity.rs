//! Management-group hierarchy node (management group or subscription).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of node returned by `Microsoft.Management/getEntities`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    #[serde(rename = "Microsoft.Management/managementGroups")]
    ManagementGroup,
    #[serde(rename = "/subscriptions")]
    Subscription,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::ManagementGroup => write!(f, "Management group"),
            EntityKind::Subscription => write!(f, "Subscription"),
        }
    }
}

/// A node in the tenant's management hierarchy.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Entity {
    /// Resource id, e.g. `/providers/Microsoft.Management/managementGroups/root`
    /// or `/subscriptions/<guid>`.
    pub id: String,
    /// Management group name, or subscription id for subscriptions.
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    #[serde(default)]
    pub properties: Option<EntityProperties>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntityProperties {
    pub tenant_id: Option<String>,
    pub display_name: Option<String>,
    pub parent: Option<ParentRef>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ParentRef {
    pub id: Option<String>,
}

impl Entity {
    pub fn is_management_group(&self) -> bool {
        self.kind == EntityKind::ManagementGroup
    }

    /// Display name when Azure returned one, otherwise the name.
    pub fn display_name(&self) -> &str {
        self.properties
            .as_ref()
            .and_then(|p| p.display_name.as_deref())
            .unwrap_or(&self.name)
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.properties
            .as_ref()
            .and_then(|p| p.parent.as_ref())
            .and_then(|p| p.id.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_management_group() {
        let json = r#"{
            "id": "/providers/Microsoft.Management/managementGroups/platform",
            "type": "Microsoft.Management/managementGroups",
            "name": "platform",
            "properties": {
                "tenantId": "00000000-0000-0000-0000-000000000001",
                "displayName": "Platform",
                "parent": { "id": "/providers/Microsoft.Management/managementGroups/root" },
                "permissions": "view",
                "numberOfChildren": 2
            }
        }"#;
        let entity: Entity = serde_json::from_str(json).expect("Error parsing entity");
        assert_eq!(entity.kind, EntityKind::ManagementGroup);
        assert!(entity.is_management_group());
        assert_eq!(entity.display_name(), "Platform");
        assert_eq!(
            entity.parent_id(),
            Some("/providers/Microsoft.Management/managementGroups/root")
        );
    }

    #[test]
    fn test_deserialize_subscription_without_properties() {
        let json = r#"{
            "id": "/subscriptions/11111111-2222-3333-4444-555555555555",
            "type": "/subscriptions",
            "name": "11111111-2222-3333-4444-555555555555"
        }"#;
        let entity: Entity = serde_json::from_str(json).expect("Error parsing entity");
        assert_eq!(entity.kind, EntityKind::Subscription);
        assert!(!entity.is_management_group());
        assert_eq!(entity.display_name(), "11111111-2222-3333-4444-555555555555");
        assert_eq!(entity.parent_id(), None);
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let json = r#"{"id": "x", "type": "Microsoft.Compute/virtualMachines", "name": "x"}"#;
        assert!(serde_json::from_str::<Entity>(json).is_err());
    }
}
