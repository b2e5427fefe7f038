//! Domain models for the policy report.
//!
//! This module contains the data structures read from Azure Resource Manager:
//! - [`Entity`] - management group or subscription in the hierarchy
//! - [`Assignment`] - binding of a definition or set to a scope
//! - [`Definition`] and [`DefinitionSet`] - policy rules and initiatives
//! - [`UsedDefinitionSet`] - an assigned set with its members resolved

mod entity;
mod policy;

// Re-export public types
pub use entity::{Entity, EntityKind, EntityProperties, ParentRef};
pub use policy::{
    Assignment, AssignmentProperties, Definition, DefinitionProperties, DefinitionReference,
    DefinitionSet, DefinitionSetProperties, UsedDefinitionSet,
};
