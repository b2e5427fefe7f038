//! Azure Resource Manager interaction.
//!
//! This module handles all Azure-related operations:
//! - [`credential`] - Credential chain for ARM tokens
//! - [`gateway`] - The paginated policy gateway abstraction
//! - [`rest`] - ARM REST implementation of the gateway
//! - [`memory`] - In-memory gateway over a fixed tenant

mod credential;
mod gateway;
mod memory;
mod rest;

// Re-export public types and functions
pub use credential::login;
pub use gateway::{collect_pages, EntitySearch, Pages, PolicyGateway, Scope, ScopeFilter};
pub use memory::{GatewayCall, InMemoryGateway, Tenant};
pub use rest::ArmGateway;
