//! Policy data processing logic.
//!
//! - [`diagram`] - The four-phase aggregation model

mod diagram;

// Re-export public types
pub use diagram::PolicyDiagram;
