// cargo watch -x 'fmt' -x 'run -- -m <management-group> show'

pub mod azure;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod output;
pub mod processing;

pub use error::{AzDocsError, Result};
pub use processing::PolicyDiagram;
