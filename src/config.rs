//! Runtime configuration.
//!
//! Constants for the Azure Resource Manager API plus the few settings that can
//! be overridden from the environment (a `.env` file is loaded by `main`).

/// Default Azure Resource Manager endpoint (public cloud).
pub const DEFAULT_RESOURCE_MANAGER_ENDPOINT: &str = "https://management.azure.com";

/// Environment variable overriding the ARM endpoint, e.g. for sovereign clouds.
pub const RESOURCE_MANAGER_ENDPOINT_ENV: &str = "AZURE_RESOURCE_MANAGER_ENDPOINT";

/// api-version for `Microsoft.Management/getEntities`.
pub const MANAGEMENT_GROUPS_API_VERSION: &str = "2021-04-01";

/// api-version for `Microsoft.Authorization` policy resources.
pub const POLICY_API_VERSION: &str = "2023-04-01";

/// Report file written by `generate` when `--output` is not given.
pub const DEFAULT_OUTPUT_FILE: &str = "docs.md";

/// log4rs configuration read from the working directory.
pub const LOG_CONFIG_FILE: &str = "log4rs.yml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Base URL of Azure Resource Manager, without trailing slash.
    pub resource_manager_endpoint: String,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_endpoint(std::env::var(RESOURCE_MANAGER_ENDPOINT_ENV).ok())
    }

    fn from_endpoint(endpoint: Option<String>) -> Self {
        let endpoint = endpoint
            .map(|e| e.trim().trim_end_matches('/').to_string())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| DEFAULT_RESOURCE_MANAGER_ENDPOINT.to_string());
        Settings {
            resource_manager_endpoint: endpoint,
        }
    }

    /// OAuth scope requested from the credential for ARM calls.
    pub fn token_scope(&self) -> String {
        format!("{}/.default", self.resource_manager_endpoint)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_endpoint(None)
    }
}
