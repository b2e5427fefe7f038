//! Credential acquisition.

use crate::error::Result;
use azure_core::auth::TokenCredential;
use std::sync::Arc;

/// Build the default Azure credential chain (environment, managed identity,
/// Azure CLI). Constructed once per run and shared by every gateway call.
///
/// Building the chain does not contact Azure; a missing or broken login shows
/// up as [`crate::AzDocsError::Credential`] on the first token request.
pub fn login() -> Result<Arc<dyn TokenCredential>> {
    let credential = azure_identity::DefaultAzureCredentialBuilder::new().build();
    log::debug!("credential created");
    Ok(Arc::new(credential))
}
