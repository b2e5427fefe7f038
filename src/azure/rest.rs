//! Azure Resource Manager implementation of [`PolicyGateway`].
//!
//! Each listing follows `nextLink` until it is absent. Every page request
//! asks the credential for a token (the credential caches it).

use super::gateway::{EntitySearch, Pages, PolicyGateway, Scope, ScopeFilter};
use crate::config::{Settings, MANAGEMENT_GROUPS_API_VERSION, POLICY_API_VERSION};
use crate::error::{AzDocsError, Result};
use crate::models::{Assignment, Definition, DefinitionSet, Entity};
use azure_core::auth::TokenCredential;
use colored::Colorize;
use futures::stream::{self, StreamExt};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

/// One page of an ARM list response.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ListPage<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    next_link: Option<String>,
}

/// `Microsoft.Authorization` policy resource collections.
#[derive(Debug, Clone, Copy)]
enum PolicyResource {
    Assignments,
    Definitions,
    DefinitionSets,
}

impl PolicyResource {
    fn path(&self) -> &'static str {
        match self {
            PolicyResource::Assignments => "policyAssignments",
            PolicyResource::Definitions => "policyDefinitions",
            PolicyResource::DefinitionSets => "policySetDefinitions",
        }
    }
}

struct PageCursor {
    next: Option<String>,
    /// Every link requested so far, the first URL included.
    seen: HashSet<String>,
    block: usize,
}

/// Follow `nextLink` from `first` until it is absent or empty.
///
/// `fetch` returns the raw body of one page. A link that was already
/// requested ends the stream with an error instead of paging forever.
fn paged<T, F, Fut>(first: String, operation: &'static str, fetch: F) -> Pages<'static, T>
where
    T: DeserializeOwned + Send + 'static,
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String>> + Send + 'static,
{
    let cursor = PageCursor {
        seen: HashSet::from([first.clone()]),
        next: Some(first),
        block: 0,
    };
    stream::try_unfold(cursor, move |mut cursor| {
        let response = cursor.next.take().map(&fetch);
        async move {
            let Some(response) = response else {
                return Ok(None);
            };
            let body = response.await?;
            let page: ListPage<T> = parse_page(&body, operation)?;

            let next = page.next_link.filter(|link| !link.is_empty());
            if let Some(link) = &next {
                if !cursor.seen.insert(link.clone()) {
                    return Err(AzDocsError::gateway(
                        operation,
                        format!("nextLink not unique - possible infinite loop: {link}"),
                    ));
                }
            }
            log::info!(
                "got block#{block:2} {operation} record_count=+{count:3}",
                block = cursor.block,
                count = page.value.len(),
            );
            cursor.next = next;
            cursor.block += 1;
            Ok(Some((page.value, cursor)))
        }
    })
    .boxed()
}

pub struct ArmGateway {
    client: reqwest::Client,
    credential: Arc<dyn TokenCredential>,
    settings: Settings,
}

impl ArmGateway {
    pub fn new(credential: Arc<dyn TokenCredential>, settings: Settings) -> Self {
        ArmGateway {
            client: reqwest::Client::new(),
            credential,
            settings,
        }
    }

    fn pages<T>(
        &self,
        method: Method,
        url: Result<Url>,
        operation: &'static str,
    ) -> Pages<'static, T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let url = match url {
            Ok(url) => url.to_string(),
            Err(e) => return stream::once(async move { Err::<Vec<T>, _>(e) }).boxed(),
        };
        let client = self.client.clone();
        let credential = Arc::clone(&self.credential);
        let token_scope = self.settings.token_scope();

        paged(url, operation, move |url| {
            let client = client.clone();
            let credential = Arc::clone(&credential);
            let token_scope = token_scope.clone();
            let method = method.clone();
            async move {
                let token = credential
                    .get_token(&[token_scope.as_str()])
                    .await
                    .map_err(AzDocsError::Credential)?;
                send(&client, method, &url, token.token.secret(), operation).await
            }
        })
    }
}

/// Issue one ARM request and return the body of a successful response.
async fn send(
    client: &reqwest::Client,
    method: Method,
    url: &str,
    bearer_token: &str,
    operation: &str,
) -> Result<String> {
    log::debug!("{operation} {method} {url}", url = url.on_blue());
    let mut request = client.request(method.clone(), url).bearer_auth(bearer_token);
    if method == Method::POST {
        // ARM rejects body-less POSTs without an explicit length.
        request = request.header(reqwest::header::CONTENT_LENGTH, "0");
    }

    let response = request.send().await.map_err(|source| AzDocsError::Request {
        url: url.to_string(),
        source,
    })?;
    let status = response.status();
    let body = response.text().await.map_err(|source| AzDocsError::Request {
        url: url.to_string(),
        source,
    })?;

    if !status.is_success() {
        log::warn!(
            "{failed} {operation} status={status}",
            failed = "failed".on_red()
        );
        return Err(AzDocsError::Status {
            operation: operation.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

fn parse_page<T: DeserializeOwned>(body: &str, operation: &str) -> Result<ListPage<T>> {
    let mut deserializer = serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
        log::debug!("OUTPUT START:\n\n{}\n\nOUTPUT END\n", body);
        AzDocsError::Parse {
            operation: operation.to_string(),
            path: e.path().to_string(),
            message: e.inner().to_string(),
        }
    })
}

fn parse_url(raw: &str, operation: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| AzDocsError::gateway(operation, format!("invalid url {raw}: {e}")))
}

fn entities_url(endpoint: &str, name: &str, search: EntitySearch) -> Result<Url> {
    let mut url = parse_url(
        &format!("{endpoint}/providers/Microsoft.Management/getEntities"),
        "list_entities",
    )?;
    url.query_pairs_mut()
        .append_pair("api-version", MANAGEMENT_GROUPS_API_VERSION)
        .append_pair("$filter", &format!("name eq '{name}'"))
        .append_pair("$search", search.as_str());
    Ok(url)
}

fn scoped_url(
    endpoint: &str,
    scope: Scope<'_>,
    resource: PolicyResource,
    filter: ScopeFilter,
) -> Result<Url> {
    let mut url = parse_url(
        &format!(
            "{endpoint}{scope}/providers/Microsoft.Authorization/{resource}",
            scope = scope.resource_id(),
            resource = resource.path()
        ),
        resource.path(),
    )?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("api-version", POLICY_API_VERSION);
        if let Some(odata) = filter.odata_filter() {
            query.append_pair("$filter", odata);
        }
    }
    Ok(url)
}

fn built_in_url(endpoint: &str, resource: PolicyResource) -> Result<Url> {
    let mut url = parse_url(
        &format!(
            "{endpoint}/providers/Microsoft.Authorization/{resource}",
            resource = resource.path()
        ),
        resource.path(),
    )?;
    url.query_pairs_mut()
        .append_pair("api-version", POLICY_API_VERSION);
    Ok(url)
}

impl PolicyGateway for ArmGateway {
    fn list_entities(&self, name: &str, search: EntitySearch) -> Pages<'_, Entity> {
        let url = entities_url(&self.settings.resource_manager_endpoint, name, search);
        self.pages(Method::POST, url, "list_entities")
    }

    fn list_assignments(&self, scope: Scope<'_>, filter: ScopeFilter) -> Pages<'_, Assignment> {
        let url = scoped_url(
            &self.settings.resource_manager_endpoint,
            scope,
            PolicyResource::Assignments,
            filter,
        );
        self.pages(Method::GET, url, "list_assignments")
    }

    fn list_definitions(&self, scope: Scope<'_>, filter: ScopeFilter) -> Pages<'_, Definition> {
        let url = scoped_url(
            &self.settings.resource_manager_endpoint,
            scope,
            PolicyResource::Definitions,
            filter,
        );
        self.pages(Method::GET, url, "list_definitions")
    }

    fn list_definition_sets(
        &self,
        scope: Scope<'_>,
        filter: ScopeFilter,
    ) -> Pages<'_, DefinitionSet> {
        let url = scoped_url(
            &self.settings.resource_manager_endpoint,
            scope,
            PolicyResource::DefinitionSets,
            filter,
        );
        self.pages(Method::GET, url, "list_definition_sets")
    }

    fn list_built_in_definitions(&self) -> Pages<'_, Definition> {
        let url = built_in_url(
            &self.settings.resource_manager_endpoint,
            PolicyResource::Definitions,
        );
        self.pages(Method::GET, url, "list_built_in_definitions")
    }

    fn list_built_in_definition_sets(&self) -> Pages<'_, DefinitionSet> {
        let url = built_in_url(
            &self.settings.resource_manager_endpoint,
            PolicyResource::DefinitionSets,
        );
        self.pages(Method::GET, url, "list_built_in_definition_sets")
    }
}
