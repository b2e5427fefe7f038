//! Error type shared by the gateway, the aggregation model and the renderers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AzDocsError {
    #[error("Authentication failure")]
    Credential(#[source] azure_core::Error),

    #[error("Request failed: {url}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} returned HTTP {status}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("Error parsing {operation} response: path={path} error={message}")]
    Parse {
        operation: String,
        path: String,
        message: String,
    },

    #[error("{operation} failed: {message}")]
    Gateway { operation: String, message: String },

    #[error("I/O error on {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Template error")]
    Template(#[from] handlebars::TemplateError),

    #[error("Render error")]
    Render(#[from] handlebars::RenderError),
}

pub type Result<T> = std::result::Result<T, AzDocsError>;

impl AzDocsError {
    pub fn gateway(operation: impl Into<String>, message: impl ToString) -> Self {
        AzDocsError::Gateway {
            operation: operation.into(),
            message: message.to_string(),
        }
    }
}
