use std::path::PathBuf;

use thiserror::Error;

/// Failures talking to the provider outside of a normal HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("CLIENT_ID and CLIENT_SECRET must be set in environment variables.")]
    MissingCredentials,
    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("{0}")]
    Transport(String),
    #[error("token request failed with HTTP {status}")]
    TokenStatus { status: u16 },
    #[error("invalid token response: {0}")]
    TokenResponse(String),
}

/// Failures building or querying the operation registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("could not read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid OpenAPI document '{source_file}': {detail}")]
    Parse { source_file: String, detail: String },
    #[error("Duplicate operationId detected: {0}")]
    Duplicate(String),
    #[error("Operation not found in registry: {0}")]
    NotFound(String),
    #[error(
        "OpenAPI specs are unavailable. Missing from {}: {}. Set UPS_MCP_SPECS_DIR to a directory containing: {}.",
        dir.display(),
        missing.join(", "),
        required.join(", ")
    )]
    MissingSpecs {
        dir: PathBuf,
        missing: Vec<String>,
        required: Vec<String>,
    },
}
