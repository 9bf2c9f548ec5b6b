//! parcelkit-client: the network-facing collaborators of the completion
//! engine.
//!
//! - [`TokenManager`] -- cached client-credentials bearer tokens
//! - [`HttpClient`] -- operation calls wrapped in a stable [`Envelope`]
//! - [`OperationRegistry`] -- operation metadata read from OpenAPI documents
//! - [`Transport`] -- the blocking HTTP seam, swappable in tests

pub mod auth;
pub mod environment;
pub mod error;
pub mod http;
pub mod registry;
pub mod transport;

pub use auth::TokenManager;
pub use environment::Environment;
pub use error::{ClientError, RegistryError};
pub use http::{Envelope, EnvelopeError, HttpClient, OperationCall, RequestSummary};
pub use registry::{OperationRegistry, OperationSpec, ParameterLocation, ParameterSpec};
pub use transport::{HttpRequest, HttpResponse, RequestBody, Transport, UreqTransport};
