//! parcelkit-core: requirement discovery and interactive completion for
//! shipping request bodies.
//!
//! A request body is checked against a [`Domain`]'s rule tables, defaulted
//! from built-in and configured values, and any remaining gaps are collected
//! from the user through an [`Elicitor`] and written back into the body.
//!
//! # Public API
//!
//! - [`find_missing()`] -- every required field absent from a body
//! - [`apply_defaults()`] -- built-in, configured and billing defaults
//! - [`canonicalize()`] -- singular-or-list keys normalized to lists
//! - [`elicit_and_rehydrate()`] -- the prompt/validate/rehydrate loop
//! - [`ElicitationError`] -- terminal outcomes with a stable JSON payload
//!
//! The shipment and rating rule tables live under [`domain`].

pub mod answers;
pub mod array;
pub mod canonicalize;
pub mod defaults;
pub mod domain;
pub mod elicit;
pub mod error;
pub mod evaluate;
pub mod path;
pub mod rehydrate;
pub mod rules;
pub mod schema;

pub use answers::{normalize, validate, Answers};
pub use array::{expand_array_fields, reconstruct_array, ArrayFieldRule};
pub use canonicalize::{canonicalize, CanonicalLayout, CanonicalizeError};
pub use defaults::{apply_defaults, ConfigSource, DefaultsError, DefaultsTable, ACCOUNT_NUMBER_KEY};
pub use domain::Domain;
pub use elicit::{
    elicit_and_rehydrate, supports_form, CompletionOptions, ElicitationResponse,
    ElicitationSession, Elicitor, ElicitorError,
};
pub use error::{ElicitationError, ErrorCode, Reason};
pub use evaluate::{find_missing, EvaluateError, EvaluationMode};
pub use path::PathError;
pub use rehydrate::{rehydrate, RehydrationError};
pub use rules::{FieldRule, FieldType, MissingEntry, MissingField};
pub use schema::{FormSchemaBuilder, SchemaBuilder};
