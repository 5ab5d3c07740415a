//! Error types for the mapping engine.

use thiserror::Error;

/// All possible errors from the mapping engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Mapping errors
    #[error("mapping key is not set")]
    EmptyKey,

    #[error("key {0} is not mapped")]
    UnmappedKey(String),

    #[error("key {0} is mapped to an empty model name")]
    EmptyModelName(String),

    #[error("model {0} is not mapped")]
    UnmappedModel(String),

    #[error("unable to derive a resource key from id {0}")]
    InvalidId(String),

    // Identifier errors
    #[error("model {model} has no identifier attribute")]
    MissingIdentifier { model: String },

    #[error("model {model} declares more than one identifier, {first} is already the identifier")]
    MoreThanOneIdentifier { model: String, first: String },

    #[error("entity of model {model} has no identifier value yet")]
    UnpersistedEntity { model: String },

    // Serialization errors
    #[error("case not allowed for now: {0}")]
    CaseNotAllowed(String),

    #[error("property {property} of {model} has no getter")]
    MissingGetter { property: String, model: String },

    #[error("maximum depth {depth} exceeded while walking {model}")]
    MaxDepthExceeded { model: String, depth: usize },

    // Deserialization errors
    #[error(
        "property {property} is not writable in {model}; \
         register it with `property(..)` or give it a setter with `accessor(..)`"
    )]
    MissingSetter { property: String, model: String },

    #[error("invalid value for attribute '{attribute}': {reason}")]
    InvalidValue { attribute: String, reason: String },

    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    // Collaborator errors
    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("entity not found: {0}")]
    EntityNotFound(String),
}

impl Error {
    /// Whether this error comes from an incomplete or inconsistent mapping.
    pub fn is_mapping_error(&self) -> bool {
        matches!(
            self,
            Error::EmptyKey
                | Error::UnmappedKey(_)
                | Error::EmptyModelName(_)
                | Error::UnmappedModel(_)
                | Error::InvalidId(_)
        )
    }

    /// Whether this error is about entity identifiers.
    ///
    /// `MissingIdentifier` and `MoreThanOneIdentifier` point at a malformed
    /// mapping, `UnpersistedEntity` at an entity that cannot be addressed yet.
    pub fn is_identifier_error(&self) -> bool {
        matches!(
            self,
            Error::MissingIdentifier { .. }
                | Error::MoreThanOneIdentifier { .. }
                | Error::UnpersistedEntity { .. }
        )
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
