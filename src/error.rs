//! # Error Types
//!
//! Error handling for the JSON protocol codec, processor and transports.
//!
//! Every fallible operation in the crate returns [`Result`], whose error side is
//! the single [`ProtocolError`] enum. Variants fall into four classes, exposed
//! through [`ProtocolError::class`]:
//!
//! - **Decode**: malformed envelope, type-tag mismatch, missing required field,
//!   container count mismatch, out-of-range values
//! - **Application**: unknown method, handler failure, exceptions raised by the peer
//! - **Transport**: I/O failures, connection closed, oversized frames
//! - **Usage**: schema, encode and configuration mistakes made by the caller
//!
//! Decode and application errors raised while processing a request are turned
//! into an EXCEPTION reply by the processor. Transport errors end the connection.
//!
//! ## Example Usage
//! ```rust
//! use thrift_json::error::{ErrorClass, ProtocolError};
//!
//! let err = ProtocolError::CountMismatch { declared: 3, actual: 2 };
//! assert_eq!(err.class(), ErrorClass::Decode);
//! ```

use std::io;
use thiserror::Error;

use crate::core::value::StructValue;
use crate::protocol::exception::ApplicationException;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    pub const ERR_NOT_AN_ARRAY: &str = "envelope is not a JSON array";
    pub const ERR_ENVELOPE_ARITY: &str = "envelope must have exactly 5 elements";
    pub const ERR_BAD_VERSION: &str = "message contained bad version";
    pub const ERR_BAD_MESSAGE_TYPE: &str = "unknown message type";
    pub const ERR_BAD_METHOD_NAME: &str = "method name must be a string";
    pub const ERR_BAD_SEQUENCE_ID: &str = "sequence id must be a 32-bit integer";
    pub const ERR_FRAME_START: &str = "message must start with '[' or '{'";
    pub const ERR_HTTP_STATUS: &str = "unexpected HTTP status";
    pub const ERR_HTTP_HEADER: &str = "malformed HTTP response header";
}

/// Broad classification of a [`ProtocolError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bytes did not match the wire grammar or the expected schema.
    Decode,
    /// The call could not be served (or the peer reported a failure).
    Application,
    /// The byte stream itself failed.
    Transport,
    /// The caller supplied an invalid schema, value or configuration.
    Usage,
}

// ProtocolError is the primary error type for all protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON syntax error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Required field '{name}' (id {id}) is missing")]
    MissingField { name: String, id: i16 },

    #[error("Container count mismatch: declared {declared}, actual {actual}")]
    CountMismatch { declared: usize, actual: usize },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Application exception: {0}")]
    Application(ApplicationException),

    #[error("Method '{method}' raised declared exception '{field}'")]
    UserException {
        method: String,
        field: String,
        exception: StructValue,
    },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Message too large: {0} bytes")]
    OversizedMessage(usize),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProtocolError {
    /// Classify the error according to who is responsible for it.
    pub fn class(&self) -> ErrorClass {
        match self {
            ProtocolError::Json(_)
            | ProtocolError::InvalidEnvelope(_)
            | ProtocolError::TypeMismatch { .. }
            | ProtocolError::MissingField { .. }
            | ProtocolError::CountMismatch { .. }
            | ProtocolError::InvalidValue(_) => ErrorClass::Decode,
            ProtocolError::UnknownMethod(_)
            | ProtocolError::Application(_)
            | ProtocolError::UserException { .. } => ErrorClass::Application,
            ProtocolError::Io(_)
            | ProtocolError::ConnectionClosed
            | ProtocolError::OversizedMessage(_)
            | ProtocolError::TransportError(_) => ErrorClass::Transport,
            ProtocolError::Encode(_) | ProtocolError::SchemaError(_) | ProtocolError::ConfigError(_) => {
                ErrorClass::Usage
            }
        }
    }

    /// Shorthand for a tag mismatch between the schema and the wire.
    pub(crate) fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        ProtocolError::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
