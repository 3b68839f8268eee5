//! # Core Protocol Components
//!
//! Schema descriptors, the value model and the JSON wire codec.
//!
//! This module provides the foundation for the protocol: what a value is,
//! how it is described, and how it maps onto the reference JSON grammar.
//!
//! ## Components
//! - **Schema**: immutable struct, method and service descriptors
//! - **Value**: tagged in-memory values with structural equality
//! - **Codec**: schema-guided value/JSON conversion
//! - **Framing**: delimiting one JSON message on a byte stream
//!
//! ## Wire Format
//! ```text
//! [version, "method", kind, seqid, { "<id>": { "<tag>": payload }, ... }]
//! ```

pub mod codec;
pub mod framing;
pub mod schema;
pub mod value;
