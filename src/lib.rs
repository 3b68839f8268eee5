//! # thrift-json
//!
//! Apache Thrift compatible JSON protocol for Rust services: a schema-guided
//! codec, a message processor, a client, and TCP and HTTP transports.
//!
//! ## Layers
//! - [`core`]: schema descriptors, values, the JSON codec and stream framing
//! - [`protocol`]: envelopes, exceptions, dispatch, processing and the client
//! - [`transport`]: byte transports plus TCP and HTTP servers
//! - [`config`], [`utils`]: configuration, logging and metrics
//!
//! ## Example
//! ```no_run
//! use thrift_json::{Dispatcher, MethodSpec, NetworkConfig, Processor, ServiceSpec, TypeSpec};
//!
//! # async fn run() -> thrift_json::Result<()> {
//! let service = ServiceSpec::builder("Echo")
//!     .method(
//!         MethodSpec::builder("echo")
//!             .arg("text", TypeSpec::String)
//!             .returns(TypeSpec::String)
//!             .build()?,
//!     )
//!     .build()?;
//!
//! let dispatcher = Dispatcher::new(service).with("echo", |args| Ok(args.get("text").cloned()))?;
//! let config = NetworkConfig::default();
//! let server = thrift_json::transport::tcp::TcpServer::bind(Processor::new(dispatcher), &config).await?;
//! server.serve().await
//! # }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use crate::config::NetworkConfig;
pub use crate::core::schema::{FieldSpec, MethodSpec, Requiredness, ServiceSpec, StructSpec, TypeSpec, TypeTag};
pub use crate::core::value::{StructValue, Value};
pub use crate::error::{ErrorClass, ProtocolError, Result};
pub use crate::protocol::{
    ApplicationException, Client, Dispatcher, ExceptionKind, HandlerError, HandlerResult,
    Message, MessageHeader, MessageType, ProcessOutcome, Processor,
};
pub use crate::transport::{MemoryBuffer, Transport};
