//! # Protocol Layer
//!
//! Message envelopes and the RPC roles built on them.
//!
//! ## Components
//! - **Message**: envelope encoding and two-step decoding
//! - **Exception**: the application exception struct and its kind codes
//! - **Dispatcher**: method name to handler routing
//! - **Processor**: one server-side request/response cycle per call
//! - **Client**: caller side with reply validation

pub mod client;
pub mod dispatcher;
pub mod exception;
pub mod message;
pub mod processor;

pub use client::Client;
pub use dispatcher::{Dispatcher, HandlerError, HandlerResult};
pub use exception::{ApplicationException, ExceptionKind};
pub use message::{Message, MessageHeader, MessageType, RawMessage};
pub use processor::{Exchange, ProcessOutcome, Processor};
