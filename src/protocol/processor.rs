//! # Message Processor
//!
//! One request/response cycle per [`Processor::process`] call:
//!
//! ```text
//! AwaitingHeader -> ReadingArgsBody -> Dispatching -> WritingReply -> Done
//! ```
//!
//! Nothing survives between calls. Decode and application failures become
//! EXCEPTION replies and never escape `process`; only transport failures do.
//! Oneway methods never produce output, not even on failure.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::config::{TransportConfig, MAX_MESSAGE_SIZE};
use crate::core::framing::read_frame;
use crate::core::schema::{MethodSpec, ServiceSpec, TypeSpec, RESULT_FIELD_ID};
use crate::core::value::{StructValue, Value};
use crate::error::Result;
use crate::protocol::dispatcher::{Dispatcher, HandlerError};
use crate::protocol::exception::{ApplicationException, ExceptionKind};
use crate::protocol::message::{salvage_header, Message, MessageHeader, MessageType, RawMessage};
use crate::transport::Transport;

/// What a processing cycle wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// A REPLY message.
    Replied,
    /// An EXCEPTION message.
    Raised,
    /// Nothing (oneway call).
    Silent,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    AwaitingHeader,
    ReadingArgsBody,
    Dispatching,
    WritingReply,
    Done,
}

/// Outcome and sizes of one processed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exchange {
    pub outcome: ProcessOutcome,
    pub request_bytes: usize,
    pub reply_bytes: usize,
}

/// Encoded response for one request frame.
#[derive(Debug)]
pub struct Response {
    pub outcome: ProcessOutcome,
    pub payload: Option<Vec<u8>>,
}

impl Response {
    fn silent() -> Self {
        Self {
            outcome: ProcessOutcome::Silent,
            payload: None,
        }
    }
}

#[derive(Debug)]
pub struct Processor {
    dispatcher: Dispatcher,
    max_message_size: usize,
}

impl Processor {
    pub fn new(dispatcher: Dispatcher) -> Self {
        for method in dispatcher.unhandled() {
            warn!(method, "declared method has no handler");
        }
        Self {
            dispatcher,
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }

    pub fn with_config(dispatcher: Dispatcher, config: &TransportConfig) -> Self {
        Self::new(dispatcher).with_max_message_size(config.max_message_size)
    }

    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    pub fn service(&self) -> &Arc<ServiceSpec> {
        self.dispatcher.service()
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Read one message from `input`, dispatch it and write any reply to `output`.
    pub fn process(
        &self,
        input: &mut dyn Transport,
        output: &mut dyn Transport,
    ) -> Result<Exchange> {
        let frame = self.read_request(input)?;
        self.answer(&frame, output)
    }

    /// [`Processor::process`] on a single bidirectional transport.
    pub fn process_duplex(&self, io: &mut dyn Transport) -> Result<Exchange> {
        let frame = self.read_request(io)?;
        self.answer(&frame, io)
    }

    fn read_request(&self, input: &mut dyn Transport) -> Result<Vec<u8>> {
        trace!(phase = ?Phase::AwaitingHeader);
        read_frame(input, self.max_message_size)
    }

    fn answer(&self, frame: &[u8], output: &mut dyn Transport) -> Result<Exchange> {
        let response = self.handle_frame(frame)?;
        write_response(output, frame.len(), response)
    }

    /// Produce the response bytes for one complete request frame.
    pub fn handle_frame(&self, frame: &[u8]) -> Result<Response> {
        trace!(phase = ?Phase::ReadingArgsBody, bytes = frame.len());
        let raw = match RawMessage::parse(frame) {
            Ok(raw) => raw,
            Err(e) => {
                let (name, seq_id) = salvage_header(frame);
                warn!(error = %e, method = %name, seq_id, "malformed envelope");
                if self.is_oneway(&name) {
                    return Ok(Response::silent());
                }
                return self.exception(&name, seq_id, ExceptionKind::ProtocolError, e.to_string());
            }
        };

        let MessageHeader { name, kind, seq_id } = raw.header.clone();
        let Some(method) = self.service().method(&name).cloned() else {
            debug!(method = %name, seq_id, "unknown method");
            if kind == MessageType::Oneway {
                return Ok(Response::silent());
            }
            return self.exception(
                &name,
                seq_id,
                ExceptionKind::UnknownMethod,
                format!("unknown method: {name}"),
            );
        };

        let oneway = method.is_oneway() || kind == MessageType::Oneway;
        if kind != MessageType::Call && kind != MessageType::Oneway {
            if oneway {
                return Ok(Response::silent());
            }
            return self.exception(
                &name,
                seq_id,
                ExceptionKind::InvalidMessageType,
                format!("expected CALL or ONEWAY, got {kind}"),
            );
        }

        let args = match raw.decode_body(method.args()) {
            Ok(message) => message.body,
            Err(e) => {
                warn!(method = %name, seq_id, error = %e, "failed to decode arguments");
                if oneway {
                    return Ok(Response::silent());
                }
                return self.exception(&name, seq_id, ExceptionKind::ProtocolError, e.to_string());
            }
        };

        trace!(phase = ?Phase::Dispatching, method = %name, seq_id);
        let dispatched = catch_unwind(AssertUnwindSafe(|| self.dispatcher.dispatch(&name, &args)))
            .unwrap_or_else(|_| Err(HandlerError::internal("handler panicked")));

        if oneway {
            if let Err(e) = dispatched {
                warn!(method = %name, error = %e, "oneway handler failed");
            }
            trace!(phase = ?Phase::Done);
            return Ok(Response::silent());
        }

        trace!(phase = ?Phase::WritingReply, method = %name, seq_id);
        match dispatched {
            Ok(ret) => match result_struct(&method, ret) {
                Ok(body) => self.reply(&name, seq_id, body),
                Err(message) => {
                    warn!(method = %name, error = %message, "handler returned an invalid result");
                    self.exception(&name, seq_id, ExceptionKind::InternalError, message)
                }
            },
            Err(HandlerError::Declared(exc)) => match declared_exception(&method, exc) {
                Ok(body) => self.reply(&name, seq_id, body),
                Err(message) => {
                    warn!(method = %name, error = %message, "undeclared exception");
                    self.exception(&name, seq_id, ExceptionKind::InternalError, message)
                }
            },
            Err(HandlerError::Application(exc)) => {
                debug!(method = %name, error = %exc, "handler raised application exception");
                let message = Message::new(
                    MessageHeader::new(name, MessageType::Exception, seq_id),
                    exc.to_struct(),
                );
                self.encode(message, ProcessOutcome::Raised)
            }
            Err(HandlerError::Internal(message)) => {
                warn!(method = %name, error = %message, "handler failed");
                self.exception(&name, seq_id, ExceptionKind::InternalError, message)
            }
        }
    }

    fn is_oneway(&self, name: &str) -> bool {
        self.service()
            .method(name)
            .is_some_and(|m| m.is_oneway())
    }

    fn reply(&self, name: &str, seq_id: i32, body: StructValue) -> Result<Response> {
        let message = Message::new(MessageHeader::new(name, MessageType::Reply, seq_id), body);
        match message.encode() {
            Ok(payload) => Ok(Response {
                outcome: ProcessOutcome::Replied,
                payload: Some(payload),
            }),
            Err(e) => {
                warn!(method = name, error = %e, "failed to encode reply");
                self.exception(name, seq_id, ExceptionKind::InternalError, e.to_string())
            }
        }
    }

    fn exception(
        &self,
        name: &str,
        seq_id: i32,
        kind: ExceptionKind,
        message: impl Into<String>,
    ) -> Result<Response> {
        let exc = ApplicationException::new(kind, message);
        self.encode(
            Message::new(
                MessageHeader::new(name, MessageType::Exception, seq_id),
                exc.to_struct(),
            ),
            ProcessOutcome::Raised,
        )
    }

    fn encode(&self, message: Message, outcome: ProcessOutcome) -> Result<Response> {
        Ok(Response {
            outcome,
            payload: Some(message.encode()?),
        })
    }
}

fn write_response(
    output: &mut dyn Transport,
    request_bytes: usize,
    response: Response,
) -> Result<Exchange> {
    let mut reply_bytes = 0;
    if let Some(payload) = &response.payload {
        output.write(payload)?;
        output.flush()?;
        reply_bytes = payload.len();
    }
    trace!(phase = ?Phase::Done, outcome = ?response.outcome);
    Ok(Exchange {
        outcome: response.outcome,
        request_bytes,
        reply_bytes,
    })
}

/// Wrap a return value at field id 0 of the method's result struct.
fn result_struct(method: &MethodSpec, ret: Option<Value>) -> std::result::Result<StructValue, String> {
    let mut body = StructValue::new(method.result());
    match (method.result_type(), ret) {
        (Some(ty), Some(value)) => {
            if !value.conforms(ty) {
                return Err(format!(
                    "{} returned {}, declared {}",
                    method.name(),
                    value.tag(),
                    ty.tag()
                ));
            }
            body.insert_unchecked(RESULT_FIELD_ID, value);
        }
        // The caller reports MISSING_RESULT.
        (Some(_), None) => {}
        (None, Some(_)) => {
            debug!(method = method.name(), "discarding return value of void method");
        }
        (None, None) => {}
    }
    Ok(body)
}

/// Place a declared exception at its field id in the result struct.
fn declared_exception(method: &MethodSpec, exc: StructValue) -> std::result::Result<StructValue, String> {
    let field = method.exceptions().find(|f| match &f.ty {
        TypeSpec::Struct(spec) => exc.is_instance_of(spec),
        _ => false,
    });
    match field {
        Some(field) => {
            let mut body = StructValue::new(method.result());
            body.insert_unchecked(field.id, Value::Struct(exc));
            Ok(body)
        }
        None => Err(format!(
            "{} raised {}, which it does not declare",
            method.name(),
            exc.spec().name()
        )),
    }
}
