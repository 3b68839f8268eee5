//! # RPC Client
//!
//! Sends CALL (or ONEWAY) messages over any [`Transport`] and validates the
//! matching reply.
//!
//! ## Reply checks
//! - EXCEPTION replies surface as [`ProtocolError::Application`]
//! - A reply for another method is `WRONG_METHOD_NAME`
//! - A reply with another sequence id is `BAD_SEQUENCE_ID`
//! - A set declared exception field surfaces as [`ProtocolError::UserException`]
//! - A non-void method without a return value is `MISSING_RESULT`

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::config::MAX_MESSAGE_SIZE;
use crate::core::framing::read_frame;
use crate::core::schema::{MethodSpec, ServiceSpec, RESULT_FIELD_ID};
use crate::core::value::{StructValue, Value};
use crate::error::{ProtocolError, Result};
use crate::protocol::exception::{ApplicationException, ExceptionKind};
use crate::protocol::message::{Message, MessageHeader, MessageType, RawMessage};
use crate::transport::Transport;

#[derive(Debug)]
pub struct Client<T: Transport> {
    service: Arc<ServiceSpec>,
    transport: T,
    seq_id: i32,
    max_message_size: usize,
}

impl<T: Transport> Client<T> {
    pub fn new(service: Arc<ServiceSpec>, transport: T) -> Self {
        Self {
            service,
            transport,
            seq_id: 0,
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }

    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    pub fn service(&self) -> &Arc<ServiceSpec> {
        &self.service
    }

    /// Sequence id of the most recent call.
    pub fn last_seq_id(&self) -> i32 {
        self.seq_id
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Close the underlying transport.
    pub fn close(&mut self) -> Result<()> {
        self.transport.close()
    }

    /// Build the argument struct for `method`, one value per declared argument.
    pub fn args<I, V>(&self, method: &str, values: I) -> Result<StructValue>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        StructValue::positional(self.method(method)?.args(), values)
    }

    /// Invoke `method`. Returns the return value, or `None` for void and
    /// oneway methods.
    #[instrument(skip(self, args), fields(service = %self.service.name()))]
    pub fn call(&mut self, method: &str, args: StructValue) -> Result<Option<Value>> {
        let spec = Arc::clone(self.method(method)?);
        if !args.is_instance_of(spec.args()) {
            return Err(ProtocolError::mismatch(
                spec.args().name(),
                args.spec().name(),
            ));
        }

        self.seq_id = self.seq_id.wrapping_add(1);
        let kind = if spec.is_oneway() {
            MessageType::Oneway
        } else {
            MessageType::Call
        };
        let request = Message::new(MessageHeader::new(method, kind, self.seq_id), args);
        self.transport.write(&request.encode()?)?;
        self.transport.flush()?;
        debug!(seq_id = self.seq_id, %kind, "request sent");

        if spec.is_oneway() {
            return Ok(None);
        }
        self.receive(&spec)
    }

    /// Positional [`Client::call`].
    pub fn call_with<I, V>(&mut self, method: &str, values: I) -> Result<Option<Value>>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let args = self.args(method, values)?;
        self.call(method, args)
    }

    fn method(&self, name: &str) -> Result<&Arc<MethodSpec>> {
        self.service.method(name).ok_or_else(|| {
            ProtocolError::UnknownMethod(format!(
                "{} does not declare '{name}'",
                self.service.name()
            ))
        })
    }

    fn receive(&mut self, method: &MethodSpec) -> Result<Option<Value>> {
        let frame = read_frame(&mut self.transport, self.max_message_size)?;
        let raw = RawMessage::parse(&frame)?;
        let header = raw.header.clone();

        // Server-side failures may carry a salvaged header, so they are
        // reported before the header checks.
        if header.kind == MessageType::Exception {
            let body = raw.decode_body(ApplicationException::spec())?.body;
            return Err(ProtocolError::Application(ApplicationException::from_struct(
                &body,
            )?));
        }
        if header.kind != MessageType::Reply {
            return Err(application(
                ExceptionKind::InvalidMessageType,
                format!("expected REPLY, got {}", header.kind),
            ));
        }
        if header.name != method.name() {
            return Err(application(
                ExceptionKind::WrongMethodName,
                format!("expected reply for {}, got {}", method.name(), header.name),
            ));
        }
        if header.seq_id != self.seq_id {
            return Err(application(
                ExceptionKind::BadSequenceId,
                format!("expected sequence id {}, got {}", self.seq_id, header.seq_id),
            ));
        }

        let mut result = raw.decode_body(method.result())?.body;
        if let Some(value) = result.get_id(RESULT_FIELD_ID).cloned() {
            return Ok(Some(value));
        }
        for field in method.exceptions() {
            if let Some(Value::Struct(exception)) = result.remove(&field.name) {
                return Err(ProtocolError::UserException {
                    method: method.name().to_string(),
                    field: field.name.clone(),
                    exception,
                });
            }
        }
        if method.result_type().is_none() {
            return Ok(None);
        }
        Err(application(
            ExceptionKind::MissingResult,
            format!("{} failed: unknown result", method.name()),
        ))
    }
}

fn application(kind: ExceptionKind, message: String) -> ProtocolError {
    ProtocolError::Application(ApplicationException::new(kind, message))
}
