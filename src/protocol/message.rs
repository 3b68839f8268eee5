//! # Message Envelope
//!
//! `[version, methodName, messageKind, seqId, body]`
//!
//! Decoding happens in two steps because the body's schema depends on the
//! method name: [`RawMessage::parse`] validates the envelope and keeps the body
//! as parsed JSON, then [`RawMessage::decode_body`] resolves it against the
//! argument or result struct once the caller has looked the method up.

use std::fmt;
use std::sync::Arc;

use serde_json::Value as Json;

use crate::core::codec::{decode_struct, encode_struct};
use crate::core::schema::StructSpec;
use crate::core::value::StructValue;
use crate::error::{constants, ProtocolError, Result};

/// Version marker carried as the first envelope element.
pub const PROTOCOL_VERSION: i64 = 1;

/// Kind of message carried by an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Call = 1,
    Reply = 2,
    Exception = 3,
    Oneway = 4,
}

impl MessageType {
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(MessageType::Call),
            2 => Some(MessageType::Reply),
            3 => Some(MessageType::Exception),
            4 => Some(MessageType::Oneway),
            _ => None,
        }
    }

    pub fn as_i64(self) -> i64 {
        self as i64
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageType::Call => "CALL",
            MessageType::Reply => "REPLY",
            MessageType::Exception => "EXCEPTION",
            MessageType::Oneway => "ONEWAY",
        };
        f.write_str(name)
    }
}

/// Envelope fields preceding the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub name: String,
    pub kind: MessageType,
    pub seq_id: i32,
}

impl MessageHeader {
    pub fn new(name: impl Into<String>, kind: MessageType, seq_id: i32) -> Self {
        Self {
            name: name.into(),
            kind,
            seq_id,
        }
    }
}

/// A complete protocol message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub header: MessageHeader,
    pub body: StructValue,
}

impl Message {
    pub fn new(header: MessageHeader, body: StructValue) -> Self {
        Self { header, body }
    }

    /// Encode as the envelope tree.
    pub fn to_json(&self) -> Result<Json> {
        Ok(Json::Array(vec![
            Json::from(PROTOCOL_VERSION),
            Json::from(self.header.name.as_str()),
            Json::from(self.header.kind.as_i64()),
            Json::from(self.header.seq_id),
            encode_struct(&self.body)?,
        ]))
    }

    /// Encode to wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.to_json()?)?)
    }

    /// Decode wire bytes whose body is described by `body_spec`.
    pub fn decode(bytes: &[u8], body_spec: &Arc<StructSpec>) -> Result<Self> {
        RawMessage::parse(bytes)?.decode_body(body_spec)
    }
}

/// An envelope whose body has not been resolved against a schema yet.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub header: MessageHeader,
    body: Json,
}

impl RawMessage {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let json: Json = serde_json::from_slice(bytes)?;
        Self::from_json(json)
    }

    pub fn from_json(json: Json) -> Result<Self> {
        let Json::Array(items) = json else {
            return Err(invalid(constants::ERR_NOT_AN_ARRAY));
        };
        let Ok([version, name, kind, seq_id, body]) = <[Json; 5]>::try_from(items) else {
            return Err(invalid(constants::ERR_ENVELOPE_ARITY));
        };

        if version.as_i64() != Some(PROTOCOL_VERSION) {
            return Err(ProtocolError::InvalidEnvelope(format!(
                "{}: {version}",
                constants::ERR_BAD_VERSION
            )));
        }
        let Json::String(name) = name else {
            return Err(invalid(constants::ERR_BAD_METHOD_NAME));
        };
        let kind = kind
            .as_i64()
            .and_then(MessageType::from_i64)
            .ok_or_else(|| {
                ProtocolError::InvalidEnvelope(format!("{}: {kind}", constants::ERR_BAD_MESSAGE_TYPE))
            })?;
        let seq_id = seq_id
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .ok_or_else(|| invalid(constants::ERR_BAD_SEQUENCE_ID))?;

        Ok(Self {
            header: MessageHeader { name, kind, seq_id },
            body,
        })
    }

    pub fn body(&self) -> &Json {
        &self.body
    }

    pub fn decode_body(self, spec: &Arc<StructSpec>) -> Result<Message> {
        let body = decode_struct(&self.body, spec)?;
        Ok(Message {
            header: self.header,
            body,
        })
    }
}

/// Best-effort header recovery from an envelope that failed validation,
/// so an error reply can still echo the caller's method and sequence id.
pub(crate) fn salvage_header(bytes: &[u8]) -> (String, i32) {
    let Ok(Json::Array(items)) = serde_json::from_slice::<Json>(bytes) else {
        return (String::new(), 0);
    };
    let name = items
        .get(1)
        .and_then(Json::as_str)
        .unwrap_or_default()
        .to_string();
    let seq_id = items
        .get(3)
        .and_then(Json::as_i64)
        .and_then(|n| i32::try_from(n).ok())
        .unwrap_or(0);
    (name, seq_id)
}

fn invalid(message: &str) -> ProtocolError {
    ProtocolError::InvalidEnvelope(message.to_string())
}
