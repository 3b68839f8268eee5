//! Application exceptions: the body of an EXCEPTION message.
//!
//! Wire struct: `1: string message`, `2: i32 type`.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::core::schema::{FieldSpec, StructSpec, TypeSpec};
use crate::core::value::{StructValue, Value};
use crate::error::{ProtocolError, Result};

/// Exception kind codes shared with Apache Thrift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionKind {
    Unknown = 0,
    UnknownMethod = 1,
    InvalidMessageType = 2,
    WrongMethodName = 3,
    BadSequenceId = 4,
    MissingResult = 5,
    InternalError = 6,
    ProtocolError = 7,
    InvalidTransform = 8,
    InvalidProtocol = 9,
    UnsupportedClientType = 10,
}

impl ExceptionKind {
    /// Unrecognised codes map to [`ExceptionKind::Unknown`].
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => ExceptionKind::UnknownMethod,
            2 => ExceptionKind::InvalidMessageType,
            3 => ExceptionKind::WrongMethodName,
            4 => ExceptionKind::BadSequenceId,
            5 => ExceptionKind::MissingResult,
            6 => ExceptionKind::InternalError,
            7 => ExceptionKind::ProtocolError,
            8 => ExceptionKind::InvalidTransform,
            9 => ExceptionKind::InvalidProtocol,
            10 => ExceptionKind::UnsupportedClientType,
            _ => ExceptionKind::Unknown,
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationException {
    pub kind: ExceptionKind,
    pub message: String,
}

impl ApplicationException {
    pub fn new(kind: ExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Wire descriptor of the exception struct.
    pub fn spec() -> &'static Arc<StructSpec> {
        static SPEC: OnceLock<Arc<StructSpec>> = OnceLock::new();
        SPEC.get_or_init(|| {
            StructSpec::from_parts(
                "TApplicationException",
                vec![
                    FieldSpec::new(1, "message", TypeSpec::String),
                    FieldSpec::new(2, "type", TypeSpec::I32),
                ],
            )
        })
    }

    pub fn to_struct(&self) -> StructValue {
        let mut value = StructValue::new(Self::spec());
        value.insert_unchecked(1, Value::String(self.message.clone()));
        value.insert_unchecked(2, Value::I32(self.kind.code()));
        value
    }

    pub fn from_struct(value: &StructValue) -> Result<Self> {
        if !value.is_instance_of(Self::spec()) {
            return Err(ProtocolError::mismatch(
                "TApplicationException",
                value.spec().name(),
            ));
        }
        let message = value
            .get_id(1)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let kind = value
            .get_id(2)
            .and_then(Value::as_i64)
            .and_then(|code| i32::try_from(code).ok())
            .map_or(ExceptionKind::Unknown, ExceptionKind::from_code);
        Ok(Self { kind, message })
    }
}

impl fmt::Display for ApplicationException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({}): {}", self.kind, self.kind.code(), self.message)
    }
}

impl std::error::Error for ApplicationException {}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::codec::{decode_struct, encode_struct};
    use serde_json::json;

    #[test]
    fn test_exception_wire_shape() {
        let exc = ApplicationException::new(ExceptionKind::UnknownMethod, "no such method: nope");
        let json = encode_struct(&exc.to_struct()).unwrap();
        assert_eq!(
            json,
            json!({"1": {"str": "no such method: nope"}, "2": {"i32": 1}})
        );

        let decoded = decode_struct(&json, ApplicationException::spec()).unwrap();
        assert_eq!(ApplicationException::from_struct(&decoded).unwrap(), exc);
    }

    #[test]
    fn test_unknown_code_maps_to_unknown() {
        assert_eq!(ExceptionKind::from_code(99), ExceptionKind::Unknown);
        assert_eq!(ExceptionKind::ProtocolError.code(), 7);
    }
}
