//! Payloads produced by Apache Thrift's `TJSONProtocol`.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

mod common;

use serde_json::Value as Json;
use thrift_json::core::codec::encode_struct;
use thrift_json::protocol::RawMessage;
use thrift_json::{MemoryBuffer, MessageType, ProcessOutcome, Processor, Value};

use common::{client_object, identity_dispatcher, load_vector, reference_object, schema};

#[test]
fn test_decode_reference_request() {
    let s = schema();
    let bytes = load_vector("apache_request.json");

    let raw = RawMessage::parse(bytes.as_bytes()).unwrap();
    assert_eq!(raw.header.name, "test");
    assert_eq!(raw.header.kind, MessageType::Call);
    assert_eq!(raw.header.seq_id, 0);

    let method = s.service.method("test").unwrap();
    let message = raw.decode_body(method.args()).unwrap();
    let decoded = message.body.get("t").unwrap();
    assert_eq!(decoded, &Value::Struct(reference_object(&s)));
}

#[test]
fn test_binary_field_keeps_exact_bytes() {
    let s = schema();
    let bytes = load_vector("apache_request.json");
    let method = s.service.method("test").unwrap();
    let message = RawMessage::parse(bytes.as_bytes())
        .unwrap()
        .decode_body(method.args())
        .unwrap();

    let t = message.body.get("t").and_then(Value::as_struct).unwrap();
    assert_eq!(
        t.get("tbinary").and_then(Value::as_bytes),
        Some(common::REFERENCE_BINARY)
    );
}

#[test]
fn test_reencoded_arguments_match_reference_tree() {
    let s = schema();
    let bytes = load_vector("apache_request.json");
    let method = s.service.method("test").unwrap();
    let message = RawMessage::parse(bytes.as_bytes())
        .unwrap()
        .decode_body(method.args())
        .unwrap();

    let expected: Json = serde_json::from_str(&bytes).unwrap();
    assert_eq!(encode_struct(&message.body).unwrap(), expected[4]);
}

#[test]
fn test_reply_field_zero_matches_request_field_one() {
    let s = schema();
    let bytes = load_vector("apache_request.json");
    let processor = Processor::new(identity_dispatcher(&s));

    let mut input = MemoryBuffer::from(bytes.as_bytes());
    let mut output = MemoryBuffer::new();
    let exchange = processor.process(&mut input, &mut output).unwrap();
    assert_eq!(exchange.outcome, ProcessOutcome::Replied);

    let request: Json = serde_json::from_str(&bytes).unwrap();
    let reply: Json = serde_json::from_slice(output.as_bytes()).unwrap();
    assert_eq!(reply[0], 1);
    assert_eq!(reply[1], "test");
    assert_eq!(reply[2], MessageType::Reply.as_i64());
    assert_eq!(reply[3], request[3]);
    assert_eq!(request[4]["1"], reply[4]["0"]);
}

#[test]
fn test_decode_is_driven_by_field_id_not_key_order() {
    let s = schema();
    let bytes = load_vector("client_request.json");
    let method = s.service.method("test").unwrap();
    let message = RawMessage::parse(bytes.as_bytes())
        .unwrap()
        .decode_body(method.args())
        .unwrap();

    assert_eq!(
        message.body.get("t"),
        Some(&Value::Struct(client_object(&s)))
    );
}
