//! Property-based tests using proptest
//!
//! These tests validate codec and framing invariants across a wide range of
//! randomly generated values and byte streams.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use proptest::prelude::*;
use thrift_json::core::codec::{decode_struct, encode_struct};
use thrift_json::core::framing::read_frame;
use thrift_json::protocol::RawMessage;
use thrift_json::{
    Dispatcher, MemoryBuffer, Message, MessageHeader, MessageType, MethodSpec, ProtocolError,
    Processor, ServiceSpec, StructSpec, StructValue, TypeSpec, Value,
};

fn item_spec() -> Arc<StructSpec> {
    StructSpec::builder("Item")
        .field(1, "label", TypeSpec::String)
        .field(2, "weight", TypeSpec::Double)
        .build()
        .unwrap()
}

fn record_spec(item: &Arc<StructSpec>) -> Arc<StructSpec> {
    StructSpec::builder("Record")
        .field(1, "flag", TypeSpec::Bool)
        .field(2, "small", TypeSpec::Byte)
        .field(3, "short", TypeSpec::I16)
        .field(4, "int", TypeSpec::I32)
        .field(5, "long", TypeSpec::I64)
        .field(6, "real", TypeSpec::Double)
        .field(7, "text", TypeSpec::String)
        .field(8, "blob", TypeSpec::Binary)
        .field(9, "names", TypeSpec::list(TypeSpec::String))
        .field(10, "ids", TypeSpec::set(TypeSpec::I16))
        .field(11, "lookup", TypeSpec::map(TypeSpec::I32, TypeSpec::String))
        .field(12, "switches", TypeSpec::map(TypeSpec::Bool, TypeSpec::I64))
        .field(13, "items", TypeSpec::list(TypeSpec::structure(item)))
        .field(14, "grid", TypeSpec::list(TypeSpec::list(TypeSpec::Double)))
        .build()
        .unwrap()
}

/// Doubles that compare equal to themselves.
fn real() -> impl Strategy<Value = f64> {
    prop::num::f64::NORMAL
        | prop::num::f64::SUBNORMAL
        | prop::num::f64::ZERO
        | prop::num::f64::INFINITE
}

fn item(spec: Arc<StructSpec>) -> impl Strategy<Value = Value> {
    (".{0,12}", real()).prop_map(move |(label, weight)| {
        let fields = [("label", Value::from(label)), ("weight", Value::from(weight))];
        Value::Struct(StructValue::from_named(&spec, fields).unwrap())
    })
}

/// Records with an arbitrary subset of fields set.
fn record() -> impl Strategy<Value = StructValue> {
    let item_spec = item_spec();
    let spec = record_spec(&item_spec);

    let scalars = (
        any::<bool>(),
        any::<i8>(),
        any::<i16>(),
        any::<i32>(),
        any::<i64>(),
        real(),
        any::<String>(),
        prop::collection::vec(any::<u8>(), 0..64),
    );
    let containers = (
        prop::collection::vec(".{0,8}", 0..6),
        prop::collection::btree_set(any::<i16>(), 0..8),
        prop::collection::btree_map(any::<i32>(), ".{0,8}", 0..6),
        prop::collection::btree_map(any::<bool>(), any::<i64>(), 0..3),
        prop::collection::vec(item(item_spec), 0..4),
        prop::collection::vec(prop::collection::vec(real(), 0..4), 0..4),
    );
    let present = prop::collection::vec(any::<bool>(), 14);

    (scalars, containers, present).prop_map(move |(s, c, present)| {
        let values: Vec<Value> = vec![
            s.0.into(),
            s.1.into(),
            s.2.into(),
            s.3.into(),
            s.4.into(),
            s.5.into(),
            s.6.into(),
            Value::binary(s.7),
            Value::list(c.0),
            Value::set(c.1),
            Value::map(c.2),
            Value::map(c.3),
            Value::list(c.4),
            Value::list(c.5.into_iter().map(Value::list)),
        ];
        let mut record = StructValue::new(&spec);
        for ((id, value), keep) in (1i16..).zip(values).zip(present) {
            if keep {
                record.insert_id(id, value).unwrap();
            }
        }
        record
    })
}

fn message_type() -> impl Strategy<Value = MessageType> {
    prop_oneof![
        Just(MessageType::Call),
        Just(MessageType::Reply),
        Just(MessageType::Exception),
        Just(MessageType::Oneway),
    ]
}

// Property: Any struct value survives encode then decode
proptest! {
    #[test]
    fn prop_struct_roundtrip(value in record()) {
        let json = encode_struct(&value).expect("Encoding should not fail");
        let decoded = decode_struct(&json, value.spec()).expect("Decoding should not fail");
        prop_assert_eq!(decoded, value);
    }
}

// Property: Encoding is deterministic
proptest! {
    #[test]
    fn prop_encoding_deterministic(value in record()) {
        let first = serde_json::to_vec(&encode_struct(&value).unwrap()).unwrap();
        let second = serde_json::to_vec(&encode_struct(&value).unwrap()).unwrap();
        prop_assert_eq!(first, second);
    }
}

// Property: Envelope header fields survive the wire
proptest! {
    #[test]
    fn prop_envelope_roundtrip(
        name in "[A-Za-z_][A-Za-z0-9_]{0,24}",
        kind in message_type(),
        seq_id in any::<i32>(),
        body in record(),
    ) {
        let message = Message::new(MessageHeader::new(name, kind, seq_id), body);
        let bytes = message.encode().unwrap();
        let decoded = Message::decode(&bytes, message.body.spec()).unwrap();
        prop_assert_eq!(decoded, message);
    }
}

// Property: Back-to-back frames are split exactly at message boundaries
proptest! {
    #[test]
    fn prop_frames_split_on_boundaries(
        bodies in prop::collection::vec(record(), 1..5),
        gaps in prop::collection::vec("[ \t\r\n]{0,3}", 5),
    ) {
        let frames: Vec<Vec<u8>> = bodies
            .into_iter()
            .enumerate()
            .map(|(i, body)| {
                let header = MessageHeader::new("put", MessageType::Call, i as i32);
                Message::new(header, body).encode().unwrap()
            })
            .collect();

        let mut stream = Vec::new();
        for (frame, gap) in frames.iter().zip(&gaps) {
            stream.extend_from_slice(gap.as_bytes());
            stream.extend_from_slice(frame);
        }

        let mut input = MemoryBuffer::from(stream);
        for frame in &frames {
            let read = read_frame(&mut input, usize::MAX).unwrap();
            prop_assert_eq!(&read, frame);
        }
        prop_assert!(matches!(
            read_frame(&mut input, usize::MAX),
            Err(ProtocolError::ConnectionClosed)
        ));
    }
}

// Property: A frame truncated anywhere is never returned as complete
proptest! {
    #[test]
    fn prop_truncated_frame_is_error(body in record(), cut in any::<prop::sample::Index>()) {
        let bytes = Message::new(MessageHeader::new("put", MessageType::Call, 1), body)
            .encode()
            .unwrap();
        let cut = cut.index(bytes.len());
        let mut input = MemoryBuffer::from(&bytes[..cut]);
        prop_assert!(read_frame(&mut input, usize::MAX).is_err());
    }
}

// Property: Parsing arbitrary bytes returns an error instead of panicking
proptest! {
    #[test]
    fn prop_parse_arbitrary_bytes(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = RawMessage::parse(&data);
    }
}

// Property: The processor answers any JSON frame without failing
proptest! {
    #[test]
    fn prop_processor_handles_arbitrary_envelopes(
        version in -2i64..3,
        name in prop_oneof![Just("echo".to_string()), ".{0,8}"],
        kind in -1i64..6,
        seq_id in any::<i32>(),
        text in any::<String>(),
    ) {
        let service = ServiceSpec::builder("Echo")
            .method(
                MethodSpec::builder("echo")
                    .arg("text", TypeSpec::String)
                    .returns(TypeSpec::String)
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();
        let dispatcher = Dispatcher::new(service)
            .with("echo", |args| Ok(args.get("text").cloned()))
            .unwrap();
        let processor = Processor::new(dispatcher);

        let frame = serde_json::to_vec(&serde_json::json!(
            [version, name, kind, seq_id, {"1": {"str": text}}]
        ))
        .unwrap();
        let response = processor.handle_frame(&frame).unwrap();
        if let Some(payload) = response.payload {
            let raw = RawMessage::parse(&payload).unwrap();
            prop_assert_eq!(raw.header.seq_id, seq_id);
            prop_assert!(matches!(raw.header.kind, MessageType::Reply | MessageType::Exception));
        }
    }
}
