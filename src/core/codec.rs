//! # JSON Value Codec
//!
//! Schema-guided mapping between [`Value`]s and the reference JSON grammar.
//!
//! ## Grammar
//! ```text
//! struct  = { "<id>": { "<tag>": payload }, ... }
//! list    = [ "<elemTag>", count, e1, e2, ... ]
//! set     = [ "<elemTag>", count, e1, e2, ... ]
//! map     = [ "<keyTag>", "<valTag>", count, { "<key>": value, ... } ]
//! bool    = 1 | 0
//! double  = number | "NaN" | "Infinity" | "-Infinity"
//! binary  = base64 string (standard alphabet, padded)
//! ```
//!
//! Container elements are bare payloads: the single-key `{tag: payload}`
//! wrapper only appears at struct-field level. Map keys are always strings.
//!
//! Both directions walk the schema, never the value alone: plain JSON cannot
//! tell a bool from a byte from a long.

use std::sync::Arc;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde_json::{Map, Number, Value as Json};
use tracing::trace;

use crate::core::schema::{StructSpec, TypeSpec, TypeTag};
use crate::core::value::{StructValue, Value};
use crate::error::{ProtocolError, Result};

/// Accepts base64 with or without trailing padding.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const NAN: &str = "NaN";
const INFINITY: &str = "Infinity";
const NEG_INFINITY: &str = "-Infinity";

/// Encode a struct as a JSON field object, fields in declaration order.
pub fn encode_struct(value: &StructValue) -> Result<Json> {
    let spec = value.spec();
    let mut object = Map::with_capacity(value.len());

    for field in spec.fields() {
        match value.get_id(field.id) {
            Some(v) => {
                let mut tagged = Map::with_capacity(1);
                tagged.insert(
                    field.ty.abbreviation().to_string(),
                    encode_value(v, &field.ty)?,
                );
                object.insert(field.id.to_string(), Json::Object(tagged));
            }
            None if field.is_required() => {
                return Err(ProtocolError::Encode(format!(
                    "{}.{} is required but unset",
                    spec.name(),
                    field.name
                )));
            }
            None => {}
        }
    }

    Ok(Json::Object(object))
}

/// Encode one value as a bare payload of type `ty`.
pub fn encode_value(value: &Value, ty: &TypeSpec) -> Result<Json> {
    let json = match (ty, value) {
        (TypeSpec::Bool, Value::Bool(b)) => Json::from(u8::from(*b)),
        (TypeSpec::Byte, Value::Byte(n)) => Json::from(*n),
        (TypeSpec::I16, Value::I16(n)) => Json::from(*n),
        (TypeSpec::I32, Value::I32(n)) => Json::from(*n),
        (TypeSpec::I64, Value::I64(n)) => Json::from(*n),
        (TypeSpec::Double, Value::Double(d)) => encode_double(*d),
        (TypeSpec::String, Value::String(s)) => Json::String(s.clone()),
        (TypeSpec::Binary, Value::Binary(b)) => Json::String(STANDARD.encode(b)),
        (TypeSpec::Struct(spec), Value::Struct(s)) => {
            if !s.is_instance_of(spec) {
                return Err(ProtocolError::Encode(format!(
                    "expected struct {}, got {}",
                    spec.name(),
                    s.spec().name()
                )));
            }
            encode_struct(s)?
        }
        (TypeSpec::List(elem), Value::List(items)) | (TypeSpec::Set(elem), Value::Set(items)) => {
            let mut array = Vec::with_capacity(items.len() + 2);
            array.push(Json::from(elem.abbreviation()));
            array.push(Json::from(items.len()));
            for item in items {
                array.push(encode_value(item, elem)?);
            }
            Json::Array(array)
        }
        (TypeSpec::Map(key_ty, val_ty), Value::Map(pairs)) => {
            let mut object = Map::with_capacity(pairs.len());
            for (k, v) in pairs {
                let key = encode_key(k, key_ty)?;
                if object.insert(key.clone(), encode_value(v, val_ty)?).is_some() {
                    return Err(ProtocolError::Encode(format!(
                        "map keys collide after stringification: \"{key}\""
                    )));
                }
            }
            Json::Array(vec![
                Json::from(key_ty.abbreviation()),
                Json::from(val_ty.abbreviation()),
                Json::from(pairs.len()),
                Json::Object(object),
            ])
        }
        (ty, value) => {
            return Err(ProtocolError::Encode(format!(
                "value of type {} does not match declared type {}",
                value.tag(),
                ty.tag()
            )));
        }
    };
    Ok(json)
}

fn encode_double(d: f64) -> Json {
    match Number::from_f64(d) {
        Some(n) => Json::Number(n),
        None if d.is_nan() => Json::from(NAN),
        None if d > 0.0 => Json::from(INFINITY),
        None => Json::from(NEG_INFINITY),
    }
}

/// Stringify a map key.
fn encode_key(key: &Value, ty: &TypeSpec) -> Result<String> {
    match encode_value(key, ty)? {
        Json::String(s) => Ok(s),
        Json::Number(n) => Ok(n.to_string()),
        _ => Err(ProtocolError::Encode(format!(
            "map keys of type {} are not supported",
            ty.tag()
        ))),
    }
}

/// Decode a JSON field object against `spec`.
///
/// Fields are resolved by id; object key order is irrelevant and unknown
/// ids are skipped.
pub fn decode_struct(json: &Json, spec: &Arc<StructSpec>) -> Result<StructValue> {
    let object = json
        .as_object()
        .ok_or_else(|| ProtocolError::mismatch(format!("{} object", spec.name()), kind(json)))?;
    let mut value = StructValue::new(spec);

    for (key, tagged) in object {
        let id: i16 = key.parse().map_err(|_| {
            ProtocolError::InvalidValue(format!("field key \"{key}\" is not a field id"))
        })?;
        let Some(field) = spec.field(id) else {
            trace!(struct_name = spec.name(), field_id = id, "skipping unknown field");
            continue;
        };

        let payload = untag(tagged, &field.ty)?;
        value.insert_unchecked(id, decode_value(payload, &field.ty)?);
    }

    if let Some(missing) = spec
        .fields()
        .iter()
        .find(|f| f.is_required() && !value.contains(f.id))
    {
        return Err(ProtocolError::MissingField {
            name: missing.name.clone(),
            id: missing.id,
        });
    }

    Ok(value)
}

/// Unwrap `{ "<tag>": payload }`, checking the tag against the schema.
fn untag<'a>(tagged: &'a Json, ty: &TypeSpec) -> Result<&'a Json> {
    let expected = ty.abbreviation();
    match tagged.as_object() {
        Some(object) if object.len() == 1 => {
            let (tag, payload) = object
                .iter()
                .next()
                .ok_or_else(|| ProtocolError::mismatch(expected, "empty object"))?;
            if tag == expected {
                Ok(payload)
            } else {
                Err(ProtocolError::mismatch(expected, tag.as_str()))
            }
        }
        _ => Err(ProtocolError::mismatch(
            format!("single-key {{\"{expected}\": ..}} object"),
            kind(tagged),
        )),
    }
}

/// Decode a bare payload of type `ty`.
pub fn decode_value(json: &Json, ty: &TypeSpec) -> Result<Value> {
    let value = match ty {
        TypeSpec::Bool => match json {
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => match n.as_i64() {
                Some(0) => Value::Bool(false),
                Some(1) => Value::Bool(true),
                _ => return Err(ProtocolError::InvalidValue(format!("{n} is not a bool"))),
            },
            other => return Err(ProtocolError::mismatch("bool", kind(other))),
        },
        TypeSpec::Byte => Value::Byte(decode_int(json, TypeTag::Byte)?),
        TypeSpec::I16 => Value::I16(decode_int(json, TypeTag::I16)?),
        TypeSpec::I32 => Value::I32(decode_int(json, TypeTag::I32)?),
        TypeSpec::I64 => Value::I64(decode_int(json, TypeTag::I64)?),
        TypeSpec::Double => match json {
            Json::Number(n) => Value::Double(
                n.as_f64()
                    .ok_or_else(|| ProtocolError::InvalidValue(format!("{n} is not a double")))?,
            ),
            Json::String(s) => Value::Double(parse_special_double(s)?),
            other => return Err(ProtocolError::mismatch("double", kind(other))),
        },
        TypeSpec::String => match json {
            Json::String(s) => Value::String(s.clone()),
            other => return Err(ProtocolError::mismatch("string", kind(other))),
        },
        TypeSpec::Binary => match json {
            Json::String(s) => Value::Binary(decode_base64(s)?),
            other => return Err(ProtocolError::mismatch("base64 string", kind(other))),
        },
        TypeSpec::Struct(spec) => Value::Struct(decode_struct(json, spec)?),
        TypeSpec::List(elem) => Value::List(decode_sequence(json, elem)?),
        TypeSpec::Set(elem) => Value::Set(decode_sequence(json, elem)?),
        TypeSpec::Map(key_ty, val_ty) => decode_map(json, key_ty, val_ty)?,
    };
    Ok(value)
}

/// `[elemTag, count, e1, e2, ...]`
fn decode_sequence(json: &Json, elem: &TypeSpec) -> Result<Vec<Value>> {
    let array = json
        .as_array()
        .ok_or_else(|| ProtocolError::mismatch("container array", kind(json)))?;
    let (header, items) = match array.as_slice() {
        [tag, count, items @ ..] => ((tag, count), items),
        _ => {
            return Err(ProtocolError::InvalidValue(
                "container array needs an element tag and a count".to_string(),
            ))
        }
    };

    expect_tag(header.0, elem)?;
    check_count(header.1, items.len())?;
    items.iter().map(|item| decode_value(item, elem)).collect()
}

/// `[keyTag, valueTag, count, {key: value, ...}]`
fn decode_map(json: &Json, key_ty: &TypeSpec, val_ty: &TypeSpec) -> Result<Value> {
    let array = json
        .as_array()
        .ok_or_else(|| ProtocolError::mismatch("map array", kind(json)))?;
    let [key_tag, val_tag, count, entries] = array.as_slice() else {
        return Err(ProtocolError::InvalidValue(format!(
            "map array must have 4 elements, found {}",
            array.len()
        )));
    };

    expect_tag(key_tag, key_ty)?;
    expect_tag(val_tag, val_ty)?;
    let entries = entries
        .as_object()
        .ok_or_else(|| ProtocolError::mismatch("map entry object", kind(entries)))?;
    check_count(count, entries.len())?;

    let pairs = entries
        .iter()
        .map(|(k, v)| Ok((decode_key(k, key_ty)?, decode_value(v, val_ty)?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::Map(pairs))
}

/// Convert a stringified map key back to its declared type.
fn decode_key(key: &str, ty: &TypeSpec) -> Result<Value> {
    let invalid = || ProtocolError::InvalidValue(format!("map key \"{key}\" is not a valid {}", ty.tag()));
    let value = match ty {
        TypeSpec::Bool => match key {
            "1" | "true" => Value::Bool(true),
            "0" | "false" => Value::Bool(false),
            _ => return Err(invalid()),
        },
        TypeSpec::Byte => Value::Byte(key.parse().map_err(|_| invalid())?),
        TypeSpec::I16 => Value::I16(key.parse().map_err(|_| invalid())?),
        TypeSpec::I32 => Value::I32(key.parse().map_err(|_| invalid())?),
        TypeSpec::I64 => Value::I64(key.parse().map_err(|_| invalid())?),
        TypeSpec::Double => match parse_special_double(key) {
            Ok(d) => Value::Double(d),
            Err(_) => Value::Double(key.parse().map_err(|_| invalid())?),
        },
        TypeSpec::String => Value::String(key.to_string()),
        TypeSpec::Binary => Value::Binary(decode_base64(key)?),
        _ => {
            return Err(ProtocolError::InvalidValue(format!(
                "map keys of type {} are not supported",
                ty.tag()
            )))
        }
    };
    Ok(value)
}

fn decode_int<T: TryFrom<i64>>(json: &Json, tag: TypeTag) -> Result<T> {
    let n = match json {
        Json::Number(n) => n,
        other => return Err(ProtocolError::mismatch(tag.name(), kind(other))),
    };
    n.as_i64()
        .and_then(|v| T::try_from(v).ok())
        .ok_or_else(|| ProtocolError::InvalidValue(format!("{n} is out of range for {tag}")))
}

fn parse_special_double(s: &str) -> Result<f64> {
    match s {
        NAN => Ok(f64::NAN),
        INFINITY => Ok(f64::INFINITY),
        NEG_INFINITY => Ok(f64::NEG_INFINITY),
        _ => Err(ProtocolError::InvalidValue(format!("\"{s}\" is not a double"))),
    }
}

fn decode_base64(s: &str) -> Result<Vec<u8>> {
    LENIENT_BASE64
        .decode(s)
        .map_err(|e| ProtocolError::InvalidValue(format!("invalid base64: {e}")))
}

fn expect_tag(json: &Json, ty: &TypeSpec) -> Result<()> {
    let expected = ty.abbreviation();
    match json.as_str() {
        Some(tag) if tag == expected => Ok(()),
        Some(tag) => Err(ProtocolError::mismatch(expected, tag)),
        None => Err(ProtocolError::mismatch(
            format!("element tag \"{expected}\""),
            kind(json),
        )),
    }
}

fn check_count(json: &Json, actual: usize) -> Result<()> {
    let declared = json
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| ProtocolError::InvalidValue(format!("container count {json} is invalid")))?;
    if declared == actual {
        Ok(())
    } else {
        Err(ProtocolError::CountMismatch { declared, actual })
    }
}

/// JSON kind name for error messages.
fn kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
