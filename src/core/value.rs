//! # Value Model
//!
//! In-memory tagged representation of every wire-representable value.
//!
//! Values are created per call and discarded once their message completes.
//! Equality is structural: struct values compare field ids and field values,
//! sets and maps compare as unordered collections, lists compare in order.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::schema::{StructSpec, TypeSpec, TypeTag};
use crate::error::{ProtocolError, Result};

/// A single wire value.
#[derive(Debug, Clone)]
pub enum Value {
    Bool(bool),
    Byte(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Double(f64),
    String(String),
    Binary(Vec<u8>),
    Struct(StructValue),
    List(Vec<Value>),
    Set(Vec<Value>),
    Map(Vec<(Value, Value)>),
}

impl Value {
    pub fn binary(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Binary(bytes.into())
    }

    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    /// Build a set. Elements equal to an earlier element are dropped.
    ///
    /// Sets of integers, strings or binaries are deduplicated by sorting;
    /// other element types fall back to a linear scan per element.
    pub fn set<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        let Some(firsts) = first_of_each_key(&items, |v| v) else {
            let mut elems: Vec<Value> = Vec::with_capacity(items.len());
            for item in items {
                if !elems.contains(&item) {
                    elems.push(item);
                }
            }
            return Value::Set(elems);
        };

        let mut keep = vec![false; items.len()];
        for (first, _) in firsts {
            keep[first] = true;
        }
        let elems = items
            .into_iter()
            .zip(keep)
            .filter_map(|(item, keep)| keep.then_some(item))
            .collect();
        Value::Set(elems)
    }

    /// Build a map. A later entry replaces an earlier one with an equal key.
    ///
    /// The entry keeps the position of the first occurrence of its key.
    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Value>,
        V: Into<Value>,
    {
        let entries: Vec<(Value, Value)> =
            entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        let Some(mut slots) = first_of_each_key(&entries, |(k, _)| k) else {
            let mut pairs: Vec<(Value, Value)> = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                match pairs.iter_mut().find(|(existing, _)| *existing == k) {
                    Some(slot) => slot.1 = v,
                    None => pairs.push((k, v)),
                }
            }
            return Value::Map(pairs);
        };

        slots.sort_unstable();
        let mut entries: Vec<Option<(Value, Value)>> = entries.into_iter().map(Some).collect();
        let mut pairs = Vec::with_capacity(slots.len());
        // Equal scalar keys are identical, so the last entry can stand in for the first.
        for (_, last) in slots {
            if let Some(pair) = entries[last].take() {
                pairs.push(pair);
            }
        }
        Value::Map(pairs)
    }

    pub fn tag(&self) -> TypeTag {
        match self {
            Value::Bool(_) => TypeTag::Bool,
            Value::Byte(_) => TypeTag::Byte,
            Value::I16(_) => TypeTag::I16,
            Value::I32(_) => TypeTag::I32,
            Value::I64(_) => TypeTag::I64,
            Value::Double(_) => TypeTag::Double,
            Value::String(_) => TypeTag::String,
            Value::Binary(_) => TypeTag::Binary,
            Value::Struct(_) => TypeTag::Struct,
            Value::List(_) => TypeTag::List,
            Value::Set(_) => TypeTag::Set,
            Value::Map(_) => TypeTag::Map,
        }
    }

    /// Deep check that this value can be encoded as `ty`.
    pub fn conforms(&self, ty: &TypeSpec) -> bool {
        match (self, ty) {
            (Value::Bool(_), TypeSpec::Bool)
            | (Value::Byte(_), TypeSpec::Byte)
            | (Value::I16(_), TypeSpec::I16)
            | (Value::I32(_), TypeSpec::I32)
            | (Value::I64(_), TypeSpec::I64)
            | (Value::Double(_), TypeSpec::Double)
            | (Value::String(_), TypeSpec::String)
            | (Value::Binary(_), TypeSpec::Binary) => true,
            (Value::Struct(s), TypeSpec::Struct(spec)) => s.is_instance_of(spec),
            (Value::List(items), TypeSpec::List(elem)) | (Value::Set(items), TypeSpec::Set(elem)) => {
                items.iter().all(|v| v.conforms(elem))
            }
            (Value::Map(pairs), TypeSpec::Map(k, v)) => {
                pairs.iter().all(|(key, val)| key.conforms(k) && val.conforms(v))
            }
            _ => false,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Any integer width widened to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Byte(n) => Some(i64::from(*n)),
            Value::I16(n) => Some(i64::from(*n)),
            Value::I32(n) => Some(i64::from(*n)),
            Value::I64(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::I16(a), Value::I16(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Binary(a), Value::Binary(b)) => a == b,
            (Value::Struct(a), Value::Struct(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => unordered_eq(a, b, |v| v),
            (Value::Map(a), Value::Map(b)) => unordered_eq(a, b, |(k, _)| k),
            _ => false,
        }
    }
}

/// Total ordering key for values whose equality is exact.
///
/// Doubles, structs and containers have none, so collections holding them
/// take the quadratic paths.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum ScalarKey<'a> {
    /// Variant discriminant and value; integer widths never compare equal.
    Int(u8, i64),
    Text(&'a str),
    Bytes(&'a [u8]),
}

impl Value {
    fn scalar_key(&self) -> Option<ScalarKey<'_>> {
        Some(match self {
            Value::Bool(b) => ScalarKey::Int(0, i64::from(*b)),
            Value::Byte(n) => ScalarKey::Int(1, i64::from(*n)),
            Value::I16(n) => ScalarKey::Int(2, i64::from(*n)),
            Value::I32(n) => ScalarKey::Int(3, i64::from(*n)),
            Value::I64(n) => ScalarKey::Int(4, *n),
            Value::String(s) => ScalarKey::Text(s),
            Value::Binary(b) => ScalarKey::Bytes(b),
            _ => return None,
        })
    }
}

/// `(first, last)` index of every distinct key, or `None` if some key is not a scalar.
fn first_of_each_key<T>(items: &[T], key: impl Fn(&T) -> &Value) -> Option<Vec<(usize, usize)>> {
    let mut seen: BTreeMap<ScalarKey<'_>, (usize, usize)> = BTreeMap::new();
    for (i, item) in items.iter().enumerate() {
        seen.entry(key(item).scalar_key()?)
            .and_modify(|slot| slot.1 = i)
            .or_insert((i, i));
    }
    Some(seen.into_values().collect())
}

/// Multiset equality. Scalar-keyed collections are compared after sorting;
/// anything else, including repeated keys, uses a pairwise scan.
fn unordered_eq<T: PartialEq>(a: &[T], b: &[T], key: impl Fn(&T) -> &Value) -> bool {
    if a.len() != b.len() {
        return false;
    }
    match (sorted_by_key(a, &key), sorted_by_key(b, &key)) {
        (Some(x), Some(y)) => x.iter().zip(&y).all(|((_, l), (_, r))| l == r),
        _ => unordered_eq_scan(a, b),
    }
}

/// Items sorted by scalar key, or `None` when a key is missing or repeated.
fn sorted_by_key<'a, T>(
    items: &'a [T],
    key: &impl Fn(&T) -> &Value,
) -> Option<Vec<(ScalarKey<'a>, &'a T)>> {
    let mut keyed = items
        .iter()
        .map(|item| Some((key(item).scalar_key()?, item)))
        .collect::<Option<Vec<_>>>()?;
    keyed.sort_unstable_by(|l, r| l.0.cmp(&r.0));
    if keyed.windows(2).any(|w| w[0].0 == w[1].0) {
        return None;
    }
    Some(keyed)
}

fn unordered_eq_scan<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    let mut used = vec![false; b.len()];
    a.iter().all(|x| {
        match b
            .iter()
            .enumerate()
            .position(|(i, y)| !used[i] && x == y)
        {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from_scalar! {
    bool => Bool,
    i8 => Byte,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f64 => Double,
    String => String,
    Vec<u8> => Binary,
    StructValue => Struct,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Binary(v.to_vec())
    }
}

/// A struct value: field id to value, plus the descriptor used to name fields.
#[derive(Debug, Clone)]
pub struct StructValue {
    spec: Arc<StructSpec>,
    fields: BTreeMap<i16, Value>,
}

impl StructValue {
    pub fn new(spec: &Arc<StructSpec>) -> Self {
        Self {
            spec: Arc::clone(spec),
            fields: BTreeMap::new(),
        }
    }

    /// Build from `(field name, value)` pairs.
    pub fn from_named<I, N, V>(spec: &Arc<StructSpec>, fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, V)>,
        N: AsRef<str>,
        V: Into<Value>,
    {
        let mut value = Self::new(spec);
        for (name, v) in fields {
            value.insert(name.as_ref(), v)?;
        }
        Ok(value)
    }

    /// Build from values in field declaration order.
    pub fn positional<I, V>(spec: &Arc<StructSpec>, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut value = Self::new(spec);
        let mut fields = spec.fields().iter();
        for v in values {
            let field = fields.next().ok_or_else(|| {
                ProtocolError::SchemaError(format!(
                    "{} takes {} fields",
                    spec.name(),
                    spec.fields().len()
                ))
            })?;
            value.insert_id(field.id, v)?;
        }
        Ok(value)
    }

    pub fn spec(&self) -> &Arc<StructSpec> {
        &self.spec
    }

    /// Set a field by name, returning the previous value.
    pub fn insert(&mut self, name: &str, value: impl Into<Value>) -> Result<Option<Value>> {
        let id = self
            .spec
            .field_by_name(name)
            .map(|f| f.id)
            .ok_or_else(|| {
                ProtocolError::SchemaError(format!("{} has no field '{name}'", self.spec.name()))
            })?;
        self.insert_id(id, value)
    }

    /// Set a field by id, returning the previous value.
    pub fn insert_id(&mut self, id: i16, value: impl Into<Value>) -> Result<Option<Value>> {
        let value = value.into();
        let field = self.spec.field(id).ok_or_else(|| {
            ProtocolError::SchemaError(format!("{} has no field id {id}", self.spec.name()))
        })?;
        if !value.conforms(&field.ty) {
            return Err(ProtocolError::SchemaError(format!(
                "{}.{} expects {}, got {}",
                self.spec.name(),
                field.name,
                field.ty.tag(),
                value.tag()
            )));
        }
        Ok(self.fields.insert(id, value))
    }

    /// Set a field by id after the caller has checked it against the schema.
    pub(crate) fn insert_unchecked(&mut self, id: i16, value: Value) {
        self.fields.insert(id, value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        let id = self.spec.field_by_name(name)?.id;
        self.fields.get(&id)
    }

    pub fn get_id(&self, id: i16) -> Option<&Value> {
        self.fields.get(&id)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let id = self.spec.field_by_name(name)?.id;
        self.fields.remove(&id)
    }

    pub fn contains(&self, id: i16) -> bool {
        self.fields.contains_key(&id)
    }

    /// Present fields in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (i16, &Value)> {
        self.fields.iter().map(|(id, v)| (*id, v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether this value was built against `spec` (same name and field ids).
    pub fn is_instance_of(&self, spec: &StructSpec) -> bool {
        std::ptr::eq(Arc::as_ptr(&self.spec), spec)
            || (self.spec.name() == spec.name() && self.spec.ids().eq(spec.ids()))
    }
}

impl PartialEq for StructValue {
    fn eq(&self, other: &Self) -> bool {
        self.spec.ids().eq(other.spec.ids()) && self.fields == other.fields
    }
}
