//! # Schema Model
//!
//! Static descriptors for structs, fields, methods and services.
//!
//! A schema compiler (outside this crate) turns an IDL into these tables once at
//! startup. After construction every descriptor is immutable and shared behind
//! an [`Arc`], so the codec and the processor only ever perform plain lookups.
//!
//! ## Numbering
//! - User struct field ids are positive and unique within the struct
//! - Method arguments are numbered from 1 in declaration order
//! - A method result struct carries the return value at field id 0 and the
//!   declared exceptions from 1 upwards

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ProtocolError, Result};

/// Field id of the return value inside a result struct.
pub const RESULT_FIELD_ID: i16 = 0;

/// Name of the return value field inside a result struct.
pub const RESULT_FIELD_NAME: &str = "success";

/// Closed set of wire type markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Bool,
    Byte,
    I16,
    I32,
    I64,
    Double,
    String,
    Binary,
    Struct,
    Map,
    Set,
    List,
    Void,
}

impl TypeTag {
    /// Abbreviation used on the wire.
    ///
    /// String and binary share `str`; void never appears on the wire and
    /// reports an empty abbreviation.
    pub fn abbreviation(self) -> &'static str {
        match self {
            TypeTag::Bool => "tf",
            TypeTag::Byte => "i8",
            TypeTag::I16 => "i16",
            TypeTag::I32 => "i32",
            TypeTag::I64 => "i64",
            TypeTag::Double => "dbl",
            TypeTag::String | TypeTag::Binary => "str",
            TypeTag::Struct => "rec",
            TypeTag::Map => "map",
            TypeTag::Set => "set",
            TypeTag::List => "lst",
            TypeTag::Void => "",
        }
    }

    /// Parse a wire abbreviation. `str` resolves to [`TypeTag::String`].
    pub fn from_abbreviation(abbr: &str) -> Option<Self> {
        match abbr {
            "tf" => Some(TypeTag::Bool),
            "i8" => Some(TypeTag::Byte),
            "i16" => Some(TypeTag::I16),
            "i32" => Some(TypeTag::I32),
            "i64" => Some(TypeTag::I64),
            "dbl" => Some(TypeTag::Double),
            "str" => Some(TypeTag::String),
            "rec" => Some(TypeTag::Struct),
            "map" => Some(TypeTag::Map),
            "set" => Some(TypeTag::Set),
            "lst" => Some(TypeTag::List),
            _ => None,
        }
    }

    /// Human-readable name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Bool => "bool",
            TypeTag::Byte => "byte",
            TypeTag::I16 => "i16",
            TypeTag::I32 => "i32",
            TypeTag::I64 => "i64",
            TypeTag::Double => "double",
            TypeTag::String => "string",
            TypeTag::Binary => "binary",
            TypeTag::Struct => "struct",
            TypeTag::Map => "map",
            TypeTag::Set => "set",
            TypeTag::List => "list",
            TypeTag::Void => "void",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Full type descriptor, including container element types.
#[derive(Debug, Clone)]
pub enum TypeSpec {
    Bool,
    Byte,
    I16,
    I32,
    I64,
    Double,
    String,
    Binary,
    Struct(Arc<StructSpec>),
    List(Box<TypeSpec>),
    Set(Box<TypeSpec>),
    Map(Box<TypeSpec>, Box<TypeSpec>),
}

impl TypeSpec {
    pub fn list(elem: TypeSpec) -> Self {
        TypeSpec::List(Box::new(elem))
    }

    pub fn set(elem: TypeSpec) -> Self {
        TypeSpec::Set(Box::new(elem))
    }

    pub fn map(key: TypeSpec, value: TypeSpec) -> Self {
        TypeSpec::Map(Box::new(key), Box::new(value))
    }

    pub fn structure(spec: &Arc<StructSpec>) -> Self {
        TypeSpec::Struct(Arc::clone(spec))
    }

    pub fn tag(&self) -> TypeTag {
        match self {
            TypeSpec::Bool => TypeTag::Bool,
            TypeSpec::Byte => TypeTag::Byte,
            TypeSpec::I16 => TypeTag::I16,
            TypeSpec::I32 => TypeTag::I32,
            TypeSpec::I64 => TypeTag::I64,
            TypeSpec::Double => TypeTag::Double,
            TypeSpec::String => TypeTag::String,
            TypeSpec::Binary => TypeTag::Binary,
            TypeSpec::Struct(_) => TypeTag::Struct,
            TypeSpec::List(_) => TypeTag::List,
            TypeSpec::Set(_) => TypeTag::Set,
            TypeSpec::Map(_, _) => TypeTag::Map,
        }
    }

    /// Wire abbreviation of this type.
    pub fn abbreviation(&self) -> &'static str {
        self.tag().abbreviation()
    }
}

/// How strictly a field must be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Requiredness {
    Required,
    Optional,
    /// Neither keyword given in the IDL. Behaves like optional on the wire.
    #[default]
    Default,
}

/// One field of a struct.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub id: i16,
    pub name: String,
    pub ty: TypeSpec,
    pub requiredness: Requiredness,
}

impl FieldSpec {
    pub fn new(id: i16, name: impl Into<String>, ty: TypeSpec) -> Self {
        Self {
            id,
            name: name.into(),
            ty,
            requiredness: Requiredness::Default,
        }
    }

    pub fn is_required(&self) -> bool {
        self.requiredness == Requiredness::Required
    }
}

/// Ordered field list of a struct, method argument list or method result.
#[derive(Debug)]
pub struct StructSpec {
    name: String,
    fields: Vec<FieldSpec>,
}

impl StructSpec {
    pub fn builder(name: impl Into<String>) -> StructSpecBuilder {
        StructSpecBuilder {
            name: name.into(),
            fields: Vec::new(),
            allow_zero: false,
        }
    }

    /// Build without validation, for descriptors the crate defines itself.
    pub(crate) fn from_parts(name: &str, fields: Vec<FieldSpec>) -> Arc<StructSpec> {
        Arc::new(StructSpec {
            name: name.to_string(),
            fields,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, id: i16) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.id == id)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field ids in declaration order.
    pub fn ids(&self) -> impl Iterator<Item = i16> + '_ {
        self.fields.iter().map(|f| f.id)
    }
}

/// Validating builder for [`StructSpec`].
#[derive(Debug)]
pub struct StructSpecBuilder {
    name: String,
    fields: Vec<FieldSpec>,
    allow_zero: bool,
}

impl StructSpecBuilder {
    /// Add a field with default requiredness.
    pub fn field(mut self, id: i16, name: impl Into<String>, ty: TypeSpec) -> Self {
        self.fields.push(FieldSpec::new(id, name, ty));
        self
    }

    pub fn required(mut self, id: i16, name: impl Into<String>, ty: TypeSpec) -> Self {
        let mut field = FieldSpec::new(id, name, ty);
        field.requiredness = Requiredness::Required;
        self.fields.push(field);
        self
    }

    pub fn optional(mut self, id: i16, name: impl Into<String>, ty: TypeSpec) -> Self {
        let mut field = FieldSpec::new(id, name, ty);
        field.requiredness = Requiredness::Optional;
        self.fields.push(field);
        self
    }

    pub fn push(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn build(self) -> Result<Arc<StructSpec>> {
        for (i, field) in self.fields.iter().enumerate() {
            let lowest = if self.allow_zero { 0 } else { 1 };
            if field.id < lowest {
                return Err(ProtocolError::SchemaError(format!(
                    "{}.{}: field id {} must be at least {lowest}",
                    self.name, field.name, field.id
                )));
            }
            if let Some(dup) = self.fields[..i].iter().find(|f| f.id == field.id) {
                return Err(ProtocolError::SchemaError(format!(
                    "{}: field id {} used by both '{}' and '{}'",
                    self.name, field.id, dup.name, field.name
                )));
            }
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(ProtocolError::SchemaError(format!(
                    "{}: duplicate field name '{}'",
                    self.name, field.name
                )));
            }
        }

        Ok(Arc::new(StructSpec {
            name: self.name,
            fields: self.fields,
        }))
    }
}

/// One RPC method.
#[derive(Debug)]
pub struct MethodSpec {
    name: String,
    args: Arc<StructSpec>,
    result_type: Option<TypeSpec>,
    result: Arc<StructSpec>,
    oneway: bool,
}

impl MethodSpec {
    pub fn builder(name: impl Into<String>) -> MethodSpecBuilder {
        MethodSpecBuilder {
            name: name.into(),
            args: Vec::new(),
            result_type: None,
            throws: Vec::new(),
            oneway: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Synthetic argument struct (`<method>_args`).
    pub fn args(&self) -> &Arc<StructSpec> {
        &self.args
    }

    /// Declared return type; `None` for void.
    pub fn result_type(&self) -> Option<&TypeSpec> {
        self.result_type.as_ref()
    }

    /// Synthetic result struct (`<method>_result`).
    pub fn result(&self) -> &Arc<StructSpec> {
        &self.result
    }

    pub fn is_oneway(&self) -> bool {
        self.oneway
    }

    /// Declared exception fields of the result struct.
    pub fn exceptions(&self) -> impl Iterator<Item = &FieldSpec> {
        self.result.fields().iter().filter(|f| f.id != RESULT_FIELD_ID)
    }
}

/// Builder for [`MethodSpec`].
#[derive(Debug)]
pub struct MethodSpecBuilder {
    name: String,
    args: Vec<(String, TypeSpec, Requiredness)>,
    result_type: Option<TypeSpec>,
    throws: Vec<(String, Arc<StructSpec>)>,
    oneway: bool,
}

impl MethodSpecBuilder {
    /// Append an argument; ids follow declaration order starting at 1.
    pub fn arg(mut self, name: impl Into<String>, ty: TypeSpec) -> Self {
        self.args.push((name.into(), ty, Requiredness::Default));
        self
    }

    pub fn required_arg(mut self, name: impl Into<String>, ty: TypeSpec) -> Self {
        self.args.push((name.into(), ty, Requiredness::Required));
        self
    }

    pub fn returns(mut self, ty: TypeSpec) -> Self {
        self.result_type = Some(ty);
        self
    }

    /// Declare an exception; ids follow declaration order starting at 1.
    pub fn throws(mut self, name: impl Into<String>, exception: &Arc<StructSpec>) -> Self {
        self.throws.push((name.into(), Arc::clone(exception)));
        self
    }

    pub fn oneway(mut self) -> Self {
        self.oneway = true;
        self
    }

    pub fn build(self) -> Result<Arc<MethodSpec>> {
        if self.oneway && (self.result_type.is_some() || !self.throws.is_empty()) {
            return Err(ProtocolError::SchemaError(format!(
                "oneway method '{}' must be void and declare no exceptions",
                self.name
            )));
        }

        let mut args = StructSpec::builder(format!("{}_args", self.name));
        for (index, (name, ty, requiredness)) in self.args.into_iter().enumerate() {
            let id = field_id(&self.name, index + 1)?;
            let mut field = FieldSpec::new(id, name, ty);
            field.requiredness = requiredness;
            args = args.push(field);
        }

        let mut result = StructSpec::builder(format!("{}_result", self.name));
        result.allow_zero = true;
        if let Some(ty) = &self.result_type {
            result = result.optional(RESULT_FIELD_ID, RESULT_FIELD_NAME, ty.clone());
        }
        for (index, (name, exception)) in self.throws.into_iter().enumerate() {
            let id = field_id(&self.name, index + 1)?;
            result = result.optional(id, name, TypeSpec::Struct(exception));
        }

        Ok(Arc::new(MethodSpec {
            name: self.name,
            args: args.build()?,
            result_type: self.result_type,
            result: result.build()?,
            oneway: self.oneway,
        }))
    }
}

fn field_id(method: &str, position: usize) -> Result<i16> {
    i16::try_from(position).map_err(|_| {
        ProtocolError::SchemaError(format!("method '{method}' declares too many fields"))
    })
}

/// A service: method name to method descriptor.
#[derive(Debug)]
pub struct ServiceSpec {
    name: String,
    methods: HashMap<String, Arc<MethodSpec>>,
}

impl ServiceSpec {
    pub fn builder(name: impl Into<String>) -> ServiceSpecBuilder {
        ServiceSpecBuilder {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method(&self, name: &str) -> Option<&Arc<MethodSpec>> {
        self.methods.get(name)
    }

    pub fn methods(&self) -> impl Iterator<Item = &Arc<MethodSpec>> {
        self.methods.values()
    }
}

#[derive(Debug)]
pub struct ServiceSpecBuilder {
    name: String,
    methods: Vec<Arc<MethodSpec>>,
}

impl ServiceSpecBuilder {
    pub fn method(mut self, method: Arc<MethodSpec>) -> Self {
        self.methods.push(method);
        self
    }

    pub fn build(self) -> Result<Arc<ServiceSpec>> {
        let mut methods = HashMap::with_capacity(self.methods.len());
        for method in self.methods {
            let name = method.name().to_string();
            if methods.insert(name.clone(), method).is_some() {
                return Err(ProtocolError::SchemaError(format!(
                    "{}: duplicate method '{name}'",
                    self.name
                )));
            }
        }
        Ok(Arc::new(ServiceSpec {
            name: self.name,
            methods,
        }))
    }
}
