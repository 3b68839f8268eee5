//! Shared schema and fixtures for the integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::fs;
use std::sync::Arc;

use thrift_json::{Dispatcher, MethodSpec, ServiceSpec, StructSpec, StructValue, TypeSpec, Value};

pub const REFERENCE_BINARY: &[u8] = b"\x01\x0fabc123\x00\x02";

pub fn load_vector(name: &str) -> String {
    fs::read_to_string(format!("tests/vectors/{name}")).unwrap()
}

pub struct Schema {
    pub foo: Arc<StructSpec>,
    pub test: Arc<StructSpec>,
    pub service: Arc<ServiceSpec>,
}

/// `Foo`, `Test` and `TestService { Test test(1: Test t) }`.
pub fn schema() -> Schema {
    let foo = StructSpec::builder("Foo")
        .field(1, "bar", TypeSpec::String)
        .build()
        .unwrap();
    let rec = || TypeSpec::structure(&foo);

    let test = StructSpec::builder("Test")
        .field(1, "tbool", TypeSpec::Bool)
        .field(2, "tbyte", TypeSpec::Byte)
        .field(3, "tshort", TypeSpec::I16)
        .field(4, "tint", TypeSpec::I32)
        .field(5, "tlong", TypeSpec::I64)
        .field(6, "tdouble", TypeSpec::Double)
        .field(7, "tstr", TypeSpec::String)
        .field(8, "tlist_of_strings", TypeSpec::list(TypeSpec::String))
        .field(9, "tmap_of_int2str", TypeSpec::map(TypeSpec::I32, TypeSpec::String))
        .field(10, "tsetofints", TypeSpec::set(TypeSpec::I32))
        .field(11, "tmap_of_str2foo", TypeSpec::map(TypeSpec::String, rec()))
        .field(
            12,
            "tmap_of_str2stringlist",
            TypeSpec::map(TypeSpec::String, TypeSpec::list(TypeSpec::String)),
        )
        .field(
            13,
            "tmap_of_str2mapofstring2foo",
            TypeSpec::map(TypeSpec::String, TypeSpec::map(TypeSpec::String, rec())),
        )
        .field(14, "tlist_of_foo", TypeSpec::list(rec()))
        .field(15, "tfoo", rec())
        .field(
            16,
            "tlist_of_maps2int",
            TypeSpec::list(TypeSpec::map(TypeSpec::String, TypeSpec::I32)),
        )
        .field(
            17,
            "tmap_of_str2foolist",
            TypeSpec::map(TypeSpec::String, TypeSpec::list(rec())),
        )
        .field(18, "tmap_of_int2foo", TypeSpec::map(TypeSpec::I32, rec()))
        .field(19, "tbinary", TypeSpec::Binary)
        .field(20, "tmap_of_bool2str", TypeSpec::map(TypeSpec::Bool, TypeSpec::String))
        .field(21, "tmap_of_bool2int", TypeSpec::map(TypeSpec::Bool, TypeSpec::I32))
        .build()
        .unwrap();

    let service = ServiceSpec::builder("TestService")
        .method(
            MethodSpec::builder("test")
                .arg("t", TypeSpec::structure(&test))
                .returns(TypeSpec::structure(&test))
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();

    Schema { foo, test, service }
}

pub fn foo(schema: &Schema, bar: &str) -> Value {
    Value::Struct(StructValue::from_named(&schema.foo, [("bar", bar)]).unwrap())
}

/// The object encoded by `tests/vectors/apache_request.json`.
pub fn reference_object(s: &Schema) -> StructValue {
    let mut t = StructValue::new(&s.test);
    t.insert("tbool", false).unwrap();
    t.insert("tbyte", 16i8).unwrap();
    t.insert("tshort", 123i16).unwrap();
    t.insert("tint", 12345678i32).unwrap();
    t.insert("tlong", 123123123i64).unwrap();
    t.insert("tdouble", 1.234567f64).unwrap();
    t.insert("tstr", "Testing String").unwrap();
    t.insert(
        "tlist_of_strings",
        Value::list(["how", "do", "i", "test", "this?"]),
    )
    .unwrap();
    t.insert(
        "tmap_of_int2str",
        Value::map([(1i32, "one"), (2, "two"), (3, "three")]),
    )
    .unwrap();
    t.insert("tsetofints", Value::set([1i32, 2, 3, 4, 5])).unwrap();
    t.insert(
        "tmap_of_str2foo",
        Value::map([("first", foo(s, "first")), ("2nd", foo(s, "baz"))]),
    )
    .unwrap();
    t.insert(
        "tmap_of_str2stringlist",
        Value::map([
            ("words", Value::list(["dog", "cat", "pie"])),
            ("other", Value::list(["test", "foo", "bar", "baz", "quux"])),
        ]),
    )
    .unwrap();
    t.insert(
        "tmap_of_str2mapofstring2foo",
        Value::map([("first", Value::map([("second", foo(s, "testing"))]))]),
    )
    .unwrap();
    t.insert(
        "tlist_of_foo",
        Value::list([foo(s, "1"), foo(s, "2"), foo(s, "3")]),
    )
    .unwrap();
    t.insert("tfoo", foo(s, "test food")).unwrap();
    t.insert(
        "tlist_of_maps2int",
        Value::list([Value::map([("one", 1i32), ("two", 2), ("three", 3)])]),
    )
    .unwrap();
    t.insert(
        "tmap_of_str2foolist",
        Value::map([("test", Value::list([foo(s, "test list entry")]))]),
    )
    .unwrap();
    t.insert(
        "tmap_of_int2foo",
        Value::map([(1i32, foo(s, "One")), (2, foo(s, "Two")), (5, foo(s, "Five"))]),
    )
    .unwrap();
    t.insert("tbinary", Value::binary(REFERENCE_BINARY)).unwrap();
    t
}

/// The object the end-to-end client sends.
pub fn client_object(s: &Schema) -> StructValue {
    let mut t = StructValue::new(&s.test);
    t.insert("tdouble", 12.3456f64).unwrap();
    t.insert("tint", 567i32).unwrap();
    t.insert("tstr", "A test '{[\"string").unwrap();
    t.insert(
        "tmap_of_bool2str",
        Value::map([(true, "true string"), (false, "false string")]),
    )
    .unwrap();
    t.insert(
        "tmap_of_bool2int",
        Value::map([(true, 0i32), (false, 1)]),
    )
    .unwrap();
    t
}

/// Handler that returns its argument.
pub fn identity_dispatcher(s: &Schema) -> Dispatcher {
    Dispatcher::new(Arc::clone(&s.service))
        .with("test", |args| Ok(args.get("t").cloned()))
        .unwrap()
}
