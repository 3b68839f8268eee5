#![no_main]

use libfuzzer_sys::fuzz_target;
use thrift_json::{Dispatcher, MethodSpec, Processor, ServiceSpec, StructSpec, TypeSpec};

fuzz_target!(|data: &[u8]| {
    let Ok(processor) = processor() else {
        return;
    };

    // Every frame gets a reply or is dropped, never a panic
    if let Ok(response) = processor.handle_frame(data) {
        if let Some(payload) = response.payload {
            assert!(serde_json::from_slice::<serde_json::Value>(&payload).is_ok());
        }
    }
});

fn processor() -> thrift_json::Result<Processor> {
    let point = StructSpec::builder("Point")
        .field(1, "x", TypeSpec::Double)
        .field(2, "y", TypeSpec::Double)
        .build()?;
    let service = ServiceSpec::builder("Geometry")
        .method(
            MethodSpec::builder("scale")
                .arg("points", TypeSpec::list(TypeSpec::structure(&point)))
                .arg("factors", TypeSpec::map(TypeSpec::String, TypeSpec::Double))
                .returns(TypeSpec::list(TypeSpec::structure(&point)))
                .build()?,
        )
        .method(MethodSpec::builder("mark").arg("tag", TypeSpec::Binary).oneway().build()?)
        .build()?;
    let dispatcher = Dispatcher::new(service)
        .with("scale", |args| Ok(args.get("points").cloned()))?
        .with("mark", |_| Ok(None))?;
    Ok(Processor::new(dispatcher))
}
