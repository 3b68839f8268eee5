#![no_main]

use libfuzzer_sys::fuzz_target;
use thrift_json::core::framing::read_frame;
use thrift_json::protocol::RawMessage;
use thrift_json::MemoryBuffer;

fuzz_target!(|data: &[u8]| {
    // Envelope parsing must fail cleanly on any input
    let _ = RawMessage::parse(data);

    // Framing must stop at the end of the stream
    let mut input = MemoryBuffer::from(data);
    while let Ok(frame) = read_frame(&mut input, 1 << 20) {
        let _ = RawMessage::parse(&frame);
    }
});
