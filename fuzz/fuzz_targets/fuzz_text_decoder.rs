#![no_main]

use bytes::BytesMut;
use fleetctl::codec::{CodecMode, Message, MessageCodec};
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::{Decoder, Encoder};

fuzz_target!(|data: &[u8]| {
    let mut codec = MessageCodec::new(CodecMode::Text);
    let mut buf = BytesMut::from(data);

    while let Ok(Some(message)) = codec.decode(&mut buf) {
        if let Message::Text(token) = &message {
            assert!(!token.contains('\n'));
        }
        // Anything decoded must encode again
        let mut out = BytesMut::new();
        assert!(codec.encode(message, &mut out).is_ok());
    }
    // Text frames never leave a partial token behind
    assert!(buf.is_empty());
});
