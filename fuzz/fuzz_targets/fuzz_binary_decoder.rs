#![no_main]

use bytes::BytesMut;
use fleetctl::codec::binary::TARGET_FRAME_LEN;
use fleetctl::codec::{CodecMode, MessageCodec};
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // First byte picks a split point so frames arrive in two reads
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let split = usize::from(split).min(rest.len());
    let mut codec = MessageCodec::new(CodecMode::Binary);
    let mut buf = BytesMut::new();

    for chunk in [&rest[..split], &rest[split..]] {
        buf.extend_from_slice(chunk);
        while let Ok(Some(_)) = codec.decode(&mut buf) {}
    }
    // Whatever is left must be a strict prefix of a TARGET frame
    assert!(buf.len() < TARGET_FRAME_LEN);
});
