#![no_main]

use gatenet::crypto::DhParams;
use gatenet::protocol::handshake::HandshakeEngine;
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    // Drive the handshake with arbitrary marker and key bytes in both
    // modes; the engine must error out of order, never panic.
    if data.len() < 2 {
        return;
    }

    let null_key_mode = data[0] & 1 == 1;
    let split = (data[1] as usize).min(data.len() - 2);
    let (marker, key) = data[2..].split_at(split);
    let key = &key[..key.len().min(512)];

    let mut engine = HandshakeEngine::new(Arc::new(DhParams::modp_2048()), null_key_mode);
    if engine.on_init(marker).is_ok() {
        let _ = engine.on_client_key(key);
    }
});
