#![no_main]

use gatenet::crypto::{SessionCipher, SessionKey};
use gatenet::protocol::framing::SealedFrame;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Treat the input as sub-header plus ciphertext and open it: the
    // decoder must reject or truncate, never panic or over-read.
    if data.len() < 4 {
        return;
    }

    let frame = SealedFrame {
        header: [data[0], data[1], data[2], data[3]],
        ciphertext: data[4..].to_vec(),
    };

    let cipher = SessionCipher::new(&SessionKey::zero());
    if let Ok(payload) = frame.open(&cipher) {
        assert!(payload.len() <= frame.ciphertext.len());
        assert_eq!(payload.len(), frame.declared_len());
    }
});
