//! Fuzz test for key namespacing
//!
//! Checks on arbitrary prefixes and keys that:
//! - every storage path lies under the namespace's list prefix
//! - the original key is recoverable from its storage path
//!
//! Run with: cargo +nightly fuzz run key_namespace_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use objcache_core::KeyNamespace;

fuzz_target!(|input: (&str, &str)| {
    let (prefix, key) = input;
    let namespace = KeyNamespace::new(prefix);
    let path = namespace.path(key);

    assert!(path.as_str().starts_with(&namespace.list_prefix()));
    assert_eq!(namespace.key_of(path.as_str()).as_deref(), Some(key));
});
