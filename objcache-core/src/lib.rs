//! objcache Core - Entry Model and Codec
//!
//! Storage-independent building blocks for object-store cache backends:
//! the entry model, the payload registry, the record codec, key namespacing,
//! configuration and the error taxonomy. This crate performs no I/O.

pub mod codec;
pub mod config;
pub mod entry;
pub mod error;
pub mod namespace;
pub mod registry;

pub use codec::{EntryCodec, MIN_RECORD_LEN};
pub use config::{BackendConfig, FlushPolicy};
pub use entry::{Entry, Meta, Payload};
pub use error::{
    CacheError, CacheResult, ConfigError, DecodeError, EncodeError, RegistryError, StoreError,
    StoreResult,
};
pub use namespace::{KeyNamespace, StoragePath};
pub use registry::{PayloadRegistry, PayloadType, MAX_TAG_LEN};
