//! Error types for objcache operations

use thiserror::Error;

/// Errors reported by an object store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Object not found: {path}")]
    NotFound { path: String },

    #[error("Transport failure: {reason}")]
    Transport { reason: String },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    /// Metrics label for this error category.
    pub fn label(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "NotFound",
            StoreError::Transport { .. } => "Transport",
            StoreError::LockPoisoned => "LockPoisoned",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        StoreError::Transport {
            reason: reason.into(),
        }
    }
}

/// Failures turning an entry into a storage record.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Payload type {type_name} is not registered")]
    Unregistered { type_name: String },

    #[error("Payload of type {tag} could not be serialized: {reason}")]
    Payload { tag: String, reason: String },

    #[error("Payload of type {tag} is too large: {len} bytes")]
    TooLarge { tag: String, len: usize },
}

/// Failures turning a storage record back into an entry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Record truncated: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("Record does not start with the entry magic")]
    BadMagic,

    #[error("Record checksum mismatch")]
    ChecksumMismatch,

    #[error("Invalid duration in {field}: {nanos} nanoseconds")]
    InvalidDuration { field: &'static str, nanos: u32 },

    #[error("Invalid payload type tag")]
    InvalidTag,

    #[error("Unknown payload type tag: {tag}")]
    UnknownType { tag: String },

    #[error("Record has {count} trailing bytes")]
    TrailingBytes { count: usize },

    #[error("Payload of type {tag} could not be deserialized: {reason}")]
    Payload { tag: String, reason: String },
}

/// Payload registry misconfiguration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Payload type tag must not be empty")]
    EmptyTag,

    #[error("Payload type tag is {len} bytes, maximum is {max}")]
    TagTooLong { len: usize, max: usize },

    #[error("Payload type tag already registered: {tag}")]
    DuplicateTag { tag: String },

    #[error("Payload type {type_name} already registered as {tag}")]
    DuplicateType { type_name: String, tag: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },
}

/// Master error type for all objcache errors.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Flush incomplete: {deleted} deleted, {} failed", failed.len())]
    PartialFlush {
        deleted: u64,
        failed: Vec<(String, StoreError)>,
    },
}

/// Result type alias for objcache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Result type alias for object store calls.
pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// TESTS
// =============================================================================
