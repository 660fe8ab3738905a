//! Payload type registry.
//!
//! Backends cannot know the concrete types callers cache, so every payload
//! type is registered under a stable string tag. The tag travels inside the
//! storage record and selects the deserializer on the way back. The registry
//! is a plain value handed to each backend at construction; there is no
//! process-wide registration.
//!
//! Payload bodies are bincode, which keeps every value serde can express
//! (non-finite floats, nested options) intact across a round-trip.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::entry::Payload;
use crate::error::RegistryError;

/// Longest tag the record format can carry.
pub const MAX_TAG_LEN: usize = u16::MAX as usize;

type EncodeFn = fn(&(dyn Any + Send + Sync)) -> Result<Vec<u8>, String>;
type DecodeFn = fn(&[u8]) -> Result<Payload, String>;

/// Serializer pair for one registered payload type.
#[derive(Clone)]
pub struct PayloadType {
    tag: String,
    type_name: &'static str,
    encode: EncodeFn,
    decode: DecodeFn,
}

impl PayloadType {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn encode(&self, payload: &Payload) -> Result<Vec<u8>, String> {
        (self.encode)(payload.as_any())
    }

    pub(crate) fn decode(&self, bytes: &[u8]) -> Result<Payload, String> {
        (self.decode)(bytes)
    }
}

impl fmt::Debug for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadType")
            .field("tag", &self.tag)
            .field("type_name", &self.type_name)
            .finish()
    }
}

fn encode_as<T: Serialize + DeserializeOwned + 'static>(
    value: &(dyn Any + Send + Sync),
) -> Result<Vec<u8>, String> {
    let typed = value
        .downcast_ref::<T>()
        .ok_or_else(|| format!("value is not a {}", std::any::type_name::<T>()))?;
    let bytes = bincode::serialize(typed).map_err(|e| e.to_string())?;

    // Serde attributes that need a self-describing format (untagged enums,
    // flatten, skip_serializing_if) serialize fine and then fail to read.
    // A body that cannot be read back is never handed to a store.
    bincode::deserialize::<T>(&bytes)
        .map_err(|e| format!("encoded payload does not read back: {e}"))?;
    Ok(bytes)
}

fn decode_as<T: DeserializeOwned + Send + Sync + 'static>(bytes: &[u8]) -> Result<Payload, String> {
    let value: T = bincode::deserialize(bytes).map_err(|e| e.to_string())?;
    Ok(Payload::from_arc(Arc::new(value), std::any::type_name::<T>()))
}

/// The set of payload types a codec can encode and decode.
#[derive(Debug, Clone, Default)]
pub struct PayloadRegistry {
    by_type: HashMap<TypeId, Arc<PayloadType>>,
    by_tag: HashMap<String, Arc<PayloadType>>,
}

impl PayloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under `tag`.
    ///
    /// Tags must be non-empty, fit the record's 16-bit length field and be
    /// unique; each Rust type may be registered once.
    pub fn register<T>(&mut self, tag: impl Into<String>) -> Result<&mut Self, RegistryError>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let tag = tag.into();
        if tag.is_empty() {
            return Err(RegistryError::EmptyTag);
        }
        if tag.len() > MAX_TAG_LEN {
            return Err(RegistryError::TagTooLong {
                len: tag.len(),
                max: MAX_TAG_LEN,
            });
        }
        if self.by_tag.contains_key(&tag) {
            return Err(RegistryError::DuplicateTag { tag });
        }
        if let Some(existing) = self.by_type.get(&TypeId::of::<T>()) {
            return Err(RegistryError::DuplicateType {
                type_name: std::any::type_name::<T>().to_string(),
                tag: existing.tag.clone(),
            });
        }

        let payload_type = Arc::new(PayloadType {
            tag: tag.clone(),
            type_name: std::any::type_name::<T>(),
            encode: encode_as::<T>,
            decode: decode_as::<T>,
        });
        self.by_type.insert(TypeId::of::<T>(), Arc::clone(&payload_type));
        self.by_tag.insert(tag, payload_type);
        Ok(self)
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_type<T>(mut self, tag: impl Into<String>) -> Result<Self, RegistryError>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        self.register::<T>(tag)?;
        Ok(self)
    }

    pub fn lookup_type(&self, type_id: TypeId) -> Option<&PayloadType> {
        self.by_type.get(&type_id).map(|t| t.as_ref())
    }

    pub fn lookup_tag(&self, tag: &str) -> Option<&PayloadType> {
        self.by_tag.get(tag).map(|t| t.as_ref())
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.by_tag.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}
