//! Cache entry model.
//!
//! An [`Entry`] is what the generic cache layer hands to a backend: an opaque,
//! type-erased [`Payload`] plus the [`Meta`] it uses to decide freshness.
//! Backends never interpret `lifetime` or `gracetime`; they store and return
//! them verbatim.

use std::any::{Any, TypeId};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Type-erased cached value.
///
/// Cloning is cheap: the value is shared behind an `Arc`.
#[derive(Clone)]
pub struct Payload {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Payload {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub(crate) fn from_arc(value: Arc<dyn Any + Send + Sync>, type_name: &'static str) -> Self {
        Self { value, type_name }
    }

    /// Borrow the value if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    /// `TypeId` of the concrete value, not of the wrapper.
    pub fn value_type_id(&self) -> TypeId {
        Any::type_id(&*self.value)
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn as_any(&self) -> &(dyn Any + Send + Sync) {
        &*self.value
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Expiration metadata carried alongside a payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Meta {
    /// How long the entry is fresh.
    pub lifetime: Duration,
    /// How long past `lifetime` a stale entry may still be served.
    pub gracetime: Duration,
    /// Cache-layer tags. Never persisted by a backend.
    pub tags: BTreeSet<String>,
}

impl Meta {
    pub fn new(lifetime: Duration, gracetime: Duration) -> Self {
        Self {
            lifetime,
            gracetime,
            tags: BTreeSet::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Copy of this metadata without tags, i.e. what survives persistence.
    pub fn persisted(&self) -> Self {
        Self::new(self.lifetime, self.gracetime)
    }
}

/// A cached value plus its expiration metadata.
#[derive(Debug, Clone)]
pub struct Entry {
    pub meta: Meta,
    pub data: Payload,
}

impl Entry {
    pub fn new<T: Any + Send + Sync>(data: T, lifetime: Duration, gracetime: Duration) -> Self {
        Self {
            meta: Meta::new(lifetime, gracetime),
            data: Payload::new(data),
        }
    }

    pub fn with_meta(data: Payload, meta: Meta) -> Self {
        Self { meta, data }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.meta = self.meta.with_tag(tag);
        self
    }

    /// Typed view of the payload.
    pub fn data<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }
}
