//! # Normalized resource notifications.

use crate::key::ResourceKey;

/// A change observed on the remote side.
///
/// The payload is whatever the retriever uses to represent a resource; the
/// engine never looks inside it. Deletions carry only the key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceEvent<P> {
    /// The resource appeared (or was listed).
    Added(ResourceKey, P),
    /// The resource changed.
    Updated(ResourceKey, P),
    /// The resource no longer exists.
    Deleted(ResourceKey),
}

impl<P> ResourceEvent<P> {
    /// Key of the affected resource.
    pub fn key(&self) -> &ResourceKey {
        match self {
            ResourceEvent::Added(key, _)
            | ResourceEvent::Updated(key, _)
            | ResourceEvent::Deleted(key) => key,
        }
    }

    /// Short label used in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ResourceEvent::Added(..) => "added",
            ResourceEvent::Updated(..) => "updated",
            ResourceEvent::Deleted(_) => "deleted",
        }
    }
}
