//! # Resource keys.
//!
//! [`ResourceKey`] is the opaque identifier the whole runtime deduplicates on.
//! It is conventionally `namespace/name` (or just `name` for cluster-scoped
//! resources), but the engine never parses it except in the convenience accessors.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Immutable, cheaply cloneable identifier of a remote resource.
///
/// # Example
/// ```
/// use reconvisor::ResourceKey;
///
/// let key = ResourceKey::namespaced("default", "web-0");
/// assert_eq!(key.as_str(), "default/web-0");
/// assert_eq!(key.namespace(), Some("default"));
/// assert_eq!(key.name(), "web-0");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey(Arc<str>);

impl ResourceKey {
    /// Creates a key from any string.
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self(key.into())
    }

    /// Creates a `namespace/name` key.
    pub fn namespaced(namespace: &str, name: &str) -> Self {
        Self(format!("{namespace}/{name}").into())
    }

    /// Returns the key as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the part before the first `/`, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.0.split_once('/').map(|(ns, _)| ns)
    }

    /// Returns the part after the first `/`, or the whole key.
    pub fn name(&self) -> &str {
        self.0.split_once('/').map_or(&self.0, |(_, name)| name)
    }

    /// Returns the shared string backing this key.
    #[inline]
    pub(crate) fn shared(&self) -> Arc<str> {
        Arc::clone(&self.0)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceKey {
    fn from(s: &str) -> Self {
        Self(s.into())
    }
}

impl From<String> for ResourceKey {
    fn from(s: String) -> Self {
        Self(s.into())
    }
}

impl Borrow<str> for ResourceKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}
