//! # Retriever: the list+watch capability supplied by the caller.
//!
//! A retriever can be backed by any remote API that can enumerate resources with
//! a version token and stream changes from that token on. The watch stream is
//! expected to end eventually (server timeout, compaction, network failure); the
//! runtime relists and watches again.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::SourceError;
use crate::key::ResourceKey;
use crate::source::ResourceEvent;

/// Result of a full list.
#[derive(Clone, Debug)]
pub struct ListResult<P> {
    /// Every resource currently present, with its key.
    pub items: Vec<(ResourceKey, P)>,
    /// Version token to start the watch from.
    pub version: String,
}

impl<P> ListResult<P> {
    /// Creates a list result.
    pub fn new(items: Vec<(ResourceKey, P)>, version: impl Into<String>) -> Self {
        Self {
            items,
            version: version.into(),
        }
    }
}

/// Finite, lazily produced sequence of changes.
///
/// An `Err` item or the end of the stream both mean "relist".
pub type WatchStream<P> = BoxStream<'static, Result<ResourceEvent<P>, SourceError>>;

/// List+watch capability over one collection of resources.
///
/// # Example
/// ```rust
/// use async_trait::async_trait;
/// use futures::stream::{self, StreamExt};
/// use reconvisor::{ListResult, ResourceEvent, ResourceKey, Retriever, SourceError, WatchStream};
///
/// struct Fixed;
///
/// #[async_trait]
/// impl Retriever<String> for Fixed {
///     async fn list(&self) -> Result<ListResult<String>, SourceError> {
///         Ok(ListResult::new(vec![(ResourceKey::from("a"), "v1".to_string())], "1"))
///     }
///
///     async fn watch(&self, _version: &str) -> Result<WatchStream<String>, SourceError> {
///         Ok(stream::pending().boxed())
///     }
/// }
/// ```
#[async_trait]
pub trait Retriever<P>: Send + Sync + 'static {
    /// Lists every resource and the version token to watch from.
    ///
    /// A failure here is fatal for the running period.
    async fn list(&self) -> Result<ListResult<P>, SourceError>;

    /// Opens a watch from `version`.
    ///
    /// A failure here (or an expired version) triggers a relist.
    async fn watch(&self, version: &str) -> Result<WatchStream<P>, SourceError>;
}

/// Shared handle to a retriever.
pub type RetrieverRef<P> = Arc<dyn Retriever<P>>;
