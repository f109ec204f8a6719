// ── Reactive node streams ──
//
// Subscription types for consuming registry changes.

mod filter;

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::NodeRecord;
use crate::store::NodeSnapshot;

pub use filter::NodeFilter;

/// A subscription to the node registry.
///
/// Provides both point-in-time snapshot access and reactive change
/// notification via the `changed()` method or by converting to a `Stream`.
/// Every snapshot is ordered by node id and narrowed by the stream's filter.
pub struct NodeStream {
    current: NodeSnapshot,
    receiver: watch::Receiver<NodeSnapshot>,
    filter: NodeFilter,
}

impl NodeStream {
    pub(crate) fn new(receiver: watch::Receiver<NodeSnapshot>) -> Self {
        let current = receiver.borrow().clone();
        Self {
            current,
            receiver,
            filter: NodeFilter::All,
        }
    }

    pub fn with_filter(mut self, filter: NodeFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Nodes captured at creation time (or at the last `changed()`).
    pub fn current(&self) -> Vec<Arc<NodeRecord>> {
        self.filter.apply(&self.current)
    }

    /// Latest nodes (may have changed since creation).
    pub fn latest(&self) -> Vec<Arc<NodeRecord>> {
        let snap = self.receiver.borrow().clone();
        self.filter.apply(&snap)
    }

    /// Wait for the next registry change, returning the filtered nodes.
    /// Returns `None` once the controller has been dropped.
    pub async fn changed(&mut self) -> Option<Vec<Arc<NodeRecord>>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = Arc::clone(&snap);
        Some(self.filter.apply(&snap))
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> NodeWatchStream {
        NodeWatchStream {
            inner: WatchStream::new(self.receiver),
            filter: self.filter,
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
///
/// Yields the filtered node list once immediately and again each time the
/// registry is mutated.
pub struct NodeWatchStream {
    inner: WatchStream<NodeSnapshot>,
    filter: NodeFilter,
}

impl Stream for NodeWatchStream {
    type Item = Vec<Arc<NodeRecord>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.inner)
            .poll_next(cx)
            .map(|snap| snap.map(|s| this.filter.apply(&s)))
    }
}
