// ── Record streams ──
//
// Subscription to a model's record, for consumers that re-render or
// persist on change.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::record::Record;

/// A subscription to one model's record.
///
/// Provides point-in-time snapshot access and change notification via
/// `changed()` or by converting into a `Stream`.
pub struct RecordStream {
    current: Record,
    receiver: watch::Receiver<Record>,
}

impl RecordStream {
    pub(crate) fn new(receiver: watch::Receiver<Record>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Snapshot captured at creation or at the last `changed()`.
    pub fn current(&self) -> &Record {
        &self.current
    }

    /// Latest record, which may be newer than `current()`.
    pub fn latest(&self) -> Record {
        self.receiver.borrow().clone()
    }

    /// Whether the record was written since the last `changed()`.
    pub fn has_changed(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    /// Wait for the next write, returning the new record.
    /// Returns `None` once the model has been dropped.
    pub async fn changed(&mut self) -> Option<Record> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream`. The first item is the current record.
    pub fn into_stream(self) -> RecordWatchStream {
        RecordWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct RecordWatchStream {
    inner: WatchStream<Record>,
}

impl Stream for RecordWatchStream {
    type Item = Record;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
