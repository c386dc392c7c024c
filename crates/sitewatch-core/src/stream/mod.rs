// ── Reactive site streams ──
//
// Snapshot subscriptions over the registry. Every mutation publishes a
// fresh `Arc<Vec<Arc<Site>>>`; subscribers that fall behind simply see
// the newest snapshot on their next poll.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::Site;

type Snapshot = Arc<Vec<Arc<Site>>>;

/// A subscription to the all-sites snapshot.
pub struct SiteStream {
    current: Snapshot,
    receiver: watch::Receiver<Snapshot>,
}

impl SiteStream {
    pub(crate) fn new(receiver: watch::Receiver<Snapshot>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Snapshot as of creation or the last `changed()`.
    pub fn current(&self) -> &Snapshot {
        &self.current
    }

    pub fn latest(&self) -> Snapshot {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change. `None` once the registry is gone.
    pub async fn changed(&mut self) -> Option<Snapshot> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = Arc::clone(&snap);
        Some(snap)
    }

    pub fn into_stream(self) -> SiteWatchStream {
        SiteWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding each new snapshot.
pub struct SiteWatchStream {
    inner: WatchStream<Snapshot>,
}

impl Stream for SiteWatchStream {
    type Item = Snapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use futures_util::StreamExt;
    use tokio::sync::broadcast;

    use crate::model::{DetectorType, SensorReading, SensorStatus, SiteDirectory};
    use crate::store::Registry;

    fn reading(site_id: u32) -> SensorReading {
        SensorReading {
            site_id,
            site_name: "S".into(),
            channel_id: "CH1".into(),
            tag: "T".into(),
            process_value: 0.0,
            current_ma: 4.0,
            detector_type: DetectorType::GasLel,
            status: SensorStatus::Normal,
            status_code: 0,
            timestamp: Utc::now(),
            topic: String::new(),
        }
    }

    #[tokio::test]
    async fn changed_yields_new_snapshot() {
        let (tx, _) = broadcast::channel(8);
        let registry = Registry::new(SiteDirectory::default(), tx);
        let mut stream = registry.subscribe();
        assert!(stream.current().is_empty());

        registry.apply(&reading(3));
        let snap = stream.changed().await.unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(stream.current().len(), 1);
    }

    #[tokio::test]
    async fn into_stream_sees_latest_state() {
        let (tx, _) = broadcast::channel(8);
        let registry = Registry::new(SiteDirectory::default(), tx);
        let mut stream = registry.subscribe().into_stream();

        registry.apply(&reading(1));
        registry.apply(&reading(2));

        let snap = stream.next().await.unwrap();
        assert_eq!(snap.len(), 2);
    }
}
