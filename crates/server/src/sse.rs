//! Server-sent runtime snapshots.
//!
//! One background loop serializes the full runtime collection once per
//! publish interval and fans the string out to every subscriber. With no
//! subscribers the loop idles without touching the store, and the cached
//! snapshot is dropped so a new subscriber always starts fresh.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::AppResult;
use crate::store::RuntimeStore;

/// One message on the feed.
#[derive(Debug, Clone)]
pub enum Feed {
    /// The serialized runtime collection.
    Snapshot(Arc<String>),
    /// Snapshot evaluation failed; the stream ends after this.
    Failed(Arc<String>),
}

#[derive(Default)]
struct FeedState {
    subscribers: Vec<UnboundedSender<Feed>>,
    current: Option<Arc<String>>,
}

/// Periodically publishes runtime snapshots to SSE subscribers.
pub struct SsePublisher {
    store: Arc<RuntimeStore>,
    interval: Duration,
    state: Mutex<FeedState>,
}

impl SsePublisher {
    pub fn new(store: Arc<RuntimeStore>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            state: Mutex::new(FeedState::default()),
        }
    }

    /// Register a subscriber. The current snapshot (cached, or computed on
    /// the spot) is delivered immediately; failures close the stream after
    /// a single error message.
    pub async fn subscribe(&self) -> UnboundedReceiver<Feed> {
        let mut state = self.state.lock().await;
        let first = match &state.current {
            Some(current) => Feed::Snapshot(current.clone()),
            None => match self.snapshot().await {
                Ok(payload) => {
                    state.current = Some(payload.clone());
                    Feed::Snapshot(payload)
                }
                Err(err) => {
                    warn!(error = %err, "snapshot failed for new subscriber");
                    Feed::Failed(Arc::new(err.to_string()))
                }
            },
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let keep = matches!(first, Feed::Snapshot(_));
        let _ = tx.send(first);
        if keep {
            state.subscribers.push(tx);
            debug!(subscribers = state.subscribers.len(), "sse subscriber added");
        }
        rx
    }

    async fn snapshot(&self) -> AppResult<Arc<String>> {
        let views = self.store.all().await?;
        Ok(Arc::new(serde_json::to_string(&views)?))
    }

    /// Run until the token fires. Remaining subscribers are dropped on the
    /// way out, which ends their streams.
    pub async fn run(self: Arc<Self>, token: CancellationToken) {
        tokio::select! {
            _ = token.cancelled() => {
                info!("sse publisher stopped");
                return;
            }
            _ = self.store.wait_ready() => {}
        }
        info!(interval = ?self.interval, "sse publisher running");

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = sleep(self.interval) => {}
            }
            self.publish_once().await;
        }

        let mut state = self.state.lock().await;
        state.subscribers.clear();
        state.current = None;
        info!("sse publisher stopped");
    }

    async fn publish_once(&self) {
        let mut state = self.state.lock().await;
        if state.subscribers.is_empty() {
            state.current = None;
            return;
        }

        match self.snapshot().await {
            Ok(payload) => {
                state.current = Some(payload.clone());
                state
                    .subscribers
                    .retain(|tx| tx.send(Feed::Snapshot(payload.clone())).is_ok());
                debug!(subscribers = state.subscribers.len(), "snapshot published");
            }
            Err(err) => {
                error!(error = %err, "snapshot failed");
                state.current = None;
                let message = Arc::new(err.to_string());
                for tx in state.subscribers.drain(..) {
                    let _ = tx.send(Feed::Failed(message.clone()));
                }
            }
        }
    }
}

/// GET handler for the runtime feed.
pub async fn feed(
    State(publisher): State<Arc<SsePublisher>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = publisher.subscribe().await;
    let stream = UnboundedReceiverStream::new(rx).map(|feed| {
        let event = match feed {
            Feed::Snapshot(payload) => Event::default().event("runtimes").data(payload.as_str()),
            Feed::Failed(message) => Event::default().event("error").data(message.as_str()),
        };
        Ok(event)
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
