//! Connected streaming clients and their mailboxes

use axum::response::sse::Event;
use futures::stream::{self, Stream, StreamExt};
use parking_lot::Mutex;
use pathweave_core::{LogEntry, STREAM_POLL_INTERVAL_MS};
use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Pending broadcasts a client may hold before it is dropped
pub const MAILBOX_CAPACITY: usize = 1024;

/// Ordered queue of serialized broadcasts for one client
pub type Mailbox = Arc<Mutex<VecDeque<String>>>;

/// Registry of live streaming clients
#[derive(Default)]
pub struct ClientRegistry {
    next_id: AtomicU64,
    clients: Mutex<HashMap<u64, Mailbox>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client and hand back its id and mailbox
    pub fn add(&self) -> (u64, Mailbox) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mailbox: Mailbox = Arc::new(Mutex::new(VecDeque::new()));
        self.clients.lock().insert(id, mailbox.clone());
        debug!("Viewer client {} connected", id);
        (id, mailbox)
    }

    /// Remove a client; removing twice is harmless
    pub fn remove(&self, id: u64) -> bool {
        let removed = self.clients.lock().remove(&id).is_some();
        if removed {
            debug!("Viewer client {} disconnected", id);
        }
        removed
    }

    pub fn contains(&self, id: u64) -> bool {
        self.clients.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queue a batch of entries for every client as one JSON array.
    ///
    /// Clients with a full mailbox are dropped. Returns how many clients
    /// received the batch.
    pub fn broadcast(&self, entries: &[LogEntry]) -> usize {
        if entries.is_empty() {
            return 0;
        }
        let message = match serde_json::to_string(entries) {
            Ok(message) => message,
            Err(e) => {
                warn!("Failed to serialize log entries: {}", e);
                return 0;
            }
        };

        let mut clients = self.clients.lock();
        let mut rejected = Vec::new();
        for (id, mailbox) in clients.iter() {
            let mut queue = mailbox.lock();
            if queue.len() >= MAILBOX_CAPACITY {
                rejected.push(*id);
            } else {
                queue.push_back(message.clone());
            }
        }
        for id in &rejected {
            warn!("Dropping viewer client {}: mailbox full", id);
            clients.remove(id);
        }
        clients.len()
    }
}

/// Removes its client from the registry when the stream is dropped
struct ClientGuard {
    id: u64,
    registry: Arc<ClientRegistry>,
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

/// Event stream for a new client.
///
/// Starts with `{"connected": true}` and then drains the client's mailbox
/// every poll interval. The stream ends if the client is dropped from the
/// registry and deregisters the client when it is dropped itself.
pub fn client_stream(registry: Arc<ClientRegistry>) -> impl Stream<Item = Result<Event, Infallible>> {
    let (id, mailbox) = registry.add();
    let guard = ClientGuard { id, registry };
    let interval = Duration::from_millis(STREAM_POLL_INTERVAL_MS);

    let connected = stream::once(async { Ok(Event::default().data(r#"{"connected": true}"#)) });

    let updates = stream::unfold((guard, mailbox), move |(guard, mailbox)| async move {
        loop {
            let next = mailbox.lock().pop_front();
            if let Some(message) = next {
                return Some((Ok(Event::default().data(message)), (guard, mailbox)));
            }
            if !guard.registry.contains(guard.id) {
                return None;
            }
            tokio::time::sleep(interval).await;
        }
    });

    connected.chain(updates)
}
