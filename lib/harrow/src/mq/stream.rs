use crate::mq::{MessageCallback, MessageDriver, MqError, MqResult};
use flint::logging::{self, Logger};
use hashbrown::HashMap;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Monotonically increasing entry id within a backend.
pub type EntryId = u64;

/// How long one poll blocks waiting for new entries.
const POLL_BLOCK: Duration = Duration::from_millis(100);
/// Entries drained per poll.
const POLL_BATCH: usize = 10;
/// Back-off after a backend failure.
const FAILURE_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct StreamEntry {
    pub topic: String,
    pub id: EntryId,
    pub payload: Vec<u8>,
}

/// The XREAD-shaped port the reliable driver polls: append-only topics with
/// blocking cursor reads. A Redis-streams client implements this against
/// the broker; [`MemoryStream`] implements it in-process.
pub trait StreamBackend: Send + Sync + 'static {
    fn append(&self, topic: &str, payload: &[u8]) -> MqResult<EntryId>;

    /// Id of the newest entry in `topic`, 0 when empty. New subscriptions
    /// start here, so only entries appended afterwards are delivered.
    fn tail_id(&self, topic: &str) -> EntryId;

    /// Returns up to `count` entries newer than each `(topic, after)`
    /// cursor, in id order. Blocks up to `block` when nothing is pending;
    /// an empty result after the block is not an error.
    fn read_from(&self, cursors: &[(String, EntryId)], block: Duration, count: usize) -> MqResult<Vec<StreamEntry>>;
}

/// In-process [`StreamBackend`].
pub struct MemoryStream {
    topics: Mutex<HashMap<String, Vec<(EntryId, Vec<u8>)>>>,
    cond: Condvar,
    next_id: AtomicU64,
}

impl MemoryStream {
    pub fn new() -> MemoryStream {
        MemoryStream {
            topics: Mutex::new(HashMap::new()),
            cond: Condvar::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn collect(
        topics: &HashMap<String, Vec<(EntryId, Vec<u8>)>>,
        cursors: &[(String, EntryId)],
        count: usize,
    ) -> Vec<StreamEntry> {
        let mut out = Vec::new();

        for (topic, after) in cursors {
            if let Some(entries) = topics.get(topic) {
                for (id, payload) in entries {
                    if id > after {
                        out.push(StreamEntry {
                            topic: topic.clone(),
                            id: *id,
                            payload: payload.clone(),
                        });
                    }
                }
            }
        }

        out.sort_by_key(|entry| entry.id);
        out.truncate(count);
        out
    }
}

impl StreamBackend for MemoryStream {
    fn append(&self, topic: &str, payload: &[u8]) -> MqResult<EntryId> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.topics
            .lock()
            .entry(topic.to_string())
            .or_default()
            .push((id, payload.to_vec()));
        self.cond.notify_all();
        Ok(id)
    }

    fn tail_id(&self, topic: &str) -> EntryId {
        self.topics
            .lock()
            .get(topic)
            .and_then(|entries| entries.last())
            .map_or(0, |(id, _)| *id)
    }

    fn read_from(&self, cursors: &[(String, EntryId)], block: Duration, count: usize) -> MqResult<Vec<StreamEntry>> {
        let mut topics = self.topics.lock();

        let found = Self::collect(&topics, cursors, count);
        if !found.is_empty() {
            return Ok(found);
        }

        self.cond.wait_for(&mut topics, block);
        Ok(Self::collect(&topics, cursors, count))
    }
}

struct Subscription {
    topic: String,
    last_id: EntryId,
    callback: MessageCallback,
}

/// Reliable driver: a poll thread walks per-topic cursors through the
/// backend and fans results out to subscribers. Backend failures back off
/// one second and retry; nothing is skipped, because cursors only advance
/// on delivery.
pub struct StreamDriver<B: StreamBackend> {
    backend: Arc<B>,
    subs: Arc<Mutex<Vec<Subscription>>>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    log: Logger,
}

impl<B: StreamBackend> StreamDriver<B> {
    pub fn new<'a, L: Into<Option<&'a Logger>>>(backend: Arc<B>, log: L) -> StreamDriver<B> {
        StreamDriver {
            backend,
            subs: Arc::new(Mutex::new(Vec::new())),
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
            log: logging::child(log),
        }
    }

    fn poll_loop(
        backend: Arc<B>,
        subs: Arc<Mutex<Vec<Subscription>>>,
        running: Arc<AtomicBool>,
        log: Logger,
    ) {
        while running.load(Ordering::Acquire) {
            let cursors: Vec<(String, EntryId)> = subs
                .lock()
                .iter()
                .map(|sub| (sub.topic.clone(), sub.last_id))
                .collect();

            if cursors.is_empty() {
                std::thread::sleep(POLL_BLOCK);
                continue;
            }

            match backend.read_from(&cursors, POLL_BLOCK, POLL_BATCH) {
                Ok(entries) => {
                    if entries.is_empty() {
                        continue;
                    }

                    let mut subs = subs.lock();
                    for entry in &entries {
                        for sub in subs.iter_mut() {
                            if sub.topic == entry.topic && entry.id > sub.last_id {
                                sub.last_id = entry.id;
                                (sub.callback)(&entry.topic, &entry.payload);
                            }
                        }
                    }
                }
                Err(err) => {
                    logging::warn!(log, "stream poll failed"; "error" => ?err);
                    std::thread::sleep(FAILURE_BACKOFF);
                }
            }
        }
    }
}

impl<B: StreamBackend> MessageDriver for StreamDriver<B> {
    fn connect(&self, url: &str) -> MqResult<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        logging::info!(self.log, "stream driver connected"; "url" => url);

        let backend = Arc::clone(&self.backend);
        let subs = Arc::clone(&self.subs);
        let running = Arc::clone(&self.running);
        let log = self.log.clone();

        *self.worker.lock() = Some(std::thread::spawn(move || {
            Self::poll_loop(backend, subs, running, log);
        }));

        Ok(())
    }

    fn disconnect(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
    }

    fn publish(&self, topic: &str, payload: &[u8]) -> MqResult<()> {
        self.backend.append(topic, payload).map(|_| ())
    }

    /// Cursor starts at the topic tail: only entries appended after the
    /// subscription are delivered.
    fn subscribe(&self, topic: &str, callback: MessageCallback) -> MqResult<()> {
        let last_id = self.backend.tail_id(topic);
        self.subs.lock().push(Subscription {
            topic: topic.to_string(),
            last_id,
            callback,
        });
        Ok(())
    }
}

impl<B: StreamBackend> Drop for StreamDriver<B> {
    fn drop(&mut self) {
        self.disconnect();
    }
}
