use crate::net::packet::Packet;
use flint::logging::{self, Logger};
use flint::SessionId;
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Allocates a process-unique session id. Ids are never reused.
#[inline]
pub fn alloc_session_id() -> SessionId {
    NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[repr(u8)]
pub enum SessionState {
    Connecting = 0,
    Connected = 1,
    Closing = 2,
    Closed = 3,
}

impl SessionState {
    fn from_u8(value: u8) -> SessionState {
        match value {
            0 => SessionState::Connecting,
            1 => SessionState::Connected,
            2 => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }
}

/// Called by `Session::send` to nudge the owning I/O worker. Tests pass a
/// no-op and inspect the queue directly.
pub type WakeFn = Arc<dyn Fn() + Send + Sync>;

/// One connected client. The I/O worker owns the socket and buffers; this
/// object is the cross-thread surface: state, the outbound packet queue and
/// overload bookkeeping.
///
/// Lifetime is the `Arc` count: the worker and the registry each hold a
/// reference, handlers take transient ones through `with_session`. The
/// session object dies when the socket is closed and the last reference
/// drops.
pub struct Session {
    id: SessionId,
    state: AtomicU8,
    outbound: Mutex<VecDeque<Packet>>,
    wake: WakeFn,
    reads_paused: AtomicBool,
    rate_drops: AtomicU32,
}

impl Session {
    pub fn new(id: SessionId, wake: WakeFn) -> Session {
        Session {
            id,
            state: AtomicU8::new(SessionState::Connecting as u8),
            outbound: Mutex::new(VecDeque::new()),
            wake,
            reads_paused: AtomicBool::new(false),
            rate_drops: AtomicU32::new(0),
        }
    }

    #[inline]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Queues a packet for transmission and wakes the I/O worker. Refused
    /// once the session has left the Connected state; packets accepted
    /// before that still drain.
    pub fn send(&self, packet: Packet) -> bool {
        if !self.is_connected() {
            return false;
        }

        self.outbound.lock().push_back(packet);
        (self.wake)();
        true
    }

    /// Requests a cooperative close: already-queued packets flush first.
    pub fn close(&self) {
        let connected = SessionState::Connected as u8;
        let closing = SessionState::Closing as u8;
        let _ = self
            .state
            .compare_exchange(connected, closing, Ordering::AcqRel, Ordering::Acquire);
        (self.wake)();
    }

    /// Pops the next queued packet. Consumed by the owning I/O worker;
    /// tests use it to inspect what a session would have transmitted.
    pub fn take_next_outbound(&self) -> Option<Packet> {
        self.outbound.lock().pop_front()
    }

    pub fn pending_sends(&self) -> usize {
        self.outbound.lock().len()
    }

    #[inline]
    pub fn pause_reads(&self) {
        self.reads_paused.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn resume_reads(&self) {
        self.reads_paused.store(false, Ordering::Relaxed);
    }

    #[inline]
    pub fn reads_paused(&self) -> bool {
        self.reads_paused.load(Ordering::Relaxed)
    }

    /// Records a rate-limited frame drop; returns the consecutive count.
    #[inline]
    pub fn note_rate_drop(&self) -> u32 {
        self.rate_drops.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// An admitted frame ends a breach streak.
    #[inline]
    pub fn clear_rate_drops(&self) {
        self.rate_drops.store(0, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("pending_sends", &self.pending_sends())
            .finish()
    }
}

/// Session id -> session table. All mutations are O(1) under one mutex.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, Arc<Session>>>,
    log: Logger,
}

impl SessionRegistry {
    pub fn new<'a, L: Into<Option<&'a Logger>>>(log: L) -> SessionRegistry {
        SessionRegistry {
            sessions: Mutex::new(HashMap::new()),
            log: logging::child(log),
        }
    }

    pub fn register(&self, session: Arc<Session>) {
        logging::debug!(self.log, "session registered"; "session_id" => session.id());
        self.sessions.lock().insert(session.id(), session);
    }

    /// Removes the session from the table. In-flight references keep the
    /// object alive until they drain; no new packets reach it afterwards.
    pub fn unregister(&self, session_id: SessionId) -> Option<Arc<Session>> {
        let removed = self.sessions.lock().remove(&session_id);
        if removed.is_some() {
            logging::debug!(self.log, "session unregistered"; "session_id" => session_id);
        }
        removed
    }

    /// Clones the `Arc` out of the table. The strong count is the ref-count
    /// that keeps the session alive while a handler uses it.
    pub fn get(&self, session_id: SessionId) -> Option<Arc<Session>> {
        self.sessions.lock().get(&session_id).cloned()
    }

    /// Runs `f` with the session pinned alive. The registry lock is not
    /// held while `f` runs.
    pub fn with_session<R>(&self, session_id: SessionId, f: impl FnOnce(&Arc<Session>) -> R) -> Option<R> {
        let session = self.get(session_id)?;
        Some(f(&session))
    }

    pub fn count(&self) -> usize {
        self.sessions.lock().len()
    }
}

#[cfg(test)]
pub(crate) fn noop_wake() -> WakeFn {
    Arc::new(|| {})
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::packet::{PacketHeader, PacketPool};

    fn test_packet(pool: &PacketPool) -> Packet {
        let mut buf = pool.acquire(PacketHeader::SIZE).unwrap();
        PacketHeader { size: 4, id: 1 }.write_to(buf.as_mut());
        buf.set_used(4);
        buf.freeze()
    }

    #[test]
    fn test_send_requires_connected() {
        let pool = PacketPool::new(4);
        let session = Session::new(alloc_session_id(), noop_wake());

        assert!(!session.send(test_packet(&pool)));

        session.set_state(SessionState::Connected);
        assert!(session.send(test_packet(&pool)));
        assert_eq!(session.pending_sends(), 1);

        session.set_state(SessionState::Closed);
        assert!(!session.send(test_packet(&pool)));
        // The accepted packet is still queued for draining.
        assert_eq!(session.pending_sends(), 1);
    }

    #[test]
    fn test_send_wakes_worker() {
        use std::sync::atomic::AtomicUsize;

        let pool = PacketPool::new(4);
        let wakes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&wakes);
        let session = Session::new(alloc_session_id(), Arc::new(move || {
            counter.fetch_add(1, Ordering::Relaxed);
        }));
        session.set_state(SessionState::Connected);

        session.send(test_packet(&pool));
        session.send(test_packet(&pool));
        assert_eq!(wakes.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_close_is_cooperative() {
        let session = Session::new(alloc_session_id(), noop_wake());
        session.set_state(SessionState::Connected);

        session.close();
        assert_eq!(session.state(), SessionState::Closing);

        // Closing again or closing a closed session changes nothing.
        session.set_state(SessionState::Closed);
        session.close();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_registry_lifetime() {
        let registry = SessionRegistry::new(None);
        let session = Arc::new(Session::new(alloc_session_id(), noop_wake()));
        let id = session.id();

        registry.register(Arc::clone(&session));
        assert_eq!(registry.count(), 1);

        let seen = registry.with_session(id, |s| s.id());
        assert_eq!(seen, Some(id));

        let removed = registry.unregister(id).unwrap();
        assert_eq!(removed.id(), id);
        assert!(registry.with_session(id, |_| ()).is_none());

        // The session object outlives the registry entry while referenced.
        assert_eq!(Arc::strong_count(&session), 2);
        drop(removed);
        assert_eq!(Arc::strong_count(&session), 1);
    }

    #[test]
    fn test_rate_drop_streak() {
        let session = Session::new(alloc_session_id(), noop_wake());

        assert_eq!(session.note_rate_drop(), 1);
        assert_eq!(session.note_rate_drop(), 2);
        session.clear_rate_drops();
        assert_eq!(session.note_rate_drop(), 1);
    }
}
