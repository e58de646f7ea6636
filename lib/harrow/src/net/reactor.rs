use crate::dispatch::dispatcher::{Admission, Ctx, DispatcherHandle};
use crate::net::buffer::RecvBuffer;
use crate::net::limiter::RateLimiter;
use crate::net::packet::{Packet, PacketHeader, PacketPool};
use crate::net::session::{alloc_session_id, Session, SessionRegistry, SessionState, WakeFn};
use crate::net::shared::{FatalKind, NetResult};
use flint::logging::{self, Logger};
use flint::SessionId;
use hashbrown::HashMap;
use mio::net::TcpStream;
use mio::{Events, Interest, Poll, Token, Waker};
use parking_lot::Mutex;
use std::io::{self, Write};
use std::net::{Shutdown, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const WAKER_TOKEN: Token = Token(0);
const POLL_TIMEOUT: Duration = Duration::from_millis(50);
const ACCEPT_IDLE: Duration = Duration::from_millis(10);
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(3);

/// Where framed packets and connection changes go: the logic dispatcher,
/// behind a narrow seam so the reactor stays testable on its own.
pub trait PacketSink: Send + Sync {
    fn deliver(&self, session_id: SessionId, packet: Packet) -> Admission;
    fn connected(&self, session_id: SessionId);
    fn disconnected(&self, session_id: SessionId);

    /// True once the dispatcher has drained enough for paused sessions to
    /// resume reading.
    fn is_recovered(&self) -> bool;
}

pub type SessionHook<A> = Arc<dyn Fn(&mut Ctx<'_, A>, SessionId) + Send + Sync>;

/// The production [`PacketSink`]: packets go straight to the dispatcher,
/// lifecycle hooks are posted as logic-thread tasks.
pub struct DispatcherSink<A> {
    handle: DispatcherHandle<A>,
    on_connect: Option<SessionHook<A>>,
    on_disconnect: Option<SessionHook<A>>,
}

impl<A: 'static> DispatcherSink<A> {
    pub fn new(handle: DispatcherHandle<A>) -> DispatcherSink<A> {
        DispatcherSink {
            handle,
            on_connect: None,
            on_disconnect: None,
        }
    }

    pub fn on_connect<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Ctx<'_, A>, SessionId) + Send + Sync + 'static,
    {
        self.on_connect = Some(Arc::new(hook));
        self
    }

    pub fn on_disconnect<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Ctx<'_, A>, SessionId) + Send + Sync + 'static,
    {
        self.on_disconnect = Some(Arc::new(hook));
        self
    }
}

impl<A: 'static> PacketSink for DispatcherSink<A> {
    fn deliver(&self, session_id: SessionId, packet: Packet) -> Admission {
        self.handle.deliver(session_id, packet)
    }

    fn connected(&self, session_id: SessionId) {
        if let Some(hook) = &self.on_connect {
            let hook = Arc::clone(hook);
            self.handle.post(move |ctx| hook(ctx, session_id));
        }
    }

    fn disconnected(&self, session_id: SessionId) {
        if let Some(hook) = &self.on_disconnect {
            let hook = Arc::clone(hook);
            self.handle.post(move |ctx| hook(ctx, session_id));
        }
    }

    fn is_recovered(&self) -> bool {
        self.handle.is_recovered()
    }
}

#[derive(Debug, Clone)]
pub struct ReactorConfig {
    pub address: String,
    pub io_threads: usize,
    pub max_sessions: usize,
    /// Token bucket refill rate, packets per second.
    pub recv_rate: f64,
    /// Token bucket burst capacity.
    pub recv_burst: f64,
    /// Consecutive rate-limited drops before the session is closed.
    pub rate_drop_limit: u32,
    pub idle_timeout: Duration,
}

impl Default for ReactorConfig {
    fn default() -> ReactorConfig {
        ReactorConfig {
            address: "127.0.0.1:0".to_string(),
            io_threads: 2,
            max_sessions: 1024,
            recv_rate: 100.0,
            recv_burst: 200.0,
            rate_drop_limit: 256,
            idle_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Clone, Copy)]
struct RateLimits {
    rate: f64,
    burst: f64,
    rate_drop_limit: u32,
}

enum WorkerMsg {
    Adopt(TcpStream),
    Close(SessionId),
}

/// Cross-thread surface of one I/O worker: its waker plus the inbox and
/// pending-send lists other threads push into.
struct WorkerShared {
    waker: Waker,
    inbox: Mutex<Vec<WorkerMsg>>,
    pending: Mutex<Vec<SessionId>>,
}

struct Connection {
    stream: TcpStream,
    session: Arc<Session>,
    recv: RecvBuffer,
    limiter: RateLimiter,
    /// The single outstanding write: current packet and bytes sent so far.
    /// The packet reference is released on write completion.
    inflight: Option<(Packet, usize)>,
    last_ingress: Instant,
}

/// Accept loop plus parallel I/O worker threads. Workers own sockets and
/// per-session receive state; everything leaving a worker goes through the
/// [`PacketSink`].
pub struct Reactor {
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    workers: Vec<Arc<WorkerShared>>,
    worker_joins: Vec<JoinHandle<()>>,
    accept_join: Option<JoinHandle<()>>,
    log: Logger,
}

impl Reactor {
    pub fn bind<'a, L: Into<Option<&'a Logger>>>(
        config: ReactorConfig,
        pool: PacketPool,
        registry: Arc<SessionRegistry>,
        sink: Arc<dyn PacketSink>,
        log: L,
    ) -> NetResult<Reactor> {
        let log = logging::child(log);

        let addr: SocketAddr = config.address.parse()?;
        let listener = std::net::TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        logging::info!(log, "reactor listening"; "address" => %local_addr, "io_threads" => config.io_threads);

        let running = Arc::new(AtomicBool::new(true));
        let limits = RateLimits {
            rate: config.recv_rate,
            burst: config.recv_burst,
            rate_drop_limit: config.rate_drop_limit,
        };

        let mut workers = Vec::new();
        let mut worker_joins = Vec::new();

        for index in 0..config.io_threads.max(1) {
            let poll = Poll::new()?;
            let waker = Waker::new(poll.registry(), WAKER_TOKEN)?;

            let shared = Arc::new(WorkerShared {
                waker,
                inbox: Mutex::new(Vec::new()),
                pending: Mutex::new(Vec::new()),
            });

            let worker = IoWorker {
                poll,
                shared: Arc::clone(&shared),
                conns: Vec::new(),
                free: Vec::new(),
                by_session: HashMap::new(),
                registry: Arc::clone(&registry),
                sink: Arc::clone(&sink),
                pool: pool.clone(),
                limits,
                idle_timeout: config.idle_timeout,
                running: Arc::clone(&running),
                log: log.new(logging::o!("io_worker" => index)),
            };

            workers.push(shared);
            worker_joins.push(std::thread::spawn(move || worker.run()));
        }

        let accept_join = {
            let running = Arc::clone(&running);
            let workers = workers.clone();
            let registry = Arc::clone(&registry);
            let max_sessions = config.max_sessions;
            let log = log.new(logging::o!());
            let next = AtomicUsize::new(0);

            std::thread::spawn(move || {
                while running.load(Ordering::Acquire) {
                    match listener.accept() {
                        Ok((stream, peer)) => {
                            if registry.count() >= max_sessions {
                                logging::warn!(log, "session limit reached, connection refused"; "peer" => %peer);
                                continue;
                            }
                            if stream.set_nonblocking(true).is_err() {
                                continue;
                            }

                            let stream = TcpStream::from_std(stream);
                            let target = &workers[next.fetch_add(1, Ordering::Relaxed) % workers.len()];
                            target.inbox.lock().push(WorkerMsg::Adopt(stream));
                            let _ = target.waker.wake();
                        }
                        Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                            std::thread::sleep(ACCEPT_IDLE);
                        }
                        Err(err) => {
                            logging::error!(log, "accept failed"; "error" => ?err);
                            std::thread::sleep(ACCEPT_IDLE);
                        }
                    }
                }
            })
        };

        Ok(Reactor {
            local_addr,
            running,
            workers,
            worker_joins,
            accept_join: Some(accept_join),
            log,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Asks a worker to close a session's socket. The logic-thread path is
    /// `Session::close`, which flushes first; this is the hard variant.
    pub fn drop_session(&self, session_id: SessionId) {
        for worker in &self.workers {
            worker.inbox.lock().push(WorkerMsg::Close(session_id));
            let _ = worker.waker.wake();
        }
    }

    pub fn shutdown(&mut self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        logging::info!(self.log, "reactor shutting down");

        for worker in &self.workers {
            let _ = worker.waker.wake();
        }
        if let Some(join) = self.accept_join.take() {
            let _ = join.join();
        }
        for join in self.worker_joins.drain(..) {
            let _ = join.join();
        }
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct IoWorker {
    poll: Poll,
    shared: Arc<WorkerShared>,
    conns: Vec<Option<Connection>>,
    free: Vec<usize>,
    by_session: HashMap<SessionId, usize>,
    registry: Arc<SessionRegistry>,
    sink: Arc<dyn PacketSink>,
    pool: PacketPool,
    limits: RateLimits,
    idle_timeout: Duration,
    running: Arc<AtomicBool>,
    log: Logger,
}

impl IoWorker {
    fn run(mut self) {
        let mut events = Events::with_capacity(1024);
        let mut ready: Vec<(usize, bool, bool)> = Vec::new();
        let mut last_housekeeping = Instant::now();

        while self.running.load(Ordering::Acquire) {
            if let Err(err) = self.poll.poll(&mut events, Some(POLL_TIMEOUT)) {
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                logging::error!(self.log, "poll failed"; "error" => ?err);
                break;
            }

            ready.clear();
            for event in events.iter() {
                let token = event.token();
                if token == WAKER_TOKEN {
                    continue;
                }
                ready.push((
                    token.0 - 1,
                    event.is_readable() || event.is_read_closed(),
                    event.is_writable(),
                ));
            }

            for &(slot, readable, writable) in &ready {
                if readable {
                    self.on_readable(slot);
                }
                if writable {
                    self.on_writable(slot);
                }
            }

            self.drain_inbox();
            self.drain_pending_sends();
            self.resume_paused();

            if last_housekeeping.elapsed() >= HOUSEKEEPING_INTERVAL {
                self.housekeeping();
                last_housekeeping = Instant::now();
            }
        }

        let slots: Vec<usize> = (0..self.conns.len()).collect();
        for slot in slots {
            self.close_conn(slot);
        }
    }

    fn adopt(&mut self, mut stream: TcpStream) {
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.conns.push(None);
                self.conns.len() - 1
            }
        };

        if let Err(err) = self
            .poll
            .registry()
            .register(&mut stream, Token(slot + 1), Interest::READABLE | Interest::WRITABLE)
        {
            logging::error!(self.log, "stream registration failed"; "error" => ?err);
            self.free.push(slot);
            return;
        }

        let session_id = alloc_session_id();
        let shared = Arc::clone(&self.shared);
        let wake: WakeFn = Arc::new(move || {
            shared.pending.lock().push(session_id);
            let _ = shared.waker.wake();
        });

        let session = Arc::new(Session::new(session_id, wake));
        session.set_state(SessionState::Connected);

        self.registry.register(Arc::clone(&session));
        self.by_session.insert(session_id, slot);
        self.conns[slot] = Some(Connection {
            stream,
            session,
            recv: RecvBuffer::default(),
            limiter: RateLimiter::new(self.limits.rate, self.limits.burst),
            inflight: None,
            last_ingress: Instant::now(),
        });

        self.sink.connected(session_id);
        logging::info!(self.log, "session connected"; "session_id" => session_id);
    }

    fn on_readable(&mut self, slot: usize) {
        let mut fatal: Option<FatalKind> = None;
        let mut eof = false;

        loop {
            let Some(conn) = self.conns.get_mut(slot).and_then(Option::as_mut) else {
                return;
            };
            if conn.session.reads_paused() {
                return;
            }

            let mut socket_drained = false;
            match conn.recv.ingress(&mut conn.stream) {
                Ok(result) => {
                    if result.received > 0 {
                        conn.last_ingress = Instant::now();
                    }
                    if result.closed {
                        eof = true;
                    }
                    // Otherwise the buffer filled: frame, clean, read again.
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => socket_drained = true,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => fatal = Some(FatalKind::Io(err.kind())),
            }

            if fatal.is_none() {
                match Self::process_frames(conn, self.sink.as_ref(), &self.pool, self.limits, &self.log) {
                    Ok(()) => {
                        conn.recv.clean();
                        if !eof && conn.recv.free_size() == 0 {
                            // No frame could be extracted from a full
                            // buffer: the session is wedged.
                            fatal = Some(FatalKind::Wedged);
                        }
                    }
                    Err(kind) => fatal = Some(kind),
                }
            }

            if fatal.is_some() || eof {
                break;
            }
            if socket_drained {
                return;
            }
        }

        if let Some(kind) = fatal {
            logging::debug!(self.log, "closing session on error"; "slot" => slot, "kind" => ?kind);
        }
        self.close_conn(slot);
    }

    /// The frame loop: validate header, admit through the rate limiter,
    /// copy into a pooled packet and hand off to the sink.
    fn process_frames(
        conn: &mut Connection,
        sink: &dyn PacketSink,
        pool: &PacketPool,
        limits: RateLimits,
        log: &Logger,
    ) -> Result<(), FatalKind> {
        while conn.recv.data_size() >= PacketHeader::SIZE {
            let Some(header) = PacketHeader::peek(conn.recv.read_slice()) else {
                break;
            };

            // An out-of-range size closes the session without consuming
            // any body bytes.
            if !header.size_in_range() {
                return Err(FatalKind::SizeOutOfRange);
            }

            let frame_len = header.size as usize;
            if conn.recv.data_size() < frame_len {
                break;
            }

            if !conn.limiter.try_consume(1.0) {
                conn.recv.advance_read(frame_len);
                let streak = conn.session.note_rate_drop();
                logging::debug!(log, "rate limited frame dropped";
                                "session_id" => conn.session.id(),
                                "streak" => streak);
                if streak >= limits.rate_drop_limit {
                    return Err(FatalKind::RateLimit);
                }
                continue;
            }
            conn.session.clear_rate_drops();

            let Some(mut buf) = pool.acquire(frame_len) else {
                // Pool at its hard cap: shed this frame, keep the session.
                conn.recv.advance_read(frame_len);
                logging::warn!(log, "packet pool exhausted, frame dropped";
                               "session_id" => conn.session.id());
                continue;
            };

            buf.fill(&conn.recv.read_slice()[..frame_len]);
            conn.recv.advance_read(frame_len);

            if sink.deliver(conn.session.id(), buf.freeze()) == Admission::Overloaded {
                conn.session.pause_reads();
                logging::debug!(log, "dispatcher overloaded, reads paused";
                                "session_id" => conn.session.id());
            }
        }

        Ok(())
    }

    fn on_writable(&mut self, slot: usize) {
        let should_close = {
            let Some(conn) = self.conns.get_mut(slot).and_then(Option::as_mut) else {
                return;
            };

            match Self::flush_outbound(conn) {
                Ok(()) => {
                    let drained = conn.inflight.is_none() && conn.session.pending_sends() == 0;
                    conn.session.state() == SessionState::Closing && drained
                }
                Err(err) => {
                    logging::debug!(self.log, "write failed"; "slot" => slot, "error" => ?err);
                    true
                }
            }
        };

        if should_close {
            self.close_conn(slot);
        }
    }

    /// Maintains a single outstanding write. Completion releases the
    /// packet's reference and starts the next one.
    fn flush_outbound(conn: &mut Connection) -> io::Result<()> {
        loop {
            if conn.inflight.is_none() {
                match conn.session.take_next_outbound() {
                    Some(packet) => conn.inflight = Some((packet, 0)),
                    None => return Ok(()),
                }
            }

            let completed = {
                let (packet, offset) = conn.inflight.as_mut().expect("inflight set above");
                match conn.stream.write(&packet.bytes()[*offset..]) {
                    Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                    Ok(count) => {
                        *offset += count;
                        *offset == packet.bytes().len()
                    }
                    Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => false,
                    Err(err) => return Err(err),
                }
            };

            if completed {
                conn.inflight = None;
            }
        }
    }

    fn drain_inbox(&mut self) {
        let inbox: Vec<WorkerMsg> = std::mem::take(&mut *self.shared.inbox.lock());

        for msg in inbox {
            match msg {
                WorkerMsg::Adopt(stream) => self.adopt(stream),
                WorkerMsg::Close(session_id) => {
                    if let Some(&slot) = self.by_session.get(&session_id) {
                        self.close_conn(slot);
                    }
                }
            }
        }
    }

    fn drain_pending_sends(&mut self) {
        let pending: Vec<SessionId> = std::mem::take(&mut *self.shared.pending.lock());

        for session_id in pending {
            if let Some(&slot) = self.by_session.get(&session_id) {
                self.on_writable(slot);
            }
        }
    }

    fn resume_paused(&mut self) {
        let paused: Vec<usize> = self
            .conns
            .iter()
            .enumerate()
            .filter_map(|(slot, conn)| match conn {
                Some(conn) if conn.session.reads_paused() => Some(slot),
                _ => None,
            })
            .collect();

        if paused.is_empty() || !self.sink.is_recovered() {
            return;
        }

        for slot in paused {
            if let Some(conn) = self.conns[slot].as_ref() {
                conn.session.resume_reads();
                logging::debug!(self.log, "reads resumed"; "session_id" => conn.session.id());
            }
            self.on_readable(slot);
        }
    }

    fn housekeeping(&mut self) {
        let now = Instant::now();

        let stale: Vec<usize> = self
            .conns
            .iter()
            .enumerate()
            .filter_map(|(slot, conn)| match conn {
                Some(conn) if now.duration_since(conn.last_ingress) >= self.idle_timeout => Some(slot),
                Some(conn) if conn.session.state() == SessionState::Closing => {
                    // A close requested with nothing queued would otherwise
                    // wait for the peer; sweep it here.
                    let drained = conn.inflight.is_none() && conn.session.pending_sends() == 0;
                    drained.then_some(slot)
                }
                _ => None,
            })
            .collect();

        for slot in stale {
            logging::info!(self.log, "reaping idle or closing session"; "slot" => slot);
            self.close_conn(slot);
        }
    }

    fn close_conn(&mut self, slot: usize) {
        let Some(mut conn) = self.conns.get_mut(slot).and_then(Option::take) else {
            return;
        };

        let session_id = conn.session.id();
        let _ = self.poll.registry().deregister(&mut conn.stream);
        let _ = conn.stream.shutdown(Shutdown::Both);

        conn.session.set_state(SessionState::Closed);
        self.registry.unregister(session_id);
        self.by_session.remove(&session_id);
        self.free.push(slot);

        self.sink.disconnected(session_id);
        logging::info!(self.log, "session closed"; "session_id" => session_id);
    }
}
