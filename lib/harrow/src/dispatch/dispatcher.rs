use crate::dispatch::handlers::HandlerRegistry;
use crate::dispatch::strand::{StrandKey, StrandSet};
use crate::dispatch::timer::{TimerCmd, TimerWheel};
use crate::framework::Framework;
use crate::net::packet::Packet;
use crate::net::session::Session;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use flint::logging::{self, Logger};
use flint::SessionId;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Longest the logic thread sleeps with no timer armed.
const IDLE_WAIT: Duration = Duration::from_millis(100);

/// Everything a callback on the logic thread can reach: the application
/// state it owns exclusively, and the framework services.
pub struct Ctx<'a, A> {
    pub app: &'a mut A,
    pub fw: &'a Framework<A>,
}

/// Decoded header view over a delivered packet body.
#[derive(Debug, Clone, Copy)]
pub struct PacketView<'a> {
    pub id: u16,
    pub body: &'a [u8],
}

pub type Task<A> = Box<dyn FnOnce(&mut Ctx<'_, A>) + Send>;

pub enum Work<A> {
    /// A framed packet produced by an I/O thread.
    Packet { session_id: SessionId, packet: Packet },
    /// Run a closure on the logic thread.
    Task(Task<A>),
    /// Run a closure on the logic thread, serialized through a strand.
    Stranded { key: StrandKey, task: Task<A> },
    Timer(TimerCmd<A>),
    Shutdown,
}

/// Admission verdict for a delivered packet, reported back to the reactor.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Admission {
    Accepted,
    /// Queue depth crossed the soft cap; pause reads for the session.
    Overloaded,
}

/// Cheap cloneable producer side of the dispatcher queue. Safe to use from
/// any thread.
pub struct DispatcherHandle<A> {
    tx: Sender<Work<A>>,
    depth: Arc<AtomicUsize>,
    soft_cap: usize,
}

impl<A> Clone for DispatcherHandle<A> {
    fn clone(&self) -> Self {
        DispatcherHandle {
            tx: self.tx.clone(),
            depth: Arc::clone(&self.depth),
            soft_cap: self.soft_cap,
        }
    }
}

impl<A: 'static> DispatcherHandle<A> {
    fn push(&self, work: Work<A>) {
        self.depth.fetch_add(1, Ordering::Relaxed);
        if self.tx.send(work).is_err() {
            // Logic thread already gone; the work is dropped.
            self.depth.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Hands a framed packet to the logic thread.
    pub fn deliver(&self, session_id: SessionId, packet: Packet) -> Admission {
        self.push(Work::Packet { session_id, packet });
        if self.depth() > self.soft_cap {
            Admission::Overloaded
        } else {
            Admission::Accepted
        }
    }

    pub fn post<F>(&self, f: F)
    where
        F: FnOnce(&mut Ctx<'_, A>) + Send + 'static,
    {
        self.push(Work::Task(Box::new(f)));
    }

    pub fn stranded<F>(&self, key: StrandKey, f: F)
    where
        F: FnOnce(&mut Ctx<'_, A>) + Send + 'static,
    {
        self.push(Work::Stranded {
            key,
            task: Box::new(f),
        });
    }

    pub(crate) fn timer_cmd(&self, cmd: TimerCmd<A>) {
        self.push(Work::Timer(cmd));
    }

    pub fn shutdown(&self) {
        self.push(Work::Shutdown);
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// True once the queue has drained below the recovery watermark;
    /// paused sessions resume reading.
    pub fn is_recovered(&self) -> bool {
        self.depth() < self.soft_cap / 2
    }
}

/// Single-consumer side: owns the timer wheel and strand queues, drains the
/// work queue on exactly one thread.
pub struct Dispatcher<A> {
    rx: Receiver<Work<A>>,
    handle: DispatcherHandle<A>,
    timers: TimerWheel<A>,
    strands: StrandSet<A>,
    log: Logger,
}

impl<A: 'static> Dispatcher<A> {
    pub fn new<'a, L: Into<Option<&'a Logger>>>(soft_cap: usize, log: L) -> Dispatcher<A> {
        let (tx, rx) = channel::unbounded();
        let log = logging::child(log);

        Dispatcher {
            rx,
            handle: DispatcherHandle {
                tx,
                depth: Arc::new(AtomicUsize::new(0)),
                soft_cap,
            },
            timers: TimerWheel::new(),
            strands: StrandSet::new(),
            log,
        }
    }

    pub fn handle(&self) -> DispatcherHandle<A> {
        self.handle.clone()
    }

    /// Runs the logic loop until shutdown is observed. Every iteration
    /// drains ready work first (so pending timer cancels are observed),
    /// fires due timers, then sleeps until the next deadline.
    pub fn run(mut self, app: &mut A, fw: &Framework<A>, handlers: &HandlerRegistry<A>) {
        logging::info!(self.log, "logic dispatcher running");

        'outer: loop {
            loop {
                match self.rx.try_recv() {
                    Ok(work) => {
                        self.handle.depth.fetch_sub(1, Ordering::Relaxed);
                        if !self.dispatch(work, app, fw, handlers) {
                            break 'outer;
                        }
                    }
                    Err(_) => break,
                }
            }

            self.timers.run_due(app, fw);

            let timeout = match self.timers.until_next() {
                Some(next) => next.min(IDLE_WAIT),
                None => IDLE_WAIT,
            };

            match self.rx.recv_timeout(timeout) {
                Ok(work) => {
                    self.handle.depth.fetch_sub(1, Ordering::Relaxed);
                    if !self.dispatch(work, app, fw, handlers) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        logging::info!(self.log, "logic dispatcher stopped");
    }

    /// Returns false when the loop must stop.
    fn dispatch(&mut self, work: Work<A>, app: &mut A, fw: &Framework<A>, handlers: &HandlerRegistry<A>) -> bool {
        match work {
            Work::Packet { session_id, packet } => {
                self.deliver_packet(session_id, packet, app, fw, handlers);
            }
            Work::Task(task) => {
                let mut ctx = Ctx { app: &mut *app, fw };
                task(&mut ctx);
            }
            Work::Stranded { key, task } => {
                self.strands.run(key, task, app, fw);
            }
            Work::Timer(cmd) => {
                self.timers.apply(cmd);
            }
            Work::Shutdown => return false,
        }

        true
    }

    fn deliver_packet(
        &mut self,
        session_id: SessionId,
        packet: Packet,
        app: &mut A,
        fw: &Framework<A>,
        handlers: &HandlerRegistry<A>,
    ) {
        // The session must still be registered and connected; packets for
        // closed sessions drain here by being discarded.
        let session: Arc<Session> = match fw.sessions.get(session_id) {
            Some(session) if session.is_connected() => session,
            _ => {
                logging::debug!(self.log, "packet for dead session dropped"; "session_id" => session_id);
                return;
            }
        };

        let header = match packet.header() {
            Some(header) => header,
            None => {
                logging::warn!(self.log, "undersized packet dropped"; "session_id" => session_id);
                return;
            }
        };

        let view = PacketView {
            id: header.id,
            body: packet.body(),
        };

        let mut ctx = Ctx { app: &mut *app, fw };
        handlers.dispatch(&mut ctx, &session, view);
        // `packet` drops here: the delivery reference is released.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::Framework;
    use std::sync::Mutex;

    struct TestApp {
        seen: Vec<u32>,
    }

    fn fixture() -> (Dispatcher<TestApp>, Framework<TestApp>, TestApp) {
        let (dispatcher, fw) = Framework::standalone(64, None);
        (dispatcher, fw, TestApp { seen: Vec::new() })
    }

    #[test]
    fn test_tasks_run_fifo() {
        let (dispatcher, fw, mut app) = fixture();
        let handle = dispatcher.handle();

        for i in 0..10u32 {
            handle.post(move |ctx: &mut Ctx<'_, TestApp>| ctx.app.seen.push(i));
        }
        handle.shutdown();

        dispatcher.run(&mut app, &fw, &HandlerRegistry::new(None));
        assert_eq!(app.seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_cross_thread_posts() {
        let (dispatcher, fw, mut app) = fixture();
        let handle = dispatcher.handle();

        let threads: Vec<_> = (0..4)
            .map(|t| {
                let handle = handle.clone();
                std::thread::spawn(move || {
                    for i in 0..25u32 {
                        handle.post(move |ctx: &mut Ctx<'_, TestApp>| ctx.app.seen.push(t * 100 + i));
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        handle.shutdown();

        dispatcher.run(&mut app, &fw, &HandlerRegistry::new(None));

        // All 100 tasks ran, and each producer's tasks ran in its order.
        assert_eq!(app.seen.len(), 100);
        for t in 0..4u32 {
            let per: Vec<_> = app.seen.iter().filter(|v| **v / 100 == t).collect();
            assert_eq!(per.len(), 25);
            assert!(per.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_overload_admission() {
        let (dispatcher, fw, _app) = fixture();
        let handle: DispatcherHandle<TestApp> = dispatcher.handle();
        let pool = crate::net::packet::PacketPool::new(256);

        let packet = {
            let mut buf = pool.acquire(4).unwrap();
            crate::net::packet::PacketHeader { size: 4, id: 1 }.write_to(buf.as_mut());
            buf.set_used(4);
            buf.freeze()
        };

        let mut overloaded = false;
        for _ in 0..70 {
            if handle.deliver(1, packet.clone()) == Admission::Overloaded {
                overloaded = true;
                break;
            }
        }
        assert!(overloaded, "soft cap of 64 must trip within 70 deliveries");
        assert!(!handle.is_recovered());
        drop(fw);
    }

    #[test]
    fn test_unknown_session_packet_dropped() {
        let (dispatcher, fw, mut app) = fixture();
        let handle = dispatcher.handle();
        let pool = crate::net::packet::PacketPool::new(4);

        let mut buf = pool.acquire(8).unwrap();
        crate::net::packet::PacketHeader { size: 8, id: 99 }.write_to(buf.as_mut());
        buf.set_used(8);
        let packet = buf.freeze();

        handle.deliver(12345, packet.clone());
        handle.shutdown();
        dispatcher.run(&mut app, &fw, &HandlerRegistry::new(None));

        // The delivery reference was released back to us.
        assert_eq!(packet.ref_count(), 1);
    }
}
