use crate::db::pool::DbPool;
use crate::dispatch::dispatcher::{Dispatcher, DispatcherHandle};
use crate::dispatch::timer::TimerApi;
use crate::events::EventBus;
use crate::mq::MessageSystem;
use crate::net::packet::PacketPool;
use crate::net::session::SessionRegistry;
use flint::logging::{self, Logger};
use std::sync::Arc;

/// Default hard cap on live packet buffers.
pub const DEFAULT_MAX_PACKETS: usize = 4096;

/// The service bundle handed to every subsystem. Where the original design
/// reached for singletons, this is an explicitly constructed value: whoever
/// builds the process decides what goes in.
pub struct Framework<A> {
    pub dispatcher: DispatcherHandle<A>,
    pub timers: TimerApi<A>,
    pub pool: PacketPool,
    pub sessions: Arc<SessionRegistry>,
    pub events: Arc<EventBus<A>>,
    pub db: Arc<DbPool>,
    pub mq: Arc<MessageSystem>,
    pub log: Logger,
}

impl<A> Clone for Framework<A> {
    fn clone(&self) -> Self {
        Framework {
            dispatcher: self.dispatcher.clone(),
            timers: self.timers.clone(),
            pool: self.pool.clone(),
            sessions: Arc::clone(&self.sessions),
            events: Arc::clone(&self.events),
            db: Arc::clone(&self.db),
            mq: Arc::clone(&self.mq),
            log: self.log.clone(),
        }
    }
}

impl<A: 'static> Framework<A> {
    /// Builds a dispatcher plus a framework with in-process defaults: a
    /// fresh packet pool and registry, an empty DB pool and no MQ drivers.
    /// The binary swaps in real services; tests use it as-is.
    pub fn standalone<'a, L: Into<Option<&'a Logger>>>(soft_cap: usize, log: L) -> (Dispatcher<A>, Framework<A>) {
        let log = logging::child(log);
        let dispatcher = Dispatcher::new(soft_cap, &log);
        let handle = dispatcher.handle();

        let fw = Framework {
            timers: TimerApi::new(handle.clone()),
            dispatcher: handle,
            pool: PacketPool::new(DEFAULT_MAX_PACKETS),
            sessions: Arc::new(SessionRegistry::new(&log)),
            events: Arc::new(EventBus::new(&log)),
            db: Arc::new(DbPool::empty(&log)),
            mq: Arc::new(MessageSystem::new(&log)),
            log,
        };

        (dispatcher, fw)
    }
}
