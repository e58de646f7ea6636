#![allow(clippy::len_without_is_empty)]
#![allow(clippy::new_without_default)]

//! `harrow` is the server framework the survivor game is built on: the
//! packet pipeline (pool, receive buffer, rate limiter, reactor), the
//! single-threaded logic dispatcher with strands and timers, the typed event
//! bus, session lifetime management, the DB connection pool and the message
//! queue drivers.
//!
//! The split of responsibilities follows one rule: I/O worker threads own
//! sockets and per-session buffers, the logic thread owns everything else.
//! Cross-thread hand-off always goes through the dispatcher queue.

pub mod db;
pub mod dispatch;
pub mod events;
pub mod framework;
pub mod mq;
pub mod net;

pub mod prelude {
    pub use crate::dispatch::dispatcher::{Admission, Ctx, Dispatcher, DispatcherHandle, PacketView};
    pub use crate::dispatch::handlers::HandlerRegistry;
    pub use crate::dispatch::strand::StrandKey;
    pub use crate::dispatch::timer::{TimerApi, TimerEvent, TimerFire, TimerHandle};
    pub use crate::events::EventBus;
    pub use crate::framework::Framework;
    pub use crate::net::packet::{Packet, PacketBuf, PacketHeader, PacketPool};
    pub use crate::net::session::{Session, SessionRegistry, SessionState};
}
