//! The networking modules handle all communication between clients and the
//! server: framing, buffering, admission control and the socket reactor.

pub mod buffer;
pub mod codec;
pub mod limiter;
pub mod packet;
pub mod reactor;
pub mod session;
pub mod shared;
