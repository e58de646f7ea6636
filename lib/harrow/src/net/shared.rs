use std::io;
use std::net;

/// Hard upper bound for a single framed packet, header included.
pub const MAX_PACKET_SIZE: usize = 10 * 1024;

pub type NetResult<T> = Result<T, NetError>;

/// Every fallible operation on the packet pipeline resolves to either "come
/// back later" or "this connection is done".
#[derive(Debug, Eq, PartialEq)]
pub enum NetError {
    /// The operation cannot make progress right now (partial frame, socket
    /// not ready). Not an error condition.
    Wait,
    /// The connection must be closed.
    Fatal(FatalKind),
}

#[derive(Debug, Eq, PartialEq)]
pub enum FatalKind {
    /// Header `size` below the header size or above [`MAX_PACKET_SIZE`].
    SizeOutOfRange,
    /// A write would exceed the receive buffer capacity.
    BufferOverrun,
    /// The receive buffer is full and no frame can be extracted.
    Wedged,
    /// Sustained rate-limiter breach.
    RateLimit,
    /// The packet pool is at its hard cap.
    PoolExhausted,
    AddrParse,
    Io(io::ErrorKind),
}

impl From<io::Error> for NetError {
    #[inline]
    fn from(io_error: io::Error) -> Self {
        match io_error.kind() {
            io::ErrorKind::WouldBlock => NetError::Wait,
            kind => NetError::Fatal(FatalKind::Io(kind)),
        }
    }
}

impl From<net::AddrParseError> for NetError {
    #[inline]
    fn from(_: net::AddrParseError) -> Self {
        NetError::Fatal(FatalKind::AddrParse)
    }
}

pub trait ErrorUtils {
    fn has_failed(&self) -> bool;
}

impl<T> ErrorUtils for NetResult<T> {
    fn has_failed(&self) -> bool {
        match self {
            Ok(_) => false,
            Err(NetError::Wait) => false,
            _ => true,
        }
    }
}
