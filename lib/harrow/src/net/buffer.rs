use std::io;

/// 64 KiB covers the realistic backlog of a single game connection.
pub const DEFAULT_CAPACITY: usize = 64 * 1024;

/// Compaction only happens when free space falls under this threshold, so
/// the memmove cost is amortized over many frames.
pub const COMPACT_THRESHOLD: usize = 10 * 1024;

/// Outcome of draining a reader into the buffer.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Ingress {
    pub received: usize,
    /// The reader reported end-of-stream (orderly peer close).
    pub closed: bool,
}

/// Per-session linear receive buffer with lazy compaction.
///
/// Owned and mutated exclusively by the session's I/O thread; frames are
/// copied out into pooled packets before crossing to the logic thread, so
/// the buffer itself needs no synchronization.
pub struct RecvBuffer {
    buf: Vec<u8>,
    read_pos: usize,
    write_pos: usize,
}

impl RecvBuffer {
    pub fn new(capacity: usize) -> RecvBuffer {
        RecvBuffer {
            buf: vec![0u8; capacity],
            read_pos: 0,
            write_pos: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes received but not yet consumed.
    #[inline]
    pub fn data_size(&self) -> usize {
        self.write_pos - self.read_pos
    }

    /// Bytes writable past the current write cursor.
    #[inline]
    pub fn free_size(&self) -> usize {
        self.buf.len() - self.write_pos
    }

    /// The unconsumed region.
    #[inline]
    pub fn read_slice(&self) -> &[u8] {
        &self.buf[self.read_pos..self.write_pos]
    }

    /// The writable region.
    #[inline]
    pub fn write_slice(&mut self) -> &mut [u8] {
        &mut self.buf[self.write_pos..]
    }

    /// Consumes `count` bytes. False when `count` exceeds the data size.
    #[inline]
    pub fn advance_read(&mut self, count: usize) -> bool {
        if count > self.data_size() {
            return false;
        }
        self.read_pos += count;
        true
    }

    /// Commits `count` received bytes. False when `count` exceeds the free
    /// space; the caller must treat that as a protocol error.
    #[inline]
    pub fn advance_write(&mut self, count: usize) -> bool {
        if count > self.free_size() {
            return false;
        }
        self.write_pos += count;
        true
    }

    #[inline]
    pub fn reset(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
    }

    /// Reclaims consumed space. Fast path: empty buffer resets both
    /// cursors. Slow path: the unread region moves to the front, but only
    /// once free space runs below [`COMPACT_THRESHOLD`].
    pub fn clean(&mut self) {
        let data_size = self.data_size();

        if data_size == 0 {
            self.reset();
            return;
        }

        if self.free_size() < COMPACT_THRESHOLD {
            // Overlap-safe: source and destination are the same allocation.
            self.buf.copy_within(self.read_pos..self.write_pos, 0);
            self.read_pos = 0;
            self.write_pos = data_size;
        }
    }

    /// Reads from `reader` into free space until it would block, the peer
    /// closes, or the buffer fills. Cursor state survives a `WouldBlock`
    /// error; the bytes read before it are already committed.
    pub fn ingress<R: io::Read>(&mut self, mut reader: R) -> io::Result<Ingress> {
        let mut received = 0;

        while self.free_size() > 0 {
            let count = reader.read(self.write_slice())?;

            if count == 0 {
                return Ok(Ingress {
                    received,
                    closed: true,
                });
            }

            self.write_pos += count;
            received += count;
        }

        Ok(Ingress {
            received,
            closed: false,
        })
    }
}

impl Default for RecvBuffer {
    fn default() -> RecvBuffer {
        RecvBuffer::new(DEFAULT_CAPACITY)
    }
}
