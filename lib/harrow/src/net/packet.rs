use crate::net::shared::MAX_PACKET_SIZE;
use byteorder::{ByteOrder, LittleEndian};
use crossbeam::queue::SegQueue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Packed little-endian wire header: total framed size (header included)
/// followed by the protocol id.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PacketHeader {
    pub size: u16,
    pub id: u16,
}

impl PacketHeader {
    pub const SIZE: usize = 4;

    /// Reads a header off the front of `buf` without consuming it.
    #[inline]
    pub fn peek(buf: &[u8]) -> Option<PacketHeader> {
        if buf.len() < Self::SIZE {
            return None;
        }

        Some(PacketHeader {
            size: LittleEndian::read_u16(&buf[0..2]),
            id: LittleEndian::read_u16(&buf[2..4]),
        })
    }

    #[inline]
    pub fn write_to(&self, buf: &mut [u8]) {
        LittleEndian::write_u16(&mut buf[0..2], self.size);
        LittleEndian::write_u16(&mut buf[2..4], self.id);
    }

    /// True when `size` can describe a real frame.
    #[inline]
    pub fn size_in_range(&self) -> bool {
        let size = self.size as usize;
        size >= Self::SIZE && size <= MAX_PACKET_SIZE
    }
}

/// Buffer size classes. Most game packets fit the smallest class; the
/// largest matches [`MAX_PACKET_SIZE`] so every valid frame is servable.
const SIZE_CLASSES: [usize; 4] = [256, 1024, 4096, MAX_PACKET_SIZE];

struct PoolShared {
    classes: [SegQueue<Box<[u8]>>; 4],
    // Total buffers ever allocated. The pool never shrinks, so this only
    // grows, bounded by max_live.
    live: AtomicUsize,
    max_live: usize,
}

impl PoolShared {
    #[inline]
    fn class_for(size: usize) -> Option<usize> {
        SIZE_CLASSES.iter().position(|&cap| size <= cap)
    }

    #[inline]
    fn release(&self, class: usize, buf: Box<[u8]>) {
        self.classes[class].push(buf);
    }
}

/// Multi-producer/multi-consumer free list of fixed-capacity packet buffers,
/// organized into size classes. Cheap to clone; clones share the free lists.
#[derive(Clone)]
pub struct PacketPool {
    shared: Arc<PoolShared>,
}

impl PacketPool {
    /// `max_packets` is the hard cap on buffers alive at once, across all
    /// size classes.
    pub fn new(max_packets: usize) -> PacketPool {
        PacketPool {
            shared: Arc::new(PoolShared {
                classes: [SegQueue::new(), SegQueue::new(), SegQueue::new(), SegQueue::new()],
                live: AtomicUsize::new(0),
                max_live: max_packets,
            }),
        }
    }

    /// Returns a writable buffer with capacity >= `size_hint`, reusing a
    /// pooled buffer when one is free, heap-allocating otherwise. `None`
    /// when `size_hint` exceeds the largest class or the hard cap is hit.
    pub fn acquire(&self, size_hint: usize) -> Option<PacketBuf> {
        let class = PoolShared::class_for(size_hint)?;

        let data = match self.shared.classes[class].pop() {
            Some(buf) => buf,
            None => {
                self.shared
                    .live
                    .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |live| {
                        if live < self.shared.max_live {
                            Some(live + 1)
                        } else {
                            None
                        }
                    })
                    .ok()?;
                vec![0u8; SIZE_CLASSES[class]].into_boxed_slice()
            }
        };

        Some(PacketBuf {
            data,
            used: 0,
            class,
            shared: Arc::clone(&self.shared),
        })
    }

    /// Total buffers allocated over the pool's lifetime (free or in use).
    pub fn allocated(&self) -> usize {
        self.shared.live.load(Ordering::Relaxed)
    }
}

/// Exclusively owned, writable packet buffer. All mutation happens here;
/// [`PacketBuf::freeze`] trades write access for shareability.
pub struct PacketBuf {
    data: Box<[u8]>,
    used: usize,
    class: usize,
    shared: Arc<PoolShared>,
}

impl PacketBuf {
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn used(&self) -> usize {
        self.used
    }

    /// Marks the first `used` bytes as the framed content.
    #[inline]
    pub fn set_used(&mut self, used: usize) {
        debug_assert!(used <= self.data.len());
        self.used = used.min(self.data.len());
    }

    /// Full-capacity writable view.
    #[inline]
    pub fn as_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Copies `src` to the front of the buffer and frames it in one step.
    #[inline]
    pub fn fill(&mut self, src: &[u8]) {
        self.data[..src.len()].copy_from_slice(src);
        self.used = src.len();
    }

    /// Converts the staging buffer into an immutable reference-counted
    /// packet. Dropping the last reference returns the buffer to the pool.
    #[inline]
    pub fn freeze(self) -> Packet {
        Packet {
            inner: Arc::new(self),
        }
    }
}

impl Drop for PacketBuf {
    fn drop(&mut self) {
        let buf = std::mem::replace(&mut self.data, Vec::new().into_boxed_slice());
        if !buf.is_empty() {
            self.shared.release(self.class, buf);
        }
    }
}

/// Immutable, reference-counted framed packet. Clone to add a reference;
/// the buffer returns to its origin pool when the last clone drops.
///
/// The count is atomic where the original design used a plain integer under
/// a thread-confinement rule; the type split (writable `PacketBuf`, shared
/// `Packet`) enforces the same "no mutation after hand-off" invariant.
#[derive(Clone)]
pub struct Packet {
    inner: Arc<PacketBuf>,
}

impl Packet {
    /// The framed bytes: header plus body.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.inner.data[..self.inner.used]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.used
    }

    #[inline]
    pub fn header(&self) -> Option<PacketHeader> {
        PacketHeader::peek(self.bytes())
    }

    /// Body bytes after the header. Empty for malformed short frames.
    #[inline]
    pub fn body(&self) -> &[u8] {
        let bytes = self.bytes();
        if bytes.len() < PacketHeader::SIZE {
            return &[];
        }
        &bytes[PacketHeader::SIZE..]
    }

    /// Current reference count, pool ownership included.
    #[inline]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl std::fmt::Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packet")
            .field("len", &self.len())
            .field("header", &self.header())
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framed(pool: &PacketPool, id: u16, body: &[u8]) -> Packet {
        let total = PacketHeader::SIZE + body.len();
        let mut buf = pool.acquire(total).unwrap();
        PacketHeader {
            size: total as u16,
            id,
        }
        .write_to(buf.as_mut());
        buf.as_mut()[PacketHeader::SIZE..total].copy_from_slice(body);
        buf.set_used(total);
        buf.freeze()
    }

    #[test]
    fn test_header_roundtrip() {
        let mut buf = [0u8; 8];
        let header = PacketHeader { size: 260, id: 203 };
        header.write_to(&mut buf);

        // Little-endian layout is part of the wire contract.
        assert_eq!(&buf[..4], &[0x04, 0x01, 0xcb, 0x00]);
        assert_eq!(PacketHeader::peek(&buf), Some(header));
    }

    #[test]
    fn test_header_peek_short() {
        assert_eq!(PacketHeader::peek(&[1, 2, 3]), None);
    }

    #[test]
    fn test_header_size_range() {
        assert!(!PacketHeader { size: 3, id: 0 }.size_in_range());
        assert!(PacketHeader { size: 4, id: 0 }.size_in_range());
        assert!(PacketHeader {
            size: MAX_PACKET_SIZE as u16,
            id: 0
        }
        .size_in_range());
        assert!(!PacketHeader {
            size: (MAX_PACKET_SIZE + 1) as u16,
            id: 0
        }
        .size_in_range());
    }

    #[test]
    fn test_acquire_size_classes() {
        let pool = PacketPool::new(16);

        assert_eq!(pool.acquire(10).unwrap().capacity(), 256);
        assert_eq!(pool.acquire(256).unwrap().capacity(), 256);
        assert_eq!(pool.acquire(257).unwrap().capacity(), 1024);
        assert_eq!(pool.acquire(5000).unwrap().capacity(), MAX_PACKET_SIZE);
        assert!(pool.acquire(MAX_PACKET_SIZE + 1).is_none());
    }

    #[test]
    fn test_release_returns_to_pool() {
        let pool = PacketPool::new(16);

        let packet = framed(&pool, 7, b"hello");
        assert_eq!(pool.allocated(), 1);
        drop(packet);

        // The next acquire of the same class must not allocate.
        let _buf = pool.acquire(16).unwrap();
        assert_eq!(pool.allocated(), 1);
    }

    #[test]
    fn test_hard_cap() {
        let pool = PacketPool::new(2);

        let a = pool.acquire(10).unwrap();
        let b = pool.acquire(10).unwrap();
        assert!(pool.acquire(10).is_none());

        drop(a);
        assert!(pool.acquire(10).is_some());
        drop(b);
    }

    #[test]
    fn test_ref_counting() {
        let pool = PacketPool::new(4);
        let packet = framed(&pool, 1, b"abc");

        assert_eq!(packet.ref_count(), 1);
        let clone = packet.clone();
        assert_eq!(packet.ref_count(), 2);

        // Contents are stable across clones until the final release.
        assert_eq!(packet.bytes(), clone.bytes());
        drop(clone);
        assert_eq!(packet.ref_count(), 1);
        assert_eq!(packet.body(), b"abc");
    }

    #[test]
    fn test_header_and_body_views() {
        let pool = PacketPool::new(4);
        let packet = framed(&pool, 42, b"xy");

        let header = packet.header().unwrap();
        assert_eq!(header.id, 42);
        assert_eq!(header.size, 6);
        assert_eq!(packet.body(), b"xy");
    }
}
