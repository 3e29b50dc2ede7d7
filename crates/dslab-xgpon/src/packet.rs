//! Service data units carried over XGEM.

use serde::Serialize;

/// An upper-layer packet (or a fragment of one) waiting in a connection queue.
///
/// Only the length matters for the data plane; the payload itself is not modelled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Packet {
    /// Unique packet id, shared by all fragments of the same packet.
    pub uid: u64,
    /// Length in bytes.
    pub size: u32,
    /// Time when the packet entered the ONU (nanoseconds).
    pub created_at: u64,
}

impl Packet {
    /// Creates a packet.
    pub fn new(uid: u64, size: u32, created_at: u64) -> Self {
        Self { uid, size, created_at }
    }

    /// Returns the byte range `[offset, offset + len)` of this packet as a new fragment.
    ///
    /// Panics if the range does not lie within the packet.
    pub fn fragment(&self, offset: u32, len: u32) -> Packet {
        assert!(
            offset + len <= self.size,
            "Fragment [{}, {}) is outside the packet of {} bytes",
            offset,
            offset + len,
            self.size
        );
        Packet {
            uid: self.uid,
            size: len,
            created_at: self.created_at,
        }
    }

    /// Splits the packet at `at`, returning the head and the tail fragments.
    pub fn split_at(&self, at: u32) -> (Packet, Packet) {
        (self.fragment(0, at), self.fragment(at, self.size - at))
    }
}
