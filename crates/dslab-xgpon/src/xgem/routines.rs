//! Stateless XGEM frame builders.

use crate::connection::XgponConnection;

use super::frame::{padded_payload_len, XgemFrame};
use super::header::{XgemHeader, XGEM_HEADER_LENGTH};

/// Largest XGEM frame: 8-byte header plus the largest payload allowed by the 14-bit PLI.
pub const XGEM_FRAME_MAXLEN: u32 = 16388;
/// Port id reserved for idle frames.
pub const IDLE_PORT_ID: u16 = 0xFFFF;

/// Smallest frame that can carry a segment: header plus one 8-byte padded fragment.
const MIN_SEGMENT_FRAME_LEN: u32 = XGEM_HEADER_LENGTH + 8;

/// Creates a 4-byte idle frame.
pub fn create_short_idle_xgem_frame() -> XgemFrame {
    XgemFrame::short_idle()
}

/// Creates an idle frame of exactly `size` bytes.
///
/// Panics unless `size` is a multiple of 4 between 8 and [`XGEM_FRAME_MAXLEN`].
pub fn create_idle_xgem_frame(size: u32) -> XgemFrame {
    assert!(size % 4 == 0, "Idle XGEM frame size {} is not a multiple of 4", size);
    assert!(
        (XGEM_HEADER_LENGTH..=XGEM_FRAME_MAXLEN).contains(&size),
        "Idle XGEM frame size {} is out of range",
        size
    );
    let header = XgemHeader::new((size - XGEM_HEADER_LENGTH) as u16, 0, IDLE_PORT_ID, true);
    XgemFrame::long_idle(header)
}

/// Encapsulates the next packet of `conn` into a frame of at most `max_len` bytes.
///
/// If the packet does not fit and `allow_segmentation` is set, the packet is split at
/// `max_len - 8`; the tail goes back to the queue as its remaining segment. Without segmentation
/// a packet that does not fit stays in the queue and `None` is returned, as it is when the queue is empty.
///
/// Segmentation should be allowed only for the last connection served in an allocation.
pub fn generate_xgem_frame(
    conn: &mut XgponConnection,
    max_len: u32,
    key_index: u8,
    allow_segmentation: bool,
) -> Option<XgemFrame> {
    assert!(max_len % 4 == 0, "XGEM frame budget {} is not a multiple of 4", max_len);
    let max_len = max_len.min(XGEM_FRAME_MAXLEN);
    let size = conn.queue().peek()?.size;
    let port_id = conn.port_id();

    if padded_payload_len(size) + XGEM_HEADER_LENGTH <= max_len {
        let packet = conn.queue_mut().dequeue()?;
        let header = XgemHeader::new(packet.size as u16, key_index, port_id, true);
        return Some(XgemFrame::with_data(header, packet));
    }
    if !allow_segmentation || max_len < MIN_SEGMENT_FRAME_LEN {
        return None;
    }

    let packet = conn.queue_mut().dequeue()?;
    let (head, tail) = packet.split_at(max_len - XGEM_HEADER_LENGTH);
    conn.queue_mut().push_front_remaining_segment(tail);
    let header = XgemHeader::new(head.size as u16, key_index, port_id, false);
    Some(XgemFrame::with_data(header, head))
}
