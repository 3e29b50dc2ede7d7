//! ONU-side T-CONT: its connections, their round-robin scheduler and XGEM frame filling.

use crate::connection::XgponConnection;
use crate::xgem::{
    create_idle_xgem_frame, create_short_idle_xgem_frame, generate_xgem_frame, XgemFrame, XGEM_FRAME_MAXLEN,
    XGEM_SHORT_IDLE_LENGTH,
};
use crate::xgtc::XgtcDbru;

/// Bytes one connection may send before the scheduler moves on to the next one.
pub const ONU_PER_SERVICE_MAX_SIZE: u32 = 40_000;

/// Smallest space worth filling with a data frame, bytes.
const MIN_DATA_FRAME_SPACE: u32 = 16;

/// T-CONT as seen by the ONU.
pub struct XgponTcontOnu {
    alloc_id: u16,
    connections: Vec<XgponConnection>,
    last_served: usize,
    max_service_size: u32,
}

impl XgponTcontOnu {
    pub fn new(alloc_id: u16) -> Self {
        Self {
            alloc_id,
            connections: Vec::new(),
            last_served: 0,
            max_service_size: ONU_PER_SERVICE_MAX_SIZE,
        }
    }

    pub fn alloc_id(&self) -> u16 {
        self.alloc_id
    }

    pub fn add_connection(&mut self, conn: XgponConnection) {
        assert_eq!(
            conn.alloc_id(),
            self.alloc_id,
            "Connection {} does not belong to Alloc-ID {}",
            conn.port_id(),
            self.alloc_id
        );
        self.connections.push(conn);
    }

    pub fn connections(&self) -> &[XgponConnection] {
        &self.connections
    }

    pub fn connection_mut(&mut self, port_id: u16) -> Option<&mut XgponConnection> {
        self.connections.iter_mut().find(|c| c.port_id() == port_id)
    }

    /// Buffer occupancy report covering all connections of this T-CONT.
    pub fn prepare_buf_occupancy_report(&self, now: u64) -> XgtcDbru {
        let occupancy = self.connections.iter().map(|c| c.buf_occupancy_for_scheduling()).sum();
        XgtcDbru::new(occupancy, now)
    }

    /// Picks the next connection with data and how many bytes it may send.
    ///
    /// A connection whose last packet was segmented is served again until the packet is complete.
    /// Otherwise connections are visited round-robin.
    pub fn select_conn_to_serve(&mut self) -> Option<(usize, u32)> {
        let n = self.connections.len();
        if n == 0 {
            return None;
        }
        let last = &self.connections[self.last_served];
        if last.is_segmentation_running() {
            return Some((self.last_served, last.frag_buf_occupancy_for_scheduling() * 4));
        }
        for _ in 0..n {
            self.last_served = (self.last_served + 1) % n;
            let in_queue = self.connections[self.last_served].buf_occupancy_for_scheduling() * 4;
            if in_queue > 0 {
                return Some((self.last_served, in_queue.min(self.max_service_size)));
            }
        }
        None
    }

    /// Fills `payload_len` bytes with XGEM frames.
    ///
    /// Connections are served in scheduler order; only the connection that gets the remaining space
    /// may segment its packet. Space that no packet can use is filled with idle frames.
    pub fn generate_frames_to_transmit(&mut self, payload_len: u32, key_index: u8) -> Vec<XgemFrame> {
        assert!(payload_len % 4 == 0, "Payload length {} is not a multiple of 4", payload_len);
        let mut frames = Vec::new();
        let mut available = payload_len;
        while available > 0 {
            if available == XGEM_SHORT_IDLE_LENGTH {
                frames.push(create_short_idle_xgem_frame());
                break;
            }
            if available < MIN_DATA_FRAME_SPACE {
                frames.push(create_idle_xgem_frame(available));
                break;
            }
            let (index, mut amount) = match self.select_conn_to_serve() {
                Some(selected) => selected,
                None => {
                    fill_idle(&mut frames, available);
                    break;
                }
            };
            let segmentation = amount > available;
            if segmentation {
                amount = available;
            }
            let conn = &mut self.connections[index];
            let mut produced = false;
            loop {
                let frame = match generate_xgem_frame(conn, amount, key_index, segmentation) {
                    Some(frame) => frame,
                    None => break,
                };
                let size = frame.serialized_size();
                frames.push(frame);
                produced = true;
                available -= size;
                amount = amount.saturating_sub(size);
                if amount < MIN_DATA_FRAME_SPACE {
                    break;
                }
            }
            if !produced {
                // the selected packet does not fit and may not be segmented
                fill_idle(&mut frames, available);
                break;
            }
        }
        frames
    }
}

fn fill_idle(frames: &mut Vec<XgemFrame>, mut available: u32) {
    while available > 0 {
        if available == XGEM_SHORT_IDLE_LENGTH {
            frames.push(create_short_idle_xgem_frame());
            return;
        }
        let size = available.min(XGEM_FRAME_MAXLEN);
        frames.push(create_idle_xgem_frame(size));
        available -= size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Packet;
    use crate::queue::{QueueMode, XgponFifoQueue};
    use crate::xgem::{XgemFrameType, IDLE_PORT_ID};

    fn tcont(n_conns: u16) -> XgponTcontOnu {
        let mut tcont = XgponTcontOnu::new(1024);
        for port in 0..n_conns {
            let queue = XgponFifoQueue::new(QueueMode::Bytes, 1000, 100_000);
            tcont.add_connection(XgponConnection::new(2000 + port, 1024, 1, Box::new(queue)));
        }
        tcont
    }

    fn total_size(frames: &[XgemFrame]) -> u32 {
        frames.iter().map(|f| f.serialized_size()).sum()
    }

    #[test]
    fn empty_tcont_sends_idle() {
        let mut t = tcont(1);
        let frames = t.generate_frames_to_transmit(400, 0);
        assert_eq!(total_size(&frames), 400);
        assert!(frames.iter().all(|f| f.is_idle()));

        let frames = t.generate_frames_to_transmit(4, 0);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].frame_type(), XgemFrameType::ShortIdle);

        let frames = t.generate_frames_to_transmit(40_000, 0);
        assert_eq!(total_size(&frames), 40_000);
        assert!(frames.iter().all(|f| f.serialized_size() <= XGEM_FRAME_MAXLEN));
    }

    #[test]
    fn report_counts_all_connections() {
        let mut t = tcont(2);
        t.connection_mut(2000).unwrap().receive_upstream_packet(Packet::new(1, 100, 0));
        t.connection_mut(2001).unwrap().receive_upstream_packet(Packet::new(2, 41, 0));
        // (100 + 8) / 4 + (44 + 8) / 4
        assert_eq!(t.prepare_buf_occupancy_report(5).buf_occ(), 27 + 13);
    }

    #[test]
    fn round_robin_between_connections() {
        let mut t = tcont(3);
        t.connection_mut(2000).unwrap().receive_upstream_packet(Packet::new(1, 100, 0));
        t.connection_mut(2002).unwrap().receive_upstream_packet(Packet::new(2, 100, 0));
        let frames = t.generate_frames_to_transmit(108, 0);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].header().port_id(), 2002);
        assert_eq!(t.select_conn_to_serve(), Some((0, 108)));
    }

    #[test]
    fn last_connection_is_segmented() {
        let mut t = tcont(1);
        t.connection_mut(2000).unwrap().receive_upstream_packet(Packet::new(1, 1000, 0));
        let frames = t.generate_frames_to_transmit(408, 0);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].header().pli(), 400);
        assert!(!frames[0].header().last_fragment());
        assert!(t.connections()[0].is_segmentation_running());

        // the tail is sent first next time
        assert_eq!(t.select_conn_to_serve(), Some((0, 608)));
        let frames = t.generate_frames_to_transmit(700, 0);
        assert_eq!(frames[0].header().pli(), 600);
        assert!(frames[0].header().last_fragment());
        assert_eq!(total_size(&frames), 700);
        assert!(frames[1..].iter().all(|f| f.header().port_id() == IDLE_PORT_ID));
    }

    #[test]
    fn several_packets_in_one_grant() {
        let mut t = tcont(1);
        for uid in 0..3 {
            t.connection_mut(2000).unwrap().receive_upstream_packet(Packet::new(uid, 92, 0));
        }
        let frames = t.generate_frames_to_transmit(300, 0);
        assert_eq!(frames.iter().filter(|f| !f.is_idle()).count(), 3);
        assert_eq!(total_size(&frames), 300);
        assert!(t.connections()[0].queue().is_empty());
    }
}
