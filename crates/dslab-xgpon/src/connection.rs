//! Upstream connection (XGEM port) at the ONU side.

use crate::packet::Packet;
use crate::queue::XgponQueue;

/// One XGEM port: the unit of traffic the ONU upstream scheduler serves.
pub struct XgponConnection {
    port_id: u16,
    alloc_id: u16,
    onu_id: u16,
    queue: Box<dyn XgponQueue>,
}

impl XgponConnection {
    pub fn new(port_id: u16, alloc_id: u16, onu_id: u16, queue: Box<dyn XgponQueue>) -> Self {
        Self {
            port_id,
            alloc_id,
            onu_id,
            queue,
        }
    }

    pub fn port_id(&self) -> u16 {
        self.port_id
    }

    /// T-CONT this connection belongs to.
    pub fn alloc_id(&self) -> u16 {
        self.alloc_id
    }

    pub fn onu_id(&self) -> u16 {
        self.onu_id
    }

    /// Queues a packet from the upper layer. Returns false if it was dropped.
    pub fn receive_upstream_packet(&mut self, packet: Packet) -> bool {
        self.queue.enqueue(packet)
    }

    pub fn queue(&self) -> &dyn XgponQueue {
        self.queue.as_ref()
    }

    pub fn queue_mut(&mut self) -> &mut dyn XgponQueue {
        self.queue.as_mut()
    }

    pub fn is_segmentation_running(&self) -> bool {
        self.queue.is_segmentation_running()
    }

    pub fn buf_occupancy_for_scheduling(&self) -> u32 {
        self.queue.buf_occupancy_for_scheduling()
    }

    pub fn frag_buf_occupancy_for_scheduling(&self) -> u32 {
        self.queue.frag_buf_occupancy_for_scheduling()
    }
}
