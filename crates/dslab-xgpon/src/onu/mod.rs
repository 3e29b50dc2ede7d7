//! ONU: upstream connections grouped into T-CONTs and execution of BWmap grants.

pub mod tcont;

pub use tcont::{XgponTcontOnu, ONU_PER_SERVICE_MAX_SIZE};

use crate::connection::XgponConnection;
use crate::context::SimulationContext;
use crate::link_info::XgponLinkInfo;
use crate::log_trace;
use crate::packet::Packet;
use crate::xgtc::{XgtcBwmap, XgtcUsAllocation, XgtcUsBurst, START_TIME_CONTIGUOUS};

pub struct XgponOnu {
    onu_id: u16,
    link: XgponLinkInfo,
    tconts: Vec<XgponTcontOnu>,
    key_index: u8,
    ctx: SimulationContext,
}

impl XgponOnu {
    pub fn new(link: XgponLinkInfo, ctx: SimulationContext) -> Self {
        Self {
            onu_id: link.onu_id(),
            link,
            tconts: Vec::new(),
            key_index: 0,
            ctx,
        }
    }

    pub fn onu_id(&self) -> u16 {
        self.onu_id
    }

    pub fn link_info(&self) -> &XgponLinkInfo {
        &self.link
    }

    pub fn link_info_mut(&mut self) -> &mut XgponLinkInfo {
        &mut self.link
    }

    pub fn add_tcont(&mut self, tcont: XgponTcontOnu) {
        assert!(
            self.tcont(tcont.alloc_id()).is_none(),
            "Alloc-ID {} already exists at ONU {}",
            tcont.alloc_id(),
            self.onu_id
        );
        self.tconts.push(tcont);
    }

    pub fn tconts(&self) -> &[XgponTcontOnu] {
        &self.tconts
    }

    pub fn tcont(&self, alloc_id: u16) -> Option<&XgponTcontOnu> {
        self.tconts.iter().find(|t| t.alloc_id() == alloc_id)
    }

    pub fn tcont_mut(&mut self, alloc_id: u16) -> Option<&mut XgponTcontOnu> {
        self.tconts.iter_mut().find(|t| t.alloc_id() == alloc_id)
    }

    /// Adds an upstream connection to its T-CONT, creating the T-CONT on first use.
    pub fn add_connection(&mut self, conn: XgponConnection) {
        let alloc_id = conn.alloc_id();
        if self.tcont(alloc_id).is_none() {
            self.tconts.push(XgponTcontOnu::new(alloc_id));
        }
        if let Some(tcont) = self.tcont_mut(alloc_id) {
            tcont.add_connection(conn);
        }
    }

    pub fn connection_mut(&mut self, port_id: u16) -> Option<&mut XgponConnection> {
        self.tconts.iter_mut().find_map(|t| t.connection_mut(port_id))
    }

    /// Queues an upper layer packet on connection `port_id`. Returns false if it was dropped.
    pub fn receive_upstream_packet(&mut self, port_id: u16, packet: Packet) -> bool {
        let onu_id = self.onu_id;
        let size = packet.size;
        let accepted = match self.connection_mut(port_id) {
            Some(conn) => conn.receive_upstream_packet(packet),
            None => panic!("ONU {} has no connection {}", onu_id, port_id),
        };
        if !accepted {
            log_trace!(self.ctx, "dropped {} bytes on port {}", size, port_id);
        }
        accepted
    }

    /// Builds the burst for the grants of `map` starting at allocation `first`.
    ///
    /// The burst covers the first allocation and every following allocation marked contiguous.
    /// Each allocation carries a DBRu if the OLT asked for one, followed by XGEM frames filling
    /// the rest of the grant.
    pub fn produce_us_burst(&mut self, map: &XgtcBwmap, first: usize) -> XgtcUsBurst {
        let now = self.ctx.time_nanos();
        let first_alloc = map.bw_allocation(first);
        assert!(first_alloc.is_burst_start(), "Allocation {} does not start a burst", first);

        let mut burst = XgtcUsBurst::default();
        {
            let header = burst.header_mut();
            header.set_onu_id(self.onu_id);
            header.set_dying_gasp(self.link.dying_gasp());
            if first_alloc.ploamu_flag() {
                if let Some(ploam) = self.link.ploam_to_transmit() {
                    header.set_ploam(ploam);
                }
            }
            header.set_ploam_queue_status(self.link.has_ploam_to_transmit());
            header.calculate_hec();
        }

        let key_index = self.key_index;
        for (i, alloc) in map.iter().enumerate().skip(first) {
            if i > first && alloc.start_time() != START_TIME_CONTIGUOUS {
                break;
            }
            let alloc_id = alloc.alloc_id();
            let onu_id = self.onu_id;
            let tcont = self
                .tcont_mut(alloc_id)
                .unwrap_or_else(|| panic!("Alloc-ID {} is not served by ONU {}", alloc_id, onu_id));
            let mut us_alloc = XgtcUsAllocation::new(alloc_id);
            let mut words = alloc.grant_size() as u32;
            if alloc.dbru_flag() && words > 0 {
                let mut dbru = tcont.prepare_buf_occupancy_report(now);
                dbru.calculate_crc();
                us_alloc.set_dbru(dbru);
                words -= 1;
            }
            *us_alloc.frames_mut() = tcont.generate_frames_to_transmit(words * 4, key_index);
            burst.add_us_allocation(us_alloc);
        }
        burst.calculate_trailer();
        log_trace!(
            self.ctx,
            "burst of {} allocations, {} bytes",
            burst.allocations().len(),
            burst.serialized_size()
        );
        burst
    }
}

#[cfg(test)]
mod tests {
    use sugars::{rc, refcell};

    use super::*;
    use crate::context::SimulationState;
    use crate::link_info::BurstProfile;
    use crate::queue::XgponFifoQueue;
    use crate::xgtc::{XgtcBwAllocation, XgtcPloam};

    fn onu() -> XgponOnu {
        let ctx = SimulationContext::new("onu-1", rc!(refcell!(SimulationState::new(123))));
        let mut onu = XgponOnu::new(XgponLinkInfo::new(1, BurstProfile::default()), ctx);
        for (port, alloc) in [(2000, 1024), (2001, 1025)] {
            onu.add_connection(XgponConnection::new(port, alloc, 1, Box::new(XgponFifoQueue::default())));
        }
        onu
    }

    fn map() -> XgtcBwmap {
        let mut map = XgtcBwmap::new();
        map.add_bw_allocation(XgtcBwAllocation::new(1024, true, true, 8, 30, 0));
        map.add_bw_allocation(XgtcBwAllocation::new(1025, false, false, START_TIME_CONTIGUOUS, 10, 0));
        map.add_bw_allocation(XgtcBwAllocation::new(2048, true, false, 100, 10, 0));
        map
    }

    #[test]
    fn burst_covers_contiguous_allocations() {
        let mut onu = onu();
        assert!(onu.receive_upstream_packet(2000, Packet::new(1, 92, 0)));
        let burst = onu.produce_us_burst(&map(), 0);
        assert_eq!(burst.allocations().len(), 2);

        let first = &burst.allocations()[0];
        assert_eq!(first.dbru().unwrap().buf_occ(), 25);
        assert_eq!(first.serialized_size(), 120);
        assert_eq!(first.frames()[0].payload().unwrap().uid, 1);

        let second = &burst.allocations()[1];
        assert!(second.dbru().is_none());
        assert_eq!(second.serialized_size(), 40);
        assert!(second.frames().iter().all(|f| f.is_idle()));

        // header, 30 and 10 words, trailer
        assert_eq!(burst.serialized_size(), 4 + 120 + 40 + 4);
        assert!(burst.header().ploam().is_none());
    }

    #[test]
    fn ploam_rides_when_granted() {
        let mut onu = onu();
        onu.link_info_mut().push_ploam(XgtcPloam::new(1, 9, 0));
        onu.link_info_mut().push_ploam(XgtcPloam::new(1, 9, 1));
        let burst = onu.produce_us_burst(&map(), 0);
        assert_eq!(burst.header().ploam().unwrap().seq_no(), 0);
        assert!(burst.header().ploam_queue_status());
        assert_eq!(burst.serialized_size(), 52 + 120 + 40 + 4);
    }

    #[test]
    fn dropped_packet() {
        let mut onu = onu();
        assert!(onu.receive_upstream_packet(2001, Packet::new(1, 8000, 0)));
        assert!(!onu.receive_upstream_packet(2001, Packet::new(2, 1000, 0)));
        assert_eq!(onu.tcont(1025).unwrap().connections()[0].queue().stats().dropped_packets, 1);
    }

    #[test]
    #[should_panic(expected = "is not served by ONU")]
    fn foreign_allocation() {
        let mut onu = onu();
        onu.produce_us_burst(&map(), 2);
    }
}
