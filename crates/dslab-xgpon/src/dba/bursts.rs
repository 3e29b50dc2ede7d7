//! Per-cycle collection of upstream bursts and their placement into a BWmap.

use std::collections::VecDeque;

use crate::dba::per_burst_info::{OltDbaPerBurstInfo, MAX_TCONT_PER_BURST};
use crate::xgtc::XgtcBwmap;

/// Maximum number of allocations given to one ONU in one BWmap.
pub const MAX_TCONT_PER_ONU: usize = 64;
/// Number of addressable Alloc-IDs (14 bits).
pub const SERVED_TCONT_LIST_SIZE: usize = 16384;

/// Bursts of the BWmap under construction, most recently modified first, and the set of
/// Alloc-IDs already served in this cycle.
pub struct OltDbaBursts {
    bursts: VecDeque<OltDbaPerBurstInfo>,
    spare: Vec<OltDbaPerBurstInfo>,
    served: Vec<u64>,
}

impl Default for OltDbaBursts {
    fn default() -> Self {
        Self::new()
    }
}

impl OltDbaBursts {
    pub fn new() -> Self {
        Self {
            bursts: VecDeque::new(),
            spare: Vec::new(),
            served: vec![0; SERVED_TCONT_LIST_SIZE / 64],
        }
    }

    /// Drops all bursts and forgets served T-CONTs. Called at the start of every cycle.
    pub fn clear_burst_info_list(&mut self) {
        self.spare.extend(self.bursts.drain(..));
        self.served.iter_mut().for_each(|w| *w = 0);
    }

    pub fn set_served_tcont(&mut self, alloc_id: u16) {
        let id = alloc_id as usize;
        assert!(id < SERVED_TCONT_LIST_SIZE, "Alloc-ID {} is out of range", alloc_id);
        self.served[id / 64] |= 1 << (id % 64);
    }

    pub fn check_served_tcont(&self, alloc_id: u16) -> bool {
        let id = alloc_id as usize;
        assert!(id < SERVED_TCONT_LIST_SIZE, "Alloc-ID {} is out of range", alloc_id);
        self.served[id / 64] & (1 << (id % 64)) != 0
    }

    pub fn num_bursts(&self) -> usize {
        self.bursts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bursts.is_empty()
    }

    /// Bursts, most recently modified first.
    pub fn bursts(&self) -> impl Iterator<Item = &OltDbaPerBurstInfo> {
        self.bursts.iter()
    }

    /// Whether a T-CONT of `onu_id` would need a new burst, i.e. the ONU has no burst with a free
    /// allocation slot.
    pub fn is_new_burst_necessary(&self, onu_id: u16) -> bool {
        self.open_burst_index(onu_id).is_none()
    }

    /// The burst the next allocation of `onu_id` would extend, if any.
    pub fn open_burst(&self, onu_id: u16) -> Option<&OltDbaPerBurstInfo> {
        self.open_burst_index(onu_id).map(|i| &self.bursts[i])
    }

    /// Returns the burst that the next allocation of `onu_id` goes to, moved to the front of the list.
    ///
    /// The ONU's under-capacity burst is reused; otherwise a fresh uninitialized burst is created
    /// unless the ONU already holds [`MAX_TCONT_PER_ONU`] allocations in this cycle, in which case
    /// `None` is returned and the T-CONT must wait for the next cycle.
    pub fn burst_info_for_tcont(&mut self, onu_id: u16) -> Option<&mut OltDbaPerBurstInfo> {
        if let Some(index) = self.open_burst_index(onu_id) {
            if index != 0 {
                let burst = self.bursts.remove(index)?;
                self.bursts.push_front(burst);
            }
            return self.bursts.front_mut();
        }
        let total: usize = self
            .bursts
            .iter()
            .filter(|b| b.onu_id() == onu_id)
            .map(|b| b.num_allocations())
            .sum();
        if total >= MAX_TCONT_PER_ONU {
            return None;
        }
        let burst = match self.spare.pop() {
            Some(mut burst) => {
                burst.reset(onu_id);
                burst
            }
            None => OltDbaPerBurstInfo::new(onu_id),
        };
        self.bursts.push_front(burst);
        self.bursts.front_mut()
    }

    fn open_burst_index(&self, onu_id: u16) -> Option<usize> {
        self.bursts
            .iter()
            .position(|b| b.onu_id() == onu_id && b.num_allocations() < MAX_TCONT_PER_BURST)
    }

    /// Lays out all bursts into a BWmap.
    ///
    /// The first burst starts right after `extra_allocation` words left over from the previous map
    /// plus its gap. Bursts are placed oldest-modified first so that the most recently grown burst,
    /// the one most likely to overshoot, ends up last.
    pub fn produce_bwmap_from_bursts(&mut self, now: u64, extra_allocation: u32, us_frame_size: u32) -> XgtcBwmap {
        assert!(
            extra_allocation < us_frame_size - 10,
            "Extra allocation {} exceeds the upstream frame of {} words",
            extra_allocation,
            us_frame_size
        );
        let mut map = XgtcBwmap::new();
        match self.bursts.len() {
            0 => {}
            1 => {
                let burst = &mut self.bursts[0];
                let start_time = extra_allocation + burst.gap_overhead();
                if start_time < us_frame_size {
                    burst.put_all_bw_alloc_into_bwmap(&mut map, start_time as u16, now);
                }
            }
            _ => {
                let mut start_time = extra_allocation;
                for burst in self.bursts.iter_mut().rev() {
                    start_time += burst.gap_overhead();
                    assert!(
                        start_time < us_frame_size,
                        "Burst of ONU {} starts at {} beyond the upstream frame of {} words",
                        burst.onu_id(),
                        start_time,
                        us_frame_size
                    );
                    burst.put_all_bw_alloc_into_bwmap(&mut map, start_time as u16, now);
                    start_time = start_time - burst.gap_overhead() + burst.final_burst_size();
                }
            }
        }
        map
    }
}
