//! Round-robin DBA without service classes.

use crate::dba::engine::{configure_tcont, DbaCycle, DbaEngine};
use crate::dba::per_burst_info::TcontOltRef;
use crate::dba::xgiant::MIN_DATA_GRANT;

/// Largest grant of one T-CONT in one map, words (about 40 KB, enough for one flow to fill the
/// upstream frame).
pub const RR_MAX_SERVICE_SIZE: u32 = 9718;

/// Visits all T-CONTs in registration order and grants each its whole backlog up to
/// [`RR_MAX_SERVICE_SIZE`]. A T-CONT without backlog gets a one-word poll in every map. The next
/// map starts with the first T-CONT the previous one could not serve.
#[derive(Default)]
pub struct RoundRobin {
    tconts: Vec<TcontOltRef>,
    next: usize,
    start: usize,
    visited: usize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registration index of the T-CONT the next map starts with.
    pub fn next_to_serve(&self) -> usize {
        self.next
    }
}

impl DbaEngine for RoundRobin {
    fn add_tcont(&mut self, tcont: TcontOltRef, frame_slot_size: u64) {
        configure_tcont(&tcont, frame_slot_size, 1);
        self.tconts.push(tcont);
    }

    fn prepare_to_produce_bwmap(&mut self, _cycle: &DbaCycle) {
        self.start = self.next;
        self.visited = 0;
    }

    fn first_tcont(&mut self) -> Option<TcontOltRef> {
        self.start = self.next;
        self.visited = 0;
        self.tconts.get(self.start).cloned()
    }

    fn next_tcont(&mut self) -> Option<TcontOltRef> {
        if self.visited + 1 >= self.tconts.len() {
            return None;
        }
        self.visited += 1;
        Some(self.tconts[(self.start + self.visited) % self.tconts.len()].clone())
    }

    fn check_all_tconts_served(&self) -> bool {
        self.visited + 1 >= self.tconts.len()
    }

    fn calculate_amount_to_upload(&mut self, tcont: &TcontOltRef, served: bool, cycle: &DbaCycle) -> u32 {
        if self.tconts.is_empty() {
            return 0;
        }
        self.next = (self.start + self.visited + 1) % self.tconts.len();
        let dbru = if served { 0 } else { 1 };
        let request = tcont.borrow().calculate_remaining_data_to_serve(cycle.rtt, cycle.slot);
        if request > 0 {
            (request + dbru).clamp(MIN_DATA_GRANT, RR_MAX_SERVICE_SIZE)
        } else {
            dbru
        }
    }

    fn finalize_bwmap_production(&mut self, _cycle: &DbaCycle) {}

    fn to_string(&self) -> String {
        "round-robin".to_string()
    }
}
