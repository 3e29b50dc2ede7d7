//! XGIANT with deficit round robin for best-effort bandwidth.

use crate::dba::per_burst_info::TcontOltRef;
use crate::dba::xgiant::{BestEffortShare, Xgiant};

/// Every cycle each backlogged T4 T-CONT earns a quantum of the remaining capacity weighted by its
/// allocation words. Unused credit carries over to later cycles up to twice the allocation words;
/// credit of an idle T-CONT is dropped.
#[derive(Default)]
pub struct DeficitShare {
    deficits: Vec<u32>,
}

impl DeficitShare {
    pub fn deficit(&self, index: usize) -> u32 {
        self.deficits.get(index).copied().unwrap_or(0)
    }
}

impl BestEffortShare for DeficitShare {
    fn start_round(&mut self, tconts: &[TcontOltRef], requests: &[u32], capacity: u32) {
        self.deficits.resize(tconts.len(), 0);
        let words: Vec<u32> = tconts.iter().map(|t| t.borrow().allocation_words()).collect();
        let total: u64 = words
            .iter()
            .zip(requests)
            .filter(|(_, &r)| r > 0)
            .map(|(&w, _)| w as u64)
            .sum();
        for (i, deficit) in self.deficits.iter_mut().enumerate() {
            if requests[i] == 0 {
                *deficit = 0;
                continue;
            }
            let quantum = if total > 0 {
                (capacity as u64 * words[i] as u64 / total) as u32
            } else {
                0
            };
            *deficit = deficit.saturating_add(quantum).min(2 * words[i]);
        }
    }

    fn grant(&mut self, index: usize, request: u32, _allocation_words: u32) -> u32 {
        let deficit = &mut self.deficits[index];
        let grant = request.min(*deficit);
        *deficit -= grant;
        grant
    }

    fn finish_cycle(&mut self, _allocated: u32, _us_frame_size: u32) {}

    fn name(&self) -> &str {
        "xgiant-deficit"
    }
}

/// XGIANT DBA, deficit variant.
pub type XgiantDeficit = Xgiant<DeficitShare>;
