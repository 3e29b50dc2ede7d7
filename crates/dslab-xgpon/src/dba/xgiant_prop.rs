//! XGIANT with proportional sharing of best-effort bandwidth.

use crate::dba::per_burst_info::TcontOltRef;
use crate::dba::xgiant::{BestEffortShare, Xgiant};

/// Shares the capacity left for T4 T-CONTs in proportion to their backlog, scaled by a burst
/// factor that grows when the previous maps left the frame underused.
pub struct ProportionalShare {
    capacity: u32,
    total_request: u64,
    burst_factor: f64,
    cycles: u64,
}

impl Default for ProportionalShare {
    fn default() -> Self {
        Self {
            capacity: 0,
            total_request: 0,
            burst_factor: 1.0,
            cycles: 0,
        }
    }
}

impl ProportionalShare {
    pub fn burst_factor(&self) -> f64 {
        self.burst_factor
    }

    /// Number of finished allocation cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}

impl BestEffortShare for ProportionalShare {
    fn start_round(&mut self, _tconts: &[TcontOltRef], requests: &[u32], capacity: u32) {
        self.capacity = capacity;
        self.total_request = requests.iter().map(|&r| r as u64).sum();
    }

    fn grant(&mut self, _index: usize, request: u32, _allocation_words: u32) -> u32 {
        if self.total_request == 0 {
            return request;
        }
        let share = self.capacity as f64 * request as f64 / self.total_request as f64 * self.burst_factor;
        request.min(share as u32)
    }

    fn finish_cycle(&mut self, allocated: u32, us_frame_size: u32) {
        self.burst_factor = if allocated == 0 {
            2.0
        } else {
            (us_frame_size as f64 / allocated as f64).clamp(1.0, 2.0)
        };
        self.cycles += 1;
    }

    fn name(&self) -> &str {
        "xgiant-prop"
    }
}

/// XGIANT DBA, proportional variant.
pub type XgiantProp = Xgiant<ProportionalShare>;
