//! OLT-side view of a T-CONT.

use std::collections::VecDeque;

use crate::qos::{QosParameters, TcontType};
use crate::xgtc::{XgtcBwAllocation, XgtcDbru};

/// How long reports and grants are remembered, nanoseconds (one second).
pub const HISTORY_TO_MAINTAIN: u64 = 1_000_000_000;

/// T-CONT state kept by the OLT DBA: service parameters, service interval timers and the history
/// of reports and grants used to estimate the backlog still to be served.
pub struct XgponTcontOlt {
    alloc_id: u16,
    onu_id: u16,
    qos: QosParameters,
    allocated_rate: u64,
    pir_si: u16,
    pir_timer: u16,
    gir_timer: u16,
    allocation_words: u32,
    reports: VecDeque<XgtcDbru>,
    allocations: VecDeque<XgtcBwAllocation>,
    last_polling_time: u64,
}

impl XgponTcontOlt {
    pub fn new(alloc_id: u16, onu_id: u16, qos: QosParameters) -> Self {
        Self {
            alloc_id,
            onu_id,
            qos,
            allocated_rate: 0,
            pir_si: 0,
            pir_timer: 0,
            gir_timer: 0,
            allocation_words: 0,
            reports: VecDeque::new(),
            allocations: VecDeque::new(),
            last_polling_time: 0,
        }
    }

    pub fn alloc_id(&self) -> u16 {
        self.alloc_id
    }

    pub fn onu_id(&self) -> u16 {
        self.onu_id
    }

    pub fn tcont_type(&self) -> TcontType {
        self.qos.tcont_type
    }

    pub fn qos_parameters(&self) -> &QosParameters {
        &self.qos
    }

    /// Derives the allocated rate and the service interval timers from the QoS parameters.
    ///
    /// T1 and T2 are served every `max_interval` frames. T3 and T4 get a guaranteed round
    /// every `max_interval` frames and a peak round every `min_interval` frames.
    pub fn calculate_qos_parameters(&mut self) {
        match self.qos.tcont_type {
            TcontType::T1 => {
                self.allocated_rate = self.qos.fixed_bw;
                self.pir_si = self.qos.max_interval;
                self.pir_timer = self.pir_si;
            }
            TcontType::T2 => {
                self.allocated_rate = self.qos.assured_bw;
                self.pir_si = self.qos.max_interval;
                self.pir_timer = self.pir_si;
            }
            TcontType::T3 => {
                self.allocated_rate = self.qos.non_assured_bw;
                self.gir_timer = self.qos.max_interval;
                self.pir_si = self.qos.min_interval;
                self.pir_timer = self.pir_si;
            }
            TcontType::T4 => {
                self.allocated_rate = self.qos.best_effort_bw;
                self.gir_timer = self.qos.max_interval;
                self.pir_si = self.qos.min_interval;
                self.pir_timer = self.pir_si;
            }
        }
    }

    /// Rate used to size grants, bit/s.
    pub fn allocated_rate(&self) -> u64 {
        self.allocated_rate
    }

    /// Service interval in frames.
    pub fn service_interval(&self) -> u16 {
        self.pir_si
    }

    /// Words granted per service interval.
    pub fn allocation_words(&self) -> u32 {
        self.allocation_words
    }

    pub fn set_allocation_words(&mut self, words: u32) {
        self.allocation_words = words;
    }

    pub fn pir_timer(&self) -> u16 {
        self.pir_timer
    }

    pub fn gir_timer(&self) -> u16 {
        self.gir_timer
    }

    pub fn update_pir_timer(&mut self) {
        self.pir_timer = self.pir_timer.saturating_sub(1);
    }

    pub fn update_gir_timer(&mut self) {
        self.gir_timer = self.gir_timer.saturating_sub(1);
    }

    pub fn reset_pir_timer(&mut self) {
        self.pir_timer = self.pir_si;
    }

    pub fn reset_gir_timer(&mut self) {
        self.gir_timer = self.pir_si / 2;
    }

    /// Stores a buffer occupancy report received at `now`.
    pub fn receive_status_report(&mut self, mut dbru: XgtcDbru, now: u64) {
        dbru.set_receive_time(now);
        self.reports.push_back(dbru);
        if let Some(threshold) = now.checked_sub(HISTORY_TO_MAINTAIN) {
            while self.reports.len() > 1 && self.reports.front().map_or(false, |r| r.receive_time() < threshold) {
                self.reports.pop_front();
            }
        }
    }

    pub fn latest_status_report(&self) -> Option<&XgtcDbru> {
        self.reports.back()
    }

    /// Remembers a grant placed into a BWmap at `now`.
    pub fn add_bw_allocation_to_service_history(&mut self, alloc: &XgtcBwAllocation, now: u64) {
        let mut alloc = alloc.clone();
        alloc.set_create_time(now);
        if alloc.dbru_flag() {
            self.last_polling_time = now;
        }
        self.allocations.push_back(alloc);
        if let Some(threshold) = now.checked_sub(HISTORY_TO_MAINTAIN) {
            while self.allocations.front().map_or(false, |a| a.create_time() < threshold) {
                self.allocations.pop_front();
            }
        }
    }

    /// Grants recorded for this T-CONT, oldest first.
    pub fn service_history(&self) -> impl Iterator<Item = &XgtcBwAllocation> {
        self.allocations.iter()
    }

    /// Time of the last grant that asked for a buffer occupancy report.
    pub fn last_polling_time(&self) -> u64 {
        self.last_polling_time
    }

    /// Estimates the words still waiting at the ONU: the latest reported occupancy minus the grants
    /// issued too late to be reflected in that report.
    pub fn calculate_remaining_data_to_serve(&self, rtt: u64, slot_size: u64) -> u32 {
        let report = match self.latest_status_report() {
            Some(report) => report,
            None => return 0,
        };
        let report_time = report.receive_time();
        let mut assigned: u32 = 0;
        for alloc in self.allocations.iter().rev() {
            if alloc.create_time() + rtt + slot_size / 2 <= report_time {
                break;
            }
            // the report itself takes one word of a polling grant
            assigned += (alloc.grant_size() as u32).saturating_sub(alloc.dbru_flag() as u32);
        }
        report.buf_occ().saturating_sub(assigned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tcont(tcont_type: TcontType) -> XgponTcontOlt {
        let qos = QosParameters::new(tcont_type).with_rate(100_000_000).with_intervals(2, 8);
        let mut tcont = XgponTcontOlt::new(1024, 1, qos);
        tcont.calculate_qos_parameters();
        tcont
    }

    #[test]
    fn timers_per_class() {
        let t2 = tcont(TcontType::T2);
        assert_eq!(t2.service_interval(), 8);
        assert_eq!(t2.pir_timer(), 8);
        assert_eq!(t2.allocated_rate(), 100_000_000);

        let mut t3 = tcont(TcontType::T3);
        assert_eq!(t3.service_interval(), 2);
        assert_eq!(t3.gir_timer(), 8);
        t3.update_gir_timer();
        assert_eq!(t3.gir_timer(), 7);
        t3.reset_gir_timer();
        assert_eq!(t3.gir_timer(), 1);
        t3.update_pir_timer();
        t3.update_pir_timer();
        t3.update_pir_timer();
        assert_eq!(t3.pir_timer(), 0);
        t3.reset_pir_timer();
        assert_eq!(t3.pir_timer(), 2);
    }

    #[test]
    fn remaining_data() {
        let mut t = tcont(TcontType::T2);
        assert_eq!(t.calculate_remaining_data_to_serve(250_000, 125_000), 0);

        // granted at 0 and 125 us, report received at 400 us
        t.add_bw_allocation_to_service_history(&XgtcBwAllocation::new(1024, true, false, 0, 101, 0), 0);
        t.add_bw_allocation_to_service_history(&XgtcBwAllocation::new(1024, true, false, 0, 51, 0), 125_000);
        assert_eq!(t.last_polling_time(), 125_000);
        t.receive_status_report(XgtcDbru::new(300, 300_000), 400_000);

        // only the second grant is newer than 400 - 250 - 62.5 us
        assert_eq!(t.calculate_remaining_data_to_serve(250_000, 125_000), 250);
        // with a longer rtt both grants are subtracted
        assert_eq!(t.calculate_remaining_data_to_serve(450_000, 125_000), 150);
        // and the estimate never goes below zero
        t.add_bw_allocation_to_service_history(&XgtcBwAllocation::new(1024, false, false, 0, 1000, 0), 250_000);
        assert_eq!(t.calculate_remaining_data_to_serve(450_000, 125_000), 0);
    }
}
