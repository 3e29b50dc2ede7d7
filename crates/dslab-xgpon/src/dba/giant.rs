//! GIANT DBA: static class priority without service interval timers.
//!
//! Every map visits T1, T2, T3 and T4 once. Cycles alternate between a guaranteed cycle, where T3
//! gets up to a fifth of its allocation and T4 T-CONTs share the free frame evenly, and a surplus
//! cycle, where T3 gets up to four fifths and T4 T-CONTs also recover what they were denied in the
//! guaranteed cycle.

use crate::dba::engine::{allocation_words_from_rate, DbaCycle, DbaEngine, FRAME_TAIL_RESERVE};
use crate::dba::per_burst_info::TcontOltRef;
use crate::dba::rounds::{class_of, ClassRounds};
use crate::dba::xgiant::MIN_DATA_GRANT;
use crate::qos::TcontType;

const BEST_EFFORT_ROUND: usize = 3;

pub struct Giant {
    rounds: ClassRounds,
    guaranteed_cycle: bool,
    deficits: Vec<u32>,
    extra: u32,
    best_effort_started: bool,
    completed: bool,
}

impl Default for Giant {
    fn default() -> Self {
        Self {
            rounds: ClassRounds::new(&[0, 1, 2, 3]),
            guaranteed_cycle: true,
            deficits: Vec::new(),
            extra: 0,
            best_effort_started: false,
            completed: false,
        }
    }
}

impl Giant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_guaranteed_cycle(&self) -> bool {
        self.guaranteed_cycle
    }

    /// Words the T4 T-CONT at `index` was denied in the last guaranteed cycle.
    pub fn deficit(&self, index: usize) -> u32 {
        self.deficits.get(index).copied().unwrap_or(0)
    }

    fn best_effort_grant(&mut self, index: usize, request: u32, dbru: u32, cycle: &DbaCycle) -> u32 {
        if !self.best_effort_started {
            self.best_effort_started = true;
            if self.guaranteed_cycle {
                self.deficits.iter_mut().for_each(|d| *d = 0);
                self.extra = 0;
            }
        }
        let remaining = self.rounds.remaining_in_round().max(1) as u32;
        let threshold = (cycle.frame_left().saturating_sub(FRAME_TAIL_RESERVE) + self.extra) / remaining;

        let size = if self.guaranteed_cycle {
            if request == 0 {
                return 1;
            }
            if request > threshold {
                self.deficits[index] = request - threshold;
                threshold
            } else {
                self.extra += threshold - request;
                request
            }
        } else {
            let size = request + self.deficits[index];
            if size > 3 * threshold {
                threshold
            } else {
                size
            }
        };
        if size > 0 {
            size.max(MIN_DATA_GRANT) + dbru
        } else {
            1
        }
    }
}

impl DbaEngine for Giant {
    /// T-CONTs are considered in every map, so allocation words are computed for one frame.
    fn add_tcont(&mut self, tcont: TcontOltRef, frame_slot_size: u64) {
        let class = {
            let mut t = tcont.borrow_mut();
            t.calculate_qos_parameters();
            let words = allocation_words_from_rate(t.allocated_rate(), frame_slot_size, 1);
            t.set_allocation_words(words);
            class_of(t.tcont_type())
        };
        if class == BEST_EFFORT_ROUND {
            self.deficits.push(0);
        }
        self.rounds.push(tcont, class);
    }

    fn prepare_to_produce_bwmap(&mut self, _cycle: &DbaCycle) {
        self.rounds.prepare();
        self.best_effort_started = false;
        self.completed = false;
    }

    fn first_tcont(&mut self) -> Option<TcontOltRef> {
        self.rounds.first()
    }

    fn next_tcont(&mut self) -> Option<TcontOltRef> {
        self.rounds.next()
    }

    fn check_all_tconts_served(&self) -> bool {
        self.rounds.is_last()
    }

    fn calculate_amount_to_upload(&mut self, tcont: &TcontOltRef, served: bool, cycle: &DbaCycle) -> u32 {
        let index = match self.rounds.index() {
            Some(index) => index,
            None => return 0,
        };
        self.completed = self.rounds.is_last();
        let (tcont_type, words, request) = {
            let t = tcont.borrow();
            (
                t.tcont_type(),
                t.allocation_words(),
                t.calculate_remaining_data_to_serve(cycle.rtt, cycle.slot),
            )
        };
        let dbru = if served { 0 } else { 1 };
        match tcont_type {
            TcontType::T1 => words,
            TcontType::T2 => {
                if request > 0 {
                    request.max(MIN_DATA_GRANT).min(words) + dbru
                } else {
                    1
                }
            }
            TcontType::T3 => {
                let (cap, idle) = if self.guaranteed_cycle {
                    (words / 5, 0)
                } else {
                    (words * 4 / 5, 1)
                };
                if request > 0 {
                    request.max(MIN_DATA_GRANT).min(cap) + dbru
                } else {
                    idle
                }
            }
            TcontType::T4 => self.best_effort_grant(index, request, dbru, cycle),
        }
    }

    /// A cycle that reached its last T-CONT switches between guaranteed and surplus cycles and
    /// starts the next T4 round one T-CONT later.
    fn finalize_bwmap_production(&mut self, _cycle: &DbaCycle) {
        if self.completed {
            self.guaranteed_cycle = !self.guaranteed_cycle;
            self.rounds.rotate(BEST_EFFORT_ROUND);
        }
    }

    fn to_string(&self) -> String {
        "giant".to_string()
    }
}

#[cfg(test)]
mod tests {
    use sugars::{rc, refcell};

    use super::*;
    use crate::qos::QosParameters;
    use crate::tcont::XgponTcontOlt;
    use crate::xgtc::XgtcDbru;

    fn cycle(allocated: u32) -> DbaCycle {
        DbaCycle {
            now: 0,
            rtt: 250_000,
            slot: 125_000,
            us_frame_size: 9720,
            allocated,
        }
    }

    fn tcont(alloc_id: u16, tcont_type: TcontType, rate: u64, report: u32) -> TcontOltRef {
        let qos = QosParameters::new(tcont_type).with_rate(rate).with_intervals(4, 8);
        let t = rc!(refcell!(XgponTcontOlt::new(alloc_id, 1, qos)));
        if report > 0 {
            t.borrow_mut().receive_status_report(XgtcDbru::new(report, 0), 0);
        }
        t
    }

    /// Visits a whole cycle and returns the grant of every T-CONT.
    fn run_cycle(engine: &mut Giant, c: &DbaCycle) -> Vec<(u16, u32)> {
        engine.prepare_to_produce_bwmap(c);
        let mut grants = Vec::new();
        let mut next = engine.first_tcont();
        while let Some(t) = next {
            let grant = engine.calculate_amount_to_upload(&t, false, c);
            grants.push((t.borrow().alloc_id(), grant));
            if engine.check_all_tconts_served() {
                break;
            }
            next = engine.next_tcont();
        }
        engine.finalize_bwmap_production(c);
        grants
    }

    #[test]
    fn fixed_and_assured_every_map() {
        let mut engine = Giant::new();
        // 100 Mbit/s is 390 words per frame whatever the service interval
        engine.add_tcont(tcont(1, TcontType::T1, 100_000_000, 0), 125_000);
        engine.add_tcont(tcont(2, TcontType::T2, 100_000_000, 1000), 125_000);
        engine.add_tcont(tcont(3, TcontType::T2, 100_000_000, 0), 125_000);
        let c = cycle(0);
        assert_eq!(run_cycle(&mut engine, &c), vec![(1, 390), (2, 391), (3, 1)]);
        assert_eq!(run_cycle(&mut engine, &c), vec![(1, 390), (2, 391), (3, 1)]);
    }

    #[test]
    fn non_assured_alternates() {
        let mut engine = Giant::new();
        engine.add_tcont(tcont(1, TcontType::T3, 100_000_000, 1000), 125_000);
        let c = cycle(0);
        assert!(engine.is_guaranteed_cycle());
        assert_eq!(run_cycle(&mut engine, &c), vec![(1, 390 / 5 + 1)]);
        assert!(!engine.is_guaranteed_cycle());
        assert_eq!(run_cycle(&mut engine, &c), vec![(1, 390 * 4 / 5 + 1)]);
        assert!(engine.is_guaranteed_cycle());
    }

    #[test]
    fn best_effort_threshold_and_deficit() {
        let mut engine = Giant::new();
        engine.add_tcont(tcont(1, TcontType::T4, 100_000_000, 5000), 125_000);
        engine.add_tcont(tcont(2, TcontType::T4, 100_000_000, 1000), 125_000);
        // 1010 words left for two T-CONTs: a threshold of 500 each
        let c = cycle(8710);
        let grants = run_cycle(&mut engine, &c);
        assert_eq!(grants[0], (1, 501));
        assert_eq!(engine.deficit(0), 4500);
        // the last T-CONT of the round may take all the free space
        assert_eq!(grants[1], (2, 1001));
        assert_eq!(engine.deficit(1), 0);

        // surplus cycle, the T4 round starts with the second T-CONT
        let grants = run_cycle(&mut engine, &c);
        assert_eq!(grants[0], (2, 1001));
        // request plus deficit above three thresholds falls back to one threshold
        assert_eq!(grants[1], (1, 1001));
        assert!(engine.is_guaranteed_cycle());
    }

    #[test]
    fn empty_engine() {
        let mut engine = Giant::new();
        let c = cycle(0);
        assert!(run_cycle(&mut engine, &c).is_empty());
        assert!(engine.check_all_tconts_served());
    }
}
