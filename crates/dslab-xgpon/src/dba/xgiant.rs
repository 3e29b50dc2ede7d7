//! XGIANT DBA core shared by its proportional and deficit variants.
//!
//! T-CONTs are served in static priority order with persistent round-robin inside each class.
//! One cycle makes six rounds: T1, T2, T3 with the guaranteed rate, T4 polling, T3 with the peak
//! rate and finally T4, whose bandwidth is divided by a [`BestEffortShare`].

use crate::dba::engine::{configure_tcont, DbaCycle, DbaEngine};
use crate::dba::per_burst_info::TcontOltRef;
use crate::dba::rounds::{class_of, ClassRounds};

/// A T-CONT that has not sent a report for this long gets a polling grant, ns.
pub const MAX_POLLING_INTERVAL: u64 = 10_000_000;
/// Smallest data grant, words.
pub const MIN_DATA_GRANT: u32 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Round {
    Fixed,
    Assured,
    NonAssuredGuaranteed,
    BestEffortPolling,
    NonAssuredPeak,
    BestEffort,
}

const ROUNDS: [Round; 6] = [
    Round::Fixed,
    Round::Assured,
    Round::NonAssuredGuaranteed,
    Round::BestEffortPolling,
    Round::NonAssuredPeak,
    Round::BestEffort,
];

impl Round {
    fn class(self) -> usize {
        match self {
            Round::Fixed => 0,
            Round::Assured => 1,
            Round::NonAssuredGuaranteed | Round::NonAssuredPeak => 2,
            Round::BestEffortPolling | Round::BestEffort => 3,
        }
    }
}

/// Division of the remaining upstream capacity among T4 T-CONTs.
pub trait BestEffortShare {
    /// Called before the first T4 grant of a cycle with the backlog estimate of every T4 T-CONT
    /// (indexed like `tconts`) and the words left in the frame.
    fn start_round(&mut self, tconts: &[TcontOltRef], requests: &[u32], capacity: u32);

    /// Data words granted to the T4 T-CONT at `index` that reports `request` words.
    fn grant(&mut self, index: usize, request: u32, allocation_words: u32) -> u32;

    /// Called at the end of every cycle with the words allocated in it.
    fn finish_cycle(&mut self, allocated: u32, us_frame_size: u32);

    fn name(&self) -> &str;
}

/// XGIANT engine parameterised by its T4 sharing policy.
pub struct Xgiant<S: BestEffortShare> {
    share: S,
    minimum_si: u16,
    rounds: ClassRounds,
    best_effort_started: bool,
}

impl<S: BestEffortShare + Default> Xgiant<S> {
    /// Creates an engine where no service interval is shorter than `minimum_si` frames.
    pub fn new(minimum_si: u16) -> Self {
        Self::with_share(S::default(), minimum_si)
    }
}

impl<S: BestEffortShare> Xgiant<S> {
    pub fn with_share(share: S, minimum_si: u16) -> Self {
        Self {
            share,
            minimum_si: minimum_si.max(1),
            rounds: ClassRounds::new(&ROUNDS.map(Round::class)),
            best_effort_started: false,
        }
    }

    pub fn share(&self) -> &S {
        &self.share
    }

    fn start_best_effort_round(&mut self, cycle: &DbaCycle) {
        let tconts = self.rounds.class(3);
        let requests: Vec<u32> = tconts
            .iter()
            .map(|t| t.borrow().calculate_remaining_data_to_serve(cycle.rtt, cycle.slot))
            .collect();
        self.share.start_round(tconts, &requests, cycle.frame_left());
        self.best_effort_started = true;
    }
}

fn data_grant(words: u32, dbru: u32) -> u32 {
    if words > 0 {
        words.max(MIN_DATA_GRANT) + dbru
    } else {
        dbru
    }
}

impl<S: BestEffortShare> DbaEngine for Xgiant<S> {
    fn add_tcont(&mut self, tcont: TcontOltRef, frame_slot_size: u64) {
        let class = class_of(configure_tcont(&tcont, frame_slot_size, self.minimum_si));
        self.rounds.push(tcont, class);
    }

    fn prepare_to_produce_bwmap(&mut self, _cycle: &DbaCycle) {
        self.rounds.prepare();
        self.best_effort_started = false;
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
        let (round, index) = match (self.rounds.round(), self.rounds.index()) {
            (Some(round), Some(index)) => (ROUNDS[round], index),
            _ => return 0,
        };
        if round == Round::BestEffort && !self.best_effort_started {
            self.start_best_effort_round(cycle);
        }
        let mut t = tcont.borrow_mut();
        let dbru = if served { 0 } else { 1 };
        let words = t.allocation_words();
        let request = t.calculate_remaining_data_to_serve(cycle.rtt, cycle.slot);
        let poll = if cycle.now >= t.last_polling_time() + MAX_POLLING_INTERVAL {
            dbru
        } else {
            0
        };

        match round {
            Round::Fixed => {
                // the DBRu word, if any, is taken from the fixed allocation
                if t.pir_timer() == 0 {
                    t.reset_pir_timer();
                    words
                } else {
                    0
                }
            }
            Round::Assured => {
                if t.pir_timer() == 0 {
                    t.reset_pir_timer();
                    data_grant(request.min(words), dbru)
                } else {
                    poll
                }
            }
            Round::NonAssuredGuaranteed => {
                if t.gir_timer() == 0 {
                    t.reset_gir_timer();
                    let guaranteed = request.min(words / 5);
                    if guaranteed > 0 {
                        guaranteed + dbru
                    } else {
                        0
                    }
                } else {
                    0
                }
            }
            Round::BestEffortPolling => {
                if t.gir_timer() == 0 {
                    t.reset_gir_timer();
                }
                0
            }
            Round::NonAssuredPeak => {
                if t.pir_timer() == 0 {
                    t.reset_pir_timer();
                    data_grant(request.min(words * 3 / 5), dbru)
                } else {
                    poll
                }
            }
            Round::BestEffort => {
                if t.pir_timer() == 0 {
                    t.reset_pir_timer();
                    if request > 0 {
                        let share = self.share.grant(index, request, words).min(words);
                        data_grant(share, dbru)
                    } else {
                        dbru
                    }
                } else {
                    poll
                }
            }
        }
    }

    fn finalize_bwmap_production(&mut self, cycle: &DbaCycle) {
        for (class, tcont) in self.rounds.iter() {
            let mut t = tcont.borrow_mut();
            t.update_pir_timer();
            if class >= 2 {
                t.update_gir_timer();
            }
        }
        self.share.finish_cycle(cycle.allocated, cycle.us_frame_size);
    }

    fn to_string(&self) -> String {
        self.share.name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use sugars::{rc, refcell};

    use super::*;
    use crate::dba::engine::ALLOC_PER_SERVICE_MAX_SIZE;
    use crate::qos::{QosParameters, TcontType};
    use crate::tcont::XgponTcontOlt;
    use crate::xgtc::XgtcDbru;

    const SLOT: u64 = 125_000;

    /// Grants the request as is.
    #[derive(Default)]
    struct FullShare;

    impl BestEffortShare for FullShare {
        fn start_round(&mut self, _tconts: &[TcontOltRef], _requests: &[u32], _capacity: u32) {}

        fn grant(&mut self, _index: usize, request: u32, _allocation_words: u32) -> u32 {
            request
        }

        fn finish_cycle(&mut self, _allocated: u32, _us_frame_size: u32) {}

        fn name(&self) -> &str {
            "full"
        }
    }

    fn tcont(alloc_id: u16, tcont_type: TcontType) -> TcontOltRef {
        let qos = QosParameters::new(tcont_type).with_rate(100_000_000).with_intervals(1, 2);
        rc!(refcell!(XgponTcontOlt::new(alloc_id, 1, qos)))
    }

    fn cycle(now: u64) -> DbaCycle {
        DbaCycle {
            now,
            rtt: 250_000,
            slot: SLOT,
            us_frame_size: 9720,
            allocated: 0,
        }
    }

    fn visit_order(engine: &mut Xgiant<FullShare>) -> Vec<u16> {
        engine.prepare_to_produce_bwmap(&cycle(0));
        let mut order = Vec::new();
        let mut next = engine.first_tcont();
        while let Some(t) = next {
            order.push(t.borrow().alloc_id());
            if engine.check_all_tconts_served() {
                break;
            }
            next = engine.next_tcont();
        }
        order
    }

    #[test]
    fn priority_order() {
        let mut engine = Xgiant::<FullShare>::new(1);
        engine.add_tcont(tcont(4, TcontType::T4), SLOT);
        engine.add_tcont(tcont(3, TcontType::T3), SLOT);
        engine.add_tcont(tcont(2, TcontType::T2), SLOT);
        engine.add_tcont(tcont(1, TcontType::T1), SLOT);
        assert_eq!(visit_order(&mut engine), vec![1, 2, 3, 4, 3, 4]);
    }

    #[test]
    fn round_robin_resumes_after_cut() {
        let mut engine = Xgiant::<FullShare>::new(1);
        for alloc_id in 1..=3 {
            engine.add_tcont(tcont(alloc_id, TcontType::T2), SLOT);
        }
        engine.prepare_to_produce_bwmap(&cycle(0));
        assert_eq!(engine.first_tcont().unwrap().borrow().alloc_id(), 1);
        assert!(!engine.check_all_tconts_served());
        // the cycle stops here, the next one starts with the T-CONT after the last visited
        assert_eq!(visit_order(&mut engine), vec![2, 3, 1]);
        assert_eq!(visit_order(&mut engine), vec![2, 3, 1]);
    }

    #[test]
    fn empty_engine() {
        let mut engine = Xgiant::<FullShare>::new(1);
        engine.prepare_to_produce_bwmap(&cycle(0));
        assert!(engine.first_tcont().is_none());
        assert!(engine.check_all_tconts_served());
        assert!(engine.next_tcont().is_none());
    }

    #[test]
    fn fixed_grant_follows_timer() {
        let mut engine = Xgiant::<FullShare>::new(1);
        let t1 = tcont(1, TcontType::T1);
        engine.add_tcont(t1.clone(), SLOT);
        // 100 Mbit/s over 2 frames
        assert_eq!(t1.borrow().allocation_words(), 781);

        let c = cycle(0);
        engine.prepare_to_produce_bwmap(&c);
        let t = engine.first_tcont().unwrap();
        assert_eq!(engine.calculate_amount_to_upload(&t, false, &c), 0);
        engine.finalize_bwmap_production(&c);
        engine.finalize_bwmap_production(&c);

        engine.prepare_to_produce_bwmap(&c);
        let t = engine.first_tcont().unwrap();
        // exactly the fixed allocation, without an extra DBRu word
        assert_eq!(engine.calculate_amount_to_upload(&t, false, &c), 781);
        assert_eq!(engine.calculate_amount_to_upload(&t, true, &c), 0);
        assert_eq!(t1.borrow().pir_timer(), 2);
    }

    #[test]
    fn assured_grant_and_poll() {
        let mut engine = Xgiant::<FullShare>::new(1);
        let t2 = tcont(2, TcontType::T2);
        engine.add_tcont(t2.clone(), SLOT);
        let c = cycle(0);
        engine.finalize_bwmap_production(&c);
        engine.finalize_bwmap_production(&c);

        engine.prepare_to_produce_bwmap(&c);
        let t = engine.first_tcont().unwrap();
        // nothing reported: one word for the DBRu
        assert_eq!(engine.calculate_amount_to_upload(&t, false, &c), 1);

        t2.borrow_mut().receive_status_report(XgtcDbru::new(2, 0), 0);
        t2.borrow_mut().update_pir_timer();
        t2.borrow_mut().update_pir_timer();
        assert_eq!(engine.calculate_amount_to_upload(&t, true, &c), MIN_DATA_GRANT);

        t2.borrow_mut().receive_status_report(XgtcDbru::new(5000, 0), 0);
        t2.borrow_mut().update_pir_timer();
        t2.borrow_mut().update_pir_timer();
        assert_eq!(engine.calculate_amount_to_upload(&t, false, &c), 782);
    }

    #[test]
    fn long_silence_triggers_poll() {
        let mut engine = Xgiant::<FullShare>::new(1);
        let t2 = tcont(2, TcontType::T2);
        engine.add_tcont(t2, SLOT);
        let c = cycle(MAX_POLLING_INTERVAL);
        engine.prepare_to_produce_bwmap(&c);
        let t = engine.first_tcont().unwrap();
        assert_eq!(engine.calculate_amount_to_upload(&t, false, &c), 1);
        assert_eq!(engine.calculate_amount_to_upload(&t, true, &c), 0);
    }

    #[test]
    fn minimum_service_interval() {
        let mut engine = Xgiant::<FullShare>::new(4);
        let t2 = tcont(2, TcontType::T2);
        engine.add_tcont(t2.clone(), SLOT);
        // 100 Mbit/s over 4 frames is 1562 words
        assert_eq!(t2.borrow().allocation_words(), ALLOC_PER_SERVICE_MAX_SIZE);
    }
}
