//! EBU DBA: class priority with per-T-CONT credit and redistribution of unused credit.
//!
//! Every T-CONT except T1 holds a credit in words ("variable words"). A T-CONT is granted only while
//! its credit is not negative and every grant is charged to it. When a service interval timer
//! expires, a T-CONT with credit left hands the remainder to its class pool and restarts from its
//! share of the allocation words; an overdrawn T-CONT is first repaid from the pool of its class.
//! Pools are emptied every [`SURPLUS_PERIOD`] maps.

use rustc_hash::FxHashMap;

use crate::dba::engine::{configure_tcont, DbaCycle, DbaEngine};
use crate::dba::per_burst_info::TcontOltRef;
use crate::dba::rounds::{class_of, ClassRounds};
use crate::dba::xgiant::MIN_DATA_GRANT;

/// Maps between resets of the class pools.
pub const SURPLUS_PERIOD: u32 = 5;

/// Rounds of a cycle: T1, T2, T3 guaranteed, T3 surplus, T4.
const ROUNDS: [usize; 5] = [0, 1, 2, 2, 3];

/// Credit share restored on a GIR expiry of T3, and on PIR expiry of T2, T3 and T4 (numerator,
/// denominator).
const T3_GIR_SHARE: (i64, i64) = (1, 5);
const PIR_SHARES: [(i64, i64); 4] = [(1, 1), (1, 1), (3, 5), (1, 2)];

pub struct Ebu {
    minimum_si: u16,
    rounds: ClassRounds,
    credits: FxHashMap<u16, i64>,
    pools: [i64; 4],
    maps_to_reset: u32,
}

impl Ebu {
    pub fn new(minimum_si: u16) -> Self {
        Self {
            minimum_si: minimum_si.max(1),
            rounds: ClassRounds::new(&ROUNDS),
            credits: FxHashMap::default(),
            pools: [0; 4],
            maps_to_reset: SURPLUS_PERIOD,
        }
    }

    /// Current credit of `alloc_id`, words.
    pub fn credit(&self, alloc_id: u16) -> Option<i64> {
        self.credits.get(&alloc_id).copied()
    }

    /// Unused credit collected from the T-CONTs of `class` (0 for T1 to 3 for T4).
    pub fn pool(&self, class: usize) -> i64 {
        self.pools[class]
    }
}

fn restore(credit: &mut i64, pool: &mut i64, words: i64, (num, den): (i64, i64)) {
    if *credit >= 0 {
        *pool += *credit * num / den;
        *credit = words * num / den;
    } else {
        *credit = (words + *credit) * num / den;
    }
}

impl DbaEngine for Ebu {
    fn add_tcont(&mut self, tcont: TcontOltRef, frame_slot_size: u64) {
        let class = class_of(configure_tcont(&tcont, frame_slot_size, self.minimum_si));
        {
            let t = tcont.borrow();
            self.credits.insert(t.alloc_id(), t.allocation_words() as i64);
        }
        self.rounds.push(tcont, class);
    }

    fn prepare_to_produce_bwmap(&mut self, _cycle: &DbaCycle) {
        self.rounds.prepare();
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
        let round = match self.rounds.round() {
            Some(round) => round,
            None => return 0,
        };
        let mut t = tcont.borrow_mut();
        let words = t.allocation_words();
        if round == 0 {
            return if t.pir_timer() == 0 {
                t.reset_pir_timer();
                words
            } else {
                0
            };
        }

        let credit = self.credits.entry(t.alloc_id()).or_insert(words as i64);
        if *credit < 0 {
            return 0;
        }
        let (cap, idle) = match round {
            2 => (words / 5, 0),
            3 => (words * 3 / 5, 1),
            _ => (words, 1),
        };
        let request = t.calculate_remaining_data_to_serve(cycle.rtt, cycle.slot);
        let grant = if request > 0 {
            request.max(MIN_DATA_GRANT).min(cap) + if served { 0 } else { 1 }
        } else {
            idle
        };
        *credit -= grant as i64;
        grant
    }

    fn finalize_bwmap_production(&mut self, _cycle: &DbaCycle) {
        for (class, tcont) in self.rounds.iter() {
            let mut t = tcont.borrow_mut();
            if class == 0 {
                t.update_pir_timer();
                continue;
            }
            let words = t.allocation_words() as i64;
            let credit = self.credits.entry(t.alloc_id()).or_insert(words);
            let pool = &mut self.pools[class];
            if *credit < 0 && *pool > 0 {
                *credit = (*pool + *credit).min(0);
            }
            if class == 2 {
                if t.gir_timer() == 0 {
                    restore(credit, pool, words, T3_GIR_SHARE);
                    t.reset_gir_timer();
                } else {
                    t.update_gir_timer();
                }
            }
            if t.pir_timer() == 0 {
                restore(credit, pool, words, PIR_SHARES[class]);
                t.reset_pir_timer();
            } else {
                t.update_pir_timer();
            }
        }

        self.maps_to_reset -= 1;
        if self.maps_to_reset == 0 {
            self.maps_to_reset = SURPLUS_PERIOD;
            self.pools = [0; 4];
        }
    }

    fn to_string(&self) -> String {
        "ebu".to_string()
    }
}
