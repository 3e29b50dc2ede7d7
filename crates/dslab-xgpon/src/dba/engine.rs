//! OLT upstream DBA: policy trait and the BWmap production driver.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use crate::context::SimulationContext;
use crate::dba::bursts::OltDbaBursts;
use crate::dba::per_burst_info::{OltDbaPerBurstInfo, TcontOltRef};
use crate::link_info::XgponLinkInfo;
use crate::phy::XgponPhy;
use crate::qos::TcontType;
use crate::xgtc::{XgtcBwAllocation, XgtcBwmap, XgtcDbru, XgtcUsHeader, START_TIME_CONTIGUOUS};
use crate::{log_debug, log_trace, log_warn};

/// Maximum number of allocations in one BWmap.
pub const MAX_TCONT_PER_BWMAP: usize = 512;
/// Upper bound of a single grant computed from a rate, words.
pub const ALLOC_PER_SERVICE_MAX_SIZE: u32 = 1000;
/// Production stops once fewer words than this are left in the upstream frame.
pub const FRAME_TAIL_RESERVE: u32 = 10;

/// Converts a rate (bit/s) and a service interval (frames of `frame_slot_size` ns) into the words
/// granted per service. The result is rounded down to whole words and capped at
/// [`ALLOC_PER_SERVICE_MAX_SIZE`].
pub fn allocation_words_from_rate(rate: u64, frame_slot_size: u64, service_interval: u16) -> u32 {
    let bits = (rate as u128 * frame_slot_size as u128).saturating_mul(service_interval as u128) / 1_000_000_000;
    (bits / 32).min(ALLOC_PER_SERVICE_MAX_SIZE as u128) as u32
}

/// Derives the service parameters of `tcont` and sets its allocation words for a service interval
/// of at least `minimum_si` frames. Returns the T-CONT class.
pub fn configure_tcont(tcont: &TcontOltRef, frame_slot_size: u64, minimum_si: u16) -> TcontType {
    let mut t = tcont.borrow_mut();
    t.calculate_qos_parameters();
    let si = t.service_interval().max(minimum_si);
    let words = allocation_words_from_rate(t.allocated_rate(), frame_slot_size, si);
    t.set_allocation_words(words);
    t.tcont_type()
}

/// State of the BWmap cycle visible to a DBA policy.
#[derive(Clone, Debug)]
pub struct DbaCycle {
    /// Time the BWmap is produced, ns.
    pub now: u64,
    /// Logical round trip time, ns.
    pub rtt: u64,
    /// Frame duration, ns.
    pub slot: u64,
    /// Upstream frame size, words.
    pub us_frame_size: u32,
    /// Words already allocated in this map, including the previous map's overflow.
    pub allocated: u32,
}

impl DbaCycle {
    pub fn frame_left(&self) -> u32 {
        self.us_frame_size.saturating_sub(self.allocated)
    }
}

/// Grant policy of the OLT DBA.
///
/// For each BWmap the driver calls [`prepare_to_produce_bwmap`](DbaEngine::prepare_to_produce_bwmap),
/// walks T-CONTs with [`first_tcont`](DbaEngine::first_tcont) and [`next_tcont`](DbaEngine::next_tcont)
/// asking for grant sizes, stops when [`check_all_tconts_served`](DbaEngine::check_all_tconts_served)
/// holds or the frame is full, and closes the cycle with
/// [`finalize_bwmap_production`](DbaEngine::finalize_bwmap_production).
pub trait DbaEngine {
    /// Registers a T-CONT and derives its service parameters for frames of `frame_slot_size` ns.
    fn add_tcont(&mut self, tcont: TcontOltRef, frame_slot_size: u64);

    fn prepare_to_produce_bwmap(&mut self, cycle: &DbaCycle);

    fn first_tcont(&mut self) -> Option<TcontOltRef>;

    fn next_tcont(&mut self) -> Option<TcontOltRef>;

    /// Whether the T-CONT returned last is the final one of this cycle.
    fn check_all_tconts_served(&self) -> bool;

    /// Grant size in words for `tcont`. `served` tells whether it already has an allocation in this
    /// map, in which case no DBRu word is needed.
    fn calculate_amount_to_upload(&mut self, tcont: &TcontOltRef, served: bool, cycle: &DbaCycle) -> u32;

    /// Advances service interval timers at the end of the cycle.
    fn finalize_bwmap_production(&mut self, cycle: &DbaCycle);

    fn to_string(&self) -> String;
}

/// OLT side of the upstream DBA: owns the policy, the OLT view of ONU links and T-CONTs and the
/// recently sent BWmaps.
pub struct OltDbaEngine {
    policy: Box<dyn DbaEngine>,
    bursts: OltDbaBursts,
    phy: XgponPhy,
    rtt: u64,
    links: FxHashMap<u16, XgponLinkInfo>,
    tconts: FxHashMap<u16, TcontOltRef>,
    extra_allocation: u32,
    served_bwmaps: VecDeque<XgtcBwmap>,
    ctx: SimulationContext,
}

impl OltDbaEngine {
    pub fn new(policy: Box<dyn DbaEngine>, phy: XgponPhy, rtt: u64, ctx: SimulationContext) -> Self {
        Self {
            policy,
            bursts: OltDbaBursts::new(),
            phy,
            rtt,
            links: FxHashMap::default(),
            tconts: FxHashMap::default(),
            extra_allocation: 0,
            served_bwmaps: VecDeque::new(),
            ctx,
        }
    }

    pub fn policy_name(&self) -> String {
        self.policy.to_string()
    }

    pub fn phy(&self) -> &XgponPhy {
        &self.phy
    }

    pub fn add_onu(&mut self, link: XgponLinkInfo) {
        let onu_id = link.onu_id();
        assert!(self.links.insert(onu_id, link).is_none(), "ONU {} is already registered", onu_id);
    }

    pub fn link_info(&self, onu_id: u16) -> Option<&XgponLinkInfo> {
        self.links.get(&onu_id)
    }

    pub fn link_info_mut(&mut self, onu_id: u16) -> Option<&mut XgponLinkInfo> {
        self.links.get_mut(&onu_id)
    }

    /// Registers a T-CONT of an already registered ONU.
    pub fn add_tcont(&mut self, tcont: TcontOltRef) {
        let (alloc_id, onu_id) = {
            let t = tcont.borrow();
            (t.alloc_id(), t.onu_id())
        };
        assert!(self.links.contains_key(&onu_id), "T-CONT {} belongs to unknown ONU {}", alloc_id, onu_id);
        assert!(
            self.tconts.insert(alloc_id, tcont.clone()).is_none(),
            "Alloc-ID {} is already registered",
            alloc_id
        );
        self.policy.add_tcont(tcont, self.phy.frame_slot_size);
    }

    pub fn tcont(&self, alloc_id: u16) -> Option<&TcontOltRef> {
        self.tconts.get(&alloc_id)
    }

    /// Words of the last map that spill over into the next upstream frame.
    pub fn extra_allocation(&self) -> u32 {
        self.extra_allocation
    }

    /// Produces the BWmap for the upstream frame starting one round trip from now.
    pub fn generate_bwmap(&mut self) -> XgtcBwmap {
        let now = self.ctx.time_nanos();
        let frame = self.phy.us_frame_size_in_words();
        let start_extra = self.extra_allocation;
        self.bursts.clear_burst_info_list();

        let mut cycle = DbaCycle {
            now,
            rtt: self.rtt,
            slot: self.phy.frame_slot_size,
            us_frame_size: frame,
            allocated: start_extra,
        };
        self.policy.prepare_to_produce_bwmap(&cycle);

        let mut num_allocs = 0;
        let mut next = self.policy.first_tcont();
        while let Some(tcont) = next {
            if cycle.allocated >= frame - FRAME_TAIL_RESERVE || num_allocs >= MAX_TCONT_PER_BWMAP {
                break;
            }
            let (alloc_id, onu_id) = {
                let t = tcont.borrow();
                (t.alloc_id(), t.onu_id())
            };
            let served = self.bursts.check_served_tcont(alloc_id);
            let grant = self
                .policy
                .calculate_amount_to_upload(&tcont, served, &cycle)
                .min((3 * frame / 2).saturating_sub(cycle.allocated));
            if grant > 0 {
                if let Some((added, new_alloc)) = self.place_grant(&tcont, alloc_id, onu_id, grant, &cycle) {
                    cycle.allocated += added;
                    if new_alloc {
                        num_allocs += 1;
                    }
                }
            }
            if self.policy.check_all_tconts_served() {
                break;
            }
            next = self.policy.next_tcont();
        }

        let mut map = self.bursts.produce_bwmap_from_bursts(now, start_extra, frame);
        map.set_creation_time(now);
        self.extra_allocation = cycle.allocated.saturating_sub(frame);
        self.policy.finalize_bwmap_production(&cycle);
        log_debug!(
            self.ctx,
            "BWmap with {} allocations in {} bursts, {} of {} words allocated",
            map.len(),
            self.bursts.num_bursts(),
            cycle.allocated,
            frame
        );
        self.served_bwmaps.push_back(map.clone());
        map
    }

    /// Adds `grant` words for a T-CONT to the bursts under construction.
    ///
    /// Returns the growth of the allocated frame size and whether a new allocation was created, or
    /// `None` if the grant did not fit anywhere.
    fn place_grant(
        &mut self,
        tcont: &TcontOltRef,
        alloc_id: u16,
        onu_id: u16,
        grant: u32,
        cycle: &DbaCycle,
    ) -> Option<(u32, bool)> {
        let link = self.links.get(&onu_id)?;
        let frame_left = cycle.frame_left();
        let budget = match self.bursts.open_burst(onu_id) {
            Some(burst) => burst.grant_budget(frame_left),
            None => {
                let mut fresh = OltDbaPerBurstInfo::new(onu_id);
                initialize_burst(&mut fresh, link, &self.phy);
                fresh.grant_budget(frame_left)
            }
        };
        let grant = grant.min(budget).min(u16::MAX as u32);
        if grant == 0 {
            log_trace!(self.ctx, "no room for Alloc-ID {} ({} words left)", alloc_id, frame_left);
            return None;
        }

        let burst = match self.bursts.burst_info_for_tcont(onu_id) {
            Some(burst) => burst,
            None => {
                log_trace!(self.ctx, "ONU {} has no burst capacity left for Alloc-ID {}", onu_id, alloc_id);
                return None;
            }
        };

        let result = if burst.is_empty() {
            initialize_burst(burst, link, &self.phy);
            let alloc = XgtcBwAllocation::new(alloc_id, true, burst.ploam(), 0, grant as u16, burst.profile_index());
            burst.add_one_new_bw_alloc(alloc, tcont.clone());
            (burst.final_burst_size(), true)
        } else {
            let before = burst.final_burst_size();
            let new_alloc = burst.find_bw_alloc(alloc_id).is_none();
            if new_alloc {
                let alloc = XgtcBwAllocation::new(
                    alloc_id,
                    true,
                    false,
                    START_TIME_CONTIGUOUS,
                    grant as u16,
                    burst.profile_index(),
                );
                burst.add_one_new_bw_alloc(alloc, tcont.clone());
            } else {
                burst.add_to_existing_bw_alloc(alloc_id, grant);
            }
            (burst.final_burst_size() - before, new_alloc)
        };
        self.bursts.set_served_tcont(alloc_id);
        log_trace!(self.ctx, "granted {} words to Alloc-ID {} of ONU {}", grant, alloc_id, onu_id);
        Some(result)
    }

    /// Records the header fields of a burst received from `onu_id`.
    pub fn receive_us_header(&mut self, header: &XgtcUsHeader) {
        let onu_id = header.onu_id();
        match self.links.get_mut(&onu_id) {
            Some(link) => link.set_ploam_exist_at_onu(header.ploam_queue_status()),
            None => log_warn!(self.ctx, "burst header from unknown ONU {}", onu_id),
        }
    }

    /// Passes a buffer occupancy report received from an ONU to its T-CONT.
    pub fn receive_status_report(&mut self, dbru: XgtcDbru, onu_id: u16, alloc_id: u16) {
        let now = self.ctx.time_nanos();
        match self.tconts.get(&alloc_id) {
            Some(tcont) if tcont.borrow().onu_id() == onu_id => {
                log_trace!(
                    self.ctx,
                    "DBRu from Alloc-ID {} of ONU {}: {} words",
                    alloc_id,
                    onu_id,
                    dbru.buf_occ()
                );
                tcont.borrow_mut().receive_status_report(dbru, now);
            }
            _ => log_warn!(self.ctx, "DBRu for unknown Alloc-ID {} of ONU {}", alloc_id, onu_id),
        }
    }

    /// Returns the BWmap whose upstream frame contains `time` (a burst arrival time).
    ///
    /// Maps whose frame ended before `time` are discarded. Panics if no sent map matches.
    pub fn bwmap_for_burst(&mut self, time: u64) -> &XgtcBwmap {
        let frame_end = self.rtt + self.phy.frame_slot_size;
        while self
            .served_bwmaps
            .front()
            .map_or(false, |map| time >= map.creation_time() + frame_end)
        {
            self.served_bwmaps.pop_front();
        }
        let rtt = self.rtt;
        match self.served_bwmaps.front() {
            Some(map) if time >= map.creation_time() + rtt => map,
            _ => panic!("No BWmap covers a burst received at {}", time),
        }
    }

    /// Index of the first allocation of the burst that arrived at `time` in `map`.
    ///
    /// Panics if no burst of the map starts after the arrival offset.
    pub fn index_of_burst_first_allocation(&self, map: &XgtcBwmap, time: u64) -> usize {
        let frame_start = map.creation_time() + self.rtt;
        assert!(time >= frame_start, "Burst at {} precedes its upstream frame at {}", time, frame_start);
        let offset = self.phy.nanos_to_words(time - frame_start);
        map.iter()
            .position(|a| a.is_burst_start() && offset < a.start_time() as u64)
            .unwrap_or_else(|| panic!("No burst of BWmap@{} starts after word {}", map.creation_time(), offset))
    }
}

fn initialize_burst(burst: &mut OltDbaPerBurstInfo, link: &XgponLinkInfo, phy: &XgponPhy) {
    burst.initialize(
        link.onu_id(),
        link.ploam_exist_at_onu(),
        link.current_profile_index(),
        link.current_profile(),
        phy.us_guard_time,
        phy.us_fec_block_data_size,
        phy.us_fec_block_size,
    );
}
