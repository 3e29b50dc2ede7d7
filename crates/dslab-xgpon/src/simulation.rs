//! Frame-by-frame upstream simulation of one PON: traffic, ONU bursts and the OLT DBA.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use sugars::{rc, refcell};

use crate::config::{Config, FIRST_ALLOC_ID, FIRST_PORT_ID};
use crate::connection::XgponConnection;
use crate::context::{SimulationContext, SimulationState};
use crate::dba::OltDbaEngine;
use crate::link_info::XgponLinkInfo;
use crate::onu::XgponOnu;
use crate::packet::Packet;
use crate::stats::{Stats, TcontStats};
use crate::tcont::XgponTcontOlt;
use crate::traffic::TrafficGenerator;
use crate::xgtc::{XgtcBwmap, XgtcUsBurst};
use crate::{log_error, log_info};

struct ConnectionSource {
    onu_id: u16,
    port_id: u16,
    generator: TrafficGenerator,
}

struct BurstInFlight {
    arrival: u64,
    burst: XgtcUsBurst,
}

/// Upstream simulation driven in steps of one frame slot.
///
/// A BWmap produced by the OLT at time `c` reaches the ONUs at `c + rtt/2`; the bursts it grants
/// arrive at the OLT during the upstream frame starting at `c + rtt`.
pub struct XgponSimulation {
    sim: Rc<RefCell<SimulationState>>,
    ctx: SimulationContext,
    olt: OltDbaEngine,
    onus: Vec<XgponOnu>,
    alloc_owner: FxHashMap<u16, u16>,
    sources: Vec<ConnectionSource>,
    pending_maps: VecDeque<XgtcBwmap>,
    in_flight: VecDeque<BurstInFlight>,
    rtt: u64,
    slot: u64,
    frames: u64,
    frames_to_run: u64,
    next_packet_uid: u64,
    stats: Stats,
}

impl XgponSimulation {
    pub fn new(config: Config) -> Self {
        let sim = rc!(refcell!(SimulationState::new(config.seed)));
        let mut ctx = SimulationContext::new("simulation", sim.clone());
        let olt_ctx = SimulationContext::new("olt", sim.clone());
        let mut olt = OltDbaEngine::new(config.dba, config.phy.clone(), config.rtt, olt_ctx);

        let mut onus = Vec::with_capacity(config.onus.len());
        let mut alloc_owner = FxHashMap::default();
        let mut sources = Vec::new();
        let mut stats = Stats::default();
        let mut alloc_id = FIRST_ALLOC_ID;
        let mut port_id = FIRST_PORT_ID;
        for (i, onu_config) in config.onus.iter().enumerate() {
            let onu_id = i as u16 + 1;
            olt.add_onu(XgponLinkInfo::new(onu_id, config.profile.clone()));
            let onu_ctx = SimulationContext::new(&format!("onu-{}", onu_id), sim.clone());
            let mut onu = XgponOnu::new(XgponLinkInfo::new(onu_id, config.profile.clone()), onu_ctx);
            for tcont in &onu_config.tconts {
                olt.add_tcont(rc!(refcell!(XgponTcontOlt::new(alloc_id, onu_id, tcont.qos.clone()))));
                alloc_owner.insert(alloc_id, onu_id);
                stats
                    .tconts
                    .insert(alloc_id, TcontStats::new(alloc_id, onu_id, tcont.qos.tcont_type));
                for _ in 0..tcont.connections {
                    let queue = Box::new(config.queue.build());
                    onu.add_connection(XgponConnection::new(port_id, alloc_id, onu_id, queue));
                    if let Some(traffic) = &tcont.traffic {
                        match TrafficGenerator::new(traffic.clone(), &mut ctx) {
                            Ok(generator) => sources.push(ConnectionSource {
                                onu_id,
                                port_id,
                                generator,
                            }),
                            Err(e) => log_error!(ctx, "no traffic on port {}: {}", port_id, e),
                        }
                    }
                    port_id += 1;
                }
                alloc_id += 1;
            }
            onus.push(onu);
        }

        log_info!(
            ctx,
            "{} ONUs, {} T-CONTs, {} traffic sources, DBA {}",
            onus.len(),
            alloc_owner.len(),
            sources.len(),
            olt.policy_name()
        );
        Self {
            sim,
            ctx,
            olt,
            onus,
            alloc_owner,
            sources,
            pending_maps: VecDeque::new(),
            in_flight: VecDeque::new(),
            rtt: config.rtt,
            slot: config.phy.frame_slot_size,
            frames: 0,
            frames_to_run: config.frames,
            next_packet_uid: 0,
            stats,
        }
    }

    /// Creates a context bound to the simulation clock and random generator.
    pub fn create_context(&self, name: &str) -> SimulationContext {
        SimulationContext::new(name, self.sim.clone())
    }

    pub fn time_nanos(&self) -> u64 {
        self.sim.borrow().time_nanos()
    }

    pub fn olt(&self) -> &OltDbaEngine {
        &self.olt
    }

    pub fn onu(&self, onu_id: u16) -> Option<&XgponOnu> {
        self.onus.get((onu_id as usize).checked_sub(1)?)
    }

    pub fn onu_mut(&mut self, onu_id: u16) -> Option<&mut XgponOnu> {
        self.onus.get_mut((onu_id as usize).checked_sub(1)?)
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Queues a packet on connection `port_id` of ONU `onu_id` at the current time.
    pub fn send_packet(&mut self, onu_id: u16, port_id: u16, size: u32) -> bool {
        let now = self.time_nanos();
        self.enqueue(onu_id, port_id, size, now)
    }

    fn enqueue(&mut self, onu_id: u16, port_id: u16, size: u32, created_at: u64) -> bool {
        let uid = self.next_packet_uid;
        self.next_packet_uid += 1;
        let onu = match (onu_id as usize).checked_sub(1).and_then(|i| self.onus.get_mut(i)) {
            Some(onu) => onu,
            None => panic!("Unknown ONU {}", onu_id),
        };
        let alloc_id = match onu.connection_mut(port_id) {
            Some(conn) => conn.alloc_id(),
            None => panic!("ONU {} has no connection {}", onu_id, port_id),
        };
        let accepted = onu.receive_upstream_packet(port_id, Packet::new(uid, size, created_at));
        if let Some(t) = self.stats.tcont_mut(alloc_id) {
            if accepted {
                t.received_packets += 1;
                t.received_bytes += size as u64;
            } else {
                t.dropped_packets += 1;
                t.dropped_bytes += size as u64;
            }
        }
        accepted
    }

    /// Simulates one frame slot.
    ///
    /// The OLT first receives the bursts that arrived since the previous step, then new packets
    /// enter the ONU queues, the ONUs answer the BWmaps that reached them and finally the OLT
    /// produces the next BWmap.
    pub fn step(&mut self) {
        let now = self.frames * self.slot;
        self.receive_bursts(now);
        self.sim.borrow_mut().set_time(now);
        self.generate_traffic(now);
        self.execute_bwmaps(now);

        let map = self.olt.generate_bwmap();
        self.stats.bwmaps += 1;
        self.stats.allocations += map.len() as u64;
        for alloc in map.iter() {
            self.stats.allocated_words += alloc.grant_size() as u64;
            if let Some(t) = self.stats.tcont_mut(alloc.alloc_id()) {
                t.granted_words += alloc.grant_size() as u64;
            }
        }
        self.pending_maps.push_back(map);

        self.frames += 1;
        self.stats.frames = self.frames;
        self.stats.duration = self.frames * self.slot;
    }

    /// Runs the configured number of frames and returns the collected statistics.
    pub fn run(&mut self) -> Stats {
        while self.frames < self.frames_to_run {
            self.step();
        }
        log_info!(
            self.ctx,
            "{} frames, {} packets delivered, throughput {:.3} Mbit/s, mean delay {:.1} us",
            self.stats.frames,
            self.stats.delay.len(),
            self.stats.throughput() / 1e6,
            self.stats.delay.mean() / 1e3
        );
        self.stats.clone()
    }

    fn generate_traffic(&mut self, until: u64) {
        let mut arrivals = Vec::new();
        for source in self.sources.iter_mut() {
            let size = source.generator.source().packet_size();
            for time in source.generator.arrivals_until(until, &mut self.ctx) {
                arrivals.push((time, source.onu_id, source.port_id, size));
            }
        }
        arrivals.sort_by_key(|a| a.0);
        for (time, onu_id, port_id, size) in arrivals {
            self.enqueue(onu_id, port_id, size, time);
        }
    }

    fn execute_bwmaps(&mut self, now: u64) {
        while self
            .pending_maps
            .front()
            .map_or(false, |map| map.creation_time() + self.rtt / 2 <= now)
        {
            let map = match self.pending_maps.pop_front() {
                Some(map) => map,
                None => break,
            };
            for (i, alloc) in map.iter().enumerate() {
                if !alloc.is_burst_start() {
                    continue;
                }
                let onu_id = match self.alloc_owner.get(&alloc.alloc_id()) {
                    Some(&onu_id) => onu_id,
                    None => panic!("Alloc-ID {} has no owner", alloc.alloc_id()),
                };
                let onu = &mut self.onus[onu_id as usize - 1];
                let sync = onu.link_info().current_profile().sync_words() as u64;
                let burst = onu.produce_us_burst(&map, i);
                let offset = self.olt.phy().words_to_nanos(alloc.start_time() as u64 - sync);
                let arrival = map.creation_time() + self.rtt + offset;

                self.stats.bursts += 1;
                self.stats.idle_bytes += burst
                    .allocations()
                    .iter()
                    .flat_map(|a| a.frames())
                    .filter(|f| f.is_idle())
                    .map(|f| f.serialized_size() as u64)
                    .sum::<u64>();
                let pos = self.in_flight.partition_point(|b| b.arrival <= arrival);
                self.in_flight.insert(pos, BurstInFlight { arrival, burst });
            }
        }
    }

    fn receive_bursts(&mut self, until: u64) {
        while self.in_flight.front().map_or(false, |b| b.arrival <= until) {
            let BurstInFlight { arrival, burst } = match self.in_flight.pop_front() {
                Some(b) => b,
                None => break,
            };
            self.sim.borrow_mut().set_time(arrival);
            self.receive_burst(arrival, &burst);
        }
    }

    fn receive_burst(&mut self, arrival: u64, burst: &XgtcUsBurst) {
        let onu_id = burst.header().onu_id();
        self.olt.receive_us_header(burst.header());
        let map = self.olt.bwmap_for_burst(arrival).clone();
        let first = self.olt.index_of_burst_first_allocation(&map, arrival);
        for (k, us_alloc) in burst.allocations().iter().enumerate() {
            let alloc_id = map.bw_allocation(first + k).alloc_id();
            assert_eq!(
                alloc_id,
                us_alloc.alloc_id(),
                "Burst of ONU {} does not match BWmap@{}",
                onu_id,
                map.creation_time()
            );
            if let Some(dbru) = us_alloc.dbru() {
                self.olt.receive_status_report(dbru.clone(), onu_id, alloc_id);
            }
            for frame in us_alloc.frames() {
                let packet = match frame.payload() {
                    Some(packet) => packet,
                    None => continue,
                };
                let delay = arrival.saturating_sub(packet.created_at);
                let last = frame.header().last_fragment();
                if let Some(t) = self.stats.tcont_mut(alloc_id) {
                    t.delivered_bytes += packet.size as u64;
                    if last {
                        t.delivered_packets += 1;
                        t.delay.add(delay);
                    }
                }
                if last {
                    self.stats.delay.add(delay);
                }
            }
        }
    }
}
