use std::collections::BTreeMap;
use std::ops::AddAssign;

use num::{ToPrimitive, Zero};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::qos::TcontType;

#[derive(Clone, Default)]
pub struct SampleMetric<T> {
    data: Vec<T>,
}

impl<T> SampleMetric<T> {
    pub fn add(&mut self, x: T) {
        self.data.push(x);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<T> SampleMetric<T>
where
    T: AddAssign + Copy + Zero,
{
    pub fn sum(&self) -> T {
        let mut s = T::zero();
        for x in self.data.iter().copied() {
            s += x;
        }
        s
    }
}

impl<T> SampleMetric<T>
where
    T: AddAssign + Copy + Zero + ToPrimitive,
{
    /// Mean of the samples, 0 for an empty metric.
    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.;
        }
        self.sum().to_f64().unwrap_or(0.) / (self.data.len() as f64)
    }
}

impl<T> Serialize for SampleMetric<T>
where
    T: AddAssign + Copy + Zero + ToPrimitive + Serialize,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("SampleMetric", 3)?;
        s.serialize_field("len", &self.len())?;
        s.serialize_field("sum", &self.sum())?;
        s.serialize_field("mean", &self.mean())?;
        s.end()
    }
}

/// Per T-CONT counters.
#[derive(Clone, Serialize)]
pub struct TcontStats {
    pub alloc_id: u16,
    pub onu_id: u16,
    pub tcont_type: TcontType,
    pub received_packets: u64,
    pub received_bytes: u64,
    pub dropped_packets: u64,
    pub dropped_bytes: u64,
    /// Packets whose last fragment reached the OLT.
    pub delivered_packets: u64,
    /// Payload bytes (all fragments) that reached the OLT.
    pub delivered_bytes: u64,
    pub granted_words: u64,
    /// Upstream delay of delivered packets, ns.
    pub delay: SampleMetric<u64>,
}

impl TcontStats {
    pub fn new(alloc_id: u16, onu_id: u16, tcont_type: TcontType) -> Self {
        Self {
            alloc_id,
            onu_id,
            tcont_type,
            received_packets: 0,
            received_bytes: 0,
            dropped_packets: 0,
            dropped_bytes: 0,
            delivered_packets: 0,
            delivered_bytes: 0,
            granted_words: 0,
            delay: SampleMetric::default(),
        }
    }
}

#[derive(Clone, Default, Serialize)]
pub struct Stats {
    /// Simulated upstream frame cycles.
    pub frames: u64,
    /// Simulated time, ns.
    pub duration: u64,
    pub bwmaps: u64,
    pub allocations: u64,
    pub allocated_words: u64,
    /// Bytes of idle XGEM frames sent upstream.
    pub idle_bytes: u64,
    pub bursts: u64,
    pub tconts: BTreeMap<u16, TcontStats>,
    /// Upstream delay of all delivered packets, ns.
    pub delay: SampleMetric<u64>,
}

impl Stats {
    pub fn tcont_mut(&mut self, alloc_id: u16) -> Option<&mut TcontStats> {
        self.tconts.get_mut(&alloc_id)
    }

    pub fn delivered_bytes(&self) -> u64 {
        self.tconts.values().map(|t| t.delivered_bytes).sum()
    }

    /// Delivered upstream throughput, bit/s.
    pub fn throughput(&self) -> f64 {
        if self.duration == 0 {
            return 0.;
        }
        self.delivered_bytes() as f64 * 8. * 1e9 / self.duration as f64
    }

    /// Share of the upstream frames covered by grants.
    pub fn utilization(&self, us_frame_size: u32) -> f64 {
        if self.frames == 0 || us_frame_size == 0 {
            return 0.;
        }
        self.allocated_words as f64 / (self.frames as f64 * us_frame_size as f64)
    }

    /// Delivered throughput of every T-CONT of the given class, bit/s.
    pub fn class_throughput(&self, tcont_type: TcontType) -> f64 {
        if self.duration == 0 {
            return 0.;
        }
        let bytes: u64 = self
            .tconts
            .values()
            .filter(|t| t.tcont_type == tcont_type)
            .map(|t| t.delivered_bytes)
            .sum();
        bytes as f64 * 8. * 1e9 / self.duration as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_metric() {
        let mut m = SampleMetric::<u64>::default();
        assert_eq!(m.mean(), 0.);
        m.add(10);
        m.add(20);
        assert_eq!(m.sum(), 30);
        assert_eq!(m.mean(), 15.);
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn throughput_and_utilization() {
        let mut stats = Stats::default();
        let mut t = TcontStats::new(1024, 1, TcontType::T2);
        t.delivered_bytes = 125_000;
        stats.tconts.insert(1024, t);
        stats.duration = 1_000_000_000;
        stats.frames = 2;
        stats.allocated_words = 9720;
        assert_eq!(stats.throughput(), 1_000_000.);
        assert_eq!(stats.class_throughput(TcontType::T2), 1_000_000.);
        assert_eq!(stats.class_throughput(TcontType::T4), 0.);
        assert_eq!(stats.utilization(9720), 0.5);
    }
}
