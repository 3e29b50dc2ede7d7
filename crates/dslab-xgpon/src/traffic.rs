//! Upstream traffic sources feeding ONU connections.

use rand_distr::Exp;
use serde::{Deserialize, Serialize};

use crate::context::SimulationContext;
use crate::error::XgponError;
use crate::xgem::{XGEM_FRAME_MAXLEN, XGEM_HEADER_LENGTH};

/// Packet arrival process of one connection. Rates are in bit/s, sizes in bytes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TrafficSource {
    /// Fixed size packets at a constant bit rate.
    Cbr { packet_size: u32, rate: u64 },
    /// Fixed size packets with exponential inter-arrival times.
    Poisson { packet_size: u32, rate: u64 },
}

impl TrafficSource {
    pub fn packet_size(&self) -> u32 {
        match self {
            TrafficSource::Cbr { packet_size, .. } | TrafficSource::Poisson { packet_size, .. } => *packet_size,
        }
    }

    pub fn rate(&self) -> u64 {
        match self {
            TrafficSource::Cbr { rate, .. } | TrafficSource::Poisson { rate, .. } => *rate,
        }
    }

    /// Mean time between packets, ns.
    pub fn mean_interval(&self) -> f64 {
        self.packet_size() as f64 * 8. * 1e9 / self.rate() as f64
    }

    pub fn validate(&self) -> Result<(), XgponError> {
        if self.packet_size() == 0 || self.rate() == 0 {
            return Err(XgponError::InvalidConfig(format!(
                "traffic source needs a positive packet size and rate: {:?}",
                self
            )));
        }
        if self.packet_size() > XGEM_FRAME_MAXLEN - XGEM_HEADER_LENGTH {
            return Err(XgponError::InvalidConfig(format!(
                "packet size {} exceeds the XGEM payload limit",
                self.packet_size()
            )));
        }
        Ok(())
    }
}

/// Generates arrival times of a [`TrafficSource`].
pub struct TrafficGenerator {
    source: TrafficSource,
    next_arrival: f64,
    exp: Option<Exp<f64>>,
}

impl TrafficGenerator {
    /// Creates a generator whose first arrival falls within the first mean interval.
    pub fn new(source: TrafficSource, ctx: &mut SimulationContext) -> Result<Self, XgponError> {
        source.validate()?;
        let interval = source.mean_interval();
        let exp = match source {
            TrafficSource::Cbr { .. } => None,
            TrafficSource::Poisson { .. } => Some(
                Exp::new(1. / interval)
                    .map_err(|e| XgponError::InvalidConfig(format!("bad poisson rate: {:?}", e)))?,
            ),
        };
        let next_arrival = match &exp {
            Some(exp) => ctx.sample_from_distribution(exp),
            None => ctx.gen_range(0.0..interval),
        };
        Ok(Self {
            source,
            next_arrival,
            exp,
        })
    }

    pub fn source(&self) -> &TrafficSource {
        &self.source
    }

    /// Returns the arrival times (ns) up to and including `until`.
    pub fn arrivals_until(&mut self, until: u64, ctx: &mut SimulationContext) -> Vec<u64> {
        let mut arrivals = Vec::new();
        while self.next_arrival <= until as f64 {
            arrivals.push(self.next_arrival as u64);
            self.next_arrival += match &self.exp {
                Some(exp) => ctx.sample_from_distribution(exp),
                None => self.source.mean_interval(),
            };
        }
        arrivals
    }
}
