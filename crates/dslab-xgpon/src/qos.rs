//! Service level parameters of T-CONTs.

use serde::{Deserialize, Serialize};

/// Default service interval bound, in frames.
pub const DEFAULT_SERVICE_INTERVAL: u16 = 100;

/// T-CONT traffic class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TcontType {
    /// Fixed bandwidth.
    T1,
    /// Assured bandwidth.
    T2,
    /// Non-assured bandwidth (guaranteed plus surplus).
    T3,
    /// Best effort.
    T4,
}

/// QoS parameters of one T-CONT. Rates are in bit/s, intervals in frames.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QosParameters {
    pub tcont_type: TcontType,
    #[serde(default)]
    pub fixed_bw: u64,
    #[serde(default)]
    pub assured_bw: u64,
    #[serde(default)]
    pub non_assured_bw: u64,
    #[serde(default)]
    pub best_effort_bw: u64,
    #[serde(default = "default_interval")]
    pub max_interval: u16,
    #[serde(default = "default_interval")]
    pub min_interval: u16,
}

fn default_interval() -> u16 {
    DEFAULT_SERVICE_INTERVAL
}

impl QosParameters {
    /// Parameters of the given class with all rates zero and default intervals.
    pub fn new(tcont_type: TcontType) -> Self {
        Self {
            tcont_type,
            fixed_bw: 0,
            assured_bw: 0,
            non_assured_bw: 0,
            best_effort_bw: 0,
            max_interval: DEFAULT_SERVICE_INTERVAL,
            min_interval: DEFAULT_SERVICE_INTERVAL,
        }
    }

    pub fn with_intervals(mut self, min_interval: u16, max_interval: u16) -> Self {
        self.min_interval = min_interval;
        self.max_interval = max_interval;
        self
    }

    /// Sets the rate that applies to the class of these parameters.
    pub fn with_rate(mut self, rate: u64) -> Self {
        match self.tcont_type {
            TcontType::T1 => self.fixed_bw = rate,
            TcontType::T2 => self.assured_bw = rate,
            TcontType::T3 => self.non_assured_bw = rate,
            TcontType::T4 => self.best_effort_bw = rate,
        }
        self
    }
}
