use std::boxed::Box;
use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dba::{default_dba_engine_resolver, DbaEngine, XgiantProp, DBA_ENGINE_NAMES};
use crate::error::XgponError;
use crate::link_info::BurstProfile;
use crate::phy::XgponPhy;
use crate::qos::{QosParameters, TcontType, DEFAULT_SERVICE_INTERVAL};
use crate::queue::{QueueMode, XgponFifoQueue, DEFAULT_MAX_BYTES, DEFAULT_MAX_PACKETS};
use crate::traffic::TrafficSource;
use crate::xgtc::START_TIME_CONTIGUOUS;

/// Largest ONU-ID usable by an ONU (1023 is the broadcast id).
pub const MAX_ONU_ID: u16 = 1022;
/// First Alloc-ID handed out to T-CONTs; lower ids are default Alloc-IDs equal to ONU-IDs.
pub const FIRST_ALLOC_ID: u16 = 1024;
pub const MAX_ALLOC_ID: u16 = 0x3FFF;
/// First XGEM Port-ID handed out to connections.
pub const FIRST_PORT_ID: u16 = 1024;
pub const MAX_PORT_ID: u16 = 0xFFFE;

fn default_seed() -> u64 {
    123
}

fn default_frames() -> u64 {
    1000
}

fn default_rtt() -> u64 {
    250_000
}

fn default_one() -> u16 {
    1
}

fn default_count() -> u32 {
    1
}

fn default_interval() -> u16 {
    DEFAULT_SERVICE_INTERVAL
}

/// Limits of every connection queue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub mode: QueueMode,
    pub max_packets: u32,
    pub max_bytes: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            mode: QueueMode::default(),
            max_packets: DEFAULT_MAX_PACKETS,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

impl QueueConfig {
    pub fn build(&self) -> XgponFifoQueue {
        XgponFifoQueue::new(self.mode, self.max_packets, self.max_bytes)
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct RawTcontConfig {
    pub tcont_type: TcontType,
    /// Fixed, assured, non-assured or best effort rate depending on the type, bit/s.
    #[serde(default)]
    pub rate: u64,
    #[serde(default = "default_interval")]
    pub min_interval: u16,
    #[serde(default = "default_interval")]
    pub max_interval: u16,
    #[serde(default = "default_one")]
    pub connections: u16,
    /// Traffic offered to each connection of the T-CONT.
    #[serde(default)]
    pub traffic: Option<TrafficSource>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct RawOnuConfig {
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub tconts: Vec<RawTcontConfig>,
}

/// YAML-serializable config
#[derive(Clone, Serialize, Deserialize)]
pub struct RawConfig {
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_frames")]
    pub frames: u64,
    /// Logical round trip time, ns.
    #[serde(default = "default_rtt")]
    pub rtt: u64,
    #[serde(default)]
    pub dba: String,
    /// Lower bound of service intervals used by the DBA, frames.
    #[serde(default = "default_one")]
    pub minimum_si: u16,
    #[serde(default)]
    pub phy: XgponPhy,
    #[serde(default)]
    pub profile: BurstProfile,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub onus: Vec<RawOnuConfig>,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            frames: default_frames(),
            rtt: default_rtt(),
            dba: String::new(),
            minimum_si: 1,
            phy: XgponPhy::default(),
            profile: BurstProfile::default(),
            queue: QueueConfig::default(),
            onus: Vec::new(),
        }
    }
}

type DbaEngineResolver = dyn Fn(&str, u16) -> Option<Box<dyn DbaEngine>> + Send + Sync;

pub struct ConfigParamResolvers {
    pub dba_engine_resolver: Box<DbaEngineResolver>,
}

impl Default for ConfigParamResolvers {
    fn default() -> Self {
        Self {
            dba_engine_resolver: Box::new(default_dba_engine_resolver),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TcontConfig {
    pub qos: QosParameters,
    pub connections: u16,
    pub traffic: Option<TrafficSource>,
}

#[derive(Clone, Debug, Default)]
pub struct OnuConfig {
    pub tconts: Vec<TcontConfig>,
}

/// This is simulation config. It implements Default trait (see below) so that you can create
/// default config and change only the fields you need.
///
/// ONU `i` (0-based) gets ONU-ID `i + 1`. Alloc-IDs and Port-IDs are numbered consecutively from
/// [`FIRST_ALLOC_ID`] and [`FIRST_PORT_ID`] in ONU order.
pub struct Config {
    pub seed: u64,
    pub frames: u64,
    pub rtt: u64,
    pub dba: Box<dyn DbaEngine>,
    pub phy: XgponPhy,
    pub profile: BurstProfile,
    pub queue: QueueConfig,
    pub onus: Vec<OnuConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            frames: default_frames(),
            rtt: default_rtt(),
            dba: Box::new(XgiantProp::new(1)),
            phy: XgponPhy::default(),
            profile: BurstProfile::default(),
            queue: QueueConfig::default(),
            onus: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_raw(raw: RawConfig, resolvers: ConfigParamResolvers) -> Result<Self, XgponError> {
        let mut me: Self = Default::default();
        if raw.minimum_si == 0 {
            return Err(XgponError::InvalidConfig("minimum_si must be at least 1".to_string()));
        }
        me.dba = if raw.dba.is_empty() {
            Box::new(XgiantProp::new(raw.minimum_si))
        } else {
            (resolvers.dba_engine_resolver)(&raw.dba, raw.minimum_si).ok_or_else(|| {
                XgponError::InvalidConfig(format!(
                    "unknown DBA engine {:?}, expected one of {:?}",
                    raw.dba, DBA_ENGINE_NAMES
                ))
            })?
        };
        me.seed = raw.seed;
        me.frames = raw.frames;
        me.rtt = raw.rtt;
        me.phy = raw.phy;
        me.profile = raw.profile;
        me.queue = raw.queue;
        for onu in raw.onus {
            let mut tconts = Vec::with_capacity(onu.tconts.len());
            for t in onu.tconts {
                let qos = QosParameters::new(t.tcont_type)
                    .with_rate(t.rate)
                    .with_intervals(t.min_interval, t.max_interval);
                tconts.push(TcontConfig {
                    qos,
                    connections: t.connections,
                    traffic: t.traffic,
                });
            }
            for _ in 0..onu.count {
                me.onus.push(OnuConfig { tconts: tconts.clone() });
            }
        }
        me.validate()?;
        Ok(me)
    }

    pub fn from_yaml(path: &Path, resolvers: ConfigParamResolvers) -> Result<Self, XgponError> {
        let f = File::open(path)?;
        Self::from_raw(serde_yaml::from_reader(f)?, resolvers)
    }

    /// Checks that the parameters describe a schedulable PON.
    pub fn validate(&self) -> Result<(), XgponError> {
        let invalid = |msg: String| Err(XgponError::InvalidConfig(msg));
        let phy = &self.phy;
        if phy.frame_slot_size == 0 || phy.us_link_rate == 0 {
            return invalid("upstream link rate and frame slot must be positive".to_string());
        }
        if phy.us_frame_size_in_words() < 2 * crate::dba::engine::FRAME_TAIL_RESERVE {
            return invalid(format!(
                "upstream frame of {} words is too short",
                phy.us_frame_size_in_words()
            ));
        }
        if phy.us_frame_size_in_words() >= START_TIME_CONTIGUOUS as u32 {
            return invalid(format!(
                "upstream frame of {} words does not fit BWmap start times",
                phy.us_frame_size_in_words()
            ));
        }
        if self.rtt < 2 * phy.frame_slot_size {
            return invalid(format!(
                "rtt {} ns is shorter than two frame slots of {} ns",
                self.rtt, phy.frame_slot_size
            ));
        }
        if phy.us_fec_block_data_size == 0
            || phy.us_fec_block_data_size % 4 != 0
            || phy.us_fec_block_size % 4 != 0
            || phy.us_fec_block_data_size >= phy.us_fec_block_size
        {
            return invalid(format!(
                "FEC block of {} bytes with {} data bytes is not usable",
                phy.us_fec_block_size, phy.us_fec_block_data_size
            ));
        }
        if self.profile.sync_words() == 0 {
            return invalid("preamble and delimiter must take at least one word".to_string());
        }
        if self.onus.len() > MAX_ONU_ID as usize {
            return invalid(format!("{} ONUs, at most {} are addressable", self.onus.len(), MAX_ONU_ID));
        }
        let mut tconts = 0usize;
        let mut ports = 0usize;
        for onu in &self.onus {
            for t in &onu.tconts {
                tconts += 1;
                ports += t.connections as usize;
                if t.connections == 0 {
                    return invalid("every T-CONT needs at least one connection".to_string());
                }
                if t.qos.min_interval == 0 || t.qos.max_interval == 0 {
                    return invalid("service intervals must be positive".to_string());
                }
                if let Some(traffic) = &t.traffic {
                    traffic.validate()?;
                }
            }
        }
        if tconts > (MAX_ALLOC_ID - FIRST_ALLOC_ID + 1) as usize {
            return invalid(format!("{} T-CONTs do not fit the Alloc-ID space", tconts));
        }
        if ports > (MAX_PORT_ID - FIRST_PORT_ID + 1) as usize {
            return invalid(format!("{} connections do not fit the Port-ID space", ports));
        }
        Ok(())
    }
}
