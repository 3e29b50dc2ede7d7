//! Physical layer parameters that matter for upstream scheduling.

use serde::{Deserialize, Serialize};

/// XG-PON1 upstream line rate in bytes per second (2.48832 Gbit/s).
pub const XGPON1_US_LINE_RATE: u64 = 311_040_000;
/// Duration of one frame in nanoseconds.
pub const XGPON1_FRAME_SLOT_SIZE: u64 = 125_000;
/// Minimum guard time between upstream bursts in words.
pub const XGPON1_MINIMUM_GUARD_TIME: u32 = 2;
/// FEC codeword size in bytes.
pub const XGPON1_FEC_BLOCK_SIZE: u32 = 248;
/// Data bytes carried by one upstream FEC codeword.
pub const XGPON1_US_FEC_DATA_SIZE: u32 = 232;

/// Upstream PHY parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XgponPhy {
    /// Upstream link rate, bytes per second.
    pub us_link_rate: u64,
    /// Frame duration, nanoseconds.
    pub frame_slot_size: u64,
    /// Guard time between consecutive bursts, words.
    pub us_guard_time: u32,
    /// FEC codeword size, bytes.
    pub us_fec_block_size: u32,
    /// FEC codeword data part, bytes.
    pub us_fec_block_data_size: u32,
}

impl Default for XgponPhy {
    fn default() -> Self {
        Self {
            us_link_rate: XGPON1_US_LINE_RATE,
            frame_slot_size: XGPON1_FRAME_SLOT_SIZE,
            us_guard_time: XGPON1_MINIMUM_GUARD_TIME,
            us_fec_block_size: XGPON1_FEC_BLOCK_SIZE,
            us_fec_block_data_size: XGPON1_US_FEC_DATA_SIZE,
        }
    }
}

impl XgponPhy {
    /// Size of one upstream frame in words.
    pub fn us_frame_size_in_words(&self) -> u32 {
        (self.us_link_rate as u128 * self.frame_slot_size as u128 / 1_000_000_000 / 4).min(u32::MAX as u128) as u32
    }

    /// Time needed to transmit `words` on the upstream link, nanoseconds.
    pub fn words_to_nanos(&self, words: u64) -> u64 {
        words * 4 * 1_000_000_000 / self.us_link_rate
    }

    /// Number of whole words transmitted in `nanos` nanoseconds.
    pub fn nanos_to_words(&self, nanos: u64) -> u64 {
        nanos * self.us_link_rate / (4 * 1_000_000_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xgpon1_frame() {
        let phy = XgponPhy::default();
        assert_eq!(phy.us_frame_size_in_words(), 9720);
        assert_eq!(phy.nanos_to_words(phy.frame_slot_size), 9720);
    }
}
