//! Per-ONU link state shared by OLT and ONU: burst profiles, PLOAM queue, dying gasp.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::xgtc::XgtcPloam;

/// Default preamble length in bytes.
pub const PSBU_PREAMBLE_DEFAULT_LEN: u8 = 20;
/// Default delimiter length in bytes.
pub const PSBU_DELIMITER_DEFAULT_LEN: u8 = 4;

/// Upstream burst profile: PHY synchronisation overhead and FEC.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BurstProfile {
    /// Preamble length, bytes.
    pub preamble_len: u8,
    /// Delimiter length, bytes.
    pub delimiter_len: u8,
    pub fec: bool,
}

impl Default for BurstProfile {
    fn default() -> Self {
        Self {
            preamble_len: PSBU_PREAMBLE_DEFAULT_LEN,
            delimiter_len: PSBU_DELIMITER_DEFAULT_LEN,
            fec: false,
        }
    }
}

impl BurstProfile {
    /// Preamble plus delimiter, in words.
    pub fn sync_words(&self) -> u32 {
        (self.preamble_len as u32 + self.delimiter_len as u32) / 4
    }
}

/// Link information of one ONU.
pub struct XgponLinkInfo {
    onu_id: u16,
    profiles: Vec<BurstProfile>,
    current_profile: usize,
    equalize_delay: u64,
    dying_gasp: bool,
    ploam_queue: VecDeque<XgtcPloam>,
    ploam_exist_at_onu: bool,
}

impl XgponLinkInfo {
    pub fn new(onu_id: u16, profile: BurstProfile) -> Self {
        Self {
            onu_id,
            profiles: vec![profile],
            current_profile: 0,
            equalize_delay: 0,
            dying_gasp: false,
            ploam_queue: VecDeque::new(),
            ploam_exist_at_onu: false,
        }
    }

    pub fn onu_id(&self) -> u16 {
        self.onu_id
    }

    /// Adds a profile and returns its index.
    pub fn add_profile(&mut self, profile: BurstProfile) -> u8 {
        assert!(self.profiles.len() < 4, "At most 4 burst profiles are addressable");
        self.profiles.push(profile);
        (self.profiles.len() - 1) as u8
    }

    pub fn profile(&self, index: u8) -> Option<&BurstProfile> {
        self.profiles.get(index as usize)
    }

    pub fn current_profile(&self) -> &BurstProfile {
        &self.profiles[self.current_profile]
    }

    pub fn current_profile_index(&self) -> u8 {
        self.current_profile as u8
    }

    pub fn set_current_profile_index(&mut self, index: u8) {
        assert!((index as usize) < self.profiles.len(), "Unknown burst profile {}", index);
        self.current_profile = index as usize;
    }

    /// Equalization delay, nanoseconds.
    pub fn equalize_delay(&self) -> u64 {
        self.equalize_delay
    }

    pub fn set_equalize_delay(&mut self, delay: u64) {
        self.equalize_delay = delay;
    }

    pub fn dying_gasp(&self) -> bool {
        self.dying_gasp
    }

    pub fn set_dying_gasp(&mut self, state: bool) {
        self.dying_gasp = state;
    }

    /// Queues a PLOAM message at the ONU side.
    pub fn push_ploam(&mut self, ploam: XgtcPloam) {
        self.ploam_queue.push_back(ploam);
    }

    /// ONU side: whether a PLOAM message waits for transmission.
    pub fn has_ploam_to_transmit(&self) -> bool {
        !self.ploam_queue.is_empty()
    }

    pub fn ploam_to_transmit(&mut self) -> Option<XgtcPloam> {
        self.ploam_queue.pop_front()
    }

    /// OLT side: whether the ONU announced waiting PLOAM messages in its last burst header.
    pub fn ploam_exist_at_onu(&self) -> bool {
        self.ploam_exist_at_onu
    }

    pub fn set_ploam_exist_at_onu(&mut self, state: bool) {
        self.ploam_exist_at_onu = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ploam_queue() {
        let mut link = XgponLinkInfo::new(1, BurstProfile::default());
        assert!(!link.has_ploam_to_transmit());
        link.push_ploam(XgtcPloam::new(1, 2, 0));
        assert!(link.has_ploam_to_transmit());
        assert_eq!(link.ploam_to_transmit().unwrap().msg_type(), 2);
        assert!(link.ploam_to_transmit().is_none());
    }

    #[test]
    fn profiles() {
        let mut link = XgponLinkInfo::new(1, BurstProfile::default());
        assert_eq!(link.current_profile().sync_words(), 6);
        let idx = link.add_profile(BurstProfile {
            fec: true,
            ..Default::default()
        });
        link.set_current_profile_index(idx);
        assert!(link.current_profile().fec);
    }
}
