//! Bandwidth allocation record of the BWmap.

use crate::error::XgponError;

/// Serialized allocation length in bytes.
pub const XGTC_BW_ALLOCATION_LENGTH: u32 = 8;
/// Start time carried by every allocation of a burst except the first.
pub const START_TIME_CONTIGUOUS: u16 = 0xFFFF;

/// Upstream grant for one T-CONT.
///
/// Wire layout (MSB first): AllocId(14) | DBRu(1) | PLOAMu(1) | StartTime(16) | GrantSize(16) |
/// FWI(1) | BurstProfile(2) | HEC(13).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct XgtcBwAllocation {
    alloc_id: u16,
    dbru_flag: bool,
    ploamu_flag: bool,
    start_time: u16,
    grant_size: u16,
    fwi: bool,
    burst_profile: u8,
    hec: u16,
    create_time: u64,
}

impl XgtcBwAllocation {
    /// Creates an allocation of `grant_size` words starting at `start_time` (words from frame start).
    pub fn new(
        alloc_id: u16,
        dbru_flag: bool,
        ploamu_flag: bool,
        start_time: u16,
        grant_size: u16,
        burst_profile: u8,
    ) -> Self {
        Self {
            alloc_id: alloc_id & 0x3FFF,
            dbru_flag,
            ploamu_flag,
            start_time,
            grant_size,
            fwi: false,
            burst_profile: burst_profile & 0x3,
            hec: 0,
            create_time: 0,
        }
    }

    pub fn alloc_id(&self) -> u16 {
        self.alloc_id
    }

    /// Whether the ONU must send a buffer occupancy report in this allocation.
    pub fn dbru_flag(&self) -> bool {
        self.dbru_flag
    }

    /// Whether the ONU may send a PLOAM message in the burst header.
    pub fn ploamu_flag(&self) -> bool {
        self.ploamu_flag
    }

    pub fn start_time(&self) -> u16 {
        self.start_time
    }

    pub fn set_start_time(&mut self, start_time: u16) {
        self.start_time = start_time;
    }

    /// Whether this allocation opens a new burst.
    pub fn is_burst_start(&self) -> bool {
        self.start_time != START_TIME_CONTIGUOUS
    }

    /// Granted size in words, including the DBRu word if requested.
    pub fn grant_size(&self) -> u16 {
        self.grant_size
    }

    pub fn set_grant_size(&mut self, grant_size: u16) {
        self.grant_size = grant_size;
    }

    pub fn fwi(&self) -> bool {
        self.fwi
    }

    pub fn burst_profile(&self) -> u8 {
        self.burst_profile
    }

    /// Time the OLT created the allocation (nanoseconds, not serialized).
    pub fn create_time(&self) -> u64 {
        self.create_time
    }

    pub fn set_create_time(&mut self, time: u64) {
        self.create_time = time;
    }

    pub fn calculate_hec(&mut self) {}

    pub fn to_u64(&self) -> u64 {
        (self.alloc_id as u64) << 50
            | (self.dbru_flag as u64) << 49
            | (self.ploamu_flag as u64) << 48
            | (self.start_time as u64) << 32
            | (self.grant_size as u64) << 16
            | (self.fwi as u64) << 15
            | (self.burst_profile as u64) << 13
            | (self.hec & 0x1FFF) as u64
    }

    pub fn from_u64(v: u64) -> Self {
        Self {
            alloc_id: ((v >> 50) as u16) & 0x3FFF,
            dbru_flag: (v >> 49) & 1 == 1,
            ploamu_flag: (v >> 48) & 1 == 1,
            start_time: (v >> 32) as u16,
            grant_size: (v >> 16) as u16,
            fwi: (v >> 15) & 1 == 1,
            burst_profile: ((v >> 13) as u8) & 0x3,
            hec: (v as u16) & 0x1FFF,
            create_time: 0,
        }
    }

    pub fn serialized_size(&self) -> u32 {
        XGTC_BW_ALLOCATION_LENGTH
    }

    pub fn serialize(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_u64().to_be_bytes());
    }

    pub fn deserialize(buf: &[u8]) -> Result<Self, XgponError> {
        XgponError::check_len(buf, XGTC_BW_ALLOCATION_LENGTH as usize)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&buf[..8]);
        Ok(Self::from_u64(u64::from_be_bytes(raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packing() {
        let alloc = XgtcBwAllocation::new(0x1234, true, false, 0x00AB, 0x0100, 2);
        let v = alloc.to_u64();
        assert_eq!(v >> 50, 0x1234);
        assert_eq!((v >> 49) & 1, 1);
        assert_eq!((v >> 48) & 1, 0);
        assert_eq!((v >> 32) & 0xFFFF, 0xAB);
        assert_eq!((v >> 16) & 0xFFFF, 0x100);
        assert_eq!((v >> 13) & 0x3, 2);
        let mut buf = Vec::new();
        alloc.serialize(&mut buf);
        assert_eq!(XgtcBwAllocation::deserialize(&buf).unwrap(), alloc);
    }

    #[test]
    fn contiguous_marker() {
        let alloc = XgtcBwAllocation::new(1, false, false, START_TIME_CONTIGUOUS, 10, 0);
        assert!(!alloc.is_burst_start());
    }
}
