//! Upstream XGTC burst: header, per-T-CONT allocations and trailer.

use crate::xgem::XgemFrame;

use super::dbru::XgtcDbru;
use super::us_header::XgtcUsHeader;

/// Length of the burst trailer (BIP) in bytes.
pub const XGTC_US_TRAILER_LENGTH: u32 = 4;

/// The part of a burst belonging to one allocation: an optional DBRu followed by XGEM frames.
#[derive(Clone, Debug, Default)]
pub struct XgtcUsAllocation {
    alloc_id: u16,
    dbru: Option<XgtcDbru>,
    frames: Vec<XgemFrame>,
}

impl XgtcUsAllocation {
    pub fn new(alloc_id: u16) -> Self {
        Self {
            alloc_id,
            dbru: None,
            frames: Vec::new(),
        }
    }

    pub fn alloc_id(&self) -> u16 {
        self.alloc_id
    }

    pub fn dbru(&self) -> Option<&XgtcDbru> {
        self.dbru.as_ref()
    }

    pub fn dbru_mut(&mut self) -> Option<&mut XgtcDbru> {
        self.dbru.as_mut()
    }

    pub fn set_dbru(&mut self, dbru: XgtcDbru) {
        self.dbru = Some(dbru);
    }

    pub fn frames(&self) -> &[XgemFrame] {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut Vec<XgemFrame> {
        &mut self.frames
    }

    pub fn serialized_size(&self) -> u32 {
        let frames: u32 = self.frames.iter().map(|f| f.serialized_size()).sum();
        frames + self.dbru.as_ref().map_or(0, |d| d.serialized_size())
    }

    pub fn serialize(&self, buf: &mut Vec<u8>) {
        if let Some(dbru) = &self.dbru {
            dbru.serialize(buf);
        }
        for frame in &self.frames {
            frame.serialize(buf);
        }
    }
}

/// One ONU upstream burst.
#[derive(Clone, Debug, Default)]
pub struct XgtcUsBurst {
    header: XgtcUsHeader,
    allocations: Vec<XgtcUsAllocation>,
    trailer: u32,
}

impl XgtcUsBurst {
    pub fn header(&self) -> &XgtcUsHeader {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut XgtcUsHeader {
        &mut self.header
    }

    pub fn add_us_allocation(&mut self, allocation: XgtcUsAllocation) {
        self.allocations.push(allocation);
    }

    pub fn allocations(&self) -> &[XgtcUsAllocation] {
        &self.allocations
    }

    pub fn allocations_mut(&mut self) -> &mut [XgtcUsAllocation] {
        &mut self.allocations
    }

    /// BIP is not computed.
    pub fn calculate_trailer(&mut self) {
        self.trailer = 0;
    }

    pub fn trailer(&self) -> u32 {
        self.trailer
    }

    /// Burst size in bytes, excluding the PHY preamble and delimiter.
    pub fn serialized_size(&self) -> u32 {
        let allocations: u32 = self.allocations.iter().map(|a| a.serialized_size()).sum();
        self.header.serialized_size() + allocations + XGTC_US_TRAILER_LENGTH
    }

    pub fn serialize(&self, buf: &mut Vec<u8>) {
        self.header.serialize(buf);
        for allocation in &self.allocations {
            allocation.serialize(buf);
        }
        buf.extend_from_slice(&self.trailer.to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xgem::{create_idle_xgem_frame, create_short_idle_xgem_frame};
    use crate::xgtc::ploam::XgtcPloam;

    #[test]
    fn sizes_add_up() {
        let mut burst = XgtcUsBurst::default();
        burst.header_mut().set_onu_id(3);

        let mut first = XgtcUsAllocation::new(1024);
        first.set_dbru(XgtcDbru::new(10, 0));
        first.frames_mut().push(create_idle_xgem_frame(36));
        first.frames_mut().push(create_short_idle_xgem_frame());
        assert_eq!(first.serialized_size(), 44);
        burst.add_us_allocation(first);

        let mut second = XgtcUsAllocation::new(1025);
        second.frames_mut().push(create_idle_xgem_frame(8));
        burst.add_us_allocation(second);
        burst.calculate_trailer();

        assert_eq!(burst.serialized_size(), 4 + 44 + 8 + 4);
        let mut buf = Vec::new();
        burst.serialize(&mut buf);
        assert_eq!(buf.len() as u32, burst.serialized_size());

        burst.header_mut().set_ploam(XgtcPloam::new(3, 1, 0));
        assert_eq!(burst.serialized_size(), 52 + 44 + 8 + 4);
    }
}
