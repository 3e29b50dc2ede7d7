//! XGTC upstream burst header.

use crate::error::XgponError;

use super::ploam::{XgtcPloam, XGTC_PLOAM_LENGTH};

/// Length of the header without a PLOAM message.
pub const XGTC_US_HEADER_BASE_LENGTH: u32 = 4;

const PLOAM_QUEUE_FLAG: u16 = 0x100;
const DYING_GASP_FLAG: u16 = 0x001;
const IND_MASK: u16 = 0x1FF;
const HEC_MASK: u32 = 0x1FFF;

/// Upstream burst header: ONU id (10 bits), Ind (9 bits), HEC (13 bits), optionally followed by a PLOAM.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct XgtcUsHeader {
    onu_id: u16,
    ind: u16,
    hec: u16,
    ploam: Option<XgtcPloam>,
}

impl XgtcUsHeader {
    pub fn onu_id(&self) -> u16 {
        self.onu_id
    }

    pub fn set_onu_id(&mut self, onu_id: u16) {
        self.onu_id = onu_id & 0x03FF;
    }

    pub fn ind(&self) -> u16 {
        self.ind
    }

    /// Whether more PLOAM messages are waiting at the ONU.
    pub fn ploam_queue_status(&self) -> bool {
        self.ind & PLOAM_QUEUE_FLAG != 0
    }

    pub fn set_ploam_queue_status(&mut self, waiting: bool) {
        if waiting {
            self.ind |= PLOAM_QUEUE_FLAG;
        } else {
            self.ind &= !PLOAM_QUEUE_FLAG;
        }
    }

    pub fn dying_gasp(&self) -> bool {
        self.ind & DYING_GASP_FLAG != 0
    }

    pub fn set_dying_gasp(&mut self, dying_gasp: bool) {
        if dying_gasp {
            self.ind |= DYING_GASP_FLAG;
        } else {
            self.ind &= !DYING_GASP_FLAG;
        }
    }

    pub fn ploam(&self) -> Option<&XgtcPloam> {
        self.ploam.as_ref()
    }

    pub fn set_ploam(&mut self, ploam: XgtcPloam) {
        self.ploam = Some(ploam);
    }

    /// HEC is not computed.
    pub fn calculate_hec(&mut self) {}

    pub fn verify_hec(&self) -> bool {
        true
    }

    fn to_u32(&self) -> u32 {
        (self.onu_id as u32) << 22 | ((self.ind & IND_MASK) as u32) << 13 | (self.hec as u32 & HEC_MASK)
    }

    pub fn serialized_size(&self) -> u32 {
        match self.ploam {
            Some(_) => XGTC_US_HEADER_BASE_LENGTH + XGTC_PLOAM_LENGTH,
            None => XGTC_US_HEADER_BASE_LENGTH,
        }
    }

    pub fn serialize(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_u32().to_be_bytes());
        if let Some(ploam) = &self.ploam {
            ploam.serialize(buf);
        }
    }

    /// Reads a header. Whether a PLOAM follows is known from the bandwidth allocation (PLOAMu flag).
    pub fn deserialize(buf: &[u8], with_ploam: bool) -> Result<Self, XgponError> {
        XgponError::check_len(buf, XGTC_US_HEADER_BASE_LENGTH as usize)?;
        let v = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let ploam = if with_ploam {
            Some(XgtcPloam::deserialize(&buf[XGTC_US_HEADER_BASE_LENGTH as usize..])?)
        } else {
            None
        };
        Ok(Self {
            onu_id: (v >> 22) as u16,
            ind: ((v >> 13) as u16) & IND_MASK,
            hec: (v & HEC_MASK) as u16,
            ploam,
        })
    }
}
