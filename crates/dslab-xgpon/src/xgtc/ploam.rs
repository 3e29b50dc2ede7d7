//! PLOAM message envelope (48 bytes).

use crate::error::XgponError;

/// Serialized PLOAM length in bytes.
pub const XGTC_PLOAM_LENGTH: u32 = 48;
/// Length of the message-specific content.
pub const PLOAM_CONTENT_LENGTH: usize = 36;
/// Length of the message integrity check.
pub const PLOAM_MIC_LENGTH: usize = 8;

/// A PLOAM message. Content semantics are opaque here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XgtcPloam {
    onu_id: u16,
    msg_type: u8,
    seq_no: u8,
    content: [u8; PLOAM_CONTENT_LENGTH],
    mic: [u8; PLOAM_MIC_LENGTH],
}

impl Default for XgtcPloam {
    fn default() -> Self {
        Self {
            onu_id: 0,
            msg_type: 0,
            seq_no: 0,
            content: [0; PLOAM_CONTENT_LENGTH],
            mic: [0; PLOAM_MIC_LENGTH],
        }
    }
}

impl XgtcPloam {
    pub fn new(onu_id: u16, msg_type: u8, seq_no: u8) -> Self {
        let mut ploam = Self::default();
        ploam.set_onu_id(onu_id);
        ploam.msg_type = msg_type;
        ploam.seq_no = seq_no;
        ploam
    }

    pub fn onu_id(&self) -> u16 {
        self.onu_id
    }

    /// Sets the ONU id; only 10 bits are kept.
    pub fn set_onu_id(&mut self, onu_id: u16) {
        self.onu_id = onu_id & 0x03FF;
    }

    pub fn msg_type(&self) -> u8 {
        self.msg_type
    }

    pub fn seq_no(&self) -> u8 {
        self.seq_no
    }

    pub fn content(&self) -> &[u8; PLOAM_CONTENT_LENGTH] {
        &self.content
    }

    pub fn content_mut(&mut self) -> &mut [u8; PLOAM_CONTENT_LENGTH] {
        &mut self.content
    }

    /// MIC is not computed.
    pub fn calculate_mic(&mut self) {}

    /// MIC verification always succeeds.
    pub fn verify_mic(&self) -> bool {
        true
    }

    pub fn serialized_size(&self) -> u32 {
        XGTC_PLOAM_LENGTH
    }

    pub fn serialize(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.onu_id.to_be_bytes());
        buf.push(self.msg_type);
        buf.push(self.seq_no);
        buf.extend_from_slice(&self.content);
        buf.extend_from_slice(&self.mic);
    }

    pub fn deserialize(buf: &[u8]) -> Result<Self, XgponError> {
        XgponError::check_len(buf, XGTC_PLOAM_LENGTH as usize)?;
        let mut ploam = Self::default();
        ploam.set_onu_id(u16::from_be_bytes([buf[0], buf[1]]));
        ploam.msg_type = buf[2];
        ploam.seq_no = buf[3];
        ploam.content.copy_from_slice(&buf[4..4 + PLOAM_CONTENT_LENGTH]);
        ploam.mic.copy_from_slice(&buf[40..48]);
        Ok(ploam)
    }
}
