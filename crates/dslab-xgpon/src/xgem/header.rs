//! XGEM frame header (8 bytes).

use crate::error::XgponError;

/// Serialized length of the XGEM header in bytes.
pub const XGEM_HEADER_LENGTH: u32 = 8;

const PLI_MASK: u16 = 0x3FFF;
const KEY_INDEX_MASK: u8 = 0x03;
const OPTIONS_MASK: u32 = 0x3_FFFF;
const HEC_MASK: u16 = 0x1FFF;

/// XGEM header fields.
///
/// Bit layout (MSB first): PLI(14) | KeyIndex(2) | PortId(16) | Options(18) | LF(1) | HEC(13).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct XgemHeader {
    pli: u16,
    key_index: u8,
    port_id: u16,
    options: u32,
    last_fragment: bool,
    hec: u16,
}

impl Default for XgemHeader {
    fn default() -> Self {
        Self {
            pli: 0,
            key_index: 0,
            port_id: 0,
            options: 0,
            last_fragment: true,
            hec: 0,
        }
    }
}

impl XgemHeader {
    /// Creates a header carrying `pli` payload bytes for `port_id`.
    pub fn new(pli: u16, key_index: u8, port_id: u16, last_fragment: bool) -> Self {
        let mut header = Self::default();
        header.set_pli(pli);
        header.set_key_index(key_index);
        header.set_port_id(port_id);
        header.set_last_fragment(last_fragment);
        header.calculate_hec();
        header
    }

    /// Payload length indication in bytes (unpadded).
    pub fn pli(&self) -> u16 {
        self.pli
    }

    /// Sets the payload length; only the lower 14 bits are kept.
    pub fn set_pli(&mut self, pli: u16) {
        self.pli = pli & PLI_MASK;
    }

    pub fn key_index(&self) -> u8 {
        self.key_index
    }

    pub fn set_key_index(&mut self, key_index: u8) {
        self.key_index = key_index & KEY_INDEX_MASK;
    }

    pub fn port_id(&self) -> u16 {
        self.port_id
    }

    pub fn set_port_id(&mut self, port_id: u16) {
        self.port_id = port_id;
    }

    pub fn options(&self) -> u32 {
        self.options
    }

    pub fn set_options(&mut self, options: u32) {
        self.options = options & OPTIONS_MASK;
    }

    /// Whether this frame carries the last (or only) fragment of an SDU.
    pub fn last_fragment(&self) -> bool {
        self.last_fragment
    }

    pub fn set_last_fragment(&mut self, last_fragment: bool) {
        self.last_fragment = last_fragment;
    }

    pub fn hec(&self) -> u16 {
        self.hec
    }

    /// HEC is not computed; the field stays as set.
    pub fn calculate_hec(&mut self) {}

    /// HEC verification always succeeds.
    pub fn verify_hec(&self) -> bool {
        true
    }

    /// Packs the header into its 64-bit wire representation.
    pub fn to_u64(&self) -> u64 {
        (self.pli as u64) << 50
            | (self.key_index as u64) << 48
            | (self.port_id as u64) << 32
            | (self.options as u64) << 14
            | (self.last_fragment as u64) << 13
            | (self.hec & HEC_MASK) as u64
    }

    /// Unpacks a header from its 64-bit wire representation.
    pub fn from_u64(v: u64) -> Self {
        Self {
            pli: ((v >> 50) as u16) & PLI_MASK,
            key_index: ((v >> 48) as u8) & KEY_INDEX_MASK,
            port_id: (v >> 32) as u16,
            options: ((v >> 14) as u32) & OPTIONS_MASK,
            last_fragment: (v >> 13) & 1 == 1,
            hec: (v as u16) & HEC_MASK,
        }
    }

    pub fn serialized_size(&self) -> u32 {
        XGEM_HEADER_LENGTH
    }

    /// Appends the 8 header bytes to `buf`.
    pub fn serialize(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_u64().to_be_bytes());
    }

    /// Reads a header from the first 8 bytes of `buf`.
    pub fn deserialize(buf: &[u8]) -> Result<Self, XgponError> {
        XgponError::check_len(buf, XGEM_HEADER_LENGTH as usize)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&buf[..8]);
        Ok(Self::from_u64(u64::from_be_bytes(raw)))
    }
}
