//! Dynamic bandwidth report upstream (buffer occupancy report).

use crate::error::XgponError;

/// Serialized DBRu length in bytes (one word).
pub const XGTC_DBRU_LENGTH: u32 = 4;

/// Buffer occupancy report of one T-CONT, in words.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct XgtcDbru {
    buf_occ: u32,
    crc: u8,
    create_time: u64,
    receive_time: u64,
}

impl XgtcDbru {
    pub fn new(buf_occ: u32, create_time: u64) -> Self {
        let mut dbru = Self {
            create_time,
            ..Default::default()
        };
        dbru.set_buf_occ(buf_occ);
        dbru.calculate_crc();
        dbru
    }

    /// Reported occupancy in words. Only 24 bits are carried.
    pub fn buf_occ(&self) -> u32 {
        self.buf_occ
    }

    pub fn set_buf_occ(&mut self, buf_occ: u32) {
        self.buf_occ = buf_occ.min(0xFF_FFFF);
    }

    /// CRC is not computed.
    pub fn calculate_crc(&mut self) {}

    pub fn verify_crc(&self) -> bool {
        true
    }

    /// Time the ONU produced the report (not serialized).
    pub fn create_time(&self) -> u64 {
        self.create_time
    }

    /// Time the OLT received the report (not serialized).
    pub fn receive_time(&self) -> u64 {
        self.receive_time
    }

    pub fn set_receive_time(&mut self, time: u64) {
        self.receive_time = time;
    }

    pub fn serialized_size(&self) -> u32 {
        XGTC_DBRU_LENGTH
    }

    pub fn serialize(&self, buf: &mut Vec<u8>) {
        let v = self.buf_occ << 8 | self.crc as u32;
        buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn deserialize(buf: &[u8]) -> Result<Self, XgponError> {
        XgponError::check_len(buf, XGTC_DBRU_LENGTH as usize)?;
        let v = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        Ok(Self {
            buf_occ: v >> 8,
            crc: v as u8,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupancy_saturates_at_24_bits() {
        let dbru = XgtcDbru::new(0x1FF_FFFF, 10);
        assert_eq!(dbru.buf_occ(), 0xFF_FFFF);
        let mut buf = Vec::new();
        dbru.serialize(&mut buf);
        assert_eq!(buf, vec![0xFF, 0xFF, 0xFF, 0x00]);
        assert_eq!(XgtcDbru::deserialize(&buf).unwrap().buf_occ(), 0xFF_FFFF);
    }
}
