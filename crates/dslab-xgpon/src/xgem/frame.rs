//! XGEM frame: header plus (padded) payload.

use crate::packet::Packet;

use super::header::{XgemHeader, XGEM_HEADER_LENGTH};

/// Size of a short idle XGEM frame (4 zero bytes, no header).
pub const XGEM_SHORT_IDLE_LENGTH: u32 = 4;

/// Kind of XGEM frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XgemFrameType {
    /// Four bytes of padding, no header.
    ShortIdle,
    /// Header with the idle port id followed by zero padding.
    LongIdle,
    /// Header followed by an SDU or SDU fragment.
    WithData,
}

/// Returns the payload length after padding to the XGEM fragment granularity.
///
/// Payloads shorter than 8 bytes are padded to 8; longer ones to a multiple of 4.
pub fn padded_payload_len(len: u32) -> u32 {
    if len == 0 {
        0
    } else if len < 8 {
        8
    } else {
        (len + 3) / 4 * 4
    }
}

/// One XGEM frame.
#[derive(Clone, Debug)]
pub struct XgemFrame {
    frame_type: XgemFrameType,
    header: XgemHeader,
    payload: Option<Packet>,
}

impl XgemFrame {
    pub(crate) fn short_idle() -> Self {
        Self {
            frame_type: XgemFrameType::ShortIdle,
            header: XgemHeader::default(),
            payload: None,
        }
    }

    pub(crate) fn long_idle(header: XgemHeader) -> Self {
        Self {
            frame_type: XgemFrameType::LongIdle,
            header,
            payload: None,
        }
    }

    pub(crate) fn with_data(header: XgemHeader, payload: Packet) -> Self {
        Self {
            frame_type: XgemFrameType::WithData,
            header,
            payload: Some(payload),
        }
    }

    pub fn frame_type(&self) -> XgemFrameType {
        self.frame_type
    }

    pub fn header(&self) -> &XgemHeader {
        &self.header
    }

    /// The carried SDU fragment, `None` for idle frames.
    pub fn payload(&self) -> Option<&Packet> {
        self.payload.as_ref()
    }

    pub fn is_idle(&self) -> bool {
        self.frame_type != XgemFrameType::WithData
    }

    /// Size on the wire in bytes.
    pub fn serialized_size(&self) -> u32 {
        match self.frame_type {
            XgemFrameType::ShortIdle => XGEM_SHORT_IDLE_LENGTH,
            XgemFrameType::LongIdle => self.header.pli() as u32 + XGEM_HEADER_LENGTH,
            XgemFrameType::WithData => padded_payload_len(self.header.pli() as u32) + XGEM_HEADER_LENGTH,
        }
    }

    /// Appends the frame to `buf`. The payload bytes are zeros since SDU contents are not modelled.
    pub fn serialize(&self, buf: &mut Vec<u8>) {
        match self.frame_type {
            XgemFrameType::ShortIdle => buf.extend_from_slice(&[0u8; XGEM_SHORT_IDLE_LENGTH as usize]),
            _ => {
                let size = self.serialized_size() as usize;
                self.header.serialize(buf);
                buf.resize(buf.len() + size - XGEM_HEADER_LENGTH as usize, 0);
            }
        }
    }
}
