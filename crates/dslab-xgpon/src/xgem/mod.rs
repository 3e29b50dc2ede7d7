//! XGEM (XG-PON encapsulation method) framing.

pub mod frame;
pub mod header;
pub mod routines;

pub use frame::{padded_payload_len, XgemFrame, XgemFrameType, XGEM_SHORT_IDLE_LENGTH};
pub use header::{XgemHeader, XGEM_HEADER_LENGTH};
pub use routines::{
    create_idle_xgem_frame, create_short_idle_xgem_frame, generate_xgem_frame, IDLE_PORT_ID, XGEM_FRAME_MAXLEN,
};
