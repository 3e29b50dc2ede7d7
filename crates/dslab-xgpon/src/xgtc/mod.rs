//! XGTC (XG-PON transmission convergence) layer codecs.

pub mod bw_allocation;
pub mod bwmap;
pub mod dbru;
pub mod ploam;
pub mod us_burst;
pub mod us_header;

pub use bw_allocation::{XgtcBwAllocation, START_TIME_CONTIGUOUS, XGTC_BW_ALLOCATION_LENGTH};
pub use bwmap::XgtcBwmap;
pub use dbru::{XgtcDbru, XGTC_DBRU_LENGTH};
pub use ploam::{XgtcPloam, XGTC_PLOAM_LENGTH};
pub use us_burst::{XgtcUsAllocation, XgtcUsBurst, XGTC_US_TRAILER_LENGTH};
pub use us_header::{XgtcUsHeader, XGTC_US_HEADER_BASE_LENGTH};
