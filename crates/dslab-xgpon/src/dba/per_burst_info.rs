//! Accumulator for one upstream burst being built by the OLT DBA.

use std::cell::RefCell;
use std::rc::Rc;

use crate::link_info::BurstProfile;
use crate::tcont::XgponTcontOlt;
use crate::xgtc::{XgtcBwAllocation, XgtcBwmap};

/// Maximum number of allocations in one burst.
pub const MAX_TCONT_PER_BURST: usize = 16;
/// XGTC burst header and trailer, words.
pub const HEADER_TRAILER_IN_WORDS: u32 = 2;
/// PLOAM message carried in the burst header, words.
pub const PLOAM_IN_WORDS: u32 = 12;

/// Shared handle to an OLT-side T-CONT.
pub type TcontOltRef = Rc<RefCell<XgponTcontOlt>>;

/// Size of a burst body of `data` words after FEC encoding with the given block sizes (words).
///
/// Full data blocks map to full codewords; a trailing partial block is shortened and still carries
/// the full parity overhead.
pub fn fec_coded_size(data: u32, data_block: u32, fec_block: u32) -> u32 {
    let rem = data % data_block;
    let tail = if rem > 0 { rem + (fec_block - data_block) } else { 0 };
    (data / data_block) * fec_block + tail
}

/// Largest body (words) whose FEC-encoded size does not exceed `coded` words.
pub fn max_data_for_coded_size(coded: u32, data_block: u32, fec_block: u32) -> u32 {
    let parity = fec_block - data_block;
    let rem = coded % fec_block;
    let tail = if rem > parity { rem - parity } else { 0 };
    (coded / fec_block) * data_block + tail
}

/// One burst of one ONU under construction.
///
/// The final size is the header/trailer/data words (FEC-padded if the profile enables FEC) plus the
/// gap overhead: guard time, preamble and delimiter.
#[derive(Default)]
pub struct OltDbaPerBurstInfo {
    onu_id: u16,
    initialized: bool,
    ploam: bool,
    profile_index: u8,
    gap: u32,
    fec: bool,
    data_block_size: u32,
    fec_block_size: u32,
    header_trailer_data_size: u32,
    final_burst_size: u32,
    allocations: Vec<XgtcBwAllocation>,
    tconts: Vec<TcontOltRef>,
}

impl OltDbaPerBurstInfo {
    /// Creates an uninitialized burst owned by `onu_id`.
    pub fn new(onu_id: u16) -> Self {
        Self {
            onu_id,
            ..Default::default()
        }
    }

    /// Returns a reused burst to the uninitialized state for `onu_id`.
    pub fn reset(&mut self, onu_id: u16) {
        self.onu_id = onu_id;
        self.initialized = false;
        self.ploam = false;
        self.header_trailer_data_size = 0;
        self.final_burst_size = 0;
        self.allocations.clear();
        self.tconts.clear();
    }

    /// Sets the per-burst parameters and clears any previous content.
    ///
    /// `guard_time` is in words; FEC block sizes are in bytes.
    #[allow(clippy::too_many_arguments)]
    pub fn initialize(
        &mut self,
        onu_id: u16,
        ploam: bool,
        profile_index: u8,
        profile: &BurstProfile,
        guard_time: u32,
        data_block_size: u32,
        fec_block_size: u32,
    ) {
        assert!(
            !profile.fec || (data_block_size >= 4 && fec_block_size > data_block_size),
            "Invalid FEC block sizes: data {} / codeword {}",
            data_block_size,
            fec_block_size
        );
        self.onu_id = onu_id;
        self.initialized = true;
        self.ploam = ploam;
        self.profile_index = profile_index;
        self.gap = guard_time + profile.sync_words();
        self.fec = profile.fec;
        self.data_block_size = data_block_size / 4;
        self.fec_block_size = fec_block_size / 4;
        self.header_trailer_data_size = HEADER_TRAILER_IN_WORDS + if ploam { PLOAM_IN_WORDS } else { 0 };
        self.allocations.clear();
        self.tconts.clear();
        self.update_final_burst_size();
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn onu_id(&self) -> u16 {
        self.onu_id
    }

    pub fn ploam(&self) -> bool {
        self.ploam
    }

    pub fn profile_index(&self) -> u8 {
        self.profile_index
    }

    pub fn fec(&self) -> bool {
        self.fec
    }

    /// Guard time plus preamble and delimiter, words.
    pub fn gap_overhead(&self) -> u32 {
        self.gap
    }

    /// Header, trailer, PLOAM and granted words before FEC.
    pub fn header_trailer_data_size(&self) -> u32 {
        self.header_trailer_data_size
    }

    /// Words this burst occupies in the upstream frame, gap included.
    pub fn final_burst_size(&self) -> u32 {
        self.final_burst_size
    }

    pub fn num_allocations(&self) -> usize {
        self.allocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.allocations.len() >= MAX_TCONT_PER_BURST
    }

    pub fn allocations(&self) -> &[XgtcBwAllocation] {
        &self.allocations
    }

    /// Largest header/trailer/data size that still fits into `available` words including the gap.
    pub fn max_data_for_span(&self, available: u32) -> u32 {
        let coded = available.saturating_sub(self.gap);
        if self.fec {
            max_data_for_coded_size(coded, self.data_block_size, self.fec_block_size)
        } else {
            coded
        }
    }

    /// Largest number of words that can still be granted in this burst when `frame_left` words of the
    /// upstream frame are unallocated.
    pub fn grant_budget(&self, frame_left: u32) -> u32 {
        let span = if self.is_empty() {
            frame_left
        } else {
            frame_left + self.final_burst_size
        };
        self.max_data_for_span(span).saturating_sub(self.header_trailer_data_size)
    }

    /// Appends a grant owned by `tcont`.
    pub fn add_one_new_bw_alloc(&mut self, alloc: XgtcBwAllocation, tcont: TcontOltRef) {
        assert!(self.initialized, "Burst of ONU {} is not initialized", self.onu_id);
        assert!(!self.is_full(), "Burst of ONU {} already holds {} allocations", self.onu_id, MAX_TCONT_PER_BURST);
        self.header_trailer_data_size += alloc.grant_size() as u32;
        self.allocations.push(alloc);
        self.tconts.push(tcont);
        self.update_final_burst_size();
    }

    /// Recomputes the final burst size from the accumulated words.
    pub fn update_final_burst_size(&mut self) {
        let body = if self.fec {
            fec_coded_size(self.header_trailer_data_size, self.data_block_size, self.fec_block_size)
        } else {
            self.header_trailer_data_size
        };
        self.final_burst_size = body + self.gap;
    }

    /// Index of the allocation for `alloc_id` in this burst.
    pub fn find_bw_alloc(&self, alloc_id: u16) -> Option<usize> {
        self.allocations.iter().position(|a| a.alloc_id() == alloc_id)
    }

    /// Grows the existing grant of `alloc_id` by `size` words.
    ///
    /// Panics if the T-CONT has no allocation in this burst or the grant overflows 16 bits.
    pub fn add_to_existing_bw_alloc(&mut self, alloc_id: u16, size: u32) {
        let index = self
            .find_bw_alloc(alloc_id)
            .unwrap_or_else(|| panic!("Alloc-ID {} has no allocation in this burst", alloc_id));
        let alloc = &mut self.allocations[index];
        let grant = alloc.grant_size() as u32 + size;
        assert!(grant <= u16::MAX as u32, "Grant of Alloc-ID {} overflows: {}", alloc_id, grant);
        alloc.set_grant_size(grant as u16);
        self.header_trailer_data_size += size;
        self.update_final_burst_size();
    }

    /// Places all allocations into `map`, the first one starting at `start_time`, and records them in
    /// the owning T-CONTs' service history.
    pub fn put_all_bw_alloc_into_bwmap(&mut self, map: &mut XgtcBwmap, start_time: u16, now: u64) {
        for (i, (alloc, tcont)) in self.allocations.iter_mut().zip(self.tconts.iter()).enumerate() {
            if i == 0 {
                alloc.set_start_time(start_time);
            }
            alloc.set_create_time(now);
            tcont.borrow_mut().add_bw_allocation_to_service_history(alloc, now);
            map.add_bw_allocation(alloc.clone());
        }
    }
}
