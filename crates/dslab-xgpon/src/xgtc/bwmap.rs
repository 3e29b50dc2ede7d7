//! Bandwidth map.

use std::fmt::{Display, Formatter};

use crate::error::XgponError;

use super::bw_allocation::{XgtcBwAllocation, XGTC_BW_ALLOCATION_LENGTH};

/// Ordered upstream grants for one upstream frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct XgtcBwmap {
    allocations: Vec<XgtcBwAllocation>,
    creation_time: u64,
}

impl XgtcBwmap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bw_allocation(&mut self, alloc: XgtcBwAllocation) {
        self.allocations.push(alloc);
    }

    pub fn len(&self) -> usize {
        self.allocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }

    /// Returns the allocation at `index`.
    ///
    /// Panics if the index is out of range.
    pub fn bw_allocation(&self, index: usize) -> &XgtcBwAllocation {
        assert!(
            index < self.allocations.len(),
            "BWmap index {} is out of range ({} allocations)",
            index,
            self.allocations.len()
        );
        &self.allocations[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &XgtcBwAllocation> {
        self.allocations.iter()
    }

    /// Time the OLT created the map (nanoseconds, not serialized).
    pub fn creation_time(&self) -> u64 {
        self.creation_time
    }

    pub fn set_creation_time(&mut self, time: u64) {
        self.creation_time = time;
    }

    /// Sum of all grant sizes in words.
    pub fn total_grant_words(&self) -> u32 {
        self.allocations.iter().map(|a| a.grant_size() as u32).sum()
    }

    pub fn serialized_size(&self) -> u32 {
        XGTC_BW_ALLOCATION_LENGTH * self.allocations.len() as u32
    }

    pub fn serialize(&self, buf: &mut Vec<u8>) {
        for alloc in &self.allocations {
            alloc.serialize(buf);
        }
    }

    /// Reads `count` allocations; the count travels in the downstream frame header.
    pub fn deserialize(buf: &[u8], count: usize) -> Result<Self, XgponError> {
        XgponError::check_len(buf, count * XGTC_BW_ALLOCATION_LENGTH as usize)?;
        let mut map = Self::new();
        for chunk in buf.chunks_exact(XGTC_BW_ALLOCATION_LENGTH as usize).take(count) {
            map.add_bw_allocation(XgtcBwAllocation::deserialize(chunk)?);
        }
        Ok(map)
    }
}

impl Display for XgtcBwmap {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "BWmap@{} [", self.creation_time)?;
        for (i, alloc) in self.allocations.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if alloc.is_burst_start() {
                write!(f, "{}:{}+{}", alloc.alloc_id(), alloc.start_time(), alloc.grant_size())?;
            } else {
                write!(f, "{}:+{}", alloc.alloc_id(), alloc.grant_size())?;
            }
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_and_read_back() {
        let mut map = XgtcBwmap::new();
        map.add_bw_allocation(XgtcBwAllocation::new(1024, true, false, 8, 100, 0));
        map.add_bw_allocation(XgtcBwAllocation::new(1025, true, false, 0xFFFF, 50, 0));
        assert_eq!(map.serialized_size(), 16);
        assert_eq!(map.total_grant_words(), 150);
        let mut buf = Vec::new();
        map.serialize(&mut buf);
        let decoded = XgtcBwmap::deserialize(&buf, 2).unwrap();
        assert_eq!(decoded, map);
        assert!(XgtcBwmap::deserialize(&buf, 3).is_err());
        assert_eq!(map.to_string(), "BWmap@0 [1024:8+100, 1025:+50]");
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn index_out_of_range() {
        XgtcBwmap::new().bw_allocation(0);
    }
}
