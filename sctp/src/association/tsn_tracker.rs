//! Receive-side TSN bookkeeping: cumulative ack point, out-of-order TSNs
//! above it and duplicates, which together make up a SACK.

use crate::codec::SackChunk;
use crate::utils::{tsn_ge, tsn_gt};

#[derive(Debug, Clone)]
pub struct TsnTracker {
    /// Highest TSN such that it and everything before it arrived
    cumulative_tsn: u32,
    /// TSNs above the cumulative point, ascending in serial order
    above: Vec<u32>,
    /// Duplicates seen since the last SACK
    duplicates: Vec<u32>,
}

/// Duplicates remembered between two SACKs
const MAX_REPORTED_DUPLICATES: usize = 64;

impl TsnTracker {
    pub fn new(peer_initial_tsn: u32) -> Self {
        Self {
            cumulative_tsn: peer_initial_tsn.wrapping_sub(1),
            above: Vec::new(),
            duplicates: Vec::new(),
        }
    }

    pub fn cumulative_tsn(&self) -> u32 {
        self.cumulative_tsn
    }

    /// TSNs received above a hole, waiting for it to fill
    pub fn pending_above(&self) -> usize {
        self.above.len()
    }

    /// Whether `tsn` was already received
    pub fn contains(&self, tsn: u32) -> bool {
        !tsn_gt(tsn, self.cumulative_tsn)
            || self
                .above
                .binary_search_by(|p| serial_cmp(*p, tsn))
                .is_ok()
    }

    /// Record an arriving TSN. Returns false for a duplicate, which is
    /// remembered for the next SACK.
    pub fn record(&mut self, tsn: u32) -> bool {
        if !tsn_gt(tsn, self.cumulative_tsn) {
            self.note_duplicate(tsn);
            return false;
        }

        match self.above.binary_search_by(|p| serial_cmp(*p, tsn)) {
            Ok(_) => {
                self.note_duplicate(tsn);
                return false;
            }
            Err(pos) => self.above.insert(pos, tsn),
        }

        let mut advanced = 0;
        for &next in &self.above {
            if next != self.cumulative_tsn.wrapping_add(1) {
                break;
            }
            self.cumulative_tsn = next;
            advanced += 1;
        }
        self.above.drain(..advanced);
        true
    }

    fn note_duplicate(&mut self, tsn: u32) {
        if self.duplicates.len() < MAX_REPORTED_DUPLICATES {
            self.duplicates.push(tsn);
        }
    }

    /// Gap ack blocks as offsets from the cumulative TSN
    pub fn gap_blocks(&self) -> Vec<(u16, u16)> {
        let mut blocks: Vec<(u16, u16)> = Vec::new();

        for &tsn in &self.above {
            let offset = tsn.wrapping_sub(self.cumulative_tsn);
            if offset > u16::MAX as u32 {
                break;
            }
            let offset = offset as u16;
            match blocks.last_mut() {
                Some((_, end)) if *end + 1 == offset => *end = offset,
                _ => blocks.push((offset, offset)),
            }
        }

        blocks
    }

    /// Build a SACK no larger than `max_len` bytes and forget the
    /// duplicates.
    ///
    /// Gap blocks nearest the cumulative TSN are kept first; duplicates get
    /// whatever room is left. Blocks left out are reported again by a later
    /// SACK since they stay in the tracker.
    pub fn take_sack(&mut self, a_rwnd: u32, max_len: usize) -> SackChunk {
        let room = max_len.saturating_sub(SackChunk::len_for(0)) / 4;

        let mut sack = SackChunk::new(self.cumulative_tsn, a_rwnd);
        sack.gap_ack_blocks = self.gap_blocks();
        sack.gap_ack_blocks.truncate(room);

        let mut duplicates = std::mem::take(&mut self.duplicates);
        duplicates.truncate(room - sack.gap_ack_blocks.len());
        sack.duplicate_tsns = duplicates;
        sack
    }
}

fn serial_cmp(a: u32, b: u32) -> std::cmp::Ordering {
    if a == b {
        std::cmp::Ordering::Equal
    } else if tsn_ge(a, b) {
        std::cmp::Ordering::Greater
    } else {
        std::cmp::Ordering::Less
    }
}
