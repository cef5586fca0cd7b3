//! Stream reassembly
//!
//! Each inbound stream keeps a stash of DATA chunks not yet handed to the
//! upper layer, ordered by TSN. A delivery pass walks the stash once from
//! the lowest TSN and delivers every message that is complete:
//!
//! - fragments of one message must have consecutive TSNs, on every stream
//! - on an ordered stream, consecutive TSNs are required throughout the walk
//!   and a message is only delivered when its SSN is the next expected one
//! - on an unordered stream, gaps between messages are tolerated
//!
//! The walk stops at the first hole; chunks past it wait for the next pass.

use crate::codec::{DataChunk, Fragment};
use crate::stream::{SctpMessage, StreamListener};
use crate::utils::tsn_lt;
use logging::Logger;
use std::collections::BTreeMap;

/// Receive-side state of one stream
#[derive(Debug, Clone)]
pub struct StreamState {
    stream_id: u16,
    ordered: bool,
    next_message_seq_in: u16,
    /// Stash keyed by TSN offset from `tsn_base`, so iteration is in
    /// serial TSN order across wraparound
    pending: BTreeMap<u32, DataChunk>,
    /// Lowest stashed TSN while the stash is not empty
    tsn_base: u32,
    logger: Logger,
}

impl StreamState {
    pub fn new(stream_id: u16, ordered: bool, logger: Logger) -> Self {
        Self {
            stream_id,
            ordered,
            next_message_seq_in: 0,
            pending: BTreeMap::new(),
            tsn_base: 0,
            logger,
        }
    }

    pub fn stream_id(&self) -> u16 {
        self.stream_id
    }

    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    pub fn set_ordered(&mut self, ordered: bool) {
        self.ordered = ordered;
    }

    /// SSN of the next ordered message to deliver
    pub fn next_message_seq_in(&self) -> u16 {
        self.next_message_seq_in
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// User data bytes held in the stash
    pub fn pending_bytes(&self) -> usize {
        self.pending.values().map(|c| c.data.len()).sum()
    }

    /// TSNs in the stash, ascending
    pub fn pending_tsns(&self) -> Vec<u32> {
        self.pending.values().map(|c| c.tsn).collect()
    }

    pub fn contains_tsn(&self, tsn: u32) -> bool {
        self.pending.contains_key(&tsn.wrapping_sub(self.tsn_base))
    }

    /// Add a chunk to the stash. A TSN already present is ignored and
    /// `false` returned.
    pub fn insert(&mut self, chunk: DataChunk) -> bool {
        if self.pending.is_empty() {
            self.tsn_base = chunk.tsn;
        } else if tsn_lt(chunk.tsn, self.tsn_base) {
            self.rebase(chunk.tsn);
        }

        let key = chunk.tsn.wrapping_sub(self.tsn_base);
        if self.pending.contains_key(&key) {
            self.logger.trace(&format!(
                "Stream {}: duplicate TSN {} ignored",
                self.stream_id, chunk.tsn
            ));
            return false;
        }
        self.pending.insert(key, chunk);
        true
    }

    /// Drop everything buffered
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Re-key the stash as offsets from `tsn_base`, which must not be above
    /// any stashed TSN
    fn rebase(&mut self, tsn_base: u32) {
        let pending = std::mem::take(&mut self.pending);
        self.tsn_base = tsn_base;
        self.pending = pending
            .into_values()
            .map(|chunk| (chunk.tsn.wrapping_sub(tsn_base), chunk))
            .collect();
    }

    /// Run one delivery pass. Returns the number of messages the listener
    /// accepted.
    pub fn deliver<L: StreamListener + ?Sized>(&mut self, listener: &mut L) -> usize {
        let Some(first) = self.pending.values().next() else {
            return 0;
        };

        let mut expected_tsn = first.tsn;
        let mut in_progress: Option<Vec<u32>> = None;
        let mut delivered_keys: Vec<u32> = Vec::new();
        let mut delivered = 0;

        for (&key, chunk) in &self.pending {
            let ordered_mode = self.ordered || in_progress.is_some();
            if ordered_mode && chunk.tsn != expected_tsn {
                self.logger.trace(&format!(
                    "Stream {}: hole before TSN {} (expected {})",
                    self.stream_id, chunk.tsn, expected_tsn
                ));
                break;
            }

            match chunk.fragment() {
                Fragment::Single => {
                    if self.ordered && chunk.stream_seq != self.next_message_seq_in {
                        self.logger.trace(&format!(
                            "Stream {}: SSN {} waiting for {}",
                            self.stream_id, chunk.stream_seq, self.next_message_seq_in
                        ));
                        break;
                    }
                    if in_progress.take().is_some() {
                        self.logger
                            .debug(&format!("Stream {}: unterminated message dropped", self.stream_id));
                    }

                    let message = SctpMessage::new(
                        self.stream_id,
                        chunk.ppid,
                        self.ordered,
                        chunk.data.clone(),
                    );
                    if listener.deliver(&message) {
                        delivered_keys.push(key);
                        self.next_message_seq_in = self.next_message_seq_in.wrapping_add(1);
                        delivered += 1;
                    }
                }
                Fragment::Begin => {
                    if self.ordered && chunk.stream_seq != self.next_message_seq_in {
                        self.logger.trace(&format!(
                            "Stream {}: SSN {} waiting for {}",
                            self.stream_id, chunk.stream_seq, self.next_message_seq_in
                        ));
                        break;
                    }
                    if in_progress.replace(vec![key]).is_some() {
                        self.logger
                            .debug(&format!("Stream {}: unterminated message dropped", self.stream_id));
                    }
                }
                Fragment::Middle => match in_progress.as_mut() {
                    Some(run) => run.push(key),
                    None => self.logger.debug(&format!(
                        "Stream {}: orphan middle fragment TSN {}",
                        self.stream_id, chunk.tsn
                    )),
                },
                Fragment::End => match in_progress.take() {
                    Some(mut run) => {
                        run.push(key);
                        let message = self.assemble(&run);
                        if listener.deliver(&message) {
                            delivered_keys.extend(run);
                            self.next_message_seq_in = self.next_message_seq_in.wrapping_add(1);
                            delivered += 1;
                        }
                    }
                    None => self.logger.debug(&format!(
                        "Stream {}: orphan end fragment TSN {}",
                        self.stream_id, chunk.tsn
                    )),
                },
            }

            expected_tsn = chunk.tsn.wrapping_add(1);
        }

        for key in delivered_keys {
            self.pending.remove(&key);
        }
        let lowest = self.pending.values().next().map(|chunk| chunk.tsn);
        if let Some(lowest) = lowest
            && lowest != self.tsn_base
        {
            self.rebase(lowest);
        }
        delivered
    }

    fn assemble(&self, run: &[u32]) -> SctpMessage {
        let fragments: Vec<&DataChunk> = run.iter().filter_map(|k| self.pending.get(k)).collect();
        let ppid = fragments.first().map(|c| c.ppid).unwrap_or_default();
        let data = fragments
            .iter()
            .flat_map(|c| c.data.iter().copied())
            .collect();
        SctpMessage::new(self.stream_id, ppid, self.ordered, data)
    }
}
