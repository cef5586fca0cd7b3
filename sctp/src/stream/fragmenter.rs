//! Splitting outbound messages into DATA chunks

use crate::codec::{DataChunk, Fragment};
use crate::stream::SctpMessage;

/// Split `message` into DATA chunks of at most `max_fragment_size` bytes of
/// user data, numbered with consecutive TSNs starting at `first_tsn`.
///
/// Every fragment carries the same stream sequence number. An empty message
/// yields no chunks.
pub fn fragment_message(
    message: &SctpMessage,
    stream_seq: u16,
    first_tsn: u32,
    max_fragment_size: usize,
) -> Vec<DataChunk> {
    if message.data.is_empty() || max_fragment_size == 0 {
        return Vec::new();
    }

    let pieces: Vec<&[u8]> = message.data.chunks(max_fragment_size).collect();
    let last = pieces.len() - 1;

    pieces
        .into_iter()
        .enumerate()
        .map(|(i, piece)| {
            let fragment = match (i == 0, i == last) {
                (true, true) => Fragment::Single,
                (true, false) => Fragment::Begin,
                (false, true) => Fragment::End,
                (false, false) => Fragment::Middle,
            };
            let mut chunk = DataChunk::fragment_of(
                fragment,
                first_tsn.wrapping_add(i as u32),
                message.stream_id,
                stream_seq,
                message.ppid,
                piece.to_vec(),
            );
            chunk.unordered = !message.ordered;
            chunk
        })
        .collect()
}
