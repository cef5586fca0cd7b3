/// A complete user message on one stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SctpMessage {
    pub stream_id: u16,
    /// Payload protocol identifier
    pub ppid: u32,
    pub ordered: bool,
    pub data: Vec<u8>,
}

impl SctpMessage {
    pub fn new(stream_id: u16, ppid: u32, ordered: bool, data: Vec<u8>) -> Self {
        Self {
            stream_id,
            ppid,
            ordered,
            data,
        }
    }
}

/// Receives reassembled messages.
///
/// Returning `false` refuses the message for now: it stays buffered and is
/// offered again on the next delivery pass. Implementations must not feed
/// chunks back into the stream that is calling them.
pub trait StreamListener {
    fn deliver(&mut self, message: &SctpMessage) -> bool;
}
