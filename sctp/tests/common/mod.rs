//! Helpers shared by the integration tests: a recording listener and a
//! back-to-back link between two associations.

#![allow(dead_code)]

use logging::Logger;
use sctp::{
    AbortReason, AssociationListener, SctpAssociation, SctpConfig, SctpMessage, SctpPacket,
    StreamListener,
};

pub type Endpoint = SctpAssociation<Recorder>;

#[derive(Default)]
pub struct Recorder {
    pub messages: Vec<SctpMessage>,
    pub established: usize,
    pub aborted: Vec<AbortReason>,
    pub shutdown_complete: usize,
    /// Refuse every delivery while set
    pub refuse: bool,
}

impl StreamListener for Recorder {
    fn deliver(&mut self, message: &SctpMessage) -> bool {
        if self.refuse {
            return false;
        }
        self.messages.push(message.clone());
        true
    }
}

impl AssociationListener for Recorder {
    fn on_established(&mut self) {
        self.established += 1;
    }

    fn on_aborted(&mut self, reason: &AbortReason) {
        self.aborted.push(reason.clone());
    }

    fn on_shutdown_complete(&mut self) {
        self.shutdown_complete += 1;
    }
}

pub fn endpoint(config: SctpConfig) -> Endpoint {
    SctpAssociation::new(config, Recorder::default(), Logger::discard()).unwrap()
}

/// Feed packets to `to` and return its replies
pub fn send_to(to: &mut Endpoint, packets: &[SctpPacket], now_ms: u64) -> Vec<SctpPacket> {
    packets
        .iter()
        .flat_map(|packet| to.handle_bytes_at(&packet.to_bytes().unwrap(), now_ms))
        .collect()
}

/// Bounce packets between two endpoints until neither has anything to say.
/// `packets` are addressed to `second`.
pub fn pump(first: &mut Endpoint, second: &mut Endpoint, mut packets: Vec<SctpPacket>) {
    let now = sctp::association::now_ms();
    let mut to_second = true;
    while !packets.is_empty() {
        let target = if to_second { &mut *second } else { &mut *first };
        packets = send_to(target, &packets, now);
        to_second = !to_second;
    }
}

/// Two endpoints with default configuration, handshake complete
pub fn established_pair() -> (Endpoint, Endpoint) {
    established_pair_with(SctpConfig::default(), SctpConfig::default())
}

pub fn established_pair_with(client: SctpConfig, server: SctpConfig) -> (Endpoint, Endpoint) {
    let mut client = endpoint(client);
    let mut server = endpoint(server);
    let init = client.connect().unwrap();
    pump(&mut client, &mut server, vec![init]);
    assert!(client.is_established() && server.is_established());
    (client, server)
}
