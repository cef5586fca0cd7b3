//! SCTP association state machine
//!
//! An SCTP association represents a connection between two endpoints. It
//! owns the verification tags and TSN spaces of both sides, runs the
//! four-way handshake and the shutdown sequence, and hands DATA chunks to
//! the per-stream reassembly engine.
//!
//! ```text
//!   initiator                              responder
//!   CLOSED  --- INIT ------------------->  CLOSED (no state kept)
//!   COOKIE-WAIT  <------------ INIT-ACK --  (signed cookie)
//!   COOKIE-ECHOED --- COOKIE-ECHO ------>  ESTABLISHED
//!   ESTABLISHED  <----------- COOKIE-ACK --
//! ```
//!
//! Everything is synchronous: callers feed received bytes in and transmit
//! whatever packets come back. Timers and retransmission are not handled
//! here.

mod cookie;
mod listener;
mod state;
mod tsn_tracker;

pub use cookie::{COOKIE_SIZE, CookieError, CookieSecret, StateCookie, now_ms};
pub use listener::{AbortReason, AssociationListener};
pub use state::AssociationState;
pub use tsn_tracker::TsnTracker;

use crate::codec::chunk::DATA_CHUNK_HEADER_SIZE;
use crate::codec::param::{param_type, report_if_unrecognized};
use crate::codec::primitives::padded_len;
use crate::codec::{
    Chunk, DataChunk, DecodedPacket, ErrorCause, FormatError, InitChunk, Parameter,
    SCTP_HEADER_SIZE, SackChunk, SctpPacket,
};
use crate::config::SctpConfig;
use crate::error::{Result, SctpError};
use crate::stream::{SctpMessage, StreamState, fragment_message};
use crate::utils::{tsn_ge, tsn_gt};
use logging::Logger;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

/// Replies gathered while processing one inbound packet
#[derive(Default)]
struct Outbox {
    /// Chunks for the peer, bundled into one packet at the end
    chunks: Vec<Chunk>,
    /// Complete packets, each with its own verification tag
    packets: Vec<SctpPacket>,
    /// Remaining chunks of the inbound packet must be skipped
    stop: bool,
}

/// Represents an SCTP association (connection)
pub struct SctpAssociation<L: AssociationListener> {
    config: SctpConfig,
    state: AssociationState,
    /// Tag the peer must put on packets to us
    local_verification_tag: u32,
    /// Tag we put on packets to the peer
    peer_verification_tag: u32,
    local_initial_tsn: u32,
    peer_initial_tsn: u32,
    /// Next TSN to send
    next_tsn: u32,
    /// Receiver window last advertised by the peer
    peer_a_rwnd: u32,
    num_outbound_streams: u16,
    num_inbound_streams: u16,
    /// Cookie from the peer's INIT-ACK, echoed until COOKIE-ACK arrives
    cookie: Option<Vec<u8>>,
    /// INIT we sent, kept to restart after a stale cookie
    init_sent: Option<InitChunk>,
    cookie_secret: CookieSecret,
    tsn_tracker: TsnTracker,
    streams: HashMap<u16, StreamState>,
    /// Ordering mode forced by the upper layer, per stream
    stream_ordering: HashMap<u16, bool>,
    outbound_stream_seq: HashMap<u16, u16>,
    send_queue: VecDeque<DataChunk>,
    /// Sent and not yet acknowledged, keyed by TSN offset from our initial TSN
    in_flight: BTreeMap<u32, DataChunk>,
    listener: L,
    logger: Logger,
}

impl<L: AssociationListener> SctpAssociation<L> {
    /// Create a closed association
    ///
    /// # Errors
    ///
    /// Returns [`SctpError::InvalidConfig`] if the configuration does not
    /// validate.
    pub fn new(config: SctpConfig, listener: L, logger: Logger) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            state: AssociationState::Closed,
            local_verification_tag: 0,
            peer_verification_tag: 0,
            local_initial_tsn: 0,
            peer_initial_tsn: 0,
            next_tsn: 0,
            peer_a_rwnd: 0,
            num_outbound_streams: 0,
            num_inbound_streams: 0,
            cookie: None,
            init_sent: None,
            cookie_secret: CookieSecret::generate(),
            tsn_tracker: TsnTracker::new(0),
            streams: HashMap::new(),
            stream_ordering: HashMap::new(),
            outbound_stream_seq: HashMap::new(),
            send_queue: VecDeque::new(),
            in_flight: BTreeMap::new(),
            listener,
            logger,
        })
    }

    /// Get current state
    pub fn state(&self) -> AssociationState {
        self.state
    }

    /// Check if association is established
    pub fn is_established(&self) -> bool {
        self.state == AssociationState::Established
    }

    pub fn config(&self) -> &SctpConfig {
        &self.config
    }

    pub fn local_verification_tag(&self) -> u32 {
        self.local_verification_tag
    }

    pub fn peer_verification_tag(&self) -> u32 {
        self.peer_verification_tag
    }

    pub fn local_initial_tsn(&self) -> u32 {
        self.local_initial_tsn
    }

    pub fn peer_initial_tsn(&self) -> u32 {
        self.peer_initial_tsn
    }

    pub fn num_outbound_streams(&self) -> u16 {
        self.num_outbound_streams
    }

    pub fn num_inbound_streams(&self) -> u16 {
        self.num_inbound_streams
    }

    pub fn peer_a_rwnd(&self) -> u32 {
        self.peer_a_rwnd
    }

    /// Highest peer TSN received with no gap before it
    pub fn cumulative_tsn_received(&self) -> u32 {
        self.tsn_tracker.cumulative_tsn()
    }

    /// Receive-side state of a stream that has seen DATA
    pub fn stream(&self, stream_id: u16) -> Option<&StreamState> {
        self.streams.get(&stream_id)
    }

    /// DATA chunks buffered across all streams
    pub fn stashed_chunks(&self) -> usize {
        self.streams.values().map(StreamState::pending_len).sum()
    }

    /// Chunks queued by `send` and not yet handed out by `poll_send`
    pub fn queued_chunks(&self) -> usize {
        self.send_queue.len()
    }

    /// Chunks sent and not yet acknowledged
    pub fn in_flight_chunks(&self) -> usize {
        self.in_flight.len()
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    /// Force the ordering mode of an inbound stream. Without this, a stream
    /// takes its mode from the U flag of the first DATA chunk it sees.
    pub fn set_stream_ordering(&mut self, stream_id: u16, ordered: bool) {
        self.stream_ordering.insert(stream_id, ordered);
        if let Some(stream) = self.streams.get_mut(&stream_id) {
            stream.set_ordered(ordered);
        }
    }

    /// Start the handshake: returns the INIT packet
    pub fn connect(&mut self) -> Result<SctpPacket> {
        if self.state != AssociationState::Closed {
            return Err(SctpError::InvalidState(format!(
                "connect requested in {}",
                self.state
            )));
        }

        self.local_verification_tag = random_nonzero();
        self.local_initial_tsn = random_nonzero();
        self.next_tsn = self.local_initial_tsn;

        let init = InitChunk::new(
            self.local_verification_tag,
            self.config.recv_window,
            self.config.max_outbound_streams,
            self.config.max_inbound_streams,
            self.local_initial_tsn,
        );
        self.init_sent = Some(init.clone());
        self.set_state(AssociationState::CookieWait);

        // Verification tag is 0 for INIT
        Ok(self.packet_with(0, vec![Chunk::Init(init)]))
    }

    /// Process received bytes; returns the packets to transmit
    pub fn handle_bytes(&mut self, bytes: &[u8]) -> Vec<SctpPacket> {
        self.handle_bytes_at(bytes, now_ms())
    }

    /// Same as [`SctpAssociation::handle_bytes`] with an explicit clock
    /// (milliseconds since the epoch) for cookie minting and expiry.
    pub fn handle_bytes_at(&mut self, bytes: &[u8], now_ms: u64) -> Vec<SctpPacket> {
        match SctpPacket::decode(bytes) {
            Ok(decoded) => self.process_decoded(decoded, now_ms),
            Err(err) => self.handle_malformed(bytes, err),
        }
    }

    /// Process an already decoded packet
    pub fn process_packet(&mut self, packet: SctpPacket) -> Vec<SctpPacket> {
        let decoded = DecodedPacket {
            packet,
            unrecognized: Vec::new(),
            stopped: false,
        };
        self.process_decoded(decoded, now_ms())
    }

    fn handle_malformed(&mut self, bytes: &[u8], err: FormatError) -> Vec<SctpPacket> {
        let ours = SctpPacket::peek_verification_tag(bytes) == Some(self.local_verification_tag);
        if !(ours && self.has_peer()) {
            self.logger
                .debug(&format!("Discarding malformed packet: {}", err));
            return Vec::new();
        }

        let cause = ErrorCause::protocol_violation(&err.to_string());
        vec![self.abort_with(cause, AbortReason::Malformed(err))]
    }

    fn process_decoded(&mut self, decoded: DecodedPacket, now_ms: u64) -> Vec<SctpPacket> {
        let DecodedPacket {
            packet,
            unrecognized,
            stopped,
        } = decoded;

        if !self.accepts_tag(&packet) {
            self.logger.debug(&format!(
                "Discarding packet with verification tag {:#010x} in {}",
                packet.verification_tag, self.state
            ));
            return Vec::new();
        }
        if stopped {
            self.logger
                .debug("Unrecognized chunk type stopped packet processing");
        }

        let verification_tag = packet.verification_tag;
        let mut out = Outbox::default();
        let mut carried_data = false;
        let mut touched = BTreeSet::new();

        for chunk in packet.chunks {
            self.logger.trace(&format!("Received {} in {}", chunk.name(), self.state));

            match chunk {
                Chunk::Init(init) => {
                    self.handle_init(&init, now_ms, &mut out);
                    out.stop = true;
                }
                Chunk::InitAck(init_ack) => self.handle_init_ack(&init_ack, &mut out),
                Chunk::CookieEcho(cookie) => {
                    self.handle_cookie_echo(&cookie, verification_tag, now_ms, &mut out)
                }
                Chunk::CookieAck => self.handle_cookie_ack(),
                Chunk::Data(data) => {
                    carried_data |= self.handle_data(data, &mut out, &mut touched);
                }
                Chunk::Sack(sack) => self.handle_sack(&sack),
                Chunk::Heartbeat(heartbeat) => {
                    if self.has_peer() {
                        out.chunks.push(Chunk::HeartbeatAck(heartbeat));
                    }
                }
                Chunk::HeartbeatAck(_) => {}
                Chunk::Abort { causes, .. } => {
                    self.handle_abort(causes);
                    out.stop = true;
                }
                Chunk::Shutdown { cumulative_tsn } => {
                    self.handle_shutdown(cumulative_tsn, &mut out)
                }
                Chunk::ShutdownAck => self.handle_shutdown_ack(&mut out),
                Chunk::ShutdownComplete { .. } => self.handle_shutdown_complete(),
                Chunk::Error { causes } => self.handle_error(&causes, &mut out),
                Chunk::EcnEcho { lowest_tsn } => {
                    // No congestion window to shrink; acknowledge the echo
                    if self.has_peer() {
                        out.chunks.push(Chunk::Cwr { lowest_tsn });
                    }
                }
                Chunk::Cwr { .. } => {}
            }

            if out.stop {
                break;
            }
        }

        if !out.stop && self.has_peer() {
            let reports: Vec<ErrorCause> = unrecognized
                .iter()
                .filter(|u| u.action.reports())
                .map(|u| ErrorCause::UnrecognizedChunkType(u.bytes.clone()))
                .collect();
            if !reports.is_empty() {
                out.chunks.push(Chunk::Error { causes: reports });
            }
        }

        if carried_data && self.state.accepts_data() {
            for stream_id in touched {
                self.deliver_stream(stream_id);
            }
            // The SACK takes whatever room the other replies leave in the MTU
            let used: usize = out.chunks.iter().map(Chunk::padded_len).sum();
            let max_len = self
                .config
                .mtu
                .saturating_sub(SCTP_HEADER_SIZE + used)
                .min(u16::MAX as usize);
            let a_rwnd = self.advertised_window();
            out.chunks
                .push(Chunk::Sack(self.tsn_tracker.take_sack(a_rwnd, max_len)));
        }

        if let Some(chunk) = self.progress_shutdown() {
            out.chunks.push(chunk);
        }

        if !out.chunks.is_empty() {
            if self.has_peer() {
                let packet = self.packet_with(self.peer_verification_tag, out.chunks);
                out.packets.push(packet);
            } else {
                self.logger.debug(&format!(
                    "Dropping {} reply chunk(s): no peer in {}",
                    out.chunks.len(),
                    self.state
                ));
            }
        }

        out.packets
    }

    /// Verification tag rules for the first chunk of a packet
    fn accepts_tag(&self, packet: &SctpPacket) -> bool {
        let tag = packet.verification_tag;
        let local = self.local_verification_tag != 0 && tag == self.local_verification_tag;
        let reflected = self.peer_verification_tag != 0 && tag == self.peer_verification_tag;

        match packet.chunks.first() {
            Some(Chunk::Init(_)) => tag == 0,
            Some(Chunk::Abort { t_bit, .. }) | Some(Chunk::ShutdownComplete { t_bit }) => {
                local || (*t_bit && reflected)
            }
            // Checked against the tag embedded in the cookie
            Some(Chunk::CookieEcho(_)) if self.state == AssociationState::Closed => true,
            _ => local,
        }
    }

    /// Responder side: answer INIT with a signed cookie, keeping no state
    fn handle_init(&mut self, init: &InitChunk, now_ms: u64, out: &mut Outbox) {
        if self.state != AssociationState::Closed {
            self.logger
                .debug(&format!("Ignoring INIT in {}", self.state));
            return;
        }

        if init.initiate_tag == 0
            || init.num_outbound_streams == 0
            || init.num_inbound_streams == 0
        {
            self.logger.warn("INIT with zero tag or stream count");
            out.packets.push(self.packet_with(
                init.initiate_tag,
                vec![Chunk::Abort {
                    t_bit: false,
                    causes: vec![ErrorCause::InvalidMandatoryParameter],
                }],
            ));
            return;
        }

        let preservative = init
            .params
            .iter()
            .find_map(|param| match param {
                Parameter::CookiePreservative(increment) => Some(*increment),
                _ => None,
            })
            .unwrap_or(0)
            .min(self.config.cookie_lifetime_ms);

        let cookie = StateCookie {
            responder_tag: random_nonzero(),
            initiator_tag: init.initiate_tag,
            responder_initial_tsn: random_nonzero(),
            initiator_initial_tsn: init.initial_tsn,
            initiator_a_rwnd: init.a_rwnd,
            outbound_streams: self.config.max_outbound_streams.min(init.num_inbound_streams),
            inbound_streams: self.config.max_inbound_streams.min(init.num_outbound_streams),
            created_ms: now_ms,
            lifetime_ms: self.config.cookie_lifetime_ms.saturating_add(preservative),
        };

        let Some(cookie_bytes) = cookie.mint(&self.cookie_secret) else {
            self.logger.error("Failed to sign state cookie");
            out.packets.push(self.packet_with(
                init.initiate_tag,
                vec![Chunk::Abort {
                    t_bit: false,
                    causes: vec![ErrorCause::OutOfResource],
                }],
            ));
            return;
        };

        let mut init_ack = InitChunk::new(
            cookie.responder_tag,
            self.config.recv_window,
            cookie.outbound_streams,
            cookie.inbound_streams,
            cookie.responder_initial_tsn,
        );
        init_ack.params.push(Parameter::StateCookie(cookie_bytes));
        for param in &init.params {
            if let Parameter::Unknown { param_type, .. } = param
                && report_if_unrecognized(*param_type)
            {
                init_ack
                    .params
                    .push(Parameter::UnrecognizedParameter(param.to_bytes()));
            }
        }

        self.logger.debug(&format!(
            "INIT from tag {:#010x}: answering with cookie",
            init.initiate_tag
        ));
        out.packets
            .push(self.packet_with(init.initiate_tag, vec![Chunk::InitAck(init_ack)]));
    }

    /// Initiator side: adopt the peer's parameters and echo its cookie
    fn handle_init_ack(&mut self, init_ack: &InitChunk, out: &mut Outbox) {
        if self.state != AssociationState::CookieWait {
            self.logger
                .debug(&format!("Ignoring INIT-ACK in {}", self.state));
            return;
        }

        self.peer_verification_tag = init_ack.initiate_tag;

        if init_ack.initiate_tag == 0
            || init_ack.num_outbound_streams == 0
            || init_ack.num_inbound_streams == 0
        {
            let cause = ErrorCause::InvalidMandatoryParameter;
            out.packets
                .push(self.abort_with(cause.clone(), AbortReason::Local(cause)));
            out.stop = true;
            return;
        }

        let Some(cookie) = init_ack.state_cookie().map(<[u8]>::to_vec) else {
            let cause = ErrorCause::MissingMandatoryParameter(vec![param_type::STATE_COOKIE]);
            out.packets
                .push(self.abort_with(cause.clone(), AbortReason::Local(cause)));
            out.stop = true;
            return;
        };

        self.peer_initial_tsn = init_ack.initial_tsn;
        self.peer_a_rwnd = init_ack.a_rwnd;
        self.num_outbound_streams = self
            .config
            .max_outbound_streams
            .min(init_ack.num_inbound_streams);
        self.num_inbound_streams = self
            .config
            .max_inbound_streams
            .min(init_ack.num_outbound_streams);
        self.tsn_tracker = TsnTracker::new(init_ack.initial_tsn);

        // COOKIE-ECHO must be the first chunk of the packet
        out.chunks.push(Chunk::CookieEcho(cookie.clone()));

        let unrecognized: Vec<ErrorCause> = init_ack
            .params
            .iter()
            .filter_map(|param| match param {
                Parameter::Unknown { param_type, .. } if report_if_unrecognized(*param_type) => {
                    Some(ErrorCause::UnrecognizedParameters(param.to_bytes()))
                }
                Parameter::UnrecognizedParameter(raw) => {
                    self.logger
                        .debug(&format!("Peer did not understand parameter {:02x?}", raw));
                    None
                }
                _ => None,
            })
            .collect();
        if !unrecognized.is_empty() {
            out.chunks.push(Chunk::Error {
                causes: unrecognized,
            });
        }

        self.cookie = Some(cookie);
        self.set_state(AssociationState::CookieEchoed);
    }

    fn handle_cookie_echo(&mut self, bytes: &[u8], tag: u32, now_ms: u64, out: &mut Outbox) {
        match self.state {
            AssociationState::Closed => self.accept_cookie(bytes, tag, now_ms, out),
            AssociationState::Established => {
                // Our COOKIE-ACK was lost; acknowledge again if the cookie is ours
                let matches_us = StateCookie::verify(bytes, &self.cookie_secret)
                    .map(|cookie| {
                        cookie.responder_tag == self.local_verification_tag
                            && cookie.initiator_tag == self.peer_verification_tag
                    })
                    .unwrap_or(false);
                if matches_us {
                    out.chunks.push(Chunk::CookieAck);
                } else {
                    self.logger.debug("Ignoring COOKIE-ECHO for another association");
                }
            }
            state if state.is_shutting_down() => {
                out.chunks.push(Chunk::Error {
                    causes: vec![ErrorCause::CookieReceivedWhileShuttingDown],
                });
            }
            state => self
                .logger
                .debug(&format!("Ignoring COOKIE-ECHO in {}", state)),
        }
    }

    /// Responder side: validate the echoed cookie and build the association
    fn accept_cookie(&mut self, bytes: &[u8], tag: u32, now_ms: u64, out: &mut Outbox) {
        let cookie = match StateCookie::verify(bytes, &self.cookie_secret) {
            Ok(cookie) => cookie,
            Err(err) => {
                self.logger
                    .warn(&format!("Rejecting COOKIE-ECHO: {}", err));
                // No trusted peer tag: reflect the packet's own tag
                out.packets.push(self.packet_with(
                    tag,
                    vec![Chunk::Abort {
                        t_bit: true,
                        causes: vec![ErrorCause::protocol_violation(&err.to_string())],
                    }],
                ));
                self.listener.on_aborted(&AbortReason::Cookie(err));
                return;
            }
        };

        if let Err(err) = cookie.check_at(tag, now_ms) {
            self.logger
                .warn(&format!("Rejecting COOKIE-ECHO: {}", err));
            let reply = match &err {
                CookieError::Expired { staleness_us } => Chunk::Error {
                    causes: vec![ErrorCause::StaleCookie {
                        staleness_us: *staleness_us,
                    }],
                },
                _ => Chunk::Abort {
                    t_bit: false,
                    causes: vec![ErrorCause::protocol_violation(&err.to_string())],
                },
            };
            out.packets
                .push(self.packet_with(cookie.initiator_tag, vec![reply]));
            self.listener.on_aborted(&AbortReason::Cookie(err));
            return;
        }

        self.local_verification_tag = cookie.responder_tag;
        self.peer_verification_tag = cookie.initiator_tag;
        self.local_initial_tsn = cookie.responder_initial_tsn;
        self.next_tsn = cookie.responder_initial_tsn;
        self.peer_initial_tsn = cookie.initiator_initial_tsn;
        self.peer_a_rwnd = cookie.initiator_a_rwnd;
        self.num_outbound_streams = cookie.outbound_streams;
        self.num_inbound_streams = cookie.inbound_streams;
        self.tsn_tracker = TsnTracker::new(cookie.initiator_initial_tsn);

        self.set_state(AssociationState::Established);
        out.chunks.push(Chunk::CookieAck);
        self.listener.on_established();
    }

    fn handle_cookie_ack(&mut self) {
        if self.state != AssociationState::CookieEchoed {
            self.logger
                .debug(&format!("Ignoring COOKIE-ACK in {}", self.state));
            return;
        }
        self.cookie = None;
        self.init_sent = None;
        self.set_state(AssociationState::Established);
        self.listener.on_established();
    }

    /// Stash one DATA chunk. Returns true when the chunk counts towards a
    /// SACK for this packet.
    fn handle_data(
        &mut self,
        data: DataChunk,
        out: &mut Outbox,
        touched: &mut BTreeSet<u16>,
    ) -> bool {
        if !self.state.accepts_data() {
            self.logger
                .debug(&format!("Ignoring DATA TSN {} in {}", data.tsn, self.state));
            return false;
        }

        if data.data.is_empty() {
            let cause = ErrorCause::NoUserData { tsn: data.tsn };
            out.packets
                .push(self.abort_with(cause.clone(), AbortReason::Local(cause)));
            out.stop = true;
            return false;
        }

        if self.tsn_tracker.contains(data.tsn) {
            // Noted as duplicate for the SACK
            self.tsn_tracker.record(data.tsn);
            return true;
        }

        // Every TSN held above a hole costs memory until the hole fills
        let fills_hole = data.tsn == self.tsn_tracker.cumulative_tsn().wrapping_add(1);
        if !fills_hole && self.tsn_tracker.pending_above() >= self.config.max_stash_chunks {
            self.logger.warn(&format!(
                "{} TSNs held above cumulative TSN {}",
                self.tsn_tracker.pending_above(),
                self.tsn_tracker.cumulative_tsn()
            ));
            self.refuse_for_resources(out);
            return false;
        }

        if data.stream_id >= self.num_inbound_streams {
            self.tsn_tracker.record(data.tsn);
            self.logger.debug(&format!(
                "DATA TSN {} for unknown stream {}",
                data.tsn, data.stream_id
            ));
            out.chunks.push(Chunk::Error {
                causes: vec![ErrorCause::InvalidStreamIdentifier(data.stream_id)],
            });
            return true;
        }

        self.tsn_tracker.record(data.tsn);
        let stream_id = data.stream_id;
        let ordered = self
            .stream_ordering
            .get(&stream_id)
            .copied()
            .unwrap_or(!data.unordered);
        let stream_logger = self.logger.for_component("Stream");
        self.streams
            .entry(stream_id)
            .or_insert_with(|| StreamState::new(stream_id, ordered, stream_logger))
            .insert(data);
        touched.insert(stream_id);

        if self.stashed_chunks() > self.config.max_stash_chunks {
            // Make room from whatever this packet already completed
            for &touched_id in touched.iter() {
                self.deliver_stream(touched_id);
            }
            if self.stashed_chunks() > self.config.max_stash_chunks {
                self.logger.warn(&format!(
                    "Stash limit of {} chunks reached",
                    self.config.max_stash_chunks
                ));
                self.refuse_for_resources(out);
                return false;
            }
        }
        true
    }

    fn refuse_for_resources(&mut self, out: &mut Outbox) {
        let cause = ErrorCause::OutOfResource;
        out.packets
            .push(self.abort_with(cause.clone(), AbortReason::Local(cause)));
        out.stop = true;
    }

    /// Run delivery passes on one stream until nothing more completes
    fn deliver_stream(&mut self, stream_id: u16) -> usize {
        let Some(stream) = self.streams.get_mut(&stream_id) else {
            return 0;
        };

        let mut total = 0;
        loop {
            let delivered = stream.deliver(&mut self.listener);
            if delivered == 0 {
                break;
            }
            total += delivered;
        }
        total
    }

    /// Offer buffered messages to the listener again, e.g. after it
    /// refused one. Returns the number delivered.
    pub fn deliver_pending(&mut self) -> usize {
        let stream_ids: Vec<u16> = self.streams.keys().copied().collect();
        stream_ids
            .into_iter()
            .map(|stream_id| self.deliver_stream(stream_id))
            .sum()
    }

    fn handle_sack(&mut self, sack: &SackChunk) {
        if !self.has_peer() || self.state == AssociationState::CookieEchoed {
            return;
        }

        self.peer_a_rwnd = sack.a_rwnd;
        self.retire_acked(sack.cumulative_tsn);

        for (start, end) in &sack.gap_ack_blocks {
            let first = sack.cumulative_tsn.wrapping_add(*start as u32);
            let last = sack.cumulative_tsn.wrapping_add(*end as u32);
            self.in_flight
                .retain(|_, chunk| !(tsn_ge(chunk.tsn, first) && !tsn_gt(chunk.tsn, last)));
        }
    }

    /// Remove in-flight chunks up to and including `cumulative_tsn`
    fn retire_acked(&mut self, cumulative_tsn: u32) {
        self.in_flight
            .retain(|_, chunk| tsn_gt(chunk.tsn, cumulative_tsn));
    }

    fn handle_abort(&mut self, causes: Vec<ErrorCause>) {
        if self.state == AssociationState::Closed {
            return;
        }
        let reason = AbortReason::Peer(causes);
        self.logger
            .warn(&format!("Association {}", reason));
        self.close();
        self.listener.on_aborted(&reason);
    }

    fn handle_shutdown(&mut self, cumulative_tsn: u32, out: &mut Outbox) {
        match self.state {
            AssociationState::Established | AssociationState::ShutdownPending => {
                self.retire_acked(cumulative_tsn);
                self.set_state(AssociationState::ShutdownReceived);
            }
            AssociationState::ShutdownReceived => self.retire_acked(cumulative_tsn),
            AssociationState::ShutdownSent => {
                // Both sides shut down at once
                self.retire_acked(cumulative_tsn);
                out.chunks.push(Chunk::ShutdownAck);
                self.set_state(AssociationState::ShutdownAckSent);
            }
            state => self
                .logger
                .debug(&format!("Ignoring SHUTDOWN in {}", state)),
        }
    }

    fn handle_shutdown_ack(&mut self, out: &mut Outbox) {
        if !matches!(
            self.state,
            AssociationState::ShutdownSent | AssociationState::ShutdownAckSent
        ) {
            self.logger
                .debug(&format!("Ignoring SHUTDOWN-ACK in {}", self.state));
            return;
        }

        out.packets.push(self.packet_with(
            self.peer_verification_tag,
            vec![Chunk::ShutdownComplete { t_bit: false }],
        ));
        out.stop = true;
        self.close();
        self.listener.on_shutdown_complete();
    }

    fn handle_shutdown_complete(&mut self) {
        if self.state != AssociationState::ShutdownAckSent {
            self.logger
                .debug(&format!("Ignoring SHUTDOWN-COMPLETE in {}", self.state));
            return;
        }
        self.close();
        self.listener.on_shutdown_complete();
    }

    fn handle_error(&mut self, causes: &[ErrorCause], out: &mut Outbox) {
        for cause in causes {
            self.logger
                .warn(&format!("Peer reported error cause {}: {:?}", cause.code(), cause));

            if let ErrorCause::StaleCookie { staleness_us } = cause
                && self.state == AssociationState::CookieEchoed
            {
                self.restart_after_stale_cookie(*staleness_us, out);
            }
        }
    }

    /// Send INIT again asking for a longer cookie lifetime
    fn restart_after_stale_cookie(&mut self, staleness_us: u32, out: &mut Outbox) {
        let Some(mut init) = self.init_sent.take() else {
            return;
        };

        let increment_ms = (staleness_us / 1000 + 1).saturating_mul(2);
        init.params
            .retain(|param| !matches!(param, Parameter::CookiePreservative(_)));
        init.params.push(Parameter::CookiePreservative(increment_ms));

        self.cookie = None;
        self.peer_verification_tag = 0;
        self.set_state(AssociationState::CookieWait);
        out.packets
            .push(self.packet_with(0, vec![Chunk::Init(init.clone())]));
        self.init_sent = Some(init);
    }

    /// Queue a message for sending on a stream
    pub fn send(&mut self, stream_id: u16, ppid: u32, data: Vec<u8>, ordered: bool) -> Result<()> {
        if self.state != AssociationState::Established {
            return Err(SctpError::InvalidState(format!(
                "cannot send in {}",
                self.state
            )));
        }
        if stream_id >= self.num_outbound_streams {
            return Err(SctpError::InvalidStream(stream_id));
        }
        if data.is_empty() {
            return Err(SctpError::EmptyMessage);
        }
        if data.len() > self.peer_a_rwnd as usize {
            return Err(SctpError::MessageTooLarge { size: data.len() });
        }

        let stream_seq = if ordered {
            let seq = self.outbound_stream_seq.entry(stream_id).or_insert(0);
            let current = *seq;
            *seq = seq.wrapping_add(1);
            current
        } else {
            0
        };

        let message = SctpMessage::new(stream_id, ppid, ordered, data);
        let chunks = fragment_message(
            &message,
            stream_seq,
            self.next_tsn,
            self.config.max_fragment_size,
        );
        self.next_tsn = self.next_tsn.wrapping_add(chunks.len() as u32);

        self.logger.trace(&format!(
            "Queued {} bytes on stream {} as {} chunk(s)",
            message.data.len(),
            stream_id,
            chunks.len()
        ));
        self.send_queue.extend(chunks);
        Ok(())
    }

    /// Packets ready to go out: queued DATA bundled up to the MTU, then
    /// SHUTDOWN or SHUTDOWN-ACK once a pending shutdown has drained.
    pub fn poll_send(&mut self) -> Vec<SctpPacket> {
        let mut packets = Vec::new();

        if matches!(
            self.state,
            AssociationState::Established
                | AssociationState::ShutdownPending
                | AssociationState::ShutdownReceived
        ) {
            while !self.send_queue.is_empty() {
                let mut packet = self.packet(self.peer_verification_tag);
                let mut size = SCTP_HEADER_SIZE;

                while let Some(next) = self.send_queue.front() {
                    let chunk_len = padded_len(DATA_CHUNK_HEADER_SIZE + next.data.len());
                    if !packet.chunks.is_empty() && size + chunk_len > self.config.mtu {
                        break;
                    }
                    let Some(chunk) = self.send_queue.pop_front() else {
                        break;
                    };
                    size += chunk_len;
                    self.in_flight
                        .insert(chunk.tsn.wrapping_sub(self.local_initial_tsn), chunk.clone());
                    packet.add_chunk(Chunk::Data(chunk));
                }

                packets.push(packet);
            }
        }

        if let Some(chunk) = self.progress_shutdown() {
            packets.push(self.packet_with(self.peer_verification_tag, vec![chunk]));
        }

        packets
    }

    /// Begin a graceful shutdown. SHUTDOWN goes out immediately if nothing
    /// is queued or in flight, otherwise from a later `poll_send` or SACK.
    pub fn shutdown(&mut self) -> Result<Option<SctpPacket>> {
        match self.state {
            AssociationState::Established => {
                self.set_state(AssociationState::ShutdownPending);
                Ok(self
                    .progress_shutdown()
                    .map(|chunk| self.packet_with(self.peer_verification_tag, vec![chunk])))
            }
            state if state.is_shutting_down() => Ok(None),
            state => Err(SctpError::InvalidState(format!(
                "shutdown requested in {}",
                state
            ))),
        }
    }

    /// Tear the association down at once. Returns the ABORT to send, if
    /// the peer is known.
    pub fn abort(&mut self, reason: &str) -> Option<SctpPacket> {
        let cause = ErrorCause::UserInitiatedAbort(reason.as_bytes().to_vec());
        match self.state {
            AssociationState::Closed => None,
            AssociationState::CookieWait => {
                self.close();
                self.listener.on_aborted(&AbortReason::Local(cause));
                None
            }
            _ => Some(self.abort_with(cause.clone(), AbortReason::Local(cause))),
        }
    }

    fn progress_shutdown(&mut self) -> Option<Chunk> {
        if !self.send_queue.is_empty() || !self.in_flight.is_empty() {
            return None;
        }

        match self.state {
            AssociationState::ShutdownPending => {
                self.set_state(AssociationState::ShutdownSent);
                Some(Chunk::Shutdown {
                    cumulative_tsn: self.tsn_tracker.cumulative_tsn(),
                })
            }
            AssociationState::ShutdownReceived => {
                self.set_state(AssociationState::ShutdownAckSent);
                Some(Chunk::ShutdownAck)
            }
            _ => None,
        }
    }

    /// Build an ABORT for the peer and close
    fn abort_with(&mut self, cause: ErrorCause, reason: AbortReason) -> SctpPacket {
        self.logger
            .warn(&format!("Aborting association: {}", reason));
        let packet = self.packet_with(
            self.peer_verification_tag,
            vec![Chunk::Abort {
                t_bit: false,
                causes: vec![cause],
            }],
        );
        self.close();
        self.listener.on_aborted(&reason);
        packet
    }

    /// Enter CLOSED and drop all buffered data. Tags are kept so late
    /// replies can still be addressed.
    fn close(&mut self) {
        self.set_state(AssociationState::Closed);
        self.streams.clear();
        self.send_queue.clear();
        self.in_flight.clear();
        self.outbound_stream_seq.clear();
        self.cookie = None;
        self.init_sent = None;
    }

    fn set_state(&mut self, state: AssociationState) {
        if self.state != state {
            self.logger
                .info(&format!("State transition: {} -> {}", self.state, state));
            self.state = state;
        }
    }

    /// Whether the peer's tag is known and the association is not closed
    fn has_peer(&self) -> bool {
        !matches!(
            self.state,
            AssociationState::Closed | AssociationState::CookieWait
        )
    }

    fn advertised_window(&self) -> u32 {
        let buffered: usize = self.streams.values().map(StreamState::pending_bytes).sum();
        self.config
            .recv_window
            .saturating_sub(buffered.min(u32::MAX as usize) as u32)
    }

    fn packet(&self, verification_tag: u32) -> SctpPacket {
        SctpPacket::new(
            self.config.local_port,
            self.config.remote_port,
            verification_tag,
        )
    }

    fn packet_with(&self, verification_tag: u32, chunks: Vec<Chunk>) -> SctpPacket {
        let mut packet = self.packet(verification_tag);
        packet.chunks = chunks;
        packet
    }
}

fn random_nonzero() -> u32 {
    loop {
        let value: u32 = rand::random();
        if value != 0 {
            return value;
        }
    }
}
