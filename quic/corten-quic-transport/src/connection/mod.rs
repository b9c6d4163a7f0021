// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The per-connection protocol core: packet intake, frame dispatch, the
//! lifecycle state machine, and packet assembly.
//!
//! A connection is a single-owner state machine. The host task feeds it
//! datagrams and timer ticks and drains outgoing datagrams; no other
//! component mutates it.

pub mod limits;
pub mod state;

pub use limits::Limits;
pub use state::State;

use crate::{
    flow, path,
    space::{ApplicationSpace, HandshakeSpace, InitialSpace, SpaceState},
    stream, tls, transmission,
};
use corten_codec::{DecoderBufferMut, Encoder, EncoderBuffer, EncoderValue};
use corten_quic_core::{
    connection,
    crypto::{CryptoSuite, InitialKey as _, Key as _, Level, RetryKey as _},
    endpoint,
    frame::{
        self,
        ack_elicitation::{AckElicitable, AckElicitation},
        admission,
    },
    packet::{
        self,
        encoding::{encode_long_packet, encode_short_packet},
        initial::MIN_INITIAL_DATAGRAM_LEN,
        long,
        number::PacketNumber,
        ProtectedPacket,
    },
    random,
    stream::{StreamId, StreamType},
    time::{Duration, Timer, Timestamp},
    transport::{
        self,
        parameters::{ClientTransportParameters, ServerTransportParameters, TransportParameters},
    },
    varint::VarInt,
};
use std::{collections::VecDeque, net::SocketAddr};

/// The minimum sealed payload: the header protection sample needs 16
/// bytes past the assumed 4-byte packet number
const MIN_PAYLOAD_LEN: usize = 20;

#[derive(Debug)]
struct ClosePlan {
    error_code: VarInt,
    frame_type: Option<VarInt>,
    reason: Vec<u8>,
}

impl ClosePlan {
    /// The frame to emit at `level`; application closes are masked
    /// outside 1-RTT packets
    fn frame(&self, level: Level) -> frame::ConnectionClose<&[u8]> {
        let is_application = self.frame_type.is_none();

        if is_application && level != Level::OneRtt {
            //= https://www.rfc-editor.org/rfc/rfc9000#section-10.2.3
            //# Endpoints MUST clear the value of the Reason Phrase field and
            //# SHOULD use the APPLICATION_ERROR code when converting to a
            //# CONNECTION_CLOSE of type 0x1c.
            return frame::ConnectionClose {
                error_code: transport::Error::APPLICATION_ERROR.code,
                frame_type: Some(VarInt::ZERO),
                reason: &[],
            };
        }

        frame::ConnectionClose {
            error_code: self.error_code,
            frame_type: self.frame_type,
            reason: &self.reason,
        }
    }
}

/// A record of a connection id the peer issued
#[derive(Debug, PartialEq, Eq)]
struct PeerConnectionId {
    sequence_number: VarInt,
    id: connection::Id,
    stateless_reset_token: corten_quic_core::stateless_reset::Token,
}

pub struct Connection<Tls: tls::Session> {
    local_type: endpoint::Type,
    state: State,
    error: Option<transport::Error>,
    remote_address: SocketAddr,
    local_id: connection::Id,
    peer_id: connection::Id,
    original_destination_id: connection::Id,
    retry_token: Vec<u8>,
    limits: Limits,
    local_parameters: TransportParameters,
    peer_parameters: Option<TransportParameters>,
    peer_parameters_applied: bool,
    tls: Tls,
    tls_complete: bool,
    handshake_confirmed: bool,
    handshake_done_queued: bool,
    initial: Option<InitialSpace<Tls::Suite>>,
    handshake: Option<HandshakeSpace<Tls::Suite>>,
    application: Option<ApplicationSpace<Tls::Suite>>,
    pending_zero_rtt: Option<(
        <Tls::Suite as CryptoSuite>::ZeroRttKey,
        <Tls::Suite as CryptoSuite>::ZeroRttHeaderKey,
    )>,
    tx_flow: flow::tx::Controller,
    rx_flow: flow::rx::Controller,
    streams: stream::Manager,
    paths: path::Manager,
    peer_connection_ids: Vec<PeerConnectionId>,
    /// Count of connection ids issued locally (sequence numbers below
    /// this are valid retirement targets)
    local_ids_issued: u64,
    random: Box<dyn random::Generator>,
    queue: VecDeque<transmission::Plan>,
    close_plan: Option<ClosePlan>,
    close_emitted: bool,
    idle_timer: Timer,
    draining_timer: Timer,
}

struct TlsContext<'a, S: CryptoSuite> {
    local_type: endpoint::Type,
    ack_ranges_capacity: usize,
    initial: &'a mut Option<InitialSpace<S>>,
    handshake: &'a mut Option<HandshakeSpace<S>>,
    application: &'a mut Option<ApplicationSpace<S>>,
    pending_zero_rtt: &'a mut Option<(S::ZeroRttKey, S::ZeroRttHeaderKey)>,
    peer_parameters: &'a mut Option<TransportParameters>,
    tls_complete: &'a mut bool,
}

impl<'a, S: CryptoSuite> tls::Context<S> for TlsContext<'a, S> {
    fn deliver_crypto(&mut self, level: Level, data: Vec<u8>) {
        let state = match level {
            Level::Initial => self.initial.as_mut().map(|space| &mut space.state),
            Level::Handshake => self.handshake.as_mut().map(|space| &mut space.state),
            Level::ZeroRtt | Level::OneRtt => {
                self.application.as_mut().map(|space| &mut space.state)
            }
        };

        if let Some(state) = state {
            state.crypto.push_tx(data);
        } else {
            debug_assert!(false, "crypto data delivered before keys for {level:?}");
        }
    }

    fn install_handshake_keys(&mut self, key: S::HandshakeKey, header_key: S::HandshakeHeaderKey) {
        debug_assert!(self.handshake.is_none(), "handshake keys installed twice");
        *self.handshake = Some(HandshakeSpace::new(
            key,
            header_key,
            self.ack_ranges_capacity,
        ));
    }

    fn install_one_rtt_keys(&mut self, key: S::OneRttKey, header_key: S::OneRttHeaderKey) {
        debug_assert!(self.application.is_none(), "1-rtt keys installed twice");
        let mut space = ApplicationSpace::new(key, header_key, self.ack_ranges_capacity);
        space.zero_rtt = self.pending_zero_rtt.take();
        *self.application = Some(space);
    }

    fn install_zero_rtt_keys(&mut self, key: S::ZeroRttKey, header_key: S::ZeroRttHeaderKey) {
        if let Some(space) = self.application.as_mut() {
            space.zero_rtt = Some((key, header_key));
        } else {
            *self.pending_zero_rtt = Some((key, header_key));
        }
    }

    fn on_peer_parameters(&mut self, encoded: &[u8]) -> Result<(), transport::Error> {
        let buffer = corten_codec::DecoderBuffer::new(encoded);

        let parameters = match self.local_type {
            // a server reads the client's parameters, which must not
            // carry server-only values
            endpoint::Type::Server => {
                let (parameters, remaining) = buffer
                    .decode::<ClientTransportParameters>()
                    .map_err(|err| {
                        transport::Error::from(err).with_reason("malformed transport parameters")
                    })?;
                remaining
                    .ensure_empty()
                    .map_err(transport::Error::from)?;
                parameters.0
            }
            endpoint::Type::Client => {
                let (parameters, remaining) = buffer
                    .decode::<ServerTransportParameters>()
                    .map_err(|err| {
                        transport::Error::from(err).with_reason("malformed transport parameters")
                    })?;
                remaining
                    .ensure_empty()
                    .map_err(transport::Error::from)?;
                parameters.0
            }
        };

        *self.peer_parameters = Some(parameters);
        Ok(())
    }

    fn on_handshake_complete(&mut self) {
        *self.tls_complete = true;
    }
}

impl<Tls: tls::Session> Connection<Tls> {
    /// Starts a client connection; the first flight is queued immediately
    #[allow(clippy::too_many_arguments)]
    pub fn connect(
        remote_address: SocketAddr,
        local_id: connection::Id,
        initial_peer_id: connection::Id,
        limits: Limits,
        local_parameters: TransportParameters,
        tls: Tls,
        random: Box<dyn random::Generator>,
        now: Timestamp,
    ) -> Result<Self, transport::Error> {
        let mut connection = Self::new(
            endpoint::Type::Client,
            remote_address,
            local_id,
            initial_peer_id,
            initial_peer_id,
            limits,
            local_parameters,
            tls,
            random,
        );

        connection.state.on_handshake_start().expect("new connection is idle");
        connection.progress_tls(now)?;
        connection.arm_idle_timer(now);

        Ok(connection)
    }

    /// Accepts a server connection for a client's first Initial packet
    #[allow(clippy::too_many_arguments)]
    pub fn accept(
        remote_address: SocketAddr,
        local_id: connection::Id,
        peer_id: connection::Id,
        original_destination_id: connection::Id,
        limits: Limits,
        local_parameters: TransportParameters,
        tls: Tls,
        random: Box<dyn random::Generator>,
        now: Timestamp,
    ) -> Result<Self, transport::Error> {
        let mut connection = Self::new(
            endpoint::Type::Server,
            remote_address,
            local_id,
            peer_id,
            original_destination_id,
            limits,
            local_parameters,
            tls,
            random,
        );

        connection.state.on_handshake_start().expect("new connection is idle");
        connection.arm_idle_timer(now);

        Ok(connection)
    }

    #[allow(clippy::too_many_arguments)]
    fn new(
        local_type: endpoint::Type,
        remote_address: SocketAddr,
        local_id: connection::Id,
        peer_id: connection::Id,
        original_destination_id: connection::Id,
        limits: Limits,
        local_parameters: TransportParameters,
        tls: Tls,
        random: Box<dyn random::Generator>,
    ) -> Self {
        let (initial_key, initial_header_key) = match local_type {
            endpoint::Type::Client => {
                <Tls::Suite as CryptoSuite>::InitialKey::new_client(
                    original_destination_id.as_bytes(),
                )
            }
            endpoint::Type::Server => {
                <Tls::Suite as CryptoSuite>::InitialKey::new_server(
                    original_destination_id.as_bytes(),
                )
            }
        };

        let local_limits = local_parameters.flow_limits();

        Self {
            local_type,
            state: State::default(),
            error: None,
            remote_address,
            local_id,
            peer_id,
            original_destination_id,
            retry_token: Vec::new(),
            limits,
            local_parameters,
            peer_parameters: None,
            peer_parameters_applied: false,
            tls,
            tls_complete: false,
            handshake_confirmed: false,
            handshake_done_queued: false,
            initial: Some(InitialSpace::new(
                initial_key,
                initial_header_key,
                limits.ack_ranges_capacity,
            )),
            handshake: None,
            application: None,
            pending_zero_rtt: None,
            tx_flow: flow::tx::Controller::new(VarInt::ZERO),
            rx_flow: flow::rx::Controller::new(
                local_limits.max_data,
                local_limits.max_data,
            ),
            streams: stream::Manager::new(
                local_type,
                local_limits,
                Default::default(),
            ),
            paths: path::Manager::new(remote_address),
            peer_connection_ids: Vec::new(),
            local_ids_issued: 1,
            random,
            queue: VecDeque::new(),
            close_plan: None,
            close_emitted: false,
            idle_timer: Timer::default(),
            draining_timer: Timer::default(),
        }
    }

    // === accessors ===

    #[inline]
    pub fn state(&self) -> State {
        self.state
    }

    #[inline]
    pub fn local_id(&self) -> connection::Id {
        self.local_id
    }

    #[inline]
    pub fn peer_id(&self) -> connection::Id {
        self.peer_id
    }

    #[inline]
    pub fn remote_address(&self) -> SocketAddr {
        self.remote_address
    }

    #[inline]
    pub fn error(&self) -> Option<transport::Error> {
        self.error
    }

    #[inline]
    pub fn is_handshake_complete(&self) -> bool {
        self.tls_complete
    }

    #[inline]
    pub fn is_handshake_confirmed(&self) -> bool {
        self.handshake_confirmed
    }

    #[inline]
    pub fn peer_parameters(&self) -> Option<&TransportParameters> {
        self.peer_parameters.as_ref()
    }

    #[inline]
    pub fn local_parameters(&self) -> &TransportParameters {
        &self.local_parameters
    }

    #[inline]
    pub fn streams(&self) -> &stream::Manager {
        &self.streams
    }

    #[inline]
    pub fn paths(&self) -> &path::Manager {
        &self.paths
    }

    // === application surface ===

    /// Opens a locally initiated stream
    pub fn open_stream(&mut self, stream_type: StreamType) -> Result<StreamId, transport::Error> {
        let result = self.streams.open_local(stream_type);

        if result.is_err() {
            if let Some(limit) = self.streams.poll_blocked(stream_type) {
                self.queue
                    .push_back(transmission::Plan::StreamsBlocked(frame::StreamsBlocked {
                        stream_type,
                        stream_limit: limit,
                    }));
            }
        }

        result
    }

    /// Queues stream data for transmission, charging both flow control
    /// scopes
    pub fn send_stream_data(
        &mut self,
        id: StreamId,
        data: &[u8],
        is_fin: bool,
    ) -> Result<(), transport::Error> {
        if !self.state.is_active() {
            return Err(transport::Error::NO_ERROR.with_reason("connection is shutting down"));
        }

        let connection_blocked = !self.tx_flow.can_send(data.len());
        let stream = self
            .streams
            .stream_mut(id)
            .ok_or_else(|| transport::Error::STREAM_STATE_ERROR.with_reason("unknown stream"))?;

        if stream.stop_sending.is_some() || !stream.send.can_transmit() {
            return Err(transport::Error::STREAM_STATE_ERROR
                .with_reason("the stream is no longer writable"));
        }

        if !stream.flow.tx.can_send(data.len()) {
            if let Some(limit) = stream.flow.tx.poll_blocked() {
                self.queue.push_back(transmission::Plan::StreamDataBlocked(
                    frame::StreamDataBlocked {
                        stream_id: id.as_varint(),
                        stream_data_limit: limit,
                    },
                ));
            }
            return Err(transport::Error::FLOW_CONTROL_ERROR
                .with_reason("stream flow control window exhausted"));
        }

        if connection_blocked {
            if let Some(limit) = self.tx_flow.poll_blocked() {
                self.queue
                    .push_back(transmission::Plan::DataBlocked(frame::DataBlocked {
                        data_limit: limit,
                    }));
            }
            return Err(transport::Error::FLOW_CONTROL_ERROR
                .with_reason("connection flow control window exhausted"));
        }

        // the state transition runs before any accounting: a write after
        // a FIN must fail without shrinking the send window
        if is_fin {
            stream
                .send
                .on_fin_sent()
                .map_err(|_| transport::Error::STREAM_STATE_ERROR)?;
        } else {
            stream
                .send
                .on_send()
                .map_err(|_| transport::Error::STREAM_STATE_ERROR)?;
        }

        stream.flow.tx.on_sent(data.len())?;

        let offset = stream.tx_offset;
        stream.tx_offset = offset
            .checked_add_usize(data.len())
            .ok_or(transport::Error::INTERNAL_ERROR)?;

        self.tx_flow.on_sent(data.len())?;

        self.queue.push_back(transmission::Plan::Stream {
            id,
            offset,
            data: data.to_vec(),
            is_fin,
        });

        Ok(())
    }

    /// The application consumed received data; a window update is queued
    /// once enough of the window is used up
    pub fn on_stream_data_consumed(&mut self, len: VarInt) {
        self.rx_flow.on_data_consumed(len);
        if let Some(maximum_data) = self.rx_flow.poll_update() {
            self.queue
                .push_back(transmission::Plan::MaxData(frame::MaxData { maximum_data }));
        }
    }

    /// Closes the connection with an application error
    pub fn close(&mut self, error_code: VarInt, reason: &str, now: Timestamp) {
        if self.state.is_closed() || self.close_plan.is_some() {
            return;
        }

        let mut reason = reason.as_bytes().to_vec();
        reason.truncate(frame::connection_close::MAX_REASON_LEN);

        self.close_plan = Some(ClosePlan {
            error_code,
            frame_type: None,
            reason,
        });
        self.enter_closing(now);
    }

    /// Closes the connection with a transport error
    fn close_with(&mut self, error: transport::Error, now: Timestamp) {
        if self.error.is_none() {
            self.error = Some(error);
        }

        if self.state.is_closed() || self.close_plan.is_some() {
            return;
        }

        tracing::debug!(code = error.code.as_u64(), reason = error.reason, "closing");

        self.close_plan = Some(ClosePlan {
            error_code: error.code,
            frame_type: Some(error.frame_type.unwrap_or(VarInt::ZERO)),
            reason: error.reason.as_bytes().to_vec(),
        });
        self.enter_closing(now);
    }

    fn enter_closing(&mut self, now: Timestamp) {
        if self.state.on_closing().is_ok() {
            //= https://www.rfc-editor.org/rfc/rfc9000#section-10.2
            //# The closing and draining connection states exist to ensure
            //# that connections close cleanly and that delayed or reordered
            //# packets are properly discarded.  These states SHOULD persist
            //# for at least three times the current PTO interval
            self.draining_timer
                .set(now + self.limits.draining_duration());
            self.idle_timer.cancel();
        }
    }

    // === timers ===

    pub fn next_timeout(&self) -> Option<Timestamp> {
        let mut next: Option<Timestamp> = None;

        let mut consider = |candidate: Option<Timestamp>| {
            next = match (next, candidate) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (None, candidate) => candidate,
                (next, None) => next,
            };
        };

        consider(self.idle_timer.next_expiration());
        consider(self.draining_timer.next_expiration());
        consider(self.paths.next_timeout());
        for state in [
            self.initial.as_ref().map(|space| &space.state),
            self.handshake.as_ref().map(|space| &space.state),
            self.application.as_ref().map(|space| &space.state),
        ]
        .into_iter()
        .flatten()
        {
            consider(state.ack.next_deadline());
        }

        next
    }

    pub fn on_timeout(&mut self, now: Timestamp) {
        if self.draining_timer.poll_expiration(now) {
            self.state.on_closed();
            return;
        }

        //= https://www.rfc-editor.org/rfc/rfc9000#section-10.1
        //# If a max_idle_timeout is specified by either endpoint in its
        //# transport parameters, the connection is silently closed and its
        //# state is discarded when it remains idle for longer than the
        //# minimum of the max_idle_timeout values advertised by both
        //# endpoints.
        if self.idle_timer.poll_expiration(now) {
            tracing::debug!("idle timeout");
            self.state.on_closed();
            return;
        }

        self.paths.on_timeout(now);
    }

    fn arm_idle_timer(&mut self, now: Timestamp) {
        if self.state.is_closing() || self.state.is_closed() {
            return;
        }

        let local = self.limits.max_idle_timeout;
        let peer = self
            .peer_parameters
            .as_ref()
            .map(|parameters| Duration::from_millis(parameters.max_idle_timeout.as_u64()))
            .unwrap_or(Duration::ZERO);

        let effective = match (local.is_zero(), peer.is_zero()) {
            (true, true) => return,
            (false, true) => local,
            (true, false) => peer,
            (false, false) => local.min(peer),
        };

        self.idle_timer.set(now + effective);
    }

    // === path validation surface ===

    /// Starts validating a path to `remote_address`
    pub fn validate_path(
        &mut self,
        remote_address: SocketAddr,
        now: Timestamp,
    ) -> Result<(), transport::Error> {
        let data = self.paths.start_validation(
            remote_address,
            now,
            self.limits.path_validation_timeout,
            self.random.as_mut(),
        )?;

        self.queue
            .push_back(transmission::Plan::PathChallenge(frame::PathChallenge {
                data,
            }));
        Ok(())
    }

    /// Migrates to a previously validated path
    pub fn migrate(&mut self, remote_address: SocketAddr) -> Result<(), transport::Error> {
        self.paths.migrate(remote_address)?;
        self.remote_address = remote_address;
        Ok(())
    }

    // === receive pipeline ===

    /// Processes one UDP datagram addressed to this connection
    pub fn on_datagram(
        &mut self,
        remote_address: SocketAddr,
        payload: &mut [u8],
        now: Timestamp,
    ) -> Result<(), transport::Error> {
        if self.state.is_closed() {
            return Ok(());
        }

        if self
            .paths
            .on_datagram_received(remote_address, payload.len())
            .is_err()
        {
            tracing::trace!("datagram from an untracked path dropped");
            return Ok(());
        }

        let mut remaining = DecoderBufferMut::new(payload);
        while !remaining.is_empty() {
            let (packet, rest) = match ProtectedPacket::decode(remaining, self.local_id.len()) {
                Ok(decoded) => decoded,
                Err(_) => {
                    // an unparseable packet poisons only the rest of the
                    // datagram
                    tracing::trace!("undecodable packet dropped");
                    break;
                }
            };
            remaining = rest;

            if let Err(error) = self.on_packet(packet, remote_address, now) {
                self.close_with(error, now);
                return Err(error);
            }
        }

        self.arm_idle_timer(now);
        Ok(())
    }

    fn on_packet(
        &mut self,
        packet: ProtectedPacket<'_>,
        remote_address: SocketAddr,
        now: Timestamp,
    ) -> Result<(), transport::Error> {
        match packet {
            ProtectedPacket::Initial(packet) => self.on_initial_packet(packet, remote_address, now),
            ProtectedPacket::Handshake(packet) => {
                self.on_handshake_packet(packet, remote_address, now)
            }
            ProtectedPacket::ZeroRtt(packet) => self.on_zero_rtt_packet(packet, remote_address, now),
            ProtectedPacket::Short(packet) => self.on_short_packet(packet, remote_address, now),
            ProtectedPacket::Retry(packet) => self.on_retry_packet(packet, now),
            ProtectedPacket::VersionNegotiation(_packet) => {
                // selecting another version is out of scope; the packet is
                // authenticated by nothing and can safely be ignored
                tracing::debug!("version negotiation ignored");
                Ok(())
            }
        }
    }

    fn on_initial_packet(
        &mut self,
        packet: packet::initial::ProtectedInitial<'_>,
        remote_address: SocketAddr,
        now: Timestamp,
    ) -> Result<(), transport::Error> {
        let source_id = packet.source_connection_id;

        let Some(space) = self.initial.as_mut() else {
            // initial keys were discarded; the packet is late
            return Ok(());
        };

        let largest = space.state.rx.largest_received();
        let Ok(packet) = packet.unprotect(&space.header_key, largest) else {
            return Ok(());
        };
        let packet_number = packet.packet_number;
        let Ok(packet) = packet.decrypt(&space.key) else {
            //= https://www.rfc-editor.org/rfc/rfc9001#section-5.3
            //# These packets are discarded rather than
            //# causing the connection to fail.
            return Ok(());
        };

        if space.state.rx.on_packet_received(packet_number).is_err() {
            return Ok(());
        }

        // the peer's Initial names the id it wants to be addressed by
        self.peer_id = source_id;

        let ack_elicitation =
            self.process_payload(Level::Initial, packet.payload, remote_address, now)?;
        self.record_ack_interest(Level::Initial, packet_number, ack_elicitation, now);

        Ok(())
    }

    fn on_handshake_packet(
        &mut self,
        packet: packet::handshake::ProtectedHandshake<'_>,
        remote_address: SocketAddr,
        now: Timestamp,
    ) -> Result<(), transport::Error> {
        let Some(space) = self.handshake.as_mut() else {
            return Ok(());
        };

        let largest = space.state.rx.largest_received();
        let Ok(packet) = packet.unprotect(&space.header_key, largest) else {
            return Ok(());
        };
        let packet_number = packet.packet_number;
        let Ok(packet) = packet.decrypt(&space.key) else {
            return Ok(());
        };

        if space.state.rx.on_packet_received(packet_number).is_err() {
            return Ok(());
        }

        //= https://www.rfc-editor.org/rfc/rfc9001#section-4.9.1
        //# a client MUST discard Initial keys when it first sends a
        //# Handshake packet and a server MUST discard Initial keys when it
        //# first successfully processes a Handshake packet.
        self.initial = None;

        let ack_elicitation =
            self.process_payload(Level::Handshake, packet.payload, remote_address, now)?;
        self.record_ack_interest(Level::Handshake, packet_number, ack_elicitation, now);

        Ok(())
    }

    fn on_zero_rtt_packet(
        &mut self,
        packet: packet::zero_rtt::ProtectedZeroRtt<'_>,
        remote_address: SocketAddr,
        now: Timestamp,
    ) -> Result<(), transport::Error> {
        if self.local_type.is_client() {
            // only servers open 0-RTT data
            return Ok(());
        }

        let Some(space) = self.application.as_mut() else {
            return Ok(());
        };
        let Some((key, header_key)) = space.zero_rtt.as_ref() else {
            // 0-RTT was not accepted; the host never installed keys
            return Ok(());
        };

        let largest = space.state.rx.largest_received();
        let Ok(packet) = packet.unprotect(header_key, largest) else {
            return Ok(());
        };
        let packet_number = packet.packet_number;
        let Ok(packet) = packet.decrypt(key) else {
            return Ok(());
        };

        if space.state.rx.on_packet_received(packet_number).is_err() {
            return Ok(());
        }

        let ack_elicitation =
            self.process_payload(Level::ZeroRtt, packet.payload, remote_address, now)?;
        self.record_ack_interest(Level::ZeroRtt, packet_number, ack_elicitation, now);

        Ok(())
    }

    fn on_short_packet(
        &mut self,
        packet: packet::short::ProtectedShort<'_>,
        remote_address: SocketAddr,
        now: Timestamp,
    ) -> Result<(), transport::Error> {
        let Some(space) = self.application.as_mut() else {
            return Ok(());
        };

        let largest = space.state.rx.largest_received();
        let Ok(packet) = packet.unprotect(&space.header_key, largest) else {
            return Ok(());
        };
        let packet_number = packet.packet_number;
        let phase = packet.key_phase();

        let packet = if phase == space.keys.phase() {
            let Ok(packet) = packet.decrypt(space.keys.active()) else {
                return Ok(());
            };
            packet
        } else if largest.map_or(false, |largest| packet_number < largest) {
            //= https://www.rfc-editor.org/rfc/rfc9001#section-6.3
            //# Packets with higher packet numbers MUST be protected with
            //# either the same or newer packet protection keys than packets
            //# with lower packet numbers.
            let Some(previous) = space.keys.previous() else {
                return Ok(());
            };
            let Ok(packet) = packet.decrypt(previous) else {
                return Ok(());
            };
            packet
        } else {
            // the peer initiated a key update
            let next = space.keys.derive_next();
            let Ok(packet) = packet.decrypt(&next) else {
                return Ok(());
            };
            space.keys.rotate(next);
            packet
        };

        if space.state.rx.on_packet_received(packet_number).is_err() {
            return Ok(());
        }

        let ack_elicitation =
            self.process_payload(Level::OneRtt, packet.payload, remote_address, now)?;
        self.record_ack_interest(Level::OneRtt, packet_number, ack_elicitation, now);

        Ok(())
    }

    fn on_retry_packet(
        &mut self,
        packet: packet::retry::Retry,
        now: Timestamp,
    ) -> Result<(), transport::Error> {
        //= https://www.rfc-editor.org/rfc/rfc9000#section-17.2.5.2
        //# A client MUST accept and process at most one Retry packet for
        //# each connection attempt.
        if self.local_type.is_server()
            || !self.state.is_handshaking()
            || !self.retry_token.is_empty()
        {
            return Ok(());
        }

        let pseudo = packet.pseudo_packet(self.original_destination_id);
        if <Tls::Suite as CryptoSuite>::RetryKey::validate(&pseudo, packet.integrity_tag).is_err()
        {
            // an invalid integrity tag means the packet is off-path noise
            return Ok(());
        }

        //= https://www.rfc-editor.org/rfc/rfc9001#section-5.2
        //# The secrets used for protecting Initial packets change when a
        //# server sends a Retry packet to use the connection ID value
        //# selected by the server.
        self.retry_token = packet.retry_token.clone();
        self.peer_id = packet.source_connection_id;

        let (key, header_key) = <Tls::Suite as CryptoSuite>::InitialKey::new_client(
            packet.source_connection_id.as_bytes(),
        );

        if let Some(space) = self.initial.as_mut() {
            space.key = key;
            space.header_key = header_key;
        }

        let _ = now;
        Ok(())
    }

    fn record_ack_interest(
        &mut self,
        level: Level,
        packet_number: PacketNumber,
        ack_elicitation: AckElicitation,
        now: Timestamp,
    ) {
        let max_ack_delay = self.limits.max_ack_delay;
        if let Some(state) = self.space_state_mut(level) {
            state.ack.on_packet_received(
                packet_number,
                ack_elicitation.is_ack_eliciting(),
                now,
                max_ack_delay,
            );
        }
    }

    fn space_state_mut(&mut self, level: Level) -> Option<&mut SpaceState> {
        match level {
            Level::Initial => self.initial.as_mut().map(|space| &mut space.state),
            Level::Handshake => self.handshake.as_mut().map(|space| &mut space.state),
            Level::ZeroRtt | Level::OneRtt => {
                self.application.as_mut().map(|space| &mut space.state)
            }
        }
    }

    // === frame dispatch ===

    fn process_payload(
        &mut self,
        level: Level,
        payload: DecoderBufferMut<'_>,
        remote_address: SocketAddr,
        now: Timestamp,
    ) -> Result<AckElicitation, transport::Error> {
        let mut ack_elicitation = AckElicitation::NonEliciting;
        let mut remaining = payload;

        while !remaining.is_empty() {
            let tag = remaining.peek_byte(0)?;

            //= https://www.rfc-editor.org/rfc/rfc9000#section-12.4
            //# An endpoint MUST treat receipt of a frame in a packet type
            //# that is not permitted as a connection error of type
            //# PROTOCOL_VIOLATION.
            if !admission::is_allowed(tag, level) {
                return Err(transport::Error::PROTOCOL_VIOLATION
                    .with_frame_type(VarInt::from_u8(tag))
                    .with_reason("frame not permitted in this packet type"));
            }

            let (frame, rest) = frame::Frame::decode(remaining)?;
            remaining = rest;

            ack_elicitation = ack_elicitation.merge(frame.ack_elicitation());
            self.on_frame(level, frame, remote_address, now)?;
        }

        Ok(ack_elicitation)
    }

    fn on_frame(
        &mut self,
        level: Level,
        frame: frame::Frame<'_>,
        remote_address: SocketAddr,
        now: Timestamp,
    ) -> Result<(), transport::Error> {
        match frame {
            frame::Frame::Padding(_) | frame::Frame::Ping(_) => {}

            frame::Frame::Ack(ack) => self.on_ack_frame(level, &ack, now)?,

            frame::Frame::Crypto(crypto) => {
                let delivered = self
                    .space_state_mut(level)
                    .ok_or(transport::Error::INTERNAL_ERROR)?
                    .crypto
                    .on_crypto_frame(crypto.offset, crypto.data)?;

                if !delivered.is_empty() {
                    let mut context = TlsContext {
                        local_type: self.local_type,
                        ack_ranges_capacity: self.limits.ack_ranges_capacity,
                        initial: &mut self.initial,
                        handshake: &mut self.handshake,
                        application: &mut self.application,
                        pending_zero_rtt: &mut self.pending_zero_rtt,
                        peer_parameters: &mut self.peer_parameters,
                        tls_complete: &mut self.tls_complete,
                    };
                    self.tls.on_crypto_data(level, &delivered, &mut context)?;
                    self.on_tls_progress(now)?;
                }
            }

            frame::Frame::Stream(stream) => {
                let newly = self.streams.on_stream_frame(
                    stream.stream_id,
                    stream.offset,
                    stream.data.len(),
                    stream.is_fin,
                )?;
                self.rx_flow.on_data_received(newly)?;
            }

            frame::Frame::ResetStream(reset) => {
                let newly = self.streams.on_reset_stream(&reset)?;
                self.rx_flow.on_data_received(newly)?;
            }

            frame::Frame::StopSending(stop) => {
                if let Some(reset) = self.streams.on_stop_sending(&stop)? {
                    self.queue.push_back(transmission::Plan::ResetStream(reset));
                }
            }

            frame::Frame::MaxData(frame) => {
                self.tx_flow.on_max_data(frame.maximum_data);
            }

            frame::Frame::MaxStreamData(frame) => {
                self.streams.on_max_stream_data(&frame)?;
            }

            frame::Frame::MaxStreams(frame) => {
                self.streams
                    .on_max_streams(frame.stream_type, frame.maximum_streams);
            }

            frame::Frame::DataBlocked(frame) => {
                tracing::trace!(limit = frame.data_limit.as_u64(), "peer data blocked");
            }

            frame::Frame::StreamDataBlocked(frame) => {
                tracing::trace!(
                    stream = frame.stream_id.as_u64(),
                    "peer stream data blocked"
                );
            }

            frame::Frame::StreamsBlocked(frame) => {
                tracing::trace!(limit = frame.stream_limit.as_u64(), "peer streams blocked");
            }

            frame::Frame::NewConnectionId(frame) => self.on_new_connection_id(&frame)?,

            frame::Frame::RetireConnectionId(frame) => {
                //= https://www.rfc-editor.org/rfc/rfc9000#section-19.16
                //# Receipt of a RETIRE_CONNECTION_ID frame containing a
                //# sequence number greater than any previously sent to the
                //# peer MUST be treated as a connection error of type
                //# PROTOCOL_VIOLATION.
                if frame.sequence_number.as_u64() >= self.local_ids_issued {
                    return Err(transport::Error::PROTOCOL_VIOLATION
                        .with_reason("retirement of an unissued connection id"));
                }
            }

            frame::Frame::PathChallenge(challenge) => {
                //= https://www.rfc-editor.org/rfc/rfc9000#section-8.2.2
                //# On receiving a PATH_CHALLENGE frame, an endpoint MUST
                //# respond by echoing the data contained in the
                //# PATH_CHALLENGE frame in a PATH_RESPONSE frame.
                let data = self.paths.on_path_challenge(remote_address, challenge.data)?;
                self.queue
                    .push_back(transmission::Plan::PathResponse(frame::PathResponse {
                        data,
                    }));
            }

            frame::Frame::PathResponse(response) => {
                self.paths.on_path_response(&response.data, now);
            }

            frame::Frame::NewToken(token) => {
                //= https://www.rfc-editor.org/rfc/rfc9000#section-19.7
                //# Servers MUST treat receipt of a NEW_TOKEN frame as a
                //# connection error of type PROTOCOL_VIOLATION.
                if self.local_type.is_server() {
                    return Err(transport::Error::PROTOCOL_VIOLATION
                        .with_reason("a client must not send NEW_TOKEN"));
                }
                self.retry_token = token.token.to_vec();
            }

            frame::Frame::HandshakeDone(_) => {
                //= https://www.rfc-editor.org/rfc/rfc9000#section-19.20
                //# A server MUST treat receipt of a HANDSHAKE_DONE frame as
                //# a connection error of type PROTOCOL_VIOLATION.
                if self.local_type.is_server() {
                    return Err(transport::Error::PROTOCOL_VIOLATION
                        .with_reason("a client must not send HANDSHAKE_DONE"));
                }
                self.on_handshake_confirmed(now);
            }

            frame::Frame::ConnectionClose(close) => {
                tracing::debug!(code = close.error_code.as_u64(), "peer closed");
                self.error = Some(
                    transport::Error::new(close.error_code)
                        .with_reason("the peer closed the connection"),
                );

                //= https://www.rfc-editor.org/rfc/rfc9000#section-10.2.2
                //# An endpoint that receives a CONNECTION_CLOSE frame MAY
                //# send a single packet containing a CONNECTION_CLOSE frame
                //# before entering the draining state
                if self.close_plan.is_none() {
                    self.close_plan = Some(ClosePlan {
                        error_code: transport::Error::NO_ERROR.code,
                        frame_type: Some(VarInt::ZERO),
                        reason: Vec::new(),
                    });
                }
                self.enter_closing(now);
            }
        }

        Ok(())
    }

    fn on_ack_frame(
        &mut self,
        level: Level,
        ack: &frame::Ack<frame::ack::AckRangesDecoder<'_>>,
        now: Timestamp,
    ) -> Result<(), transport::Error> {
        let space = level.packet_number_space();
        let state = self
            .space_state_mut(level)
            .ok_or(transport::Error::INTERNAL_ERROR)?;

        let largest = ack.largest_acknowledged();

        //= https://www.rfc-editor.org/rfc/rfc9000#section-13.1
        //# An endpoint SHOULD treat receipt of an acknowledgment for a
        //# packet it did not send as a connection error of type
        //# PROTOCOL_VIOLATION
        if space.new_packet_number(largest) >= state.tx.next_unallocated() {
            return Err(transport::Error::PROTOCOL_VIOLATION
                .with_reason("acknowledgement of an unsent packet"));
        }

        state.tx.on_packet_ack(space.new_packet_number(largest));

        let _ = now;
        Ok(())
    }

    fn on_new_connection_id(
        &mut self,
        frame: &frame::NewConnectionId,
    ) -> Result<(), transport::Error> {
        if let Some(existing) = self
            .peer_connection_ids
            .iter()
            .find(|entry| entry.sequence_number == frame.sequence_number)
        {
            //= https://www.rfc-editor.org/rfc/rfc9000#section-19.15
            //# if a sequence number is used for different connection
            //# IDs, the endpoint MAY treat that receipt as a connection error
            //# of type PROTOCOL_VIOLATION.
            if existing.id != frame.connection_id
                || existing.stateless_reset_token != frame.stateless_reset_token
            {
                return Err(transport::Error::PROTOCOL_VIOLATION
                    .with_reason("connection id sequence number reused"));
            }
            return Ok(());
        }

        self.peer_connection_ids.push(PeerConnectionId {
            sequence_number: frame.sequence_number,
            id: frame.connection_id,
            stateless_reset_token: frame.stateless_reset_token,
        });

        // entries below retire_prior_to are dropped and retired
        let retire_prior_to = frame.retire_prior_to;
        self.peer_connection_ids
            .retain(|entry| entry.sequence_number >= retire_prior_to);

        Ok(())
    }

    // === TLS progression ===

    fn progress_tls(&mut self, now: Timestamp) -> Result<(), transport::Error> {
        let mut context = TlsContext {
            local_type: self.local_type,
            ack_ranges_capacity: self.limits.ack_ranges_capacity,
            initial: &mut self.initial,
            handshake: &mut self.handshake,
            application: &mut self.application,
            pending_zero_rtt: &mut self.pending_zero_rtt,
            peer_parameters: &mut self.peer_parameters,
            tls_complete: &mut self.tls_complete,
        };
        self.tls.poll(&mut context)?;
        self.on_tls_progress(now)
    }

    fn on_tls_progress(&mut self, now: Timestamp) -> Result<(), transport::Error> {
        if !self.peer_parameters_applied {
            if let Some(parameters) = self.peer_parameters {
                self.apply_peer_parameters(&parameters)?;
                self.peer_parameters_applied = true;
                self.arm_idle_timer(now);
            }
        }

        if self.tls_complete && self.local_type.is_server() && !self.handshake_done_queued {
            //= https://www.rfc-editor.org/rfc/rfc9000#section-19.20
            //# The server MUST NOT send a HANDSHAKE_DONE frame before
            //# completing the handshake.
            self.handshake_done_queued = true;
            self.queue.push_back(transmission::Plan::HandshakeDone);
            self.on_handshake_confirmed(now);
        }

        Ok(())
    }

    fn on_handshake_confirmed(&mut self, now: Timestamp) {
        if self.handshake_confirmed {
            return;
        }

        self.handshake_confirmed = true;

        //= https://www.rfc-editor.org/rfc/rfc9001#section-4.9.2
        //# An endpoint MUST discard its Handshake keys when the TLS
        //# handshake is confirmed
        self.handshake = None;
        self.initial = None;

        self.paths.on_handshake_confirmed(now);

        if self.state.is_handshaking() {
            let _ = self.state.on_connected();
        }
    }

    fn apply_peer_parameters(
        &mut self,
        parameters: &TransportParameters,
    ) -> Result<(), transport::Error> {
        //= https://www.rfc-editor.org/rfc/rfc9000#section-7.3
        //# An endpoint MUST treat the absence of the
        //# initial_source_connection_id transport parameter from either
        //# endpoint or the absence of the original_destination_connection_id
        //# transport parameter from the server as a connection error of type
        //# TRANSPORT_PARAMETER_ERROR.
        let source_id = parameters.initial_source_connection_id.ok_or_else(|| {
            transport::Error::TRANSPORT_PARAMETER_ERROR
                .with_reason("initial_source_connection_id is required")
        })?;

        if source_id != self.peer_id {
            return Err(transport::Error::TRANSPORT_PARAMETER_ERROR
                .with_reason("initial_source_connection_id mismatch"));
        }

        if self.local_type.is_client() {
            let original = parameters
                .original_destination_connection_id
                .ok_or_else(|| {
                    transport::Error::TRANSPORT_PARAMETER_ERROR
                        .with_reason("original_destination_connection_id is required")
                })?;

            if original != self.original_destination_id {
                return Err(transport::Error::TRANSPORT_PARAMETER_ERROR
                    .with_reason("original_destination_connection_id mismatch"));
            }
        }

        let limits = parameters.flow_limits();
        self.tx_flow.on_max_data(limits.max_data);
        self.streams.on_peer_limits(limits);

        Ok(())
    }

    // === transmit pipeline ===

    /// Assembles the next outgoing datagram into `buffer`, returning its
    /// length
    pub fn poll_transmit(&mut self, now: Timestamp, buffer: &mut [u8]) -> Option<usize> {
        if self.state.is_closed() {
            return None;
        }

        if self.close_plan.is_some() {
            return self.transmit_close(buffer);
        }

        let mut offset = 0;

        if self.initial.is_some() {
            offset += self.transmit_initial(now, &mut buffer[offset..]);
        }

        if self.handshake.is_some() {
            offset += self.transmit_handshake(now, &mut buffer[offset..]);
        }

        if self.application.is_some() {
            offset += self.transmit_application(now, &mut buffer[offset..]);
        }

        if offset == 0 {
            return None;
        }

        self.paths.on_bytes_sent(self.remote_address, offset);
        self.arm_idle_timer(now);
        Some(offset)
    }

    fn compose_crypto_and_acks(
        state: &mut SpaceState,
        now: Timestamp,
        max_payload: usize,
    ) -> Vec<u8> {
        let mut scratch = vec![0u8; max_payload];
        let mut encoder = EncoderBuffer::new(&mut scratch);
        let mut sent_ack = false;

        if state.ack.should_transmit(now) || (state.ack.can_transmit() && state.crypto.has_tx_data())
        {
            let frame = frame::Ack {
                ack_delay: VarInt::ZERO,
                ack_ranges: state.ack.ranges(),
                ecn_counts: None,
            };
            if frame.encoding_size() <= encoder.remaining_capacity() {
                encoder.encode(&frame);
                sent_ack = true;
            }
        }

        // reserve room for the crypto frame framing itself
        while encoder.remaining_capacity() > 16 {
            let budget = encoder.remaining_capacity() - 16;
            let Some((chunk_offset, data)) = state.crypto.pop_tx(budget) else {
                break;
            };
            let frame = frame::Crypto {
                offset: VarInt::new(chunk_offset).expect("crypto offsets stay in range"),
                data: &data[..],
            };
            encoder.encode(&frame);
        }

        if sent_ack {
            state.ack.on_ack_sent();
        }

        let len = encoder.len();
        scratch.truncate(len);
        scratch
    }

    fn transmit_initial(&mut self, now: Timestamp, buffer: &mut [u8]) -> usize {
        let peer_id = self.peer_id;
        let local_id = self.local_id;
        let is_client = self.local_type.is_client();
        let token = self.retry_token.clone();

        let Some(space) = self.initial.as_mut() else {
            return 0;
        };

        let tag_len = space.key.tag_len();
        let token_prefix = VarInt::try_from(token.len())
            .map(|len| len.encoding_size())
            .unwrap_or(8);
        let header_fixed =
            1 + 4 + 1 + peer_id.len() + 1 + local_id.len() + token_prefix + token.len();
        // worst case: 4-byte length field and 4-byte packet number
        let overhead_max = header_fixed + 4 + 4 + tag_len;
        // best case: 1-byte length field and 1-byte packet number
        let overhead_min = header_fixed + 1 + 1 + tag_len;

        let max_payload = buffer.len().saturating_sub(overhead_max);
        if max_payload < MIN_PAYLOAD_LEN {
            return 0;
        }

        let mut payload = Self::compose_crypto_and_acks(&mut space.state, now, max_payload);
        if payload.is_empty() {
            return 0;
        }

        //= https://www.rfc-editor.org/rfc/rfc9000#section-14.1
        //# A client MUST expand the payload of all UDP datagrams carrying
        //# Initial packets to at least the smallest allowed maximum
        //# datagram size of 1200 bytes
        if is_client {
            // sizing against the smallest possible overhead keeps the
            // datagram at or above the floor whatever the encoder picks
            let datagram_estimate = payload.len() + overhead_min;
            if datagram_estimate < MIN_INITIAL_DATAGRAM_LEN {
                let padding =
                    (MIN_INITIAL_DATAGRAM_LEN - datagram_estimate).min(max_payload - payload.len());
                payload.resize(payload.len() + padding, 0);
            }
        } else if payload.len() < MIN_PAYLOAD_LEN {
            payload.resize(MIN_PAYLOAD_LEN, 0);
        }

        let Ok(packet_number) = space.state.tx.next() else {
            return 0;
        };

        let result = encode_long_packet(
            &space.key,
            &space.header_key,
            long::PacketType::Initial,
            long::VERSION_ONE,
            peer_id,
            local_id,
            Some(&token),
            packet_number,
            space.state.tx.largest_acknowledged(),
            &&payload[..],
            EncoderBuffer::new(buffer),
        );

        match result {
            Ok((protected, _)) => protected.len(),
            Err(error) => {
                tracing::debug!(?error, "initial packet encoding failed");
                0
            }
        }
    }

    fn transmit_handshake(&mut self, now: Timestamp, buffer: &mut [u8]) -> usize {
        let peer_id = self.peer_id;
        let local_id = self.local_id;

        let Some(space) = self.handshake.as_mut() else {
            return 0;
        };

        let overhead =
            1 + 4 + 1 + peer_id.len() + 1 + local_id.len() + 4 + 4 + space.key.tag_len();
        let max_payload = buffer.len().saturating_sub(overhead);
        if max_payload < MIN_PAYLOAD_LEN {
            return 0;
        }

        let mut payload = Self::compose_crypto_and_acks(&mut space.state, now, max_payload);
        if payload.is_empty() {
            return 0;
        }
        if payload.len() < MIN_PAYLOAD_LEN {
            payload.resize(MIN_PAYLOAD_LEN, 0);
        }

        let Ok(packet_number) = space.state.tx.next() else {
            return 0;
        };

        let result = encode_long_packet(
            &space.key,
            &space.header_key,
            long::PacketType::Handshake,
            long::VERSION_ONE,
            peer_id,
            local_id,
            None,
            packet_number,
            space.state.tx.largest_acknowledged(),
            &&payload[..],
            EncoderBuffer::new(buffer),
        );

        match result {
            Ok((protected, _)) => protected.len(),
            Err(error) => {
                tracing::debug!(?error, "handshake packet encoding failed");
                0
            }
        }
    }

    fn transmit_application(&mut self, now: Timestamp, buffer: &mut [u8]) -> usize {
        let peer_id = self.peer_id;

        let Some(space) = self.application.as_mut() else {
            return 0;
        };

        let overhead = 1 + peer_id.len() + 4 + space.keys.active().tag_len();
        let max_payload = buffer.len().saturating_sub(overhead);
        if max_payload < MIN_PAYLOAD_LEN {
            return 0;
        }

        let mut scratch = vec![0u8; max_payload];
        let mut encoder = EncoderBuffer::new(&mut scratch);
        let mut sent_ack = false;

        let has_plans = !self.queue.is_empty() || space.state.crypto.has_tx_data();

        if space.state.ack.should_transmit(now) || (space.state.ack.can_transmit() && has_plans) {
            let frame = frame::Ack {
                ack_delay: VarInt::ZERO,
                ack_ranges: space.state.ack.ranges(),
                ecn_counts: None,
            };
            if frame.encoding_size() <= encoder.remaining_capacity() {
                encoder.encode(&frame);
                sent_ack = true;
            }
        }

        // post-handshake crypto (session tickets and the like)
        while encoder.remaining_capacity() > 16 {
            let budget = encoder.remaining_capacity() - 16;
            let Some((chunk_offset, data)) = space.state.crypto.pop_tx(budget) else {
                break;
            };
            let frame = frame::Crypto {
                offset: VarInt::new(chunk_offset).expect("crypto offsets stay in range"),
                data: &data[..],
            };
            encoder.encode(&frame);
        }

        while let Some(plan) = self.queue.front() {
            let size = plan.encoding_size();
            if size > encoder.remaining_capacity() {
                break;
            }
            let plan = self.queue.pop_front().expect("front exists");
            encoder.encode(&plan);
        }

        if sent_ack {
            space.state.ack.on_ack_sent();
        }

        let len = encoder.len();
        if len == 0 {
            return 0;
        }
        scratch.truncate(len);

        let mut payload = scratch;
        if payload.len() < MIN_PAYLOAD_LEN {
            payload.resize(MIN_PAYLOAD_LEN, 0);
        }

        let Ok(packet_number) = space.state.tx.next() else {
            return 0;
        };

        let result = encode_short_packet(
            space.keys.active(),
            &space.header_key,
            false,
            space.keys.phase(),
            peer_id,
            packet_number,
            space.state.tx.largest_acknowledged(),
            &&payload[..],
            EncoderBuffer::new(buffer),
        );

        match result {
            Ok((protected, _)) => protected.len(),
            Err(error) => {
                tracing::debug!(?error, "1-rtt packet encoding failed");
                0
            }
        }
    }

    fn transmit_close(&mut self, buffer: &mut [u8]) -> Option<usize> {
        if self.close_emitted {
            return None;
        }

        let plan = self.close_plan.as_ref()?;

        //= https://www.rfc-editor.org/rfc/rfc9000#section-10.2.3
        //# A CONNECTION_CLOSE frame should be sent in a packet at the
        //# highest permitted packet number space.
        let len = if let Some(space) = self.application.as_mut() {
            let frame = plan.frame(Level::OneRtt);
            let mut payload = frame.encode_to_vec();
            if payload.len() < MIN_PAYLOAD_LEN {
                payload.resize(MIN_PAYLOAD_LEN, 0);
            }

            let packet_number = space.state.tx.next().ok()?;
            encode_short_packet(
                space.keys.active(),
                &space.header_key,
                false,
                space.keys.phase(),
                self.peer_id,
                packet_number,
                space.state.tx.largest_acknowledged(),
                &&payload[..],
                EncoderBuffer::new(buffer),
            )
            .ok()
            .map(|(protected, _)| protected.len())
        } else if let Some(space) = self.handshake.as_mut() {
            let frame = plan.frame(Level::Handshake);
            let mut payload = frame.encode_to_vec();
            if payload.len() < MIN_PAYLOAD_LEN {
                payload.resize(MIN_PAYLOAD_LEN, 0);
            }

            let packet_number = space.state.tx.next().ok()?;
            encode_long_packet(
                &space.key,
                &space.header_key,
                long::PacketType::Handshake,
                long::VERSION_ONE,
                self.peer_id,
                self.local_id,
                None,
                packet_number,
                space.state.tx.largest_acknowledged(),
                &&payload[..],
                EncoderBuffer::new(buffer),
            )
            .ok()
            .map(|(protected, _)| protected.len())
        } else if let Some(space) = self.initial.as_mut() {
            let frame = plan.frame(Level::Initial);
            let mut payload = frame.encode_to_vec();
            if payload.len() < MIN_PAYLOAD_LEN {
                payload.resize(MIN_PAYLOAD_LEN, 0);
            }

            let packet_number = space.state.tx.next().ok()?;
            encode_long_packet(
                &space.key,
                &space.header_key,
                long::PacketType::Initial,
                long::VERSION_ONE,
                self.peer_id,
                self.local_id,
                Some(&self.retry_token),
                packet_number,
                space.state.tx.largest_acknowledged(),
                &&payload[..],
                EncoderBuffer::new(buffer),
            )
            .ok()
            .map(|(protected, _)| protected.len())
        } else {
            None
        };

        if len.is_some() {
            self.close_emitted = true;
        }

        len
    }
}
