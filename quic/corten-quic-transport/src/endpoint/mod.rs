// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The endpoint: binds the host's UDP socket to connections by
//! destination connection id, accepts new connections under admission
//! control, and emits version negotiation and stateless reset packets.

use crate::{
    connection::{Connection, Limits},
    tls,
};
use corten_codec::{DecoderBuffer, EncoderValue};
use corten_quic_core::{
    connection, endpoint,
    packet::{long, version_negotiation::VersionNegotiation},
    random, stateless_reset,
    time::Timestamp,
    transport::parameters::{ClientTransportParameters, ServerTransportParameters},
};
use hashbrown::HashMap;
use std::{collections::VecDeque, net::SocketAddr};

/// Entropy from the operating system
#[derive(Debug, Default)]
pub struct OsRandom;

impl random::Generator for OsRandom {
    fn fill(&mut self, dest: &mut [u8]) {
        getrandom::getrandom(dest).expect("operating system entropy is unavailable");
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    /// New connections are refused once this many are active
    pub max_connections: usize,
    /// The length of locally issued connection ids
    pub local_id_len: usize,
    pub limits: Limits,
    pub supported_versions: Vec<long::Version>,
    /// Tokens for answering short-header packets of forgotten connections
    pub stateless_reset_tokens: Vec<(connection::Id, stateless_reset::Token)>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_connections: 1024,
            local_id_len: 8,
            limits: Limits::default(),
            supported_versions: vec![long::VERSION_ONE],
            stateless_reset_tokens: Vec::new(),
        }
    }
}

pub struct Endpoint<E: tls::Endpoint> {
    local_type: endpoint::Type,
    config: Config,
    tls: E,
    connections: HashMap<connection::Id, Connection<E::Session>>,
    /// Maps client-chosen destination ids to the local id of the
    /// connection they created
    aliases: HashMap<connection::Id, connection::Id>,
    accept_queue: VecDeque<connection::Id>,
    control_transmits: VecDeque<(SocketAddr, Vec<u8>)>,
    random: OsRandom,
}

impl<E: tls::Endpoint> Endpoint<E> {
    pub fn new_server(config: Config, tls: E) -> Self {
        Self::new(endpoint::Type::Server, config, tls)
    }

    pub fn new_client(config: Config, tls: E) -> Self {
        Self::new(endpoint::Type::Client, config, tls)
    }

    fn new(local_type: endpoint::Type, config: Config, tls: E) -> Self {
        debug_assert!(config.local_id_len <= connection::id::MAX_LEN);

        Self {
            local_type,
            config,
            tls,
            connections: HashMap::new(),
            aliases: HashMap::new(),
            accept_queue: VecDeque::new(),
            control_transmits: VecDeque::new(),
            random: OsRandom,
        }
    }

    #[inline]
    pub fn active_connections(&self) -> usize {
        self.connections.len()
    }

    #[inline]
    pub fn connection_mut(
        &mut self,
        id: connection::Id,
    ) -> Option<&mut Connection<E::Session>> {
        self.connections.get_mut(&id)
    }

    /// Takes the next accepted server connection
    pub fn poll_accept(&mut self) -> Option<connection::Id> {
        self.accept_queue.pop_front()
    }

    fn generate_id(&mut self, len: usize) -> connection::Id {
        use random::Generator as _;

        let mut bytes = [0u8; connection::id::MAX_LEN];
        self.random.fill(&mut bytes[..len]);
        connection::Id::try_from(&bytes[..len]).expect("the length is bounded")
    }

    /// Opens a client connection towards `remote_address`
    pub fn connect(
        &mut self,
        remote_address: SocketAddr,
        server_name: &str,
        now: Timestamp,
    ) -> Result<connection::Id, corten_quic_core::transport::Error> {
        let local_id = self.generate_id(self.config.local_id_len);

        //= https://www.rfc-editor.org/rfc/rfc9000#section-7.2
        //# When an Initial packet is sent by a client that has not previously
        //# received an Initial or Retry packet from the server, the client
        //# populates the Destination Connection ID field with an
        //# unpredictable value.  This Destination Connection ID MUST be at
        //# least 8 bytes in length.
        let initial_peer_id = self.generate_id(8);

        let parameters = self.config.limits.transport_parameters(local_id);
        let encoded = ClientTransportParameters(parameters).encode_to_vec();
        let session = self.tls.new_client_session(encoded, server_name);

        let connection = Connection::connect(
            remote_address,
            local_id,
            initial_peer_id,
            self.config.limits,
            parameters,
            session,
            Box::new(OsRandom),
            now,
        )?;

        self.connections.insert(local_id, connection);
        Ok(local_id)
    }

    /// Routes one datagram to its connection, or through the
    /// new-connection path
    pub fn on_datagram(&mut self, remote_address: SocketAddr, payload: &mut [u8], now: Timestamp) {
        let Some(destination_id) = self.peek_destination_id(payload) else {
            tracing::trace!("datagram with an unreadable destination id dropped");
            return;
        };

        let key = self
            .aliases
            .get(&destination_id)
            .copied()
            .unwrap_or(destination_id);

        if let Some(connection) = self.connections.get_mut(&key) {
            // per-packet errors close the connection internally
            let _ = connection.on_datagram(remote_address, payload, now);
            return;
        }

        if self.local_type.is_server() {
            self.on_unknown_datagram(remote_address, payload, now);
        } else {
            tracing::trace!("datagram for an unknown client connection dropped");
        }
    }

    fn peek_destination_id(&self, payload: &[u8]) -> Option<connection::Id> {
        let buffer = DecoderBuffer::new(payload);
        let tag = buffer.peek_byte(0).ok()?;

        if tag & 0x80 != 0 {
            // long header: tag, version, length-prefixed ids
            let buffer = buffer.skip(1 + 4).ok()?;
            let (id, _) = buffer.decode::<connection::Id>().ok()?;
            Some(id)
        } else {
            // short headers carry no id length; the endpoint knows the
            // length of the ids it issues
            let buffer = buffer.skip(1).ok()?;
            let (id, _) = buffer.decode_slice(self.config.local_id_len).ok()?;
            connection::Id::try_from(id.as_less_safe_slice()).ok()
        }
    }

    fn on_unknown_datagram(
        &mut self,
        remote_address: SocketAddr,
        payload: &mut [u8],
        now: Timestamp,
    ) {
        let tag = match payload.first() {
            Some(tag) => *tag,
            None => return,
        };

        if tag & 0x80 == 0 {
            self.on_unknown_short_packet(remote_address, payload);
            return;
        }

        // long header: read version, destination and source ids
        let header = {
            let buffer = DecoderBuffer::new(payload);
            let parse = || -> Option<(long::Version, connection::Id, connection::Id)> {
                let buffer = buffer.skip(1).ok()?;
                let (version, buffer) = buffer.decode::<long::Version>().ok()?;
                let (destination_id, buffer) = buffer.decode::<connection::Id>().ok()?;
                let (source_id, _) = buffer.decode::<connection::Id>().ok()?;
                Some((version, destination_id, source_id))
            };
            parse()
        };
        let Some((version, destination_id, source_id)) = header else {
            return;
        };

        //= https://www.rfc-editor.org/rfc/rfc9000#section-6.1
        //# If a server receives a packet that indicates an unsupported
        //# version and if the packet is large enough to initiate a new
        //# connection for any supported version, the server SHOULD send a
        //# Version Negotiation packet
        if !self.config.supported_versions.contains(&version) {
            let packet = VersionNegotiation {
                destination_connection_id: source_id,
                source_connection_id: destination_id,
                supported_versions: self.config.supported_versions.clone(),
            };
            self.control_transmits
                .push_back((remote_address, packet.encode_to_vec()));
            return;
        }

        // only Initial packets may create connections
        if !matches!(long::PacketType::from_tag(tag), long::PacketType::Initial) {
            tracing::trace!("non-initial packet for an unknown connection dropped");
            return;
        }

        // admission control
        if self.connections.len() >= self.config.max_connections {
            tracing::debug!("connection refused: endpoint at capacity");
            return;
        }

        let local_id = self.generate_id(self.config.local_id_len);
        let mut parameters = self.config.limits.transport_parameters(local_id);
        //= https://www.rfc-editor.org/rfc/rfc9000#section-18.2
        //# This parameter is the value of the Destination Connection ID
        //# field from the first Initial packet sent by the client
        parameters.original_destination_connection_id = Some(destination_id);

        let encoded = ServerTransportParameters(parameters).encode_to_vec();
        let session = self.tls.new_server_session(encoded);

        let connection = match Connection::accept(
            remote_address,
            local_id,
            source_id,
            destination_id,
            self.config.limits,
            parameters,
            session,
            Box::new(OsRandom),
            now,
        ) {
            Ok(connection) => connection,
            Err(error) => {
                tracing::debug!(?error, "accept failed");
                return;
            }
        };

        self.connections.insert(local_id, connection);
        self.aliases.insert(destination_id, local_id);
        self.accept_queue.push_back(local_id);

        // hand the triggering datagram to the new connection
        if let Some(connection) = self.connections.get_mut(&local_id) {
            let _ = connection.on_datagram(remote_address, payload, now);
        }
    }

    fn on_unknown_short_packet(&mut self, remote_address: SocketAddr, payload: &[u8]) {
        let Some(destination_id) = self.peek_destination_id(payload) else {
            return;
        };

        //= https://www.rfc-editor.org/rfc/rfc9000#section-10.3
        //# An endpoint that receives packets that it cannot process sends a
        //# packet in the following layout
        let token = self
            .config
            .stateless_reset_tokens
            .iter()
            .find(|(id, _)| *id == destination_id)
            .map(|(_, token)| *token);

        let Some(token) = token else {
            tracing::trace!("short packet for an unknown connection dropped");
            return;
        };

        use random::Generator as _;

        // unpredictable bits that parse like a short header, token last
        let mut packet = vec![0u8; 41];
        self.random.fill(&mut packet);
        packet[0] = (packet[0] & 0x3f) | 0x40;
        let token_start = packet.len() - stateless_reset::TOKEN_LEN;
        packet[token_start..].copy_from_slice(token.as_bytes());

        self.control_transmits.push_back((remote_address, packet));
    }

    /// Drains the next outgoing datagram
    pub fn poll_transmit(
        &mut self,
        now: Timestamp,
        buffer: &mut [u8],
    ) -> Option<(SocketAddr, usize)> {
        if let Some((remote_address, packet)) = self.control_transmits.pop_front() {
            let len = packet.len().min(buffer.len());
            buffer[..len].copy_from_slice(&packet[..len]);
            return Some((remote_address, len));
        }

        for connection in self.connections.values_mut() {
            if let Some(len) = connection.poll_transmit(now, buffer) {
                return Some((connection.remote_address(), len));
            }
        }

        None
    }

    pub fn next_timeout(&self) -> Option<Timestamp> {
        self.connections
            .values()
            .filter_map(|connection| connection.next_timeout())
            .min()
    }

    /// Fires timers and reaps closed connections
    pub fn on_timeout(&mut self, now: Timestamp) {
        for connection in self.connections.values_mut() {
            connection.on_timeout(now);
        }

        let closed: Vec<connection::Id> = self
            .connections
            .iter()
            .filter(|(_, connection)| connection.state().is_closed())
            .map(|(id, _)| *id)
            .collect();

        for id in closed {
            self.connections.remove(&id);
            self.aliases.retain(|_, local| *local != id);
        }
    }
}

#[cfg(test)]
mod tests;
