// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Codec for the quic_transport_parameters TLS extension

use crate::{connection, stateless_reset, varint::VarInt};
use corten_codec::{
    decoder_invariant, decoder_value, DecoderBuffer, DecoderError, Encoder, EncoderValue,
};

//= https://www.rfc-editor.org/rfc/rfc9000#section-18
//# The extension_data field of the quic_transport_parameters extension
//# defined in [QUIC-TLS] contains the QUIC transport parameters.  They
//# are encoded as a sequence of transport parameters, as shown in
//# Figure 20:
//#
//# Transport Parameter {
//#   Transport Parameter ID (i),
//#   Transport Parameter Length (i),
//#   Transport Parameter Value (..),
//# }

mod id {
    use crate::varint::VarInt;

    pub const ORIGINAL_DESTINATION_CONNECTION_ID: VarInt = VarInt::from_u8(0x00);
    pub const MAX_IDLE_TIMEOUT: VarInt = VarInt::from_u8(0x01);
    pub const STATELESS_RESET_TOKEN: VarInt = VarInt::from_u8(0x02);
    pub const MAX_UDP_PAYLOAD_SIZE: VarInt = VarInt::from_u8(0x03);
    pub const INITIAL_MAX_DATA: VarInt = VarInt::from_u8(0x04);
    pub const INITIAL_MAX_STREAM_DATA_BIDI_LOCAL: VarInt = VarInt::from_u8(0x05);
    pub const INITIAL_MAX_STREAM_DATA_BIDI_REMOTE: VarInt = VarInt::from_u8(0x06);
    pub const INITIAL_MAX_STREAM_DATA_UNI: VarInt = VarInt::from_u8(0x07);
    pub const INITIAL_MAX_STREAMS_BIDI: VarInt = VarInt::from_u8(0x08);
    pub const INITIAL_MAX_STREAMS_UNI: VarInt = VarInt::from_u8(0x09);
    pub const ACK_DELAY_EXPONENT: VarInt = VarInt::from_u8(0x0a);
    pub const MAX_ACK_DELAY: VarInt = VarInt::from_u8(0x0b);
    pub const DISABLE_ACTIVE_MIGRATION: VarInt = VarInt::from_u8(0x0c);
    pub const PREFERRED_ADDRESS: VarInt = VarInt::from_u8(0x0d);
    pub const ACTIVE_CONNECTION_ID_LIMIT: VarInt = VarInt::from_u8(0x0e);
    pub const INITIAL_SOURCE_CONNECTION_ID: VarInt = VarInt::from_u8(0x0f);
    pub const RETRY_SOURCE_CONNECTION_ID: VarInt = VarInt::from_u8(0x10);

    //= https://www.rfc-editor.org/rfc/rfc9221#section-3
    //# max_datagram_frame_size (0x20):  A variable-length integer
    pub const MAX_DATAGRAM_FRAME_SIZE: VarInt = VarInt::from_u8(0x20);
}

//= https://www.rfc-editor.org/rfc/rfc9000#section-18.2
//# A server that chooses a zero-length connection ID MUST NOT provide a
//# preferred address.  Similarly, a server MUST NOT include a zero-
//# length connection ID in this transport parameter.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PreferredAddress {
    pub ipv4_address: [u8; 4],
    pub ipv4_port: u16,
    pub ipv6_address: [u8; 16],
    pub ipv6_port: u16,
    pub connection_id: connection::Id,
    pub stateless_reset_token: stateless_reset::Token,
}

decoder_value!(
    impl<'a> PreferredAddress {
        fn decode(buffer: Buffer) -> Result<Self> {
            let (ipv4_slice, buffer) = buffer.decode_slice(4)?;
            let ipv4_address = ipv4_slice
                .as_less_safe_slice()
                .try_into()
                .expect("the length was split above");
            let (ipv4_port, buffer) = buffer.decode()?;

            let (ipv6_slice, buffer) = buffer.decode_slice(16)?;
            let ipv6_address = ipv6_slice
                .as_less_safe_slice()
                .try_into()
                .expect("the length was split above");
            let (ipv6_port, buffer) = buffer.decode()?;

            let (connection_id, buffer) = buffer.decode::<connection::Id>()?;
            decoder_invariant!(
                !connection_id.is_empty(),
                "preferred address connection id must not be empty"
            );

            let (stateless_reset_token, buffer) = buffer.decode()?;

            let address = PreferredAddress {
                ipv4_address,
                ipv4_port,
                ipv6_address,
                ipv6_port,
                connection_id,
                stateless_reset_token,
            };

            Ok((address, buffer))
        }
    }
);

impl EncoderValue for PreferredAddress {
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.write_slice(&self.ipv4_address);
        encoder.encode(&self.ipv4_port);
        encoder.write_slice(&self.ipv6_address);
        encoder.encode(&self.ipv6_port);
        encoder.encode(&self.connection_id);
        encoder.encode(&self.stateless_reset_token);
    }
}

//= https://www.rfc-editor.org/rfc/rfc9000#section-18.2
//# Those transport parameters that are identified as integers use a
//# variable-length integer encoding; see Section 16.  Transport
//# parameters have a default value of 0 if the transport parameter is
//# absent, unless otherwise stated.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransportParameters {
    /// Idle timeout in milliseconds; 0 disables the timeout
    pub max_idle_timeout: VarInt,
    pub max_udp_payload_size: VarInt,
    pub initial_max_data: VarInt,
    pub initial_max_stream_data_bidi_local: VarInt,
    pub initial_max_stream_data_bidi_remote: VarInt,
    pub initial_max_stream_data_uni: VarInt,
    pub initial_max_streams_bidi: VarInt,
    pub initial_max_streams_uni: VarInt,
    pub ack_delay_exponent: u8,
    /// Maximum acknowledgement delay in milliseconds
    pub max_ack_delay: VarInt,
    pub disable_active_migration: bool,
    pub active_connection_id_limit: VarInt,
    pub initial_source_connection_id: Option<connection::Id>,
    pub original_destination_connection_id: Option<connection::Id>,
    pub retry_source_connection_id: Option<connection::Id>,
    pub stateless_reset_token: Option<stateless_reset::Token>,
    pub preferred_address: Option<PreferredAddress>,
    /// 0 means DATAGRAM frames are not accepted
    pub max_datagram_frame_size: VarInt,
}

pub const DEFAULT_MAX_UDP_PAYLOAD_SIZE: u16 = 65527;
pub const MIN_MAX_UDP_PAYLOAD_SIZE: u16 = 1200;
pub const DEFAULT_ACK_DELAY_EXPONENT: u8 = 3;
pub const MAX_ACK_DELAY_EXPONENT: u8 = 20;
pub const DEFAULT_MAX_ACK_DELAY_MS: u16 = 25;
pub const DEFAULT_ACTIVE_CONNECTION_ID_LIMIT: u8 = 2;

impl Default for TransportParameters {
    fn default() -> Self {
        Self {
            max_idle_timeout: VarInt::ZERO,
            max_udp_payload_size: VarInt::from_u16(DEFAULT_MAX_UDP_PAYLOAD_SIZE),
            initial_max_data: VarInt::ZERO,
            initial_max_stream_data_bidi_local: VarInt::ZERO,
            initial_max_stream_data_bidi_remote: VarInt::ZERO,
            initial_max_stream_data_uni: VarInt::ZERO,
            initial_max_streams_bidi: VarInt::ZERO,
            initial_max_streams_uni: VarInt::ZERO,
            ack_delay_exponent: DEFAULT_ACK_DELAY_EXPONENT,
            max_ack_delay: VarInt::from_u16(DEFAULT_MAX_ACK_DELAY_MS),
            disable_active_migration: false,
            active_connection_id_limit: VarInt::from_u8(DEFAULT_ACTIVE_CONNECTION_ID_LIMIT),
            initial_source_connection_id: None,
            original_destination_connection_id: None,
            retry_source_connection_id: None,
            stateless_reset_token: None,
            preferred_address: None,
            max_datagram_frame_size: VarInt::ZERO,
        }
    }
}

/// The initial flow control view the transport derives from the peer's
/// parameters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InitialFlowControlLimits {
    pub max_data: VarInt,
    pub max_stream_data_bidi_local: VarInt,
    pub max_stream_data_bidi_remote: VarInt,
    pub max_stream_data_uni: VarInt,
    pub max_streams_bidi: VarInt,
    pub max_streams_uni: VarInt,
}

impl TransportParameters {
    /// Extracts the initial flow-control limits advertised by these
    /// parameters
    pub fn flow_limits(&self) -> InitialFlowControlLimits {
        InitialFlowControlLimits {
            max_data: self.initial_max_data,
            max_stream_data_bidi_local: self.initial_max_stream_data_bidi_local,
            max_stream_data_bidi_remote: self.initial_max_stream_data_bidi_remote,
            max_stream_data_uni: self.initial_max_stream_data_uni,
            max_streams_bidi: self.initial_max_streams_bidi,
            max_streams_uni: self.initial_max_streams_uni,
        }
    }

    fn validate(self) -> Result<Self, DecoderError> {
        //= https://www.rfc-editor.org/rfc/rfc9000#section-18.2
        //# Values above 20 are invalid.
        decoder_invariant!(
            self.ack_delay_exponent <= MAX_ACK_DELAY_EXPONENT,
            "ack_delay_exponent must not exceed 20"
        );

        //= https://www.rfc-editor.org/rfc/rfc9000#section-18.2
        //# Values of 2^14 or greater are invalid.
        decoder_invariant!(
            self.max_ack_delay < (1u64 << 14),
            "max_ack_delay must be less than 2^14"
        );

        //= https://www.rfc-editor.org/rfc/rfc9000#section-18.2
        //# Values below 1200 are invalid.
        decoder_invariant!(
            (MIN_MAX_UDP_PAYLOAD_SIZE as u64..=DEFAULT_MAX_UDP_PAYLOAD_SIZE as u64)
                .contains(&self.max_udp_payload_size.as_u64()),
            "max_udp_payload_size out of range"
        );

        //= https://www.rfc-editor.org/rfc/rfc9000#section-18.2
        //# The value of the active_connection_id_limit parameter MUST be at
        //# least 2.
        decoder_invariant!(
            self.active_connection_id_limit >= 2u64,
            "active_connection_id_limit must be at least 2"
        );

        Ok(self)
    }

    fn decode_inner(buffer: DecoderBuffer<'_>) -> Result<Self, DecoderError> {
        let mut params = Self::default();
        // one bit per defined parameter id, for duplicate rejection
        let mut seen = 0u64;
        let mut buffer = buffer;

        while !buffer.is_empty() {
            let (param_id, rest) = buffer.decode::<VarInt>()?;
            let (value, rest) = rest.decode_slice_with_len_prefix::<VarInt>()?;
            buffer = rest;

            if param_id.as_u64() < 64 {
                let bit = 1u64 << param_id.as_u64();
                decoder_invariant!(seen & bit == 0, "duplicate transport parameter");
                seen |= bit;
            }

            match param_id {
                id::ORIGINAL_DESTINATION_CONNECTION_ID => {
                    params.original_destination_connection_id = Some(decode_cid(value)?);
                }
                id::MAX_IDLE_TIMEOUT => params.max_idle_timeout = decode_varint(value)?,
                id::STATELESS_RESET_TOKEN => {
                    let token = stateless_reset::Token::try_from(value.as_less_safe_slice())
                        .map_err(|_| {
                            DecoderError::InvariantViolation(
                                "stateless reset tokens are exactly 16 bytes",
                            )
                        })?;
                    params.stateless_reset_token = Some(token);
                }
                id::MAX_UDP_PAYLOAD_SIZE => params.max_udp_payload_size = decode_varint(value)?,
                id::INITIAL_MAX_DATA => params.initial_max_data = decode_varint(value)?,
                id::INITIAL_MAX_STREAM_DATA_BIDI_LOCAL => {
                    params.initial_max_stream_data_bidi_local = decode_varint(value)?;
                }
                id::INITIAL_MAX_STREAM_DATA_BIDI_REMOTE => {
                    params.initial_max_stream_data_bidi_remote = decode_varint(value)?;
                }
                id::INITIAL_MAX_STREAM_DATA_UNI => {
                    params.initial_max_stream_data_uni = decode_varint(value)?;
                }
                id::INITIAL_MAX_STREAMS_BIDI => {
                    params.initial_max_streams_bidi = decode_varint(value)?;
                }
                id::INITIAL_MAX_STREAMS_UNI => {
                    params.initial_max_streams_uni = decode_varint(value)?;
                }
                id::ACK_DELAY_EXPONENT => {
                    let value = decode_varint(value)?;
                    params.ack_delay_exponent = value
                        .as_u64()
                        .try_into()
                        .map_err(|_| DecoderError::InvariantViolation("ack_delay_exponent"))?;
                }
                id::MAX_ACK_DELAY => params.max_ack_delay = decode_varint(value)?,
                id::DISABLE_ACTIVE_MIGRATION => {
                    //= https://www.rfc-editor.org/rfc/rfc9000#section-18.2
                    //# This parameter is a zero-length value.
                    decoder_invariant!(
                        value.is_empty(),
                        "disable_active_migration carries no value"
                    );
                    params.disable_active_migration = true;
                }
                id::PREFERRED_ADDRESS => {
                    let (address, rest) = value.decode::<PreferredAddress>()?;
                    rest.ensure_empty()?;
                    params.preferred_address = Some(address);
                }
                id::ACTIVE_CONNECTION_ID_LIMIT => {
                    params.active_connection_id_limit = decode_varint(value)?;
                }
                id::INITIAL_SOURCE_CONNECTION_ID => {
                    params.initial_source_connection_id = Some(decode_cid(value)?);
                }
                id::RETRY_SOURCE_CONNECTION_ID => {
                    params.retry_source_connection_id = Some(decode_cid(value)?);
                }
                id::MAX_DATAGRAM_FRAME_SIZE => {
                    params.max_datagram_frame_size = decode_varint(value)?;
                }
                //= https://www.rfc-editor.org/rfc/rfc9000#section-7.4.2
                //# An endpoint MUST ignore transport parameters that it does
                //# not support.
                _ => continue,
            }
        }

        params.validate()
    }

    /// True when any server-only parameter is present
    fn has_server_only_parameters(&self) -> bool {
        self.original_destination_connection_id.is_some()
            || self.stateless_reset_token.is_some()
            || self.preferred_address.is_some()
            || self.retry_source_connection_id.is_some()
    }
}

fn decode_varint(value: DecoderBuffer<'_>) -> Result<VarInt, DecoderError> {
    let (value, rest) = value.decode::<VarInt>()?;
    rest.ensure_empty()?;
    Ok(value)
}

fn decode_cid(value: DecoderBuffer<'_>) -> Result<connection::Id, DecoderError> {
    // inside a transport parameter the id has no length prefix: the value
    // length is the id length
    connection::Id::try_from(value.as_less_safe_slice())
        .map_err(|_| DecoderError::InvariantViolation("connection id exceeds max length"))
}

impl EncoderValue for TransportParameters {
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        let defaults = Self::default();

        let mut write_varint = |id: VarInt, value: VarInt, default: VarInt| {
            if value != default {
                encoder.encode(&id);
                encoder.encode(&VarInt::try_from(value.encoding_size()).expect("small length"));
                encoder.encode(&value);
            }
        };

        write_varint(
            id::MAX_IDLE_TIMEOUT,
            self.max_idle_timeout,
            defaults.max_idle_timeout,
        );
        write_varint(
            id::MAX_UDP_PAYLOAD_SIZE,
            self.max_udp_payload_size,
            defaults.max_udp_payload_size,
        );
        write_varint(
            id::INITIAL_MAX_DATA,
            self.initial_max_data,
            defaults.initial_max_data,
        );
        write_varint(
            id::INITIAL_MAX_STREAM_DATA_BIDI_LOCAL,
            self.initial_max_stream_data_bidi_local,
            defaults.initial_max_stream_data_bidi_local,
        );
        write_varint(
            id::INITIAL_MAX_STREAM_DATA_BIDI_REMOTE,
            self.initial_max_stream_data_bidi_remote,
            defaults.initial_max_stream_data_bidi_remote,
        );
        write_varint(
            id::INITIAL_MAX_STREAM_DATA_UNI,
            self.initial_max_stream_data_uni,
            defaults.initial_max_stream_data_uni,
        );
        write_varint(
            id::INITIAL_MAX_STREAMS_BIDI,
            self.initial_max_streams_bidi,
            defaults.initial_max_streams_bidi,
        );
        write_varint(
            id::INITIAL_MAX_STREAMS_UNI,
            self.initial_max_streams_uni,
            defaults.initial_max_streams_uni,
        );
        write_varint(
            id::ACK_DELAY_EXPONENT,
            VarInt::from_u8(self.ack_delay_exponent),
            VarInt::from_u8(defaults.ack_delay_exponent),
        );
        write_varint(
            id::MAX_ACK_DELAY,
            self.max_ack_delay,
            defaults.max_ack_delay,
        );
        write_varint(
            id::ACTIVE_CONNECTION_ID_LIMIT,
            self.active_connection_id_limit,
            defaults.active_connection_id_limit,
        );
        write_varint(
            id::MAX_DATAGRAM_FRAME_SIZE,
            self.max_datagram_frame_size,
            defaults.max_datagram_frame_size,
        );

        if self.disable_active_migration {
            encoder.encode(&id::DISABLE_ACTIVE_MIGRATION);
            encoder.encode(&VarInt::ZERO);
        }

        let mut write_cid = |id: VarInt, value: &Option<connection::Id>| {
            if let Some(value) = value {
                encoder.encode(&id);
                encoder.encode(&VarInt::try_from(value.len()).expect("cid length is bounded"));
                encoder.write_slice(value.as_bytes());
            }
        };

        write_cid(
            id::ORIGINAL_DESTINATION_CONNECTION_ID,
            &self.original_destination_connection_id,
        );
        write_cid(
            id::INITIAL_SOURCE_CONNECTION_ID,
            &self.initial_source_connection_id,
        );
        write_cid(
            id::RETRY_SOURCE_CONNECTION_ID,
            &self.retry_source_connection_id,
        );

        if let Some(token) = &self.stateless_reset_token {
            encoder.encode(&id::STATELESS_RESET_TOKEN);
            encoder.encode(&VarInt::from_u8(stateless_reset::TOKEN_LEN as u8));
            encoder.encode(token);
        }

        if let Some(address) = &self.preferred_address {
            encoder.encode(&id::PREFERRED_ADDRESS);
            encoder.encode_with_len_prefix::<VarInt, _>(address);
        }
    }
}

//= https://www.rfc-editor.org/rfc/rfc9000#section-18.2
//# A client MUST NOT include any server-only transport parameter:
//# original_destination_connection_id, preferred_address,
//# retry_source_connection_id, or stateless_reset_token.  A server MUST
//# treat receipt of any of these transport parameters as a connection
//# error of type TRANSPORT_PARAMETER_ERROR.

/// Parameters as a client sends them
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClientTransportParameters(pub TransportParameters);

/// Parameters as a server sends them
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ServerTransportParameters(pub TransportParameters);

decoder_value!(
    impl<'a> ClientTransportParameters {
        fn decode(buffer: Buffer) -> Result<Self> {
            let len = buffer.len();
            let (slice, buffer) = buffer.decode_slice(len)?;
            let params = TransportParameters::decode_inner(slice.peek())?;

            decoder_invariant!(
                !params.has_server_only_parameters(),
                "server-only transport parameter received from a client"
            );

            Ok((ClientTransportParameters(params), buffer))
        }
    }
);

decoder_value!(
    impl<'a> ServerTransportParameters {
        fn decode(buffer: Buffer) -> Result<Self> {
            let len = buffer.len();
            let (slice, buffer) = buffer.decode_slice(len)?;
            let params = TransportParameters::decode_inner(slice.peek())?;

            Ok((ServerTransportParameters(params), buffer))
        }
    }
);

impl EncoderValue for ClientTransportParameters {
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        debug_assert!(
            !self.0.has_server_only_parameters(),
            "clients must not send server-only parameters"
        );
        self.0.encode(encoder);
    }
}

impl EncoderValue for ServerTransportParameters {
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        self.0.encode(encoder);
    }
}

#[cfg(test)]
mod tests;
