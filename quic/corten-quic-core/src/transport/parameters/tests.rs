// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use super::*;
use crate::varint::VarInt;
use corten_codec::{DecoderBuffer, EncoderValue};

fn round_trip_client(params: TransportParameters) -> TransportParameters {
    let bytes = ClientTransportParameters(params).encode_to_vec();
    let (decoded, remaining) = DecoderBuffer::new(&bytes)
        .decode::<ClientTransportParameters>()
        .unwrap();
    assert!(remaining.is_empty());
    decoded.0
}

fn round_trip_server(params: TransportParameters) -> TransportParameters {
    let bytes = ServerTransportParameters(params).encode_to_vec();
    let (decoded, remaining) = DecoderBuffer::new(&bytes)
        .decode::<ServerTransportParameters>()
        .unwrap();
    assert!(remaining.is_empty());
    decoded.0
}

#[test]
fn default_round_trip_test() {
    // an empty extension yields all defaults
    let (decoded, _) = DecoderBuffer::new(&[])
        .decode::<ClientTransportParameters>()
        .unwrap();
    assert_eq!(decoded.0, TransportParameters::default());

    assert_eq!(
        round_trip_client(TransportParameters::default()),
        TransportParameters::default()
    );
}

#[test]
fn client_round_trip_test() {
    let mut params = TransportParameters::default();
    params.max_idle_timeout = VarInt::from_u16(30_000);
    params.initial_max_data = VarInt::from_u32(1 << 20);
    params.initial_max_stream_data_bidi_local = VarInt::from_u32(1 << 16);
    params.initial_max_stream_data_bidi_remote = VarInt::from_u32(1 << 16);
    params.initial_max_stream_data_uni = VarInt::from_u32(1 << 15);
    params.initial_max_streams_bidi = VarInt::from_u8(100);
    params.initial_max_streams_uni = VarInt::from_u8(3);
    params.ack_delay_exponent = 10;
    params.max_ack_delay = VarInt::from_u8(50);
    params.disable_active_migration = true;
    params.active_connection_id_limit = VarInt::from_u8(4);
    params.initial_source_connection_id =
        Some(connection::Id::try_from(&[1u8, 2, 3, 4][..]).unwrap());
    params.max_datagram_frame_size = VarInt::from_u16(1200);

    assert_eq!(round_trip_client(params), params);
}

#[test]
fn server_round_trip_test() {
    let mut params = TransportParameters::default();
    params.original_destination_connection_id =
        Some(connection::Id::try_from(&[9u8, 8, 7][..]).unwrap());
    params.retry_source_connection_id = Some(connection::Id::try_from(&[4u8; 8][..]).unwrap());
    params.stateless_reset_token = Some(stateless_reset::Token::from([0xaa; 16]));
    params.preferred_address = Some(PreferredAddress {
        ipv4_address: [192, 0, 2, 1],
        ipv4_port: 4433,
        ipv6_address: [0x20; 16],
        ipv6_port: 4434,
        connection_id: connection::Id::try_from(&[5u8; 5][..]).unwrap(),
        stateless_reset_token: stateless_reset::Token::from([0xbb; 16]),
    });

    assert_eq!(round_trip_server(params), params);
}

#[test]
fn server_only_parameter_from_client_rejected_test() {
    let mut params = TransportParameters::default();
    params.stateless_reset_token = Some(stateless_reset::Token::from([0xaa; 16]));

    let bytes = ServerTransportParameters(params).encode_to_vec();
    assert!(DecoderBuffer::new(&bytes)
        .decode::<ClientTransportParameters>()
        .is_err());
}

#[test]
fn unknown_parameter_ignored_test() {
    // a grease-style parameter id followed by max_idle_timeout
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&VarInt::from_u16(0x1b39).encode_to_vec());
    bytes.extend_from_slice(&[3, 1, 2, 3]); // length 3, opaque value
    bytes.extend_from_slice(&VarInt::from_u8(0x01).encode_to_vec());
    bytes.extend_from_slice(&[2, 0x7e, 0x80]); // 16000 as a 2-byte varint

    let (decoded, _) = DecoderBuffer::new(&bytes)
        .decode::<ClientTransportParameters>()
        .unwrap();
    assert_eq!(decoded.0.max_idle_timeout, VarInt::from_u16(16_000));
}

#[test]
fn duplicate_parameter_rejected_test() {
    let mut bytes = Vec::new();
    for _ in 0..2 {
        bytes.extend_from_slice(&VarInt::from_u8(0x01).encode_to_vec());
        bytes.extend_from_slice(&[1, 30]);
    }

    assert!(DecoderBuffer::new(&bytes)
        .decode::<ClientTransportParameters>()
        .is_err());
}

#[test]
fn invalid_values_rejected_test() {
    // ack_delay_exponent over 20
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&VarInt::from_u8(0x0a).encode_to_vec());
    bytes.extend_from_slice(&[1, 21]);
    assert!(DecoderBuffer::new(&bytes)
        .decode::<ClientTransportParameters>()
        .is_err());

    // max_udp_payload_size below 1200
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&VarInt::from_u8(0x03).encode_to_vec());
    bytes.extend_from_slice(&[2, 0x44, 0x00]); // 1024
    assert!(DecoderBuffer::new(&bytes)
        .decode::<ClientTransportParameters>()
        .is_err());

    // active_connection_id_limit below 2
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&VarInt::from_u8(0x0e).encode_to_vec());
    bytes.extend_from_slice(&[1, 1]);
    assert!(DecoderBuffer::new(&bytes)
        .decode::<ClientTransportParameters>()
        .is_err());

    // stateless reset token with the wrong length
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&VarInt::from_u8(0x02).encode_to_vec());
    bytes.extend_from_slice(&[4, 1, 2, 3, 4]);
    assert!(DecoderBuffer::new(&bytes)
        .decode::<ServerTransportParameters>()
        .is_err());
}

#[test]
fn flow_limits_test() {
    let mut params = TransportParameters::default();
    params.initial_max_data = VarInt::from_u32(4096);
    params.initial_max_streams_bidi = VarInt::from_u8(7);

    let limits = params.flow_limits();
    assert_eq!(limits.max_data, VarInt::from_u32(4096));
    assert_eq!(limits.max_streams_bidi, VarInt::from_u8(7));
    assert_eq!(limits.max_stream_data_uni, VarInt::ZERO);
}
