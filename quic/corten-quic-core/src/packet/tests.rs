// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    connection,
    crypto::testing,
    packet::{
        encoding::{encode_long_packet, encode_short_packet},
        key_phase::KeyPhase,
        long,
        number::{PacketNumberSpace, TruncatedPacketNumber},
        ProtectedPacket,
    },
    varint::VarInt,
};
use corten_codec::{DecoderBufferMut, EncoderBuffer, EncoderValue};

fn dcid() -> connection::Id {
    connection::Id::try_from(&[1u8, 2, 3, 4, 5, 6, 7, 8][..]).unwrap()
}

fn scid() -> connection::Id {
    connection::Id::try_from(&[9u8, 10, 11, 12][..]).unwrap()
}

const PAYLOAD: [u8; 32] = [0x42; 32];

#[test]
fn initial_round_trip_test() {
    let key = testing::Key::default();
    let header_key = testing::HeaderKey;
    let space = PacketNumberSpace::Initial;
    let packet_number = space.new_packet_number(VarInt::from_u8(7));
    let token = [0xaau8; 5];

    let mut bytes = [0u8; 1200];
    let buffer = EncoderBuffer::new(&mut bytes);
    let (protected, _remaining) = encode_long_packet(
        &key,
        &header_key,
        long::PacketType::Initial,
        long::VERSION_ONE,
        dcid(),
        scid(),
        Some(&token),
        packet_number,
        None,
        &&PAYLOAD[..],
        buffer,
    )
    .unwrap();
    let packet_len = protected.len();

    let decoder = DecoderBufferMut::new(&mut bytes[..packet_len]);
    let (packet, remaining) = ProtectedPacket::decode(decoder, dcid().len()).unwrap();
    assert!(remaining.is_empty());
    assert_eq!(packet.destination_connection_id(), dcid());
    assert_eq!(packet.version(), Some(long::VERSION_ONE));

    let packet = match packet {
        ProtectedPacket::Initial(packet) => packet,
        other => panic!("expected an initial packet, got {other:?}"),
    };
    assert_eq!(packet.source_connection_id, scid());
    assert_eq!(packet.token, &token[..]);

    let packet = packet.unprotect(&header_key, None).unwrap();
    assert_eq!(packet.packet_number, packet_number);

    let packet = packet.decrypt(&key).unwrap();
    assert_eq!(packet.payload.as_less_safe_slice(), &PAYLOAD[..]);
}

#[test]
fn handshake_round_trip_test() {
    let key = testing::Key::default();
    let header_key = testing::HeaderKey;
    let space = PacketNumberSpace::Handshake;
    let packet_number = space.new_packet_number(VarInt::from_u8(1));

    let mut bytes = [0u8; 256];
    let buffer = EncoderBuffer::new(&mut bytes);
    let (protected, _) = encode_long_packet(
        &key,
        &header_key,
        long::PacketType::Handshake,
        long::VERSION_ONE,
        dcid(),
        scid(),
        None,
        packet_number,
        None,
        &&PAYLOAD[..],
        buffer,
    )
    .unwrap();
    let packet_len = protected.len();

    let decoder = DecoderBufferMut::new(&mut bytes[..packet_len]);
    let (packet, _) = ProtectedPacket::decode(decoder, dcid().len()).unwrap();

    let packet = match packet {
        ProtectedPacket::Handshake(packet) => packet,
        other => panic!("expected a handshake packet, got {other:?}"),
    };

    let packet = packet.unprotect(&header_key, None).unwrap();
    let packet = packet.decrypt(&key).unwrap();
    assert_eq!(packet.packet_number, packet_number);
    assert_eq!(packet.payload.as_less_safe_slice(), &PAYLOAD[..]);
}

#[test]
fn short_round_trip_test() {
    let key = testing::Key::default();
    let header_key = testing::HeaderKey;
    let space = PacketNumberSpace::ApplicationData;
    let packet_number = space.new_packet_number(VarInt::from_u16(300));

    let mut bytes = [0u8; 256];
    let buffer = EncoderBuffer::new(&mut bytes);
    let (protected, _) = encode_short_packet(
        &key,
        &header_key,
        false,
        KeyPhase::One,
        dcid(),
        packet_number,
        None,
        &&PAYLOAD[..],
        buffer,
    )
    .unwrap();
    let packet_len = protected.len();

    let decoder = DecoderBufferMut::new(&mut bytes[..packet_len]);
    let (packet, remaining) = ProtectedPacket::decode(decoder, dcid().len()).unwrap();
    assert!(remaining.is_empty());

    let packet = match packet {
        ProtectedPacket::Short(packet) => packet,
        other => panic!("expected a short packet, got {other:?}"),
    };
    assert_eq!(packet.destination_connection_id, dcid());

    let packet = packet.unprotect(&header_key, None).unwrap();
    assert_eq!(packet.key_phase(), KeyPhase::One);

    let packet = packet.decrypt(&key).unwrap();
    assert_eq!(packet.packet_number, packet_number);
    assert_eq!(packet.payload.as_less_safe_slice(), &PAYLOAD[..]);
}

#[test]
fn coalesced_datagram_test() {
    let key = testing::Key::default();
    let header_key = testing::HeaderKey;

    let mut bytes = [0u8; 1200];

    // initial packet followed by a handshake packet followed by a short packet
    let buffer = EncoderBuffer::new(&mut bytes);
    let (initial, buffer) = encode_long_packet(
        &key,
        &header_key,
        long::PacketType::Initial,
        long::VERSION_ONE,
        dcid(),
        scid(),
        Some(&[0xaa; 4]),
        PacketNumberSpace::Initial.new_packet_number(VarInt::from_u8(0)),
        None,
        &&PAYLOAD[..],
        buffer,
    )
    .unwrap();
    let initial_len = initial.len();

    let (handshake, buffer) = encode_long_packet(
        &key,
        &header_key,
        long::PacketType::Handshake,
        long::VERSION_ONE,
        dcid(),
        scid(),
        None,
        PacketNumberSpace::Handshake.new_packet_number(VarInt::from_u8(0)),
        None,
        &&PAYLOAD[..],
        buffer,
    )
    .unwrap();
    let handshake_len = handshake.len();

    let (short, _) = encode_short_packet(
        &key,
        &header_key,
        false,
        KeyPhase::Zero,
        dcid(),
        PacketNumberSpace::ApplicationData.new_packet_number(VarInt::from_u8(0)),
        None,
        &&PAYLOAD[..],
        buffer,
    )
    .unwrap();
    let short_len = short.len();

    let datagram_len = initial_len + handshake_len + short_len;
    let decoder = DecoderBufferMut::new(&mut bytes[..datagram_len]);

    let (packet, decoder) = ProtectedPacket::decode(decoder, dcid().len()).unwrap();
    assert!(matches!(packet, ProtectedPacket::Initial(_)));

    let (packet, decoder) = ProtectedPacket::decode(decoder, dcid().len()).unwrap();
    assert!(matches!(packet, ProtectedPacket::Handshake(_)));

    let (packet, decoder) = ProtectedPacket::decode(decoder, dcid().len()).unwrap();
    assert!(matches!(packet, ProtectedPacket::Short(_)));
    assert!(decoder.is_empty());
}

#[test]
fn version_negotiation_round_trip_test() {
    let packet = super::version_negotiation::VersionNegotiation {
        destination_connection_id: dcid(),
        source_connection_id: scid(),
        supported_versions: vec![long::VERSION_ONE],
    };

    let mut bytes = packet.encode_to_vec();
    let decoder = DecoderBufferMut::new(&mut bytes);
    let (decoded, remaining) = ProtectedPacket::decode(decoder, dcid().len()).unwrap();
    assert!(remaining.is_empty());

    let decoded = match decoded {
        ProtectedPacket::VersionNegotiation(decoded) => decoded,
        other => panic!("expected a version negotiation packet, got {other:?}"),
    };
    assert_eq!(decoded.destination_connection_id, dcid());
    assert_eq!(decoded.source_connection_id, scid());
    assert_eq!(decoded.supported_versions, vec![long::VERSION_ONE]);
}

#[test]
fn retry_round_trip_test() {
    let packet = super::retry::Retry {
        tag: super::retry::TAG,
        version: long::VERSION_ONE,
        destination_connection_id: dcid(),
        source_connection_id: scid(),
        retry_token: vec![0xab; 24],
        integrity_tag: [0x5a; 16],
    };

    let mut bytes = packet.encode_to_vec();
    let decoder = DecoderBufferMut::new(&mut bytes);
    let (decoded, remaining) = ProtectedPacket::decode(decoder, dcid().len()).unwrap();
    assert!(remaining.is_empty());

    let decoded = match decoded {
        ProtectedPacket::Retry(decoded) => decoded,
        other => panic!("expected a retry packet, got {other:?}"),
    };
    assert_eq!(decoded, packet);

    // the pseudo packet prepends the length-prefixed original dcid
    let odcid = connection::Id::try_from(&crate::crypto::initial::EXAMPLE_DCID[..]).unwrap();
    let pseudo = decoded.pseudo_packet(odcid);
    assert_eq!(pseudo[0] as usize, odcid.len());
    assert_eq!(&pseudo[1..1 + odcid.len()], odcid.as_bytes());
}

#[test]
fn truncated_packet_number_survives_protection_test() {
    // a 2-byte packet number round-trips through the truncated codec
    let space = PacketNumberSpace::ApplicationData;
    let len = space.new_packet_number_len(0b01);
    assert_eq!(len.bytesize(), 2);

    let truncated = TruncatedPacketNumber::new(0x5c02, len);
    let encoded = truncated.encode_to_vec();
    assert_eq!(encoded, vec![0x5c, 0x02]);
}
