// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use super::*;
use crate::tls::testing::MockEndpoint;
use corten_quic_core::{
    stream::{RecvState, StreamType},
    time::{Duration, Timestamp},
    varint::VarInt,
};

fn client_addr() -> SocketAddr {
    "127.0.0.1:4433".parse().unwrap()
}

fn server_addr() -> SocketAddr {
    "127.0.0.1:443".parse().unwrap()
}

fn pair() -> (Endpoint<MockEndpoint>, Endpoint<MockEndpoint>) {
    let client = Endpoint::new_client(Config::default(), MockEndpoint);
    let server = Endpoint::new_server(Config::default(), MockEndpoint);
    (client, server)
}

/// Shuttles datagrams between the two endpoints until both go quiet
fn shuttle(
    client: &mut Endpoint<MockEndpoint>,
    server: &mut Endpoint<MockEndpoint>,
    now: Timestamp,
) {
    let mut buffer = [0u8; 1500];

    for _ in 0..32 {
        let mut progressed = false;

        while let Some((_, len)) = client.poll_transmit(now, &mut buffer) {
            progressed = true;
            server.on_datagram(client_addr(), &mut buffer[..len], now);
        }

        while let Some((_, len)) = server.poll_transmit(now, &mut buffer) {
            progressed = true;
            client.on_datagram(server_addr(), &mut buffer[..len], now);
        }

        if !progressed {
            return;
        }
    }

    panic!("the endpoints never went quiet");
}

fn handshake() -> (
    Endpoint<MockEndpoint>,
    Endpoint<MockEndpoint>,
    connection::Id,
    connection::Id,
) {
    let now = Timestamp::now();
    let (mut client, mut server) = pair();

    let client_id = client.connect(server_addr(), "test.example", now).unwrap();
    shuttle(&mut client, &mut server, now);

    let server_id = server.poll_accept().expect("a connection was accepted");

    (client, server, client_id, server_id)
}

#[test]
fn handshake_test() {
    let (mut client, mut server, client_id, server_id) = handshake();

    let client_connection = client.connection_mut(client_id).unwrap();
    assert!(client_connection.is_handshake_complete());
    assert!(client_connection.is_handshake_confirmed());
    assert!(client_connection.state().is_connected());
    assert!(client_connection.peer_parameters().is_some());

    let server_connection = server.connection_mut(server_id).unwrap();
    assert!(server_connection.is_handshake_complete());
    assert!(server_connection.is_handshake_confirmed());
    assert!(server_connection.state().is_connected());

    // the handshake validated the path on both sides
    assert!(server_connection.paths().primary().state.is_validated());
}

#[test]
fn client_initial_padding_test() {
    let now = Timestamp::now();
    let (mut client, _server) = pair();
    client.connect(server_addr(), "test.example", now).unwrap();

    let mut buffer = [0u8; 1500];
    let (_, len) = client.poll_transmit(now, &mut buffer).unwrap();

    //= https://www.rfc-editor.org/rfc/rfc9000#section-14.1
    //= type=test
    //# A client MUST expand the payload of all UDP datagrams carrying
    //# Initial packets to at least the smallest allowed maximum datagram
    //# size of 1200 bytes
    assert!(len >= 1200, "initial datagram was only {len} bytes");
}

#[test]
fn stream_data_transfer_test() {
    let (mut client, mut server, client_id, server_id) = handshake();
    let now = Timestamp::now();

    let stream_id = {
        let connection = client.connection_mut(client_id).unwrap();
        let stream_id = connection.open_stream(StreamType::Bidirectional).unwrap();
        connection
            .send_stream_data(stream_id, b"hello stream", true)
            .unwrap();
        stream_id
    };
    assert_eq!(u64::from(stream_id), 0);

    shuttle(&mut client, &mut server, now);

    let connection = server.connection_mut(server_id).unwrap();
    let stream = connection.streams().stream(stream_id).unwrap();
    assert_eq!(stream.recv, RecvState::DataRecvd);
    assert_eq!(
        stream.flow.highest_received_offset(),
        VarInt::from_u8(b"hello stream".len() as u8)
    );
    assert_eq!(
        stream.flow.final_size(),
        Some(VarInt::from_u8(b"hello stream".len() as u8))
    );
}

#[test]
fn write_after_fin_rejected_test() {
    let (mut client, _server, client_id, _) = handshake();

    let connection = client.connection_mut(client_id).unwrap();
    let stream_id = connection.open_stream(StreamType::Bidirectional).unwrap();
    connection
        .send_stream_data(stream_id, b"final", true)
        .unwrap();

    let sent_before = connection
        .streams()
        .stream(stream_id)
        .unwrap()
        .flow
        .tx
        .sent();

    let error = connection
        .send_stream_data(stream_id, b"late", false)
        .unwrap_err();
    assert_eq!(
        error.code,
        corten_quic_core::transport::Error::STREAM_STATE_ERROR.code
    );

    // the rejected write must not shrink the stream's send window
    let sent_after = connection
        .streams()
        .stream(stream_id)
        .unwrap()
        .flow
        .tx
        .sent();
    assert_eq!(sent_before, sent_after);
}

#[test]
fn stream_allocation_sequence_test() {
    let (mut client, _server, client_id, _) = handshake();

    let connection = client.connection_mut(client_id).unwrap();
    let ids: Vec<u64> = (0..3)
        .map(|_| {
            connection
                .open_stream(StreamType::Bidirectional)
                .unwrap()
                .into()
        })
        .collect();
    assert_eq!(ids, vec![0, 4, 8]);
}

#[test]
fn close_propagation_test() {
    let (mut client, mut server, client_id, server_id) = handshake();
    let now = Timestamp::now();

    client
        .connection_mut(client_id)
        .unwrap()
        .close(VarInt::from_u8(7), "goodbye", now);
    assert!(client.connection_mut(client_id).unwrap().state().is_closing());

    shuttle(&mut client, &mut server, now);

    let connection = server.connection_mut(server_id).unwrap();
    assert!(connection.state().is_closing());
    let error = connection.error().unwrap();
    assert_eq!(error.code, VarInt::from_u8(7));

    // the draining period ends both connections
    let later = now + Duration::from_secs(60);
    client.on_timeout(later);
    server.on_timeout(later);
    assert_eq!(client.active_connections(), 0);
    assert_eq!(server.active_connections(), 0);
}

#[test]
fn idle_timeout_test() {
    let (mut client, mut server, ..) = handshake();
    let now = Timestamp::now();

    // no activity past the advertised idle timeout closes silently
    let later = now + Duration::from_secs(45);
    client.on_timeout(later);
    server.on_timeout(later);

    assert_eq!(client.active_connections(), 0);
    assert_eq!(server.active_connections(), 0);
}

#[test]
fn admission_control_test() {
    let now = Timestamp::now();
    let mut client = Endpoint::new_client(Config::default(), MockEndpoint);
    let mut server = Endpoint::new_server(
        Config {
            max_connections: 0,
            ..Config::default()
        },
        MockEndpoint,
    );

    client.connect(server_addr(), "test.example", now).unwrap();
    shuttle(&mut client, &mut server, now);

    assert!(server.poll_accept().is_none());
    assert_eq!(server.active_connections(), 0);
}

#[test]
fn version_negotiation_test() {
    let now = Timestamp::now();
    let mut server = Endpoint::new_server(Config::default(), MockEndpoint);

    // a long header packet with an unsupported version
    let mut datagram = vec![0u8; 1200];
    datagram[0] = 0xc0;
    datagram[1..5].copy_from_slice(&0x1a2a_3a4au32.to_be_bytes());
    datagram[5] = 8; // dcid len
    datagram[6..14].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
    datagram[14] = 4; // scid len
    datagram[15..19].copy_from_slice(&[9, 10, 11, 12]);

    server.on_datagram(client_addr(), &mut datagram, now);

    let mut buffer = [0u8; 1500];
    let (addr, len) = server.poll_transmit(now, &mut buffer).unwrap();
    assert_eq!(addr, client_addr());

    // a version negotiation packet: long form with version zero
    assert_eq!(buffer[0] & 0x80, 0x80);
    assert_eq!(&buffer[1..5], &[0, 0, 0, 0]);
    // it echoes the client's scid as the destination
    assert_eq!(buffer[5], 4);
    assert_eq!(&buffer[6..10], &[9, 10, 11, 12]);
    let _ = len;

    // and no connection was created
    assert_eq!(server.active_connections(), 0);
}

#[test]
fn stateless_reset_test() {
    let now = Timestamp::now();
    let forgotten = connection::Id::try_from(&[7u8; 8][..]).unwrap();
    let token = stateless_reset::Token::from([0x42; 16]);

    let mut server = Endpoint::new_server(
        Config {
            stateless_reset_tokens: vec![(forgotten, token)],
            ..Config::default()
        },
        MockEndpoint,
    );

    // a short header packet for a connection this endpoint lost
    let mut datagram = vec![0u8; 64];
    datagram[0] = 0x40;
    datagram[1..9].copy_from_slice(&[7u8; 8]);

    server.on_datagram(client_addr(), &mut datagram, now);

    let mut buffer = [0u8; 1500];
    let (_, len) = server.poll_transmit(now, &mut buffer).unwrap();

    // the token rides in the final 16 bytes
    assert_eq!(&buffer[len - 16..len], token.as_bytes());
    // and the packet parses as a short header
    assert_eq!(buffer[0] & 0x80, 0);
    assert_eq!(buffer[0] & 0x40, 0x40);
}

#[test]
fn unknown_short_packet_without_token_dropped_test() {
    let now = Timestamp::now();
    let mut server = Endpoint::new_server(Config::default(), MockEndpoint);

    let mut datagram = vec![0u8; 64];
    datagram[0] = 0x40;
    datagram[1..9].copy_from_slice(&[9u8; 8]);

    server.on_datagram(client_addr(), &mut datagram, now);

    let mut buffer = [0u8; 1500];
    assert!(server.poll_transmit(now, &mut buffer).is_none());
}
