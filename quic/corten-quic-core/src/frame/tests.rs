// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use super::*;
use crate::{
    ack::Ranges,
    connection, stateless_reset,
    stream::StreamType,
    varint::VarInt,
};
use crate::frame::ack::EcnCounts;
use corten_codec::{Encoder, EncoderBuffer, EncoderValue};

fn encode<F: EncoderValue>(frame: &F) -> Vec<u8> {
    frame.encode_to_vec()
}

fn decode(bytes: &mut [u8]) -> Frame<'_> {
    let buffer = DecoderBufferMut::new(bytes);
    let (frame, remaining) = Frame::decode(buffer).unwrap();
    assert!(remaining.is_empty(), "frame must consume all bytes");
    frame
}

#[test]
fn padding_round_trip_test() {
    let frame = Padding { length: 7 };
    let mut bytes = encode(&frame);
    assert_eq!(bytes.len(), 7);
    assert_eq!(decode(&mut bytes), Frame::Padding(frame));
}

#[test]
fn ping_round_trip_test() {
    let mut bytes = encode(&Ping);
    assert_eq!(bytes, vec![0x01]);
    assert_eq!(decode(&mut bytes), Frame::Ping(Ping));
}

#[test]
fn reset_stream_round_trip_test() {
    let frame = ResetStream {
        stream_id: VarInt::from_u8(3),
        application_error_code: VarInt::from_u16(0x100),
        final_size: VarInt::from_u32(77_777),
    };
    let mut bytes = encode(&frame);
    assert_eq!(decode(&mut bytes), Frame::ResetStream(frame));
}

#[test]
fn stop_sending_round_trip_test() {
    let frame = StopSending {
        stream_id: VarInt::from_u8(4),
        application_error_code: VarInt::from_u8(9),
    };
    let mut bytes = encode(&frame);
    assert_eq!(decode(&mut bytes), Frame::StopSending(frame));
}

#[test]
fn crypto_round_trip_test() {
    let data = [1u8, 2, 3, 4, 5];
    let frame = Crypto {
        offset: VarInt::from_u16(1000),
        data: &data[..],
    };
    let mut bytes = encode(&frame);

    match decode(&mut bytes) {
        Frame::Crypto(decoded) => {
            assert_eq!(decoded.offset, frame.offset);
            assert_eq!(decoded.data, &data[..]);
        }
        other => panic!("expected a crypto frame, got {other:?}"),
    }
}

#[test]
fn new_token_round_trip_test() {
    let token = [0xaau8; 16];
    let frame = NewToken { token: &token[..] };
    let mut bytes = encode(&frame);

    match decode(&mut bytes) {
        Frame::NewToken(decoded) => assert_eq!(decoded.token, &token[..]),
        other => panic!("expected a new token frame, got {other:?}"),
    }
}

#[test]
fn empty_new_token_rejected_test() {
    // tag + zero length
    let mut bytes = vec![0x07, 0x00];
    assert!(Frame::decode(DecoderBufferMut::new(&mut bytes)).is_err());
}

#[test]
fn stream_round_trip_test() {
    let data = [9u8; 11];
    let frame = Stream {
        stream_id: VarInt::from_u8(4),
        offset: VarInt::from_u16(512),
        is_last_frame: false,
        is_fin: true,
        data: &data[..],
    };
    let mut bytes = encode(&frame);

    match decode(&mut bytes) {
        Frame::Stream(decoded) => {
            assert_eq!(decoded.stream_id, frame.stream_id);
            assert_eq!(decoded.offset, frame.offset);
            assert!(decoded.is_fin);
            assert!(!decoded.is_last_frame);
            assert_eq!(decoded.data, &data[..]);
        }
        other => panic!("expected a stream frame, got {other:?}"),
    }
}

#[test]
fn stream_without_length_consumes_packet_test() {
    // LEN bit clear: the data extends to the end of the packet
    let data = [7u8; 23];
    let frame = Stream {
        stream_id: VarInt::from_u8(0),
        offset: VarInt::ZERO,
        is_last_frame: true,
        is_fin: false,
        data: &data[..],
    };
    let mut bytes = encode(&frame);
    // tag + stream id + data, no offset and no length
    assert_eq!(bytes.len(), 2 + data.len());

    match decode(&mut bytes) {
        Frame::Stream(decoded) => {
            assert!(decoded.is_last_frame);
            assert_eq!(decoded.data, &data[..]);
        }
        other => panic!("expected a stream frame, got {other:?}"),
    }
}

#[test]
fn max_data_round_trip_test() {
    let frame = MaxData {
        maximum_data: VarInt::from_u32(1 << 20),
    };
    let mut bytes = encode(&frame);
    assert_eq!(decode(&mut bytes), Frame::MaxData(frame));
}

#[test]
fn max_stream_data_round_trip_test() {
    let frame = MaxStreamData {
        stream_id: VarInt::from_u8(8),
        maximum_stream_data: VarInt::from_u32(65_536),
    };
    let mut bytes = encode(&frame);
    assert_eq!(decode(&mut bytes), Frame::MaxStreamData(frame));
}

#[test]
fn max_streams_round_trip_test() {
    for stream_type in [StreamType::Bidirectional, StreamType::Unidirectional] {
        let frame = MaxStreams {
            stream_type,
            maximum_streams: VarInt::from_u8(100),
        };
        let mut bytes = encode(&frame);
        assert_eq!(decode(&mut bytes), Frame::MaxStreams(frame));
    }
}

#[test]
fn blocked_frames_round_trip_test() {
    let frame = DataBlocked {
        data_limit: VarInt::from_u16(4096),
    };
    let mut bytes = encode(&frame);
    assert_eq!(decode(&mut bytes), Frame::DataBlocked(frame));

    let frame = StreamDataBlocked {
        stream_id: VarInt::from_u8(12),
        stream_data_limit: VarInt::from_u16(2048),
    };
    let mut bytes = encode(&frame);
    assert_eq!(decode(&mut bytes), Frame::StreamDataBlocked(frame));

    let frame = StreamsBlocked {
        stream_type: StreamType::Unidirectional,
        stream_limit: VarInt::from_u8(10),
    };
    let mut bytes = encode(&frame);
    assert_eq!(decode(&mut bytes), Frame::StreamsBlocked(frame));
}

#[test]
fn new_connection_id_round_trip_test() {
    let frame = NewConnectionId {
        sequence_number: VarInt::from_u8(5),
        retire_prior_to: VarInt::from_u8(2),
        connection_id: connection::Id::try_from(&[1u8, 2, 3, 4][..]).unwrap(),
        stateless_reset_token: stateless_reset::Token::from([0x5au8; 16]),
    };
    let mut bytes = encode(&frame);
    assert_eq!(decode(&mut bytes), Frame::NewConnectionId(frame));
}

#[test]
fn new_connection_id_retire_after_sequence_rejected_test() {
    let frame = NewConnectionId {
        sequence_number: VarInt::from_u8(1),
        retire_prior_to: VarInt::from_u8(3),
        connection_id: connection::Id::try_from(&[1u8][..]).unwrap(),
        stateless_reset_token: stateless_reset::Token::ZEROED,
    };
    let mut bytes = encode(&frame);
    assert!(Frame::decode(DecoderBufferMut::new(&mut bytes)).is_err());
}

#[test]
fn retire_connection_id_round_trip_test() {
    let frame = RetireConnectionId {
        sequence_number: VarInt::from_u8(3),
    };
    let mut bytes = encode(&frame);
    assert_eq!(decode(&mut bytes), Frame::RetireConnectionId(frame));
}

#[test]
fn path_frames_round_trip_test() {
    let frame = PathChallenge {
        data: [1, 2, 3, 4, 5, 6, 7, 8],
    };
    let mut bytes = encode(&frame);
    assert_eq!(bytes.len(), 9);
    assert_eq!(decode(&mut bytes), Frame::PathChallenge(frame));

    let frame = PathResponse {
        data: [8, 7, 6, 5, 4, 3, 2, 1],
    };
    let mut bytes = encode(&frame);
    assert_eq!(decode(&mut bytes), Frame::PathResponse(frame));
}

#[test]
fn truncated_path_challenge_rejected_test() {
    let mut bytes = vec![0x1a, 1, 2, 3];
    assert!(Frame::decode(DecoderBufferMut::new(&mut bytes)).is_err());
}

#[test]
fn connection_close_round_trip_test() {
    let reason = b"going away";
    let frame = ConnectionClose {
        error_code: VarInt::from_u8(0x0a),
        frame_type: Some(VarInt::from_u8(0x06)),
        reason: &reason[..],
    };
    let mut bytes = encode(&frame);

    match decode(&mut bytes) {
        Frame::ConnectionClose(decoded) => {
            assert_eq!(decoded.error_code, frame.error_code);
            assert_eq!(decoded.frame_type, frame.frame_type);
            assert_eq!(decoded.reason, &reason[..]);
            assert!(!decoded.is_application_close());
        }
        other => panic!("expected a connection close frame, got {other:?}"),
    }

    // the application variant omits the frame type
    let frame = ConnectionClose {
        error_code: VarInt::from_u8(1),
        frame_type: None,
        reason: &b""[..],
    };
    let mut bytes = encode(&frame);

    match decode(&mut bytes) {
        Frame::ConnectionClose(decoded) => {
            assert!(decoded.is_application_close());
            assert_eq!(decoded.tag(), 0x1d);
        }
        other => panic!("expected a connection close frame, got {other:?}"),
    }
}

#[test]
fn oversized_reason_rejected_test() {
    let reason = vec![b'x'; connection_close::MAX_REASON_LEN + 1];
    let mut bytes = Vec::new();
    bytes.push(0x1du8);
    bytes.push(0x01); // error code
    let mut len = [0u8; 8];
    let mut encoder = EncoderBuffer::new(&mut len);
    encoder.encode(&VarInt::try_from(reason.len()).unwrap());
    let len_len = encoder.len();
    bytes.extend_from_slice(&len[..len_len]);
    bytes.extend_from_slice(&reason);

    assert!(Frame::decode(DecoderBufferMut::new(&mut bytes)).is_err());
}

#[test]
fn handshake_done_round_trip_test() {
    let mut bytes = encode(&HandshakeDone);
    assert_eq!(bytes, vec![0x1e]);
    assert_eq!(decode(&mut bytes), Frame::HandshakeDone(HandshakeDone));
}

#[test]
fn ack_round_trip_test() {
    let mut ranges = Ranges::new(16);
    for pn in [1u32, 2, 3, 7, 8, 20] {
        ranges.insert(VarInt::from_u32(pn));
    }

    let frame = Ack {
        ack_delay: VarInt::from_u16(1000),
        ack_ranges: &ranges,
        ecn_counts: None,
    };
    let mut bytes = encode(&frame);

    match decode(&mut bytes) {
        Frame::Ack(decoded) => {
            assert_eq!(decoded.largest_acknowledged(), VarInt::from_u8(20));
            assert_eq!(decoded.ack_delay, VarInt::from_u16(1000));
            let decoded_ranges: Vec<_> = decoded.ack_ranges().collect();
            let expected: Vec<_> = ranges.iter_descending().collect();
            assert_eq!(decoded_ranges, expected);
            assert!(decoded.ecn_counts.is_none());
        }
        other => panic!("expected an ack frame, got {other:?}"),
    }
}

#[test]
fn ack_with_ecn_round_trip_test() {
    let mut ranges = Ranges::new(16);
    ranges.insert(VarInt::from_u8(9));

    let frame = Ack {
        ack_delay: VarInt::ZERO,
        ack_ranges: &ranges,
        ecn_counts: Some(EcnCounts {
            ect_0_count: VarInt::from_u8(1),
            ect_1_count: VarInt::from_u8(2),
            ce_count: VarInt::from_u8(3),
        }),
    };
    let mut bytes = encode(&frame);
    assert_eq!(bytes[0], 0x03);

    match decode(&mut bytes) {
        Frame::Ack(decoded) => {
            assert_eq!(decoded.ecn_counts, frame.ecn_counts);
        }
        other => panic!("expected an ack frame, got {other:?}"),
    }
}

#[test]
fn ack_range_count_bounds_test() {
    // exactly the maximum range count decodes
    let mut ranges = Ranges::new(ack::MAX_ACK_RANGES);
    for index in 0..ack::MAX_ACK_RANGES as u32 {
        ranges.insert(VarInt::from_u32(index * 2));
    }
    assert_eq!(ranges.range_count(), ack::MAX_ACK_RANGES);

    let frame = Ack {
        ack_delay: VarInt::ZERO,
        ack_ranges: &ranges,
        ecn_counts: None,
    };
    let mut bytes = encode(&frame);
    match decode(&mut bytes) {
        Frame::Ack(decoded) => {
            assert_eq!(decoded.ack_ranges().len(), ack::MAX_ACK_RANGES);
        }
        other => panic!("expected an ack frame, got {other:?}"),
    }

    // one more is refused: range count on the wire is (count - 1)
    let mut bytes = Vec::new();
    bytes.push(0x02u8);
    let mut scratch = [0u8; 32];
    let mut encoder = EncoderBuffer::new(&mut scratch);
    encoder.encode(&VarInt::from_u32(10_000)); // largest
    encoder.encode(&VarInt::ZERO); // delay
    encoder.encode(&VarInt::from_u16(ack::MAX_ACK_RANGES as u16)); // count
    let len = encoder.len();
    bytes.extend_from_slice(&scratch[..len]);
    assert!(Frame::decode(DecoderBufferMut::new(&mut bytes)).is_err());
}

#[test]
fn ack_delay_exponent_test() {
    let mut ranges = Ranges::new(4);
    ranges.insert(VarInt::from_u8(0));

    let frame = Ack {
        ack_delay: VarInt::from_u8(100),
        ack_ranges: &ranges,
        ecn_counts: None,
    };

    // the wire value is shifted by the peer's exponent
    assert_eq!(frame.ack_delay(3).as_micros(), 800);
    // saturates rather than overflowing
    assert_eq!(frame.ack_delay(63).as_micros(), u64::MAX as u128);

    // a near-maximum wire value under a valid exponent must saturate,
    // not wrap within u64
    let frame = Ack {
        ack_delay: VarInt::MAX,
        ack_ranges: &ranges,
        ecn_counts: None,
    };
    // 2 * (2^62 - 1) still fits and must come through exactly
    assert_eq!(frame.ack_delay(1).as_micros(), ((1u128 << 63) - 2));
    // 8 * (2^62 - 1) exceeds u64 and must clamp
    assert_eq!(frame.ack_delay(3).as_micros(), u64::MAX as u128);
    assert_eq!(frame.ack_delay(20).as_micros(), u64::MAX as u128);
}

#[test]
fn unknown_frame_type_rejected_test() {
    let mut bytes = vec![0x21u8, 0, 0];
    assert!(Frame::decode(DecoderBufferMut::new(&mut bytes)).is_err());
}
