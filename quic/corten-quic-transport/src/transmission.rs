// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Owned frames queued for transmission in 1-RTT packets

use corten_codec::{Encoder, EncoderValue};
use corten_quic_core::{frame, stream::StreamId, varint::VarInt};

#[derive(Debug)]
pub(crate) enum Plan {
    Ping,
    MaxData(frame::MaxData),
    MaxStreamData(frame::MaxStreamData),
    MaxStreams(frame::MaxStreams),
    DataBlocked(frame::DataBlocked),
    StreamDataBlocked(frame::StreamDataBlocked),
    StreamsBlocked(frame::StreamsBlocked),
    ResetStream(frame::ResetStream),
    StopSending(frame::StopSending),
    PathChallenge(frame::PathChallenge),
    PathResponse(frame::PathResponse),
    HandshakeDone,
    NewToken(Vec<u8>),
    RetireConnectionId(frame::RetireConnectionId),
    Stream {
        id: StreamId,
        offset: VarInt,
        data: Vec<u8>,
        is_fin: bool,
    },
}

impl EncoderValue for Plan {
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        match self {
            Plan::Ping => encoder.encode(&frame::Ping),
            Plan::MaxData(frame) => encoder.encode(frame),
            Plan::MaxStreamData(frame) => encoder.encode(frame),
            Plan::MaxStreams(frame) => encoder.encode(frame),
            Plan::DataBlocked(frame) => encoder.encode(frame),
            Plan::StreamDataBlocked(frame) => encoder.encode(frame),
            Plan::StreamsBlocked(frame) => encoder.encode(frame),
            Plan::ResetStream(frame) => encoder.encode(frame),
            Plan::StopSending(frame) => encoder.encode(frame),
            Plan::PathChallenge(frame) => encoder.encode(frame),
            Plan::PathResponse(frame) => encoder.encode(frame),
            Plan::HandshakeDone => encoder.encode(&frame::HandshakeDone),
            Plan::NewToken(token) => encoder.encode(&frame::NewToken { token: &token[..] }),
            Plan::RetireConnectionId(frame) => encoder.encode(frame),
            Plan::Stream {
                id,
                offset,
                data,
                is_fin,
            } => {
                let frame = frame::Stream {
                    stream_id: id.as_varint(),
                    offset: *offset,
                    is_last_frame: false,
                    is_fin: *is_fin,
                    data: &data[..],
                };
                encoder.encode(&frame);
            }
        }
    }
}
