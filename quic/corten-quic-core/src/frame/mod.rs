// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Frame codecs for every RFC 9000 frame type
//!
//! Frames are a tagged variant per the wire format: decoding produces a
//! [`Frame`] borrowing its data out of the packet buffer, and each frame
//! struct encodes itself through [`EncoderValue`].

use corten_codec::{DecoderBufferMut, DecoderBufferMutResult, DecoderError};

pub mod ack_elicitation;
pub mod admission;

pub(crate) type Tag = u8;

// Implements the codec for a frame of plain varint-shaped fields
macro_rules! simple_frame_codec {
    ($name:ident { $($field:ident),* $(,)? }, $tag:expr) => {
        corten_codec::decoder_parameterized_value!(
            impl<'a> $name {
                fn decode(_tag: crate::frame::Tag, buffer: Buffer) -> Result<Self> {
                    $(
                        let ($field, buffer) = buffer.decode()?;
                    )*

                    let frame = $name { $($field),* };

                    Ok((frame, buffer))
                }
            }
        );

        impl corten_codec::EncoderValue for $name {
            #[inline]
            fn encode<E: corten_codec::Encoder>(&self, buffer: &mut E) {
                buffer.encode(&$tag);
                $(
                    buffer.encode(&self.$field);
                )*
            }
        }
    };
}

pub(crate) use simple_frame_codec;

macro_rules! frames {
    ($(#[tag($($tag:pat_param)|+)] $module:ident, $ty:ident $(<$generic:ty>)?;)*) => {
        $(
            pub mod $module;
            pub use $module::$ty;
        )*

        /// A single decoded frame, borrowing its data from the packet
        #[derive(Debug, PartialEq, Eq)]
        pub enum Frame<'a> {
            $(
                $ty($module::$ty $(<$generic>)?),
            )*
        }

        impl<'a> Frame<'a> {
            /// The frame's wire tag
            pub fn tag(&self) -> Tag {
                match self {
                    $(
                        Frame::$ty(frame) => frame.tag(),
                    )*
                }
            }

            /// Decodes the next frame out of a packet payload
            pub fn decode(buffer: DecoderBufferMut<'a>) -> DecoderBufferMutResult<'a, Frame<'a>> {
                let tag = buffer.peek_byte(0)?;

                match tag {
                    $(
                        $($tag)|+ => {
                            let buffer = buffer.skip(core::mem::size_of::<Tag>())?;
                            let (frame, buffer) = buffer.decode_parameterized(tag)?;
                            Ok((Frame::$ty(frame), buffer))
                        }
                    )*
                    //= https://www.rfc-editor.org/rfc/rfc9000#section-12.4
                    //# An endpoint MUST treat the receipt of a frame of unknown
                    //# type as a connection error of type FRAME_ENCODING_ERROR.
                    _ => Err(DecoderError::InvariantViolation("unknown frame type")),
                }
            }
        }

        impl<'a> ack_elicitation::AckElicitable for Frame<'a> {
            fn ack_elicitation(&self) -> ack_elicitation::AckElicitation {
                match self {
                    $(
                        Frame::$ty(frame) => {
                            ack_elicitation::AckElicitable::ack_elicitation(frame)
                        }
                    )*
                }
            }
        }
    };
}

frames! {
    #[tag(0x00)] padding, Padding;
    #[tag(0x01)] ping, Ping;
    #[tag(0x02 | 0x03)] ack, Ack<ack::AckRangesDecoder<'a>>;
    #[tag(0x04)] reset_stream, ResetStream;
    #[tag(0x05)] stop_sending, StopSending;
    #[tag(0x06)] crypto, Crypto<&'a [u8]>;
    #[tag(0x07)] new_token, NewToken<&'a [u8]>;
    #[tag(0x08..=0x0f)] stream, Stream<&'a [u8]>;
    #[tag(0x10)] max_data, MaxData;
    #[tag(0x11)] max_stream_data, MaxStreamData;
    #[tag(0x12 | 0x13)] max_streams, MaxStreams;
    #[tag(0x14)] data_blocked, DataBlocked;
    #[tag(0x15)] stream_data_blocked, StreamDataBlocked;
    #[tag(0x16 | 0x17)] streams_blocked, StreamsBlocked;
    #[tag(0x18)] new_connection_id, NewConnectionId;
    #[tag(0x19)] retire_connection_id, RetireConnectionId;
    #[tag(0x1a)] path_challenge, PathChallenge;
    #[tag(0x1b)] path_response, PathResponse;
    #[tag(0x1c | 0x1d)] connection_close, ConnectionClose<&'a [u8]>;
    #[tag(0x1e)] handshake_done, HandshakeDone;
}

#[cfg(test)]
mod tests;
