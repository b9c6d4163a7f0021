// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    frame::{
        ack_elicitation::{AckElicitable, AckElicitation},
        Tag,
    },
    varint::VarInt,
};
use corten_codec::{decoder_invariant, decoder_parameterized_value, Encoder, EncoderValue};

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.19
//# An endpoint sends a CONNECTION_CLOSE frame (type=0x1c or 0x1d) to
//# notify its peer that the connection is being closed.  The
//# CONNECTION_CLOSE frame with a type of 0x1c is used to signal errors
//# at only the QUIC layer, or the absence of errors (with the NO_ERROR
//# code).  The CONNECTION_CLOSE frame with a type of 0x1d is used to
//# signal an error with the application that uses QUIC.

const TRANSPORT_TAG: Tag = 0x1c;
const APPLICATION_TAG: Tag = 0x1d;

/// The longest reason phrase accepted or produced, in bytes
pub const MAX_REASON_LEN: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionClose<Data> {
    pub error_code: VarInt,

    /// The type of the frame that triggered the error; present only in the
    /// transport variant (0x1c)
    pub frame_type: Option<VarInt>,

    /// Additional diagnostic detail, UTF-8
    pub reason: Data,
}

pub type ConnectionCloseRef<'a> = ConnectionClose<&'a [u8]>;

impl<Data> ConnectionClose<Data> {
    #[inline]
    pub fn tag(&self) -> Tag {
        if self.frame_type.is_some() {
            TRANSPORT_TAG
        } else {
            APPLICATION_TAG
        }
    }

    #[inline]
    pub fn is_application_close(&self) -> bool {
        self.frame_type.is_none()
    }

    #[inline]
    pub fn map_reason<F: FnOnce(Data) -> Out, Out>(self, map: F) -> ConnectionClose<Out> {
        ConnectionClose {
            error_code: self.error_code,
            frame_type: self.frame_type,
            reason: map(self.reason),
        }
    }
}

impl<Data> AckElicitable for ConnectionClose<Data> {
    #[inline]
    fn ack_elicitation(&self) -> AckElicitation {
        AckElicitation::NonEliciting
    }
}

decoder_parameterized_value!(
    impl<'a, Data> ConnectionClose<Data> {
        fn decode(tag: Tag, buffer: Buffer) -> Result<Self> {
            let (error_code, buffer) = buffer.decode()?;

            let (frame_type, buffer) = if tag == TRANSPORT_TAG {
                let (frame_type, buffer) = buffer.decode()?;
                (Some(frame_type), buffer)
            } else {
                (None, buffer)
            };

            //= https://www.rfc-editor.org/rfc/rfc9000#section-19.19
            //# Reason Phrase:  Additional diagnostic information for the
            //# closure.  This can be zero length if the sender chooses not to
            //# give details beyond the Error Code value.
            let (reason_slice, buffer) = buffer.decode_slice_with_len_prefix::<VarInt>()?;
            decoder_invariant!(
                reason_slice.len() <= MAX_REASON_LEN,
                "reason phrase too long"
            );
            let (reason, remaining) = reason_slice.decode::<Data>()?;
            remaining.ensure_empty()?;

            let frame = ConnectionClose {
                error_code,
                frame_type,
                reason,
            };

            Ok((frame, buffer))
        }
    }
);

impl<Data: EncoderValue> EncoderValue for ConnectionClose<Data> {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        debug_assert!(
            self.reason.encoding_size() <= MAX_REASON_LEN,
            "reason phrase too long"
        );

        encoder.encode(&self.tag());
        encoder.encode(&self.error_code);

        if let Some(frame_type) = self.frame_type {
            encoder.encode(&frame_type);
        }

        encoder.encode_with_len_prefix::<VarInt, _>(&self.reason);
    }
}
