// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    frame::{ack_elicitation::AckElicitable, Tag},
    varint::VarInt,
};
use corten_codec::{decoder_invariant, decoder_parameterized_value, Encoder, EncoderValue};

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.7
//# A server sends a NEW_TOKEN frame (type=0x07) to provide the client
//# with a token to send in the header of an Initial packet for a future
//# connection.
//#
//# NEW_TOKEN Frame {
//#   Type (i) = 0x07,
//#   Token Length (i),
//#   Token (..),
//# }

const TAG: Tag = 0x07;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NewToken<Data> {
    /// An opaque blob the client may use for a future Initial packet
    pub token: Data,
}

pub type NewTokenRef<'a> = NewToken<&'a [u8]>;

impl<Data> NewToken<Data> {
    #[inline]
    pub fn tag(&self) -> Tag {
        TAG
    }
}

impl<Data> AckElicitable for NewToken<Data> {}

decoder_parameterized_value!(
    impl<'a, Data> NewToken<Data> {
        fn decode(_tag: Tag, buffer: Buffer) -> Result<Self> {
            let before = buffer.len();
            let (token, buffer) = buffer.decode_with_len_prefix::<VarInt, Data>()?;

            //= https://www.rfc-editor.org/rfc/rfc9000#section-19.7
            //# A client MUST treat receipt of a NEW_TOKEN frame with an empty
            //# Token field as a connection error of type FRAME_ENCODING_ERROR.
            decoder_invariant!(before - buffer.len() > 1, "new token must not be empty");

            Ok((NewToken { token }, buffer))
        }
    }
);

impl<Data: EncoderValue> EncoderValue for NewToken<Data> {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&self.tag());
        encoder.encode_with_len_prefix::<VarInt, _>(&self.token);
    }
}
