// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    frame::{ack_elicitation::AckElicitable, Tag},
    varint::VarInt,
};
use corten_codec::{decoder_parameterized_value, Encoder, EncoderValue};

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.6
//# A CRYPTO frame (type=0x06) is used to transmit cryptographic
//# handshake messages.  It can be sent in all packet types except 0-RTT.
//#
//# CRYPTO Frame {
//#   Type (i) = 0x06,
//#   Offset (i),
//#   Length (i),
//#   Crypto Data (..),
//# }

const TAG: Tag = 0x06;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Crypto<Data> {
    /// The byte offset in the cryptographic handshake stream
    pub offset: VarInt,

    /// The cryptographic message data
    pub data: Data,
}

pub type CryptoRef<'a> = Crypto<&'a [u8]>;

impl<Data> Crypto<Data> {
    #[inline]
    pub fn tag(&self) -> Tag {
        TAG
    }

    /// Converts the data from one type to another
    #[inline]
    pub fn map_data<F: FnOnce(Data) -> Out, Out>(self, map: F) -> Crypto<Out> {
        Crypto {
            offset: self.offset,
            data: map(self.data),
        }
    }
}

impl<Data> AckElicitable for Crypto<Data> {}

decoder_parameterized_value!(
    impl<'a, Data> Crypto<Data> {
        fn decode(_tag: Tag, buffer: Buffer) -> Result<Self> {
            let (offset, buffer) = buffer.decode()?;
            let (data, buffer) = buffer.decode_with_len_prefix::<VarInt, Data>()?;

            let frame = Crypto { offset, data };

            Ok((frame, buffer))
        }
    }
);

impl<Data: EncoderValue> EncoderValue for Crypto<Data> {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&self.tag());
        encoder.encode(&self.offset);
        encoder.encode_with_len_prefix::<VarInt, _>(&self.data);
    }
}
