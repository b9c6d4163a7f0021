// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::frame::{
    ack_elicitation::{AckElicitable, AckElicitation},
    Tag,
};
use corten_codec::{decoder_parameterized_value, Encoder, EncoderValue};

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.1
//# A PADDING frame (type=0x00) has no semantic value.  PADDING frames
//# can be used to increase the size of a packet.

const TAG: Tag = 0x00;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Padding {
    pub length: usize,
}

impl Padding {
    #[inline]
    pub fn tag(&self) -> Tag {
        TAG
    }
}

impl AckElicitable for Padding {
    #[inline]
    fn ack_elicitation(&self) -> AckElicitation {
        AckElicitation::NonEliciting
    }
}

decoder_parameterized_value!(
    impl<'a> Padding {
        fn decode(_tag: Tag, buffer: Buffer) -> Result<Self> {
            // consume the run of padding bytes in one frame value
            let mut length = 1;

            let mut remaining = buffer;
            while remaining.peek_byte(0) == Ok(TAG) {
                remaining = remaining.skip(1)?;
                length += 1;
            }

            Ok((Padding { length }, remaining))
        }
    }
);

impl EncoderValue for Padding {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.write_repeated(self.length, TAG);
    }
}
