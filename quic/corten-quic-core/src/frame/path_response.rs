// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::frame::{ack_elicitation::AckElicitable, path_challenge::DATA_LEN, Tag};
use corten_codec::{decoder_parameterized_value, Encoder, EncoderValue};

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.18
//# A PATH_RESPONSE frame (type=0x1b) is sent in response to a
//# PATH_CHALLENGE frame.
//#
//# If the content of a PATH_RESPONSE frame does not match the content of
//# a PATH_CHALLENGE frame previously sent by the endpoint, the endpoint
//# MAY generate a connection error of type PROTOCOL_VIOLATION.

const TAG: Tag = 0x1b;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathResponse {
    pub data: [u8; DATA_LEN],
}

impl PathResponse {
    #[inline]
    pub fn tag(&self) -> Tag {
        TAG
    }
}

impl AckElicitable for PathResponse {}

decoder_parameterized_value!(
    impl<'a> PathResponse {
        fn decode(_tag: Tag, buffer: Buffer) -> Result<Self> {
            let (data, buffer) = buffer.decode_slice(DATA_LEN)?;
            let data = data
                .as_less_safe_slice()
                .try_into()
                .expect("the length was split above");

            Ok((PathResponse { data }, buffer))
        }
    }
);

impl EncoderValue for PathResponse {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&self.tag());
        encoder.write_slice(&self.data);
    }
}
