// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::frame::{ack_elicitation::AckElicitable, Tag};
use corten_codec::{decoder_parameterized_value, Encoder, EncoderValue};

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.17
//# Endpoints can use PATH_CHALLENGE frames (type=0x1a) to check
//# reachability to the peer and for path validation during connection
//# migration.
//#
//# PATH_CHALLENGE Frame {
//#   Type (i) = 0x1a,
//#   Data (64),
//# }

const TAG: Tag = 0x1a;

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.17
//# Data:  This 8-byte field contains arbitrary data.
pub const DATA_LEN: usize = 8;

pub type Data = [u8; DATA_LEN];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathChallenge {
    pub data: Data,
}

impl PathChallenge {
    #[inline]
    pub fn tag(&self) -> Tag {
        TAG
    }
}

impl AckElicitable for PathChallenge {}

decoder_parameterized_value!(
    impl<'a> PathChallenge {
        fn decode(_tag: Tag, buffer: Buffer) -> Result<Self> {
            let (data, buffer) = buffer.decode_slice(DATA_LEN)?;
            let data = data
                .as_less_safe_slice()
                .try_into()
                .expect("the length was split above");

            Ok((PathChallenge { data }, buffer))
        }
    }
);

impl EncoderValue for PathChallenge {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&self.tag());
        encoder.write_slice(&self.data);
    }
}
