// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    connection,
    frame::{ack_elicitation::AckElicitable, Tag},
    stateless_reset,
    varint::VarInt,
};
use corten_codec::{decoder_invariant, decoder_parameterized_value, Encoder, EncoderValue};

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.15
//# An endpoint sends a NEW_CONNECTION_ID frame (type=0x18) to provide
//# its peer with alternative connection IDs that can be used to break
//# linkability when migrating connections.
//#
//# NEW_CONNECTION_ID Frame {
//#   Type (i) = 0x18,
//#   Sequence Number (i),
//#   Retire Prior To (i),
//#   Length (8),
//#   Connection ID (8..160),
//#   Stateless Reset Token (128),
//# }

const TAG: Tag = 0x18;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NewConnectionId {
    /// The sequence number assigned to the connection id by the sender
    pub sequence_number: VarInt,

    /// Connection ids with sequence numbers below this value are retired
    pub retire_prior_to: VarInt,

    pub connection_id: connection::Id,

    /// The token to use in a stateless reset when the peer's state for
    /// this connection id is lost
    pub stateless_reset_token: stateless_reset::Token,
}

impl NewConnectionId {
    #[inline]
    pub fn tag(&self) -> Tag {
        TAG
    }
}

impl AckElicitable for NewConnectionId {}

decoder_parameterized_value!(
    impl<'a> NewConnectionId {
        fn decode(_tag: Tag, buffer: Buffer) -> Result<Self> {
            let (sequence_number, buffer) = buffer.decode::<VarInt>()?;
            let (retire_prior_to, buffer) = buffer.decode::<VarInt>()?;

            //= https://www.rfc-editor.org/rfc/rfc9000#section-19.15
            //# Receipt of the same frame multiple times MUST NOT be treated as
            //# a connection error.  A receiver can use the sequence number
            //# supplied in the NEW_CONNECTION_ID frame to handle receiving the
            //# same NEW_CONNECTION_ID frame multiple times.
            decoder_invariant!(
                retire_prior_to <= sequence_number,
                "retire_prior_to must not exceed the sequence number"
            );

            let (connection_id, buffer) = buffer.decode::<connection::Id>()?;

            //= https://www.rfc-editor.org/rfc/rfc9000#section-19.15
            //# Length:  An 8-bit unsigned integer containing the length of the
            //# connection ID.  Values less than 1 and greater than 20 are
            //# invalid and MUST be treated as a connection error of type
            //# FRAME_ENCODING_ERROR.
            decoder_invariant!(
                !connection_id.is_empty(),
                "new connection ids must not be empty"
            );

            let (stateless_reset_token, buffer) = buffer.decode()?;

            let frame = NewConnectionId {
                sequence_number,
                retire_prior_to,
                connection_id,
                stateless_reset_token,
            };

            Ok((frame, buffer))
        }
    }
);

impl EncoderValue for NewConnectionId {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&self.tag());
        encoder.encode(&self.sequence_number);
        encoder.encode(&self.retire_prior_to);
        encoder.encode(&self.connection_id);
        encoder.encode(&self.stateless_reset_token);
    }
}
