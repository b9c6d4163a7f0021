// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    connection,
    crypto::retry::{IntegrityTag, INTEGRITY_TAG_LEN},
    packet::long::{self, Version},
};
use alloc::vec::Vec;
use corten_codec::{decoder_invariant, DecoderBufferMut, DecoderError, Encoder, EncoderValue};

//= https://www.rfc-editor.org/rfc/rfc9000#section-17.2.5
//# Retry Packet {
//#   Header Form (1) = 1,
//#   Fixed Bit (1) = 1,
//#   Long Packet Type (2) = 3,
//#   Unused (4),
//#   Version (32),
//#   Destination Connection ID Length (8),
//#   Destination Connection ID (0..160),
//#   Source Connection ID Length (8),
//#   Source Connection ID (0..160),
//#   Retry Token (..),
//#   Retry Integrity Tag (128),
//# }

/// The canonical first byte of a locally generated Retry packet; the four
/// low bits are unused and arbitrary on receipt
pub const TAG: u8 = long::FORM_MASK | long::FIXED_BIT | long::PacketType::Retry.into_tag_bits();

#[derive(Debug, PartialEq, Eq)]
pub struct Retry {
    /// The first byte exactly as received; the integrity tag covers it
    pub tag: u8,
    pub version: Version,
    pub destination_connection_id: connection::Id,
    pub source_connection_id: connection::Id,
    pub retry_token: Vec<u8>,
    pub integrity_tag: IntegrityTag,
}

impl Retry {
    pub(crate) fn decode(
        header: long::Header<'_>,
    ) -> Result<(Self, DecoderBufferMut<'_>), DecoderError> {
        let (retry_token, integrity_tag) = {
            let peek = header.buffer.peek();
            let peek = peek.skip(header.consumed)?;

            //= https://www.rfc-editor.org/rfc/rfc9000#section-17.2.5
            //# A Retry packet (shown in Figure 18) carries an address
            //# validation token created by the server.
            let token_len = peek
                .len()
                .checked_sub(INTEGRITY_TAG_LEN)
                .ok_or(DecoderError::UnexpectedEof(INTEGRITY_TAG_LEN))?;
            decoder_invariant!(token_len > 0, "retry token must not be empty");

            let (token, peek) = peek.decode_slice(token_len)?;
            let token = token.as_less_safe_slice().to_vec();

            let (tag, _) = peek.decode_slice(INTEGRITY_TAG_LEN)?;
            let tag: IntegrityTag = tag
                .as_less_safe_slice()
                .try_into()
                .expect("the length was split above");

            (token, tag)
        };

        // a retry packet consumes the remainder of the datagram
        let len = header.buffer.len();
        let (_, remaining) = header.buffer.decode_slice(len)?;

        let packet = Self {
            tag: header.tag,
            version: header.version,
            destination_connection_id: header.destination_connection_id,
            source_connection_id: header.source_connection_id,
            retry_token,
            integrity_tag,
        };

        Ok((packet, remaining))
    }

    //= https://www.rfc-editor.org/rfc/rfc9001#section-5.8
    //# The Retry Pseudo-Packet is not sent over the wire.  It is computed by
    //# taking the transmitted Retry packet, removing the Retry Integrity Tag
    //# and prepending the two following fields:
    //#
    //# ODCID Length (8),
    //# Original Destination Connection ID (0..160),

    /// Builds the pseudo-packet the integrity tag covers
    pub fn pseudo_packet(&self, original_destination_connection_id: connection::Id) -> Vec<u8> {
        let mut pseudo = Vec::new();
        pseudo.push(original_destination_connection_id.len() as u8);
        pseudo.extend_from_slice(original_destination_connection_id.as_bytes());

        pseudo.push(self.tag);
        pseudo.extend_from_slice(&self.version.to_be_bytes());
        pseudo.push(self.destination_connection_id.len() as u8);
        pseudo.extend_from_slice(self.destination_connection_id.as_bytes());
        pseudo.push(self.source_connection_id.len() as u8);
        pseudo.extend_from_slice(self.source_connection_id.as_bytes());
        pseudo.extend_from_slice(&self.retry_token);

        pseudo
    }
}

impl EncoderValue for Retry {
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&self.tag);
        encoder.encode(&self.version);
        encoder.encode(&self.destination_connection_id);
        encoder.encode(&self.source_connection_id);
        encoder.write_slice(&self.retry_token);
        encoder.write_slice(&self.integrity_tag);
    }
}
