// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{connection, packet::long};
use alloc::vec::Vec;
use corten_codec::{DecoderBufferMut, DecoderError, Encoder, EncoderValue};

//= https://www.rfc-editor.org/rfc/rfc9000#section-17.2.1
//# Version Negotiation Packet {
//#   Header Form (1) = 1,
//#   Unused (7),
//#   Version (32) = 0,
//#   Destination Connection ID Length (8),
//#   Destination Connection ID (0..2040),
//#   Source Connection ID Length (8),
//#   Source Connection ID (0..2040),
//#   Supported Version (32) ...,
//# }

/// A Version Negotiation packet is identified by a version of 0
pub const VERSION: long::Version = 0;

const TAG: u8 = 0x80;

#[derive(Debug)]
pub struct VersionNegotiation {
    pub destination_connection_id: connection::Id,
    pub source_connection_id: connection::Id,
    pub supported_versions: Vec<long::Version>,
}

impl VersionNegotiation {
    pub(crate) fn decode(
        header: long::Header<'_>,
    ) -> Result<(Self, DecoderBufferMut<'_>), DecoderError> {
        let supported_versions = {
            let peek = header.buffer.peek();
            let mut peek = peek.skip(header.consumed)?;

            let mut versions = Vec::new();
            while !peek.is_empty() {
                let (version, rest) = peek.decode::<long::Version>()?;
                versions.push(version);
                peek = rest;
            }
            versions
        };

        // the packet consumes the remainder of the datagram
        let len = header.buffer.len();
        let (_, remaining) = header.buffer.decode_slice(len)?;

        let packet = Self {
            destination_connection_id: header.destination_connection_id,
            source_connection_id: header.source_connection_id,
            supported_versions,
        };

        Ok((packet, remaining))
    }

}

impl EncoderValue for VersionNegotiation {
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&TAG);
        encoder.encode(&VERSION);
        encoder.encode(&self.destination_connection_id);
        encoder.encode(&self.source_connection_id);

        for version in &self.supported_versions {
            encoder.encode(version);
        }
    }
}
