// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    connection,
    crypto::{
        self,
        payload::{EncryptedPayload, ProtectedPayload},
        HandshakeHeaderKey, HandshakeKey,
    },
    packet::{
        decode_long_payload,
        long::{self, Version},
        number::{PacketNumber, PacketNumberSpace},
    },
};
use corten_codec::{DecoderBufferMut, DecoderError};

//= https://www.rfc-editor.org/rfc/rfc9000#section-17.2.4
//# Handshake Packet {
//#   Header Form (1) = 1,
//#   Fixed Bit (1) = 1,
//#   Long Packet Type (2) = 2,
//#   Reserved Bits (2),
//#   Packet Number Length (2),
//#   Version (32),
//#   Destination Connection ID Length (8),
//#   Destination Connection ID (0..160),
//#   Source Connection ID Length (8),
//#   Source Connection ID (0..160),
//#   Length (i),
//#   Packet Number (8..32),
//#   Packet Payload (8..),
//# }

#[derive(Debug)]
pub struct ProtectedHandshake<'a> {
    pub version: Version,
    pub destination_connection_id: connection::Id,
    pub source_connection_id: connection::Id,
    pub payload: ProtectedPayload<'a>,
}

#[derive(Debug)]
pub struct EncryptedHandshake<'a> {
    pub version: Version,
    pub destination_connection_id: connection::Id,
    pub source_connection_id: connection::Id,
    pub packet_number: PacketNumber,
    pub payload: EncryptedPayload<'a>,
}

#[derive(Debug)]
pub struct CleartextHandshake<'a> {
    pub version: Version,
    pub destination_connection_id: connection::Id,
    pub source_connection_id: connection::Id,
    pub packet_number: PacketNumber,
    pub payload: DecoderBufferMut<'a>,
}

impl<'a> ProtectedHandshake<'a> {
    pub(crate) fn decode(
        header: long::Header<'a>,
    ) -> Result<(Self, DecoderBufferMut<'a>), DecoderError> {
        let consumed = header.consumed;
        let (payload, remaining) = decode_long_payload(header.buffer, consumed)?;

        let packet = Self {
            version: header.version,
            destination_connection_id: header.destination_connection_id,
            source_connection_id: header.source_connection_id,
            payload,
        };

        Ok((packet, remaining))
    }

    pub fn unprotect<H: HandshakeHeaderKey>(
        self,
        header_key: &H,
        largest_received: Option<PacketNumber>,
    ) -> Result<EncryptedHandshake<'a>, DecoderError> {
        let (truncated, payload) =
            crypto::unprotect(header_key, PacketNumberSpace::Handshake, self.payload)?;
        let packet_number = truncated.expand(largest_received);

        Ok(EncryptedHandshake {
            version: self.version,
            destination_connection_id: self.destination_connection_id,
            source_connection_id: self.source_connection_id,
            packet_number,
            payload,
        })
    }
}

impl<'a> EncryptedHandshake<'a> {
    pub fn decrypt<K: HandshakeKey>(
        self,
        key: &K,
    ) -> Result<CleartextHandshake<'a>, crypto::packet_protection::Error> {
        let (_header, payload) = crypto::decrypt(key, self.packet_number, self.payload)?;

        Ok(CleartextHandshake {
            version: self.version,
            destination_connection_id: self.destination_connection_id,
            source_connection_id: self.source_connection_id,
            packet_number: self.packet_number,
            payload: DecoderBufferMut::new(payload),
        })
    }
}
