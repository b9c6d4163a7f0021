// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    connection,
    crypto::{
        self,
        payload::{EncryptedPayload, ProtectedPayload},
        InitialHeaderKey, InitialKey,
    },
    packet::{
        decode_long_payload,
        long::{self, Version},
        number::{PacketNumber, PacketNumberSpace},
    },
    varint::VarInt,
};
use alloc::vec::Vec;
use corten_codec::{DecoderBufferMut, DecoderError};

//= https://www.rfc-editor.org/rfc/rfc9000#section-17.2.2
//# Initial Packet {
//#   Header Form (1) = 1,
//#   Fixed Bit (1) = 1,
//#   Long Packet Type (2) = 0,
//#   Reserved Bits (2),
//#   Packet Number Length (2),
//#   Version (32),
//#   Destination Connection ID Length (8),
//#   Destination Connection ID (0..160),
//#   Source Connection ID Length (8),
//#   Source Connection ID (0..160),
//#   Token Length (i),
//#   Token (..),
//#   Length (i),
//#   Packet Number (8..32),
//#   Packet Payload (8..),
//# }

//= https://www.rfc-editor.org/rfc/rfc9000#section-14.1
//# A client MUST expand the payload of all UDP datagrams carrying
//# Initial packets to at least the smallest allowed maximum datagram
//# size of 1200 bytes

pub const MIN_INITIAL_DATAGRAM_LEN: usize = 1200;

#[derive(Debug)]
pub struct ProtectedInitial<'a> {
    pub version: Version,
    pub destination_connection_id: connection::Id,
    pub source_connection_id: connection::Id,
    pub token: Vec<u8>,
    pub payload: ProtectedPayload<'a>,
}

#[derive(Debug)]
pub struct EncryptedInitial<'a> {
    pub version: Version,
    pub destination_connection_id: connection::Id,
    pub source_connection_id: connection::Id,
    pub token: Vec<u8>,
    pub packet_number: PacketNumber,
    pub payload: EncryptedPayload<'a>,
}

#[derive(Debug)]
pub struct CleartextInitial<'a> {
    pub version: Version,
    pub destination_connection_id: connection::Id,
    pub source_connection_id: connection::Id,
    pub token: Vec<u8>,
    pub packet_number: PacketNumber,
    pub payload: DecoderBufferMut<'a>,
}

impl<'a> ProtectedInitial<'a> {
    pub(crate) fn decode(
        header: long::Header<'a>,
    ) -> Result<(Self, DecoderBufferMut<'a>), DecoderError> {
        let (token, consumed) = {
            let peek = header.buffer.peek();
            let peek = peek.skip(header.consumed)?;
            let before = peek.len();

            //= https://www.rfc-editor.org/rfc/rfc9000#section-17.2.2
            //# Token Length:  A variable-length integer specifying the length of
            //# the Token field, in bytes.
            let (token, peek) = peek.decode_slice_with_len_prefix::<VarInt>()?;
            let token = token.as_less_safe_slice().to_vec();

            (token, header.consumed + (before - peek.len()))
        };

        let (payload, remaining) = decode_long_payload(header.buffer, consumed)?;

        let packet = Self {
            version: header.version,
            destination_connection_id: header.destination_connection_id,
            source_connection_id: header.source_connection_id,
            token,
            payload,
        };

        Ok((packet, remaining))
    }

    /// Removes header protection and expands the packet number
    pub fn unprotect<H: InitialHeaderKey>(
        self,
        header_key: &H,
        largest_received: Option<PacketNumber>,
    ) -> Result<EncryptedInitial<'a>, DecoderError> {
        let (truncated, payload) =
            crypto::unprotect(header_key, PacketNumberSpace::Initial, self.payload)?;
        let packet_number = truncated.expand(largest_received);

        Ok(EncryptedInitial {
            version: self.version,
            destination_connection_id: self.destination_connection_id,
            source_connection_id: self.source_connection_id,
            token: self.token,
            packet_number,
            payload,
        })
    }
}

impl<'a> EncryptedInitial<'a> {
    /// Opens the payload, yielding the cleartext frames
    pub fn decrypt<K: InitialKey>(
        self,
        key: &K,
    ) -> Result<CleartextInitial<'a>, crypto::packet_protection::Error> {
        let (_header, payload) = crypto::decrypt(key, self.packet_number, self.payload)?;

        Ok(CleartextInitial {
            version: self.version,
            destination_connection_id: self.destination_connection_id,
            source_connection_id: self.source_connection_id,
            token: self.token,
            packet_number: self.packet_number,
            payload: DecoderBufferMut::new(payload),
        })
    }
}
