// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    connection,
    crypto::{
        self,
        payload::{EncryptedPayload, ProtectedPayload},
        OneRttHeaderKey, OneRttKey,
    },
    packet::{
        key_phase::KeyPhase,
        number::{PacketNumber, PacketNumberSpace},
    },
};
use corten_codec::{decoder_invariant, DecoderBufferMut, DecoderError};

//= https://www.rfc-editor.org/rfc/rfc9000#section-17.3.1
//# 1-RTT Packet {
//#   Header Form (1) = 0,
//#   Fixed Bit (1) = 1,
//#   Spin Bit (1),
//#   Reserved Bits (2),
//#   Key Phase (1),
//#   Packet Number Length (2),
//#   Destination Connection ID (0..160),
//#   Packet Number (8..32),
//#   Packet Payload (8..),
//# }

pub(crate) const FIXED_BIT: u8 = 0x40;
pub(crate) const SPIN_BIT_MASK: u8 = 0x20;

/// The first byte of a 1-RTT packet before the packet-number-length and
/// key-phase bits are folded in
pub(crate) const SHORT_TAG: u8 = FIXED_BIT;

#[derive(Debug)]
pub struct ProtectedShort<'a> {
    pub destination_connection_id: connection::Id,
    pub payload: ProtectedPayload<'a>,
}

#[derive(Debug)]
pub struct EncryptedShort<'a> {
    pub destination_connection_id: connection::Id,
    pub packet_number: PacketNumber,
    pub payload: EncryptedPayload<'a>,
}

#[derive(Debug)]
pub struct CleartextShort<'a> {
    pub destination_connection_id: connection::Id,
    pub packet_number: PacketNumber,
    pub key_phase: KeyPhase,
    pub payload: DecoderBufferMut<'a>,
}

impl<'a> ProtectedShort<'a> {
    /// Parses a short header packet.
    ///
    /// The wire carries no DCID length for short headers: the caller
    /// supplies the length of the connection ids this endpoint issues.
    pub(crate) fn decode(
        buffer: DecoderBufferMut<'a>,
        destination_connection_id_len: usize,
    ) -> Result<(Self, DecoderBufferMut<'a>), DecoderError> {
        debug_assert!(destination_connection_id_len <= connection::id::MAX_LEN);

        let destination_connection_id = {
            let peek = buffer.peek();
            let (tag, peek) = peek.decode::<u8>()?;
            decoder_invariant!(tag & FIXED_BIT == FIXED_BIT, "fixed bit must be set");

            let (destination_connection_id, _) = peek.decode_slice(destination_connection_id_len)?;
            connection::Id::try_from(destination_connection_id.as_less_safe_slice())
                .expect("the len was asserted above")
        };

        let header_len = 1 + destination_connection_id_len;

        //= https://www.rfc-editor.org/rfc/rfc9000#section-12.2
        //# a packet with a short header does not include a length, so it can
        //# only be the last packet included in a UDP datagram.
        let len = buffer.len();
        let (packet, remaining) = buffer.decode_slice(len)?;
        let payload = ProtectedPayload::new(header_len, packet.into_less_safe_slice());

        Ok((
            Self {
                destination_connection_id,
                payload,
            },
            remaining,
        ))
    }

    pub fn unprotect<H: OneRttHeaderKey>(
        self,
        header_key: &H,
        largest_received: Option<PacketNumber>,
    ) -> Result<EncryptedShort<'a>, DecoderError> {
        let (truncated, payload) =
            crypto::unprotect(header_key, PacketNumberSpace::ApplicationData, self.payload)?;
        let packet_number = truncated.expand(largest_received);

        Ok(EncryptedShort {
            destination_connection_id: self.destination_connection_id,
            packet_number,
            payload,
        })
    }
}

impl<'a> EncryptedShort<'a> {
    /// The key phase bit, readable once header protection is removed
    pub fn key_phase(&self) -> KeyPhase {
        KeyPhase::from_tag(self.payload.buffer[0])
    }

    pub fn decrypt<K: OneRttKey>(
        self,
        key: &K,
    ) -> Result<CleartextShort<'a>, crypto::packet_protection::Error> {
        let key_phase = self.key_phase();
        let (_header, payload) = crypto::decrypt(key, self.packet_number, self.payload)?;

        Ok(CleartextShort {
            destination_connection_id: self.destination_connection_id,
            packet_number: self.packet_number,
            key_phase,
            payload: DecoderBufferMut::new(payload),
        })
    }
}
