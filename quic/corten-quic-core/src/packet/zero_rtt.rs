// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    connection,
    crypto::{
        self,
        payload::{EncryptedPayload, ProtectedPayload},
        ZeroRttHeaderKey, ZeroRttKey,
    },
    packet::{
        decode_long_payload,
        long::{self, Version},
        number::{PacketNumber, PacketNumberSpace},
    },
};
use corten_codec::{DecoderBufferMut, DecoderError};

//= https://www.rfc-editor.org/rfc/rfc9000#section-17.2.3
//# A 0-RTT packet is used to carry "early" data from the client to the
//# server as part of the first flight, prior to handshake completion.

#[derive(Debug)]
pub struct ProtectedZeroRtt<'a> {
    pub version: Version,
    pub destination_connection_id: connection::Id,
    pub source_connection_id: connection::Id,
    pub payload: ProtectedPayload<'a>,
}

#[derive(Debug)]
pub struct EncryptedZeroRtt<'a> {
    pub version: Version,
    pub destination_connection_id: connection::Id,
    pub source_connection_id: connection::Id,
    pub packet_number: PacketNumber,
    pub payload: EncryptedPayload<'a>,
}

#[derive(Debug)]
pub struct CleartextZeroRtt<'a> {
    pub version: Version,
    pub destination_connection_id: connection::Id,
    pub source_connection_id: connection::Id,
    pub packet_number: PacketNumber,
    pub payload: DecoderBufferMut<'a>,
}

impl<'a> ProtectedZeroRtt<'a> {
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

    pub fn unprotect<H: ZeroRttHeaderKey>(
        self,
        header_key: &H,
        largest_received: Option<PacketNumber>,
    ) -> Result<EncryptedZeroRtt<'a>, DecoderError> {
        //= https://www.rfc-editor.org/rfc/rfc9000#section-12.3
        //# 0-RTT and 1-RTT packets share the same packet number space
        let (truncated, payload) =
            crypto::unprotect(header_key, PacketNumberSpace::ApplicationData, self.payload)?;
        let packet_number = truncated.expand(largest_received);

        Ok(EncryptedZeroRtt {
            version: self.version,
            destination_connection_id: self.destination_connection_id,
            source_connection_id: self.source_connection_id,
            packet_number,
            payload,
        })
    }
}

impl<'a> EncryptedZeroRtt<'a> {
    pub fn decrypt<K: ZeroRttKey>(
        self,
        key: &K,
    ) -> Result<CleartextZeroRtt<'a>, crypto::packet_protection::Error> {
        let (_header, payload) = crypto::decrypt(key, self.packet_number, self.payload)?;

        Ok(CleartextZeroRtt {
            version: self.version,
            destination_connection_id: self.destination_connection_id,
            source_connection_id: self.source_connection_id,
            packet_number: self.packet_number,
            payload: DecoderBufferMut::new(payload),
        })
    }
}
