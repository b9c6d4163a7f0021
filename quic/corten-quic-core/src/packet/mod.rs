// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

pub mod encoding;
pub mod handshake;
pub mod initial;
pub mod key_phase;
pub mod long;
pub mod number;
pub mod retry;
pub mod short;
pub mod version_negotiation;
pub mod zero_rtt;

pub use key_phase::KeyPhase;

use crate::{connection, crypto::payload::ProtectedPayload, packet::long::Version};
use corten_codec::{DecoderBufferMut, DecoderError};

use handshake::ProtectedHandshake;
use initial::ProtectedInitial;
use retry::Retry;
use short::ProtectedShort;
use version_negotiation::VersionNegotiation;
use zero_rtt::ProtectedZeroRtt;

/// A single parsed packet whose payload is still protected
///
/// Parsing stops at the packet number offset: nothing past the unprotected
/// header fields is interpreted until header protection is removed.
#[derive(Debug)]
pub enum ProtectedPacket<'a> {
    Initial(ProtectedInitial<'a>),
    ZeroRtt(ProtectedZeroRtt<'a>),
    Handshake(ProtectedHandshake<'a>),
    Retry(Retry),
    Short(ProtectedShort<'a>),
    VersionNegotiation(VersionNegotiation),
}

impl<'a> ProtectedPacket<'a> {
    /// Parses the next packet out of a datagram.
    ///
    /// `destination_connection_id_len` is the length of locally issued
    /// connection ids, needed to delimit short headers (their DCID length
    /// is not carried on the wire). Returns the packet and the rest of the
    /// datagram for coalesced packets.
    pub fn decode(
        buffer: DecoderBufferMut<'a>,
        destination_connection_id_len: usize,
    ) -> Result<(ProtectedPacket<'a>, DecoderBufferMut<'a>), DecoderError> {
        let tag = buffer.peek_byte(0)?;

        if tag & long::FORM_MASK == 0 {
            let (packet, remaining) = ProtectedShort::decode(buffer, destination_connection_id_len)?;
            return Ok((ProtectedPacket::Short(packet), remaining));
        }

        let header = long::Header::decode(buffer)?;

        if header.version == version_negotiation::VERSION {
            let (packet, remaining) = VersionNegotiation::decode(header)?;
            return Ok((ProtectedPacket::VersionNegotiation(packet), remaining));
        }

        match header.packet_type {
            long::PacketType::Initial => {
                let (packet, remaining) = ProtectedInitial::decode(header)?;
                Ok((ProtectedPacket::Initial(packet), remaining))
            }
            long::PacketType::ZeroRtt => {
                let (packet, remaining) = ProtectedZeroRtt::decode(header)?;
                Ok((ProtectedPacket::ZeroRtt(packet), remaining))
            }
            long::PacketType::Handshake => {
                let (packet, remaining) = ProtectedHandshake::decode(header)?;
                Ok((ProtectedPacket::Handshake(packet), remaining))
            }
            long::PacketType::Retry => {
                let (packet, remaining) = Retry::decode(header)?;
                Ok((ProtectedPacket::Retry(packet), remaining))
            }
        }
    }

    /// The destination connection id carried in the packet header
    pub fn destination_connection_id(&self) -> connection::Id {
        match self {
            ProtectedPacket::Initial(packet) => packet.destination_connection_id,
            ProtectedPacket::ZeroRtt(packet) => packet.destination_connection_id,
            ProtectedPacket::Handshake(packet) => packet.destination_connection_id,
            ProtectedPacket::Retry(packet) => packet.destination_connection_id,
            ProtectedPacket::Short(packet) => packet.destination_connection_id,
            ProtectedPacket::VersionNegotiation(packet) => packet.destination_connection_id,
        }
    }

    /// The version field, absent for short headers
    pub fn version(&self) -> Option<Version> {
        match self {
            ProtectedPacket::Initial(packet) => Some(packet.version),
            ProtectedPacket::ZeroRtt(packet) => Some(packet.version),
            ProtectedPacket::Handshake(packet) => Some(packet.version),
            ProtectedPacket::Retry(packet) => Some(packet.version),
            ProtectedPacket::Short(_) => None,
            ProtectedPacket::VersionNegotiation(_) => Some(version_negotiation::VERSION),
        }
    }
}

/// Parses the common fields of a long header, up to and including the
/// payload length when the type carries one, and splits the packet bytes
/// out of the datagram.
///
/// Returns `(header_len, packet, remaining)` where `header_len` is the
/// packet number offset within `packet`.
pub(crate) fn decode_long_payload<'a>(
    buffer: DecoderBufferMut<'a>,
    consumed: usize,
) -> Result<(ProtectedPayload<'a>, DecoderBufferMut<'a>), DecoderError> {
    //= https://www.rfc-editor.org/rfc/rfc9000#section-17.2
    //# Length:  This is the length of the remainder of the packet (that is,
    //# the Packet Number and Payload fields) in bytes, encoded as a
    //# variable-length integer (Section 16).
    let peek = buffer.peek();
    let peek = peek.skip(consumed)?;
    let before_len = peek.len();
    let (payload_len, peek) = peek.decode::<crate::varint::VarInt>()?;
    let len_size = before_len - peek.len();

    let header_len = consumed + len_size;
    let payload_len: usize = payload_len
        .as_u64()
        .try_into()
        .map_err(|_| DecoderError::LengthCapacityExceeded)?;

    let packet_len = header_len
        .checked_add(payload_len)
        .ok_or(DecoderError::LengthCapacityExceeded)?;

    let (packet, remaining) = buffer.decode_slice(packet_len)?;
    let payload = ProtectedPayload::new(header_len, packet.into_less_safe_slice());

    Ok((payload, remaining))
}

#[cfg(test)]
mod tests;
