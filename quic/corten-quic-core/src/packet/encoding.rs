// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    connection,
    crypto::{self, payload::ProtectedPayload, HeaderKey, Key},
    packet::{
        key_phase::KeyPhase,
        long,
        number::PacketNumber,
        short,
    },
    varint::VarInt,
};
use core::fmt;
use corten_codec::{Encoder, EncoderBuffer, EncoderValue};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketEncodingError {
    /// The packet number could not be truncated against the largest
    /// acknowledged value
    PacketNumberTruncation,
    /// The remaining buffer capacity cannot hold the packet
    InsufficientSpace,
    /// Sealing or header protection failed
    ProtectionFailed,
}

impl fmt::Display for PacketEncodingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::PacketNumberTruncation => write!(f, "packet number truncation failed"),
            Self::InsufficientSpace => write!(f, "insufficient buffer capacity"),
            Self::ProtectionFailed => write!(f, "packet protection failed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PacketEncodingError {}

/// Encodes, seals and header-protects a long header packet.
///
/// `buffer` must start at the packet's first byte; the sealed packet and
/// the buffer for any coalesced packet that follows are returned.
#[allow(clippy::too_many_arguments)]
pub fn encode_long_packet<'a, K: Key, H: HeaderKey, Payload: EncoderValue>(
    key: &K,
    header_key: &H,
    packet_type: long::PacketType,
    version: long::Version,
    destination_connection_id: connection::Id,
    source_connection_id: connection::Id,
    token: Option<&[u8]>,
    packet_number: PacketNumber,
    largest_acknowledged: Option<PacketNumber>,
    payload: &Payload,
    mut buffer: EncoderBuffer<'a>,
) -> Result<(ProtectedPayload<'a>, EncoderBuffer<'a>), PacketEncodingError> {
    debug_assert!(buffer.is_empty(), "the packet must start the buffer");

    let truncated = packet_number
        .truncate(largest_acknowledged)
        .ok_or(PacketEncodingError::PacketNumberTruncation)?;
    let packet_number_len = truncated.len();

    let tag = long::FORM_MASK
        | long::FIXED_BIT
        | packet_type.into_tag_bits()
        | packet_number_len.into_packet_tag_mask();

    let payload_len = payload.encoding_size();
    let length_field = VarInt::try_from(packet_number_len.bytesize() + payload_len + key.tag_len())
        .map_err(|_| PacketEncodingError::InsufficientSpace)?;

    let mut header_size = 1 + core::mem::size_of::<long::Version>();
    header_size += 1 + destination_connection_id.len();
    header_size += 1 + source_connection_id.len();
    if let Some(token) = token {
        let token_len =
            VarInt::try_from(token.len()).map_err(|_| PacketEncodingError::InsufficientSpace)?;
        header_size += token_len.encoding_size() + token.len();
    }
    header_size += length_field.encoding_size();

    let total = header_size + packet_number_len.bytesize() + payload_len + key.tag_len();
    if total > buffer.remaining_capacity() {
        return Err(PacketEncodingError::InsufficientSpace);
    }

    buffer.encode(&tag);
    buffer.encode(&version);
    buffer.encode(&destination_connection_id);
    buffer.encode(&source_connection_id);
    if let Some(token) = token {
        let token_len = VarInt::try_from(token.len()).expect("validated above");
        buffer.encode(&token_len);
        buffer.write_slice(token);
    }
    buffer.encode(&length_field);

    let header_len = buffer.len();
    buffer.encode(&truncated);
    buffer.encode(payload);

    let (encrypted, remaining) =
        crypto::encrypt(key, packet_number, packet_number_len, header_len, buffer)
            .map_err(|_| PacketEncodingError::ProtectionFailed)?;

    let protected = crypto::protect(header_key, encrypted)
        .map_err(|_| PacketEncodingError::ProtectionFailed)?;

    Ok((protected, remaining))
}

/// Encodes, seals and header-protects a 1-RTT packet
#[allow(clippy::too_many_arguments)]
pub fn encode_short_packet<'a, K: Key, H: HeaderKey, Payload: EncoderValue>(
    key: &K,
    header_key: &H,
    spin_bit: bool,
    key_phase: KeyPhase,
    destination_connection_id: connection::Id,
    packet_number: PacketNumber,
    largest_acknowledged: Option<PacketNumber>,
    payload: &Payload,
    mut buffer: EncoderBuffer<'a>,
) -> Result<(ProtectedPayload<'a>, EncoderBuffer<'a>), PacketEncodingError> {
    debug_assert!(buffer.is_empty(), "the packet must start the buffer");

    let truncated = packet_number
        .truncate(largest_acknowledged)
        .ok_or(PacketEncodingError::PacketNumberTruncation)?;
    let packet_number_len = truncated.len();

    let mut tag = short::SHORT_TAG | key_phase.into_tag_bits() | packet_number_len.into_packet_tag_mask();
    if spin_bit {
        tag |= short::SPIN_BIT_MASK;
    }

    let payload_len = payload.encoding_size();
    let header_size = 1 + destination_connection_id.len();
    let total = header_size + packet_number_len.bytesize() + payload_len + key.tag_len();
    if total > buffer.remaining_capacity() {
        return Err(PacketEncodingError::InsufficientSpace);
    }

    buffer.encode(&tag);
    buffer.write_slice(destination_connection_id.as_bytes());

    let header_len = buffer.len();
    buffer.encode(&truncated);
    buffer.encode(payload);

    let (encrypted, remaining) =
        crypto::encrypt(key, packet_number, packet_number_len, header_len, buffer)
            .map_err(|_| PacketEncodingError::ProtectionFailed)?;

    let protected = crypto::protect(header_key, encrypted)
        .map_err(|_| PacketEncodingError::ProtectionFailed)?;

    Ok((protected, remaining))
}
