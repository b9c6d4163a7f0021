// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    crypto::payload::{EncryptedPayload, ProtectedPayload},
    packet::number::{PacketNumberSpace, TruncatedPacketNumber},
};
use corten_codec::{DecoderBuffer, DecoderError};

/// Derives 5-byte header protection masks at one encryption level
pub trait HeaderKey: Send {
    /// Derives a mask for opening a packet from a ciphertext sample
    fn opening_header_protection_mask(&self, ciphertext_sample: &[u8]) -> HeaderProtectionMask;

    /// Sample length required for opening
    fn opening_sample_len(&self) -> usize;

    /// Derives a mask for sealing a packet from a ciphertext sample
    fn sealing_header_protection_mask(&self, ciphertext_sample: &[u8]) -> HeaderProtectionMask;

    /// Sample length required for sealing
    fn sealing_sample_len(&self) -> usize;
}

//= https://www.rfc-editor.org/rfc/rfc9001#section-5.4.1
//# The output of this algorithm is a 5-byte mask that is applied to the
//# protected header fields using exclusive OR.

pub const HEADER_PROTECTION_MASK_LEN: usize = 5;
pub type HeaderProtectionMask = [u8; HEADER_PROTECTION_MASK_LEN];

//= https://www.rfc-editor.org/rfc/rfc9001#section-5.4.1
//# pn_length = (packet[0] & 0x03) + 1
//# if (packet[0] & 0x80) == 0x80:
//#    # Long header: 4 bits masked
//#    packet[0] ^= mask[0] & 0x0f
//# else:
//#    # Short header: 5 bits masked
//#    packet[0] ^= mask[0] & 0x1f

const LONG_HEADER_TAG: u8 = 0x80;
pub(crate) const LONG_HEADER_MASK: u8 = 0x0f;
pub(crate) const SHORT_HEADER_MASK: u8 = 0x1f;

#[inline(always)]
fn mask_from_packet_tag(tag: u8) -> u8 {
    if tag & LONG_HEADER_TAG == LONG_HEADER_TAG {
        LONG_HEADER_MASK
    } else {
        SHORT_HEADER_MASK
    }
}

#[inline(always)]
fn xor_mask(packet_number_bytes: &mut [u8], mask: &HeaderProtectionMask) {
    for (byte, mask_byte) in packet_number_bytes.iter_mut().zip(&mask[1..]) {
        *byte ^= mask_byte;
    }
}

/// Masks the first-byte bits and packet number of a freshly sealed packet.
///
/// The same XOR removes the protection again, so this function is its own
/// inverse on the protected bits.
#[inline]
pub(crate) fn apply_header_protection(
    mask: HeaderProtectionMask,
    payload: EncryptedPayload<'_>,
) -> ProtectedPayload<'_> {
    let header_len = payload.header_len;
    let packet_number_len = payload.packet_number_len;
    let payload = payload.buffer;

    payload[0] ^= mask[0] & mask_from_packet_tag(payload[0]);

    let header_with_pn_len = header_len + packet_number_len.bytesize();
    xor_mask(&mut payload[header_len..header_with_pn_len], &mask);

    ProtectedPayload::new(header_len, payload)
}

/// Unmasks a protected packet, reading the packet number length from the
/// now-unprotected first byte
#[inline]
pub(crate) fn remove_header_protection(
    space: PacketNumberSpace,
    mask: HeaderProtectionMask,
    payload: ProtectedPayload<'_>,
) -> Result<(TruncatedPacketNumber, EncryptedPayload<'_>), DecoderError> {
    let header_len = payload.header_len;
    let payload = payload.buffer;

    payload[0] ^= mask[0] & mask_from_packet_tag(payload[0]);
    let packet_number_len = space.new_packet_number_len(payload[0]);

    let header_with_pn_len = header_len + packet_number_len.bytesize();
    if payload.len() < header_with_pn_len {
        return Err(DecoderError::UnexpectedEof(header_with_pn_len));
    }

    let packet_number = {
        let packet_number_bytes = &mut payload[header_len..header_with_pn_len];
        xor_mask(packet_number_bytes, &mask);

        let (packet_number, _) = packet_number_len
            .decode_truncated_packet_number(DecoderBuffer::new(packet_number_bytes))?;
        packet_number
    };

    Ok((
        packet_number,
        EncryptedPayload::new(header_len, packet_number_len, payload),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::number::PacketNumberLen;
    use bolero::check;

    #[test]
    fn involution_test() {
        check!()
            .with_type::<([u8; 5], [u8; 8], u8)>()
            .cloned()
            .for_each(|(mask, packet, pn_len)| {
                let space = PacketNumberSpace::ApplicationData;
                let pn_len =
                    PacketNumberLen::for_bytesize((pn_len as usize % 4) + 1, space).unwrap();

                let mut protected = packet;
                // force a valid encoding of the pn len in the tag bits
                protected[0] = (protected[0] & !0b11) | pn_len.into_packet_tag_mask();
                let original = protected;

                let payload = EncryptedPayload::new(1, pn_len, &mut protected);
                let payload = apply_header_protection(mask, payload);
                let (_, payload) =
                    remove_header_protection(space, mask, payload).unwrap();

                // removing the mask restores every protected bit
                assert_eq!(payload.buffer, &original[..]);
            });
    }
}
