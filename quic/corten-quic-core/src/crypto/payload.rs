// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::packet::number::PacketNumberLen;
use corten_codec::DecoderError;

//= https://www.rfc-editor.org/rfc/rfc9001#section-5.4.2
//# in sampling packet ciphertext for header protection, the Packet Number
//# field is assumed to be 4 bytes long

pub const HEADER_PROTECTION_SAMPLE_OFFSET: usize = 4;

/// A packet whose header protection has not yet been removed
///
/// `buffer` spans the entire packet, headers included; `header_len` is the
/// number of bytes before the (still protected) packet number field.
#[derive(Debug)]
pub struct ProtectedPayload<'a> {
    pub(crate) header_len: usize,
    pub(crate) buffer: &'a mut [u8],
}

impl<'a> ProtectedPayload<'a> {
    #[inline]
    pub fn new(header_len: usize, buffer: &'a mut [u8]) -> Self {
        debug_assert!(header_len <= buffer.len());
        Self { header_len, buffer }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns the header protection sample: `sample_len` bytes starting 4
    /// bytes past the packet number offset, regardless of the actual packet
    /// number length. Fails when the packet is too short to sample, in
    /// which case it must be discarded.
    #[inline]
    pub fn header_protection_sample(&self, sample_len: usize) -> Result<&[u8], DecoderError> {
        header_protection_sample(self.buffer, self.header_len, sample_len)
    }
}

/// A packet whose header is in the clear but whose body is still sealed
#[derive(Debug)]
pub struct EncryptedPayload<'a> {
    pub(crate) header_len: usize,
    pub(crate) packet_number_len: PacketNumberLen,
    pub(crate) buffer: &'a mut [u8],
}

impl<'a> EncryptedPayload<'a> {
    #[inline]
    pub fn new(header_len: usize, packet_number_len: PacketNumberLen, buffer: &'a mut [u8]) -> Self {
        debug_assert!(header_len + packet_number_len.bytesize() <= buffer.len());
        Self {
            header_len,
            packet_number_len,
            buffer,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[inline]
    pub fn packet_number_len(&self) -> PacketNumberLen {
        self.packet_number_len
    }

    /// Splits into the associated data (header and packet number) and the
    /// sealed body
    #[inline]
    pub fn split_mut(self) -> (&'a mut [u8], &'a mut [u8]) {
        self.buffer
            .split_at_mut(self.header_len + self.packet_number_len.bytesize())
    }

    #[inline]
    pub fn header_protection_sample(&self, sample_len: usize) -> Result<&[u8], DecoderError> {
        header_protection_sample(self.buffer, self.header_len, sample_len)
    }
}

#[inline]
fn header_protection_sample<'a>(
    buffer: &'a [u8],
    header_len: usize,
    sample_len: usize,
) -> Result<&'a [u8], DecoderError> {
    let start = header_len + HEADER_PROTECTION_SAMPLE_OFFSET;
    let end = start + sample_len;

    buffer
        .get(start..end)
        .ok_or(DecoderError::UnexpectedEof(end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_bounds_test() {
        let mut bytes = [0u8; 26];
        for (index, byte) in bytes.iter_mut().enumerate() {
            *byte = index as u8;
        }

        let payload = ProtectedPayload::new(6, &mut bytes);
        // the sample skips the assumed 4-byte packet number
        let sample = payload.header_protection_sample(16).unwrap();
        assert_eq!(sample[0], 10);
        assert_eq!(sample.len(), 16);

        // one byte short of a full sample
        let mut short = [0u8; 25];
        let payload = ProtectedPayload::new(6, &mut short);
        assert!(payload.header_protection_sample(16).is_err());
    }
}
