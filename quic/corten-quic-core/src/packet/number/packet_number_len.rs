// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::packet::number::{PacketNumberSpace, TruncatedPacketNumber};
use corten_codec::{DecoderBuffer, DecoderBufferResult, DecoderError};

//= https://www.rfc-editor.org/rfc/rfc9000#section-17.1
//# When present in long or short packet headers, they are encoded in 1
//# to 4 bytes.

/// The on-wire length of a truncated packet number, 1 to 4 bytes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PacketNumberLen {
    bytesize: u8,
    space: PacketNumberSpace,
}

impl PacketNumberLen {
    pub const MAX_BYTESIZE: usize = 4;

    /// Creates a length of `bytesize` bytes; `None` unless 1..=4
    #[inline]
    pub fn for_bytesize(bytesize: usize, space: PacketNumberSpace) -> Option<Self> {
        if (1..=Self::MAX_BYTESIZE).contains(&bytesize) {
            Some(Self {
                bytesize: bytesize as u8,
                space,
            })
        } else {
            None
        }
    }

    /// Returns the smallest length able to represent `value`
    #[inline]
    pub(crate) fn for_value(value: u64, space: PacketNumberSpace) -> Option<Self> {
        let bytesize = match value {
            0..=0xff => 1,
            0x100..=0xffff => 2,
            0x1_0000..=0xff_ffff => 3,
            0x100_0000..=0xffff_ffff => 4,
            _ => return None,
        };
        Self::for_bytesize(bytesize, space)
    }

    #[inline]
    pub fn space(self) -> PacketNumberSpace {
        self.space
    }

    #[inline]
    pub fn bytesize(self) -> usize {
        self.bytesize as usize
    }

    #[inline]
    pub fn bitsize(self) -> usize {
        self.bytesize() * 8
    }

    /// The largest truncated value this length can carry
    #[inline]
    pub fn max_value(self) -> u64 {
        (1u64 << self.bitsize()) - 1
    }

    /// The two tag bits encoding this length (one less than the bytesize)
    #[inline]
    pub fn into_packet_tag_mask(self) -> u8 {
        self.bytesize - 1
    }

    /// Reads a truncated packet number of this length
    #[inline]
    pub fn decode_truncated_packet_number<'a>(
        self,
        buffer: DecoderBuffer<'a>,
    ) -> DecoderBufferResult<'a, TruncatedPacketNumber> {
        let (slice, buffer) = buffer.decode_slice(self.bytesize())?;
        let slice = slice.as_less_safe_slice();

        let mut value = 0u32;
        for byte in slice {
            value = (value << 8) | u32::from(*byte);
        }

        Ok((TruncatedPacketNumber::new(value, self), buffer))
    }
}

impl From<PacketNumberLen> for DecoderError {
    fn from(_len: PacketNumberLen) -> Self {
        DecoderError::InvariantViolation("invalid packet number length")
    }
}
