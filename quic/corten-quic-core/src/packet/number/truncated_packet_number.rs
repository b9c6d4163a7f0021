// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::packet::number::{
    decode_packet_number, PacketNumber, PacketNumberLen, PacketNumberSpace,
};
use corten_codec::{Encoder, EncoderValue};

/// The low bits of a packet number as they appear on the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TruncatedPacketNumber {
    value: u32,
    len: PacketNumberLen,
}

impl TruncatedPacketNumber {
    #[inline]
    pub fn new(value: u32, len: PacketNumberLen) -> Self {
        debug_assert!(u64::from(value) <= len.max_value());
        Self { value, len }
    }

    #[inline]
    pub fn space(self) -> PacketNumberSpace {
        self.len.space()
    }

    #[inline]
    pub fn len(self) -> PacketNumberLen {
        self.len
    }

    #[inline]
    pub fn bytesize(self) -> usize {
        self.len.bytesize()
    }

    #[inline]
    pub fn bitsize(self) -> usize {
        self.len.bitsize()
    }

    #[inline]
    pub fn into_u64(self) -> u64 {
        self.value.into()
    }

    /// Reconstructs the full packet number, given the largest packet number
    /// received so far in this space
    #[inline]
    pub fn expand(self, largest_received: Option<PacketNumber>) -> PacketNumber {
        decode_packet_number(largest_received, self)
    }

    /// Truncates a full packet number to the low bits selected by `len`
    #[inline]
    pub(crate) fn truncate_packet_number(
        packet_number: PacketNumber,
        len: PacketNumberLen,
    ) -> Self {
        let value = (packet_number.as_u64() & len.max_value()) as u32;
        Self::new(value, len)
    }
}

impl EncoderValue for TruncatedPacketNumber {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        let bytes = self.value.to_be_bytes();
        encoder.write_slice(&bytes[(4 - self.bytesize())..]);
    }
}
