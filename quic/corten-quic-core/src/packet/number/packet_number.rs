// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    packet::number::{derive_truncation_range, PacketNumberSpace, TruncatedPacketNumber},
    varint::VarInt,
};
use core::fmt;

/// A full 62-bit packet number tagged with its packet number space
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PacketNumber {
    space: PacketNumberSpace,
    value: VarInt,
}

impl fmt::Debug for PacketNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PacketNumber({:?}, {})", self.space, self.value)
    }
}

impl PacketNumber {
    #[inline]
    pub(crate) const fn from_varint(value: VarInt, space: PacketNumberSpace) -> Self {
        Self { space, value }
    }

    #[inline]
    pub fn space(self) -> PacketNumberSpace {
        self.space
    }

    #[inline]
    pub fn as_u64(self) -> u64 {
        self.value.as_u64()
    }

    #[inline]
    pub fn as_varint(self) -> VarInt {
        self.value
    }

    /// The packet number interpretation used for the AEAD nonce
    #[inline]
    pub fn as_crypto_nonce(self) -> u64 {
        self.value.as_u64()
    }

    /// Returns the packet number that follows this one, unless the space
    /// is exhausted
    #[inline]
    pub fn next(self) -> Option<Self> {
        let value = self.value.checked_add(VarInt::from_u8(1))?;
        Some(Self::from_varint(value, self.space))
    }

    /// Truncates the packet number for encoding, given the largest packet
    /// number the peer has acknowledged in this space
    #[inline]
    pub fn truncate(
        self,
        largest_acknowledged: Option<PacketNumber>,
    ) -> Option<TruncatedPacketNumber> {
        let len = derive_truncation_range(largest_acknowledged, self)?;
        Some(TruncatedPacketNumber::truncate_packet_number(self, len))
    }
}
