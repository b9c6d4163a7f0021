// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    packet::number::{PacketNumber, PacketNumberLen, PACKET_NUMBER_LEN_MASK},
    varint::VarInt,
};

//= https://www.rfc-editor.org/rfc/rfc9000#section-12.3
//# *  Initial space: All Initial packets (Section 17.2.2) are in this
//#    space.
//#
//# *  Handshake space: All Handshake packets (Section 17.2.4) are in
//#    this space.
//#
//# *  Application data space: All 0-RTT (Section 17.2.3) and 1-RTT
//#    (Section 17.3) packets are in this space.

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PacketNumberSpace {
    #[default]
    Initial,
    Handshake,
    ApplicationData,
}

impl PacketNumberSpace {
    #[inline]
    pub fn is_initial(self) -> bool {
        matches!(self, Self::Initial)
    }

    #[inline]
    pub fn is_handshake(self) -> bool {
        matches!(self, Self::Handshake)
    }

    #[inline]
    pub fn is_application_data(self) -> bool {
        matches!(self, Self::ApplicationData)
    }

    /// Creates a full packet number in this space
    #[inline]
    pub fn new_packet_number(self, value: VarInt) -> PacketNumber {
        PacketNumber::from_varint(value, self)
    }

    /// Reads the packet number length out of an unprotected packet tag
    #[inline]
    pub fn new_packet_number_len(self, tag: u8) -> PacketNumberLen {
        PacketNumberLen::for_bytesize(((tag & PACKET_NUMBER_LEN_MASK) + 1) as usize, self)
            .expect("the mask limits the length to 4 bytes")
    }

    #[inline]
    pub fn assert_eq(self, other: Self) {
        debug_assert_eq!(
            self, other,
            "packet numbers from different spaces cannot be compared"
        );
    }
}
