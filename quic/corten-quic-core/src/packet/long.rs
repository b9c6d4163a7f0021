// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::connection;
use corten_codec::{decoder_invariant, DecoderBufferMut, DecoderError};

//= https://www.rfc-editor.org/rfc/rfc9000#section-17.2
//# Long Header Packet {
//#   Header Form (1) = 1,
//#   Fixed Bit (1) = 1,
//#   Long Packet Type (2),
//#   Type-Specific Bits (4),
//#   Version (32),
//#   Destination Connection ID Length (8),
//#   Destination Connection ID (0..160),
//#   Source Connection ID Length (8),
//#   Source Connection ID (0..160),
//# }

//= https://www.rfc-editor.org/rfc/rfc9000#section-17.2
//# Header Form:  The most significant bit (0x80) of byte 0 (the first
//#   byte) is set to 1 for long headers.
pub(crate) const FORM_MASK: u8 = 0x80;

//= https://www.rfc-editor.org/rfc/rfc9000#section-17.2
//# Fixed Bit:  The next bit (0x40) of byte 0 is set to 1.
pub(crate) const FIXED_BIT: u8 = 0x40;

pub(crate) const PACKET_TYPE_MASK: u8 = 0x30;
const PACKET_TYPE_OFFSET: u8 = 4;

pub type Version = u32;

//= https://www.rfc-editor.org/rfc/rfc9000#section-15
//# Version 1 of QUIC uses the version value 0x00000001.
pub const VERSION_ONE: Version = 0x0000_0001;

//= https://www.rfc-editor.org/rfc/rfc9000#section-17.2
//# In this version of QUIC, the following packet types with the long
//# header are defined:
//#
//#                 +======+===========+================+
//#                 | Type | Name      | Section        |
//#                 +======+===========+================+
//#                 | 0x00 | Initial   | Section 17.2.2 |
//#                 +------+-----------+----------------+
//#                 | 0x01 | 0-RTT     | Section 17.2.3 |
//#                 +------+-----------+----------------+
//#                 | 0x02 | Handshake | Section 17.2.4 |
//#                 +------+-----------+----------------+
//#                 | 0x03 | Retry     | Section 17.2.5 |
//#                 +------+-----------+----------------+

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketType {
    Initial,
    ZeroRtt,
    Handshake,
    Retry,
}

impl PacketType {
    /// Reads the packet type out of a long header first byte
    #[inline]
    pub fn from_tag(tag: u8) -> Self {
        match (tag & PACKET_TYPE_MASK) >> PACKET_TYPE_OFFSET {
            0x0 => PacketType::Initial,
            0x1 => PacketType::ZeroRtt,
            0x2 => PacketType::Handshake,
            _ => PacketType::Retry,
        }
    }

    #[inline]
    pub(crate) const fn into_tag_bits(self) -> u8 {
        let bits = match self {
            PacketType::Initial => 0x0,
            PacketType::ZeroRtt => 0x1,
            PacketType::Handshake => 0x2,
            PacketType::Retry => 0x3,
        };
        (bits << PACKET_TYPE_OFFSET) & PACKET_TYPE_MASK
    }
}

/// The common prefix of every long header, parsed without any key material
#[derive(Debug)]
pub(crate) struct Header<'a> {
    pub tag: u8,
    pub packet_type: PacketType,
    pub version: Version,
    pub destination_connection_id: connection::Id,
    pub source_connection_id: connection::Id,
    /// Bytes consumed from the packet start through the source connection id
    pub consumed: usize,
    /// The untouched datagram bytes, starting at this packet
    pub buffer: DecoderBufferMut<'a>,
}

impl<'a> Header<'a> {
    pub(crate) fn decode(buffer: DecoderBufferMut<'a>) -> Result<Self, DecoderError> {
        let peek = buffer.peek();
        let total = peek.len();

        let (tag, peek) = peek.decode::<u8>()?;
        let (version, peek) = peek.decode::<Version>()?;

        if version != crate::packet::version_negotiation::VERSION {
            //= https://www.rfc-editor.org/rfc/rfc9000#section-17.2
            //# Packets containing a zero value for this bit are not valid
            //# packets in this version and MUST be discarded.
            decoder_invariant!(tag & FIXED_BIT == FIXED_BIT, "fixed bit must be set");
        }

        let (destination_connection_id, peek) = peek.decode::<connection::Id>()?;
        let (source_connection_id, peek) = peek.decode::<connection::Id>()?;

        let consumed = total - peek.len();

        Ok(Self {
            tag,
            packet_type: PacketType::from_tag(tag),
            version,
            destination_connection_id,
            source_connection_id,
            consumed,
            buffer,
        })
    }
}
