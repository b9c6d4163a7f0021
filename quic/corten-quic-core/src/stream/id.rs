// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Types and utilities around the QUIC stream identifier

use crate::{endpoint, stream::StreamType, varint::VarInt};

/// The ID of a stream.
///
/// A stream ID is a 62-bit integer that is unique for all streams on a
/// connection. The two low bits carry the initiator and the direction.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Copy, Clone, Hash)]
pub struct StreamId(VarInt);

impl From<StreamId> for VarInt {
    #[inline]
    fn from(id: StreamId) -> Self {
        id.0
    }
}

impl From<StreamId> for u64 {
    #[inline]
    fn from(id: StreamId) -> Self {
        id.0.as_u64()
    }
}

impl StreamId {
    /// Creates a stream ID from a [`VarInt`]; always valid, the two types
    /// share a range
    #[inline]
    pub const fn from_varint(id: VarInt) -> StreamId {
        StreamId(id)
    }

    #[inline]
    pub const fn as_varint(self) -> VarInt {
        self.0
    }

    /// Returns the first stream ID for a given initiator and type, e.g.
    /// the initial server-initiated unidirectional stream is id 3
    #[inline]
    pub fn initial(initiator: endpoint::Type, stream_type: StreamType) -> StreamId {
        //= https://www.rfc-editor.org/rfc/rfc9000#section-2.1
        //# The two least significant bits from a stream ID therefore identify a
        //# stream as one of four types, as summarized in Table 1.
        //#
        //#        +======+==================================+
        //#        | Bits | Stream Type                      |
        //#        +======+==================================+
        //#        | 0x00 | Client-Initiated, Bidirectional  |
        //#        +------+----------------------------------+
        //#        | 0x01 | Server-Initiated, Bidirectional  |
        //#        +------+----------------------------------+
        //#        | 0x02 | Client-Initiated, Unidirectional |
        //#        +------+----------------------------------+
        //#        | 0x03 | Server-Initiated, Unidirectional |
        //#        +------+----------------------------------+

        match (stream_type, initiator) {
            (StreamType::Bidirectional, endpoint::Type::Client) => StreamId(VarInt::from_u8(0)),
            (StreamType::Bidirectional, endpoint::Type::Server) => StreamId(VarInt::from_u8(1)),
            (StreamType::Unidirectional, endpoint::Type::Client) => StreamId(VarInt::from_u8(2)),
            (StreamType::Unidirectional, endpoint::Type::Server) => StreamId(VarInt::from_u8(3)),
        }
    }

    /// Returns the n-th stream ID of a given initiator and type. The 0th
    /// is the one [`Self::initial`] returns; successive ids are spaced
    /// apart by 4. Returns `None` when the id would leave the varint
    /// range.
    #[inline]
    pub fn nth(initiator: endpoint::Type, stream_type: StreamType, n: u64) -> Option<StreamId> {
        let initial = Self::initial(initiator, stream_type);
        let id = VarInt::new(n.checked_mul(4)?.checked_add(initial.into())?).ok()?;
        Some(StreamId(id))
    }

    /// Returns the next stream ID with the same initiator and direction,
    /// or `None` at the top of the range
    #[inline]
    pub fn next_of_type(self) -> Option<StreamId> {
        self.0
            .checked_add(VarInt::from_u8(4))
            .map(StreamId::from_varint)
    }

    /// Returns whether the client or the server initiated the stream
    #[inline]
    pub fn initiator(self) -> endpoint::Type {
        //= https://www.rfc-editor.org/rfc/rfc9000#section-2.1
        //# The least significant bit (0x01) of the stream ID identifies the
        //# initiator of the stream.
        if self.0.as_u64() & 0x01 == 0 {
            endpoint::Type::Client
        } else {
            endpoint::Type::Server
        }
    }

    /// Returns whether the stream is bidirectional or unidirectional
    #[inline]
    pub fn stream_type(self) -> StreamType {
        //= https://www.rfc-editor.org/rfc/rfc9000#section-2.1
        //# The second least significant bit (0x02) of the stream ID
        //# distinguishes between bidirectional streams (with the bit set
        //# to 0) and unidirectional streams (with the bit set to 1).
        if self.0.as_u64() & 0x02 == 0 {
            StreamType::Bidirectional
        } else {
            StreamType::Unidirectional
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_stream_ids_test() {
        for stream_type in [StreamType::Bidirectional, StreamType::Unidirectional] {
            for initiator in [endpoint::Type::Client, endpoint::Type::Server] {
                let id = StreamId::initial(initiator, stream_type);
                assert_eq!(stream_type, id.stream_type());
                assert_eq!(initiator, id.initiator());
            }
        }
    }

    #[test]
    fn allocation_sequence_test() {
        // client bidi allocates 0, 4, 8
        let mut id = StreamId::initial(endpoint::Type::Client, StreamType::Bidirectional);
        assert_eq!(u64::from(id), 0);
        id = id.next_of_type().unwrap();
        assert_eq!(u64::from(id), 4);
        id = id.next_of_type().unwrap();
        assert_eq!(u64::from(id), 8);

        // server uni allocates 3, 7, 11
        let mut id = StreamId::initial(endpoint::Type::Server, StreamType::Unidirectional);
        assert_eq!(u64::from(id), 3);
        id = id.next_of_type().unwrap();
        assert_eq!(u64::from(id), 7);
        id = id.next_of_type().unwrap();
        assert_eq!(u64::from(id), 11);
    }

    #[test]
    fn nth_test() {
        for stream_type in [StreamType::Bidirectional, StreamType::Unidirectional] {
            for initiator in [endpoint::Type::Client, endpoint::Type::Server] {
                let first = StreamId::nth(initiator, stream_type, 0).unwrap();
                assert_eq!(StreamId::initial(initiator, stream_type), first);

                for n in 1..10u64 {
                    let nth = StreamId::nth(initiator, stream_type, n).unwrap();
                    assert_eq!(n * 4, u64::from(nth) - u64::from(first));
                }
            }
        }
    }

    #[test]
    fn overflow_test() {
        let max = StreamId::from_varint(VarInt::MAX);
        assert!(max.next_of_type().is_none());

        assert!(StreamId::nth(
            endpoint::Type::Client,
            StreamType::Bidirectional,
            u64::MAX / 2
        )
        .is_none());
    }
}
