// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//= https://www.rfc-editor.org/rfc/rfc9000#section-2.1
//# Streams can be unidirectional or bidirectional.  Unidirectional
//# streams carry data in one direction: from the initiator of the stream
//# to its peer.  Bidirectional streams allow for data to be sent in both
//# directions.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamType {
    Bidirectional,
    Unidirectional,
}

impl StreamType {
    #[inline]
    pub fn is_bidirectional(self) -> bool {
        self == StreamType::Bidirectional
    }

    #[inline]
    pub fn is_unidirectional(self) -> bool {
        self == StreamType::Unidirectional
    }
}
