// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    frame::{ack_elicitation::AckElicitable, simple_frame_codec, Tag},
    varint::VarInt,
};

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.10
//# A MAX_STREAM_DATA frame (type=0x11) is used in flow control to inform
//# a peer of the maximum amount of data that can be sent on a stream.

const TAG: Tag = 0x11;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaxStreamData {
    pub stream_id: VarInt,

    pub maximum_stream_data: VarInt,
}

impl MaxStreamData {
    #[inline]
    pub fn tag(&self) -> Tag {
        TAG
    }
}

impl AckElicitable for MaxStreamData {}

simple_frame_codec!(
    MaxStreamData {
        stream_id,
        maximum_stream_data
    },
    TAG
);
