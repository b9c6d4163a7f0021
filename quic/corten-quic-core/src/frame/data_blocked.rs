// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    frame::{ack_elicitation::AckElicitable, simple_frame_codec, Tag},
    varint::VarInt,
};

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.12
//# A sender SHOULD send a DATA_BLOCKED frame (type=0x14) when it wishes
//# to send data but is unable to do so due to connection-level flow
//# control.

const TAG: Tag = 0x14;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataBlocked {
    /// The connection-level limit at which blocking occurred
    pub data_limit: VarInt,
}

impl DataBlocked {
    #[inline]
    pub fn tag(&self) -> Tag {
        TAG
    }
}

impl AckElicitable for DataBlocked {}

simple_frame_codec!(DataBlocked { data_limit }, TAG);
