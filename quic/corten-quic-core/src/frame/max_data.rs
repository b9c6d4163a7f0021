// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    frame::{ack_elicitation::AckElicitable, simple_frame_codec, Tag},
    varint::VarInt,
};

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.9
//# A MAX_DATA frame (type=0x10) is used in flow control to inform the
//# peer of the maximum amount of data that can be sent on the connection
//# as a whole.

const TAG: Tag = 0x10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaxData {
    pub maximum_data: VarInt,
}

impl MaxData {
    #[inline]
    pub fn tag(&self) -> Tag {
        TAG
    }
}

impl AckElicitable for MaxData {}

simple_frame_codec!(MaxData { maximum_data }, TAG);
