// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    frame::{ack_elicitation::AckElicitable, simple_frame_codec, Tag},
    varint::VarInt,
};

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.5
//# An endpoint uses a STOP_SENDING frame (type=0x05) to communicate that
//# incoming data is being discarded on receipt per application request.
//# STOP_SENDING requests that a peer cease transmission on a stream.

const TAG: Tag = 0x05;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StopSending {
    pub stream_id: VarInt,

    pub application_error_code: VarInt,
}

impl StopSending {
    #[inline]
    pub fn tag(&self) -> Tag {
        TAG
    }
}

impl AckElicitable for StopSending {}

simple_frame_codec!(
    StopSending {
        stream_id,
        application_error_code
    },
    TAG
);
