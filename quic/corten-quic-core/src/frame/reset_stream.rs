// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    frame::{ack_elicitation::AckElicitable, simple_frame_codec, Tag},
    varint::VarInt,
};

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.4
//# An endpoint uses a RESET_STREAM frame (type=0x04) to abruptly
//# terminate the sending part of a stream.
//#
//# RESET_STREAM Frame {
//#   Type (i) = 0x04,
//#   Stream ID (i),
//#   Application Protocol Error Code (i),
//#   Final Size (i),
//# }

const TAG: Tag = 0x04;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResetStream {
    pub stream_id: VarInt,

    /// The application-defined reason the stream is being closed
    pub application_error_code: VarInt,

    /// The final size of the stream in bytes
    pub final_size: VarInt,
}

impl ResetStream {
    #[inline]
    pub fn tag(&self) -> Tag {
        TAG
    }
}

impl AckElicitable for ResetStream {}

simple_frame_codec!(
    ResetStream {
        stream_id,
        application_error_code,
        final_size
    },
    TAG
);
