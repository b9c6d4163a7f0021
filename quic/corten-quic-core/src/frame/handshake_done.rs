// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::frame::{ack_elicitation::AckElicitable, simple_frame_codec, Tag};

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.20
//# The server uses a HANDSHAKE_DONE frame (type=0x1e) to signal
//# confirmation of the handshake to the client.

const TAG: Tag = 0x1e;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HandshakeDone;

impl HandshakeDone {
    #[inline]
    pub fn tag(&self) -> Tag {
        TAG
    }
}

impl AckElicitable for HandshakeDone {}

simple_frame_codec!(HandshakeDone {}, TAG);
