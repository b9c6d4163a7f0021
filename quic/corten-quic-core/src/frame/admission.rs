// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{crypto::Level, frame::Tag};

//= https://www.rfc-editor.org/rfc/rfc9000#section-12.4
//# The Pkts column in Table 3 lists the types of packets that each frame
//# type could appear in, indicated by the following characters:
//#
//# I:  Initial (Section 17.2.2)
//# H:  Handshake (Section 17.2.4)
//# 0:  0-RTT (Section 17.2.3)
//# 1:  1-RTT (Section 17.3.1)

/// Returns whether a frame with `tag` may appear in a packet protected at
/// `level`.
///
/// Receiving a frame in a packet type that does not admit it is a
/// connection error of type PROTOCOL_VIOLATION.
pub fn is_allowed(tag: Tag, level: Level) -> bool {
    use Level::*;

    match tag {
        // PADDING, CONNECTION_CLOSE (transport)
        0x00 | 0x1c => true,
        // PING, ACK, CRYPTO
        0x01 | 0x02 | 0x03 | 0x06 => matches!(level, Initial | Handshake | OneRtt),
        // NEW_TOKEN, RETIRE_CONNECTION_ID, PATH_RESPONSE, HANDSHAKE_DONE
        0x07 | 0x19 | 0x1b | 0x1e => matches!(level, OneRtt),
        // PATH_CHALLENGE
        0x1a => matches!(level, Handshake | OneRtt),
        // the stream, flow control, connection id and application close
        // frames all ride in application packets only
        0x04 | 0x05 | 0x08..=0x18 | 0x1d => matches!(level, ZeroRtt | OneRtt),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_test() {
        use Level::*;
        let all = [Initial, ZeroRtt, Handshake, OneRtt];

        // (tag, allowed levels)
        let table: &[(Tag, &[Level])] = &[
            (0x00, &[Initial, ZeroRtt, Handshake, OneRtt]),
            (0x01, &[Initial, Handshake, OneRtt]),
            (0x02, &[Initial, Handshake, OneRtt]),
            (0x03, &[Initial, Handshake, OneRtt]),
            (0x04, &[ZeroRtt, OneRtt]),
            (0x05, &[ZeroRtt, OneRtt]),
            (0x06, &[Initial, Handshake, OneRtt]),
            (0x07, &[OneRtt]),
            (0x08, &[ZeroRtt, OneRtt]),
            (0x0f, &[ZeroRtt, OneRtt]),
            (0x10, &[ZeroRtt, OneRtt]),
            (0x11, &[ZeroRtt, OneRtt]),
            (0x12, &[ZeroRtt, OneRtt]),
            (0x13, &[ZeroRtt, OneRtt]),
            (0x14, &[ZeroRtt, OneRtt]),
            (0x15, &[ZeroRtt, OneRtt]),
            (0x16, &[ZeroRtt, OneRtt]),
            (0x17, &[ZeroRtt, OneRtt]),
            (0x18, &[ZeroRtt, OneRtt]),
            (0x19, &[OneRtt]),
            (0x1a, &[Handshake, OneRtt]),
            (0x1b, &[OneRtt]),
            (0x1c, &[Initial, ZeroRtt, Handshake, OneRtt]),
            (0x1d, &[ZeroRtt, OneRtt]),
            (0x1e, &[OneRtt]),
        ];

        for (tag, allowed) in table {
            for level in all {
                assert_eq!(
                    is_allowed(*tag, level),
                    allowed.contains(&level),
                    "tag {tag:#x} at {level:?}"
                );
            }
        }
    }

    #[test]
    fn unknown_tag_test() {
        assert!(!is_allowed(0x1f, Level::OneRtt));
        assert!(!is_allowed(0xff, Level::OneRtt));
    }
}
