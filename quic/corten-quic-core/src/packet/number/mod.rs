// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//= https://www.rfc-editor.org/rfc/rfc9000#section-12.3
//# The packet number is an integer in the range 0 to 2^62-1.  This
//# number is used in determining the cryptographic nonce for packet
//# protection.  Each endpoint maintains a separate packet number for
//# sending and receiving.

mod packet_number;
mod packet_number_len;
mod packet_number_space;
mod sliding_window;
mod truncated_packet_number;

pub use packet_number::PacketNumber;
pub use packet_number_len::PacketNumberLen;
pub use packet_number_space::PacketNumberSpace;
pub use sliding_window::{SlidingWindow, SlidingWindowError};
pub use truncated_packet_number::TruncatedPacketNumber;

use crate::varint::{VarInt, MAX_VARINT_VALUE};

/// The packet number len is the two least significant bits of the packet tag
pub(crate) const PACKET_NUMBER_LEN_MASK: u8 = 0b11;

//= https://www.rfc-editor.org/rfc/rfc9000#section-17.1
//# the sender MUST use a packet number size able to represent more than
//# twice as large a range than the difference between the largest
//# acknowledged packet and packet number being sent.

pub(crate) fn derive_truncation_range(
    largest_acknowledged: Option<PacketNumber>,
    packet_number: PacketNumber,
) -> Option<PacketNumberLen> {
    let space = packet_number.space();

    let unacknowledged = match largest_acknowledged {
        Some(largest) => {
            space.assert_eq(largest.space());
            packet_number.as_u64().checked_sub(largest.as_u64())?
        }
        // nothing has been acknowledged yet so the window covers
        // every packet sent so far
        None => packet_number.as_u64() + 1,
    };

    let twice_range = unacknowledged.checked_mul(2)?;
    PacketNumberLen::for_value(twice_range, space)
}

//= https://www.rfc-editor.org/rfc/rfc9000#appendix-A.3
//# DecodePacketNumber(largest_pn, truncated_pn, pn_nbits):
//#    expected_pn  = largest_pn + 1
//#    pn_win       = 1 << pn_nbits
//#    pn_hwin      = pn_win / 2
//#    pn_mask      = pn_win - 1
//#    // The incoming packet number should be greater than
//#    // expected_pn - pn_hwin and less than or equal to
//#    // expected_pn + pn_hwin
//#    //
//#    // This means we cannot just strip the trailing bits from
//#    // expected_pn and add the truncated_pn because that might
//#    // yield a value outside the window.
//#    //
//#    // The following code calculates a candidate value and
//#    // makes sure it's within the packet number window.
//#    // Note the extra checks to prevent overflow and underflow.
//#    candidate_pn = (expected_pn & ~pn_mask) | truncated_pn
//#    if candidate_pn <= expected_pn - pn_hwin and
//#       candidate_pn < (1 << 62) - pn_win:
//#       return candidate_pn + pn_win
//#    if candidate_pn > expected_pn + pn_hwin and
//#       candidate_pn >= pn_win:
//#       return candidate_pn - pn_win
//#    return candidate_pn

pub(crate) fn decode_packet_number(
    largest_received: Option<PacketNumber>,
    truncated_pn: TruncatedPacketNumber,
) -> PacketNumber {
    let space = truncated_pn.space();

    let expected_pn = match largest_received {
        Some(largest) => {
            space.assert_eq(largest.space());
            largest.as_u64() + 1
        }
        None => 0,
    };

    let pn_nbits = truncated_pn.bitsize() as u32;
    let pn_win = 1u64 << pn_nbits;
    let pn_hwin = pn_win / 2;
    let pn_mask = pn_win - 1;

    let mut candidate_pn = (expected_pn & !pn_mask) | truncated_pn.into_u64();

    if expected_pn >= pn_hwin
        && candidate_pn <= expected_pn - pn_hwin
        && candidate_pn < (1u64 << 62) - pn_win
    {
        candidate_pn += pn_win;
    } else if candidate_pn > expected_pn + pn_hwin && candidate_pn >= pn_win {
        candidate_pn -= pn_win;
    }

    let candidate_pn = candidate_pn.min(MAX_VARINT_VALUE);
    let candidate_pn = VarInt::new(candidate_pn).expect("the candidate was clamped above");

    PacketNumber::from_varint(candidate_pn, space)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bolero::check;

    fn new(value: u64) -> PacketNumber {
        PacketNumberSpace::Initial.new_packet_number(VarInt::new(value).unwrap())
    }

    //= https://www.rfc-editor.org/rfc/rfc9000#section-17.1
    //= type=test
    //# For example, if an endpoint has received an acknowledgment for packet
    //# 0xabe8b3, sending a packet with a number of 0xac5c02 requires a
    //# packet number encoding with 16 bits or more
    #[test]
    fn truncation_length_example_test() {
        let largest_acked = new(0x00ab_e8b3);

        let truncated = new(0x00ac_5c02).truncate(Some(largest_acked)).unwrap();
        assert_eq!(truncated.bitsize(), 16);
        assert_eq!(truncated.into_u64(), 0x5c02);

        let truncated = new(0x00ac_e8fe).truncate(Some(largest_acked)).unwrap();
        assert_eq!(truncated.bitsize(), 24);
    }

    //= https://www.rfc-editor.org/rfc/rfc9000#section-17.1
    //= type=test
    //# if the highest successfully
    //# authenticated packet had a packet number of 0xa82f30ea, then a packet
    //# containing a 16-bit value of 0x9b32 will be decoded as 0xa82f9b32.
    #[test]
    fn decoding_example_test() {
        let space = PacketNumberSpace::Initial;
        let len = PacketNumberLen::for_bytesize(2, space).unwrap();
        let truncated = TruncatedPacketNumber::new(0x9b32, len);

        let largest = new(0xa82f_30ea);
        assert_eq!(truncated.expand(Some(largest)), new(0xa82f_9b32));
    }

    #[test]
    fn sender_receiver_agreement_test() {
        // the sender's length choice must reconstruct on the receiver
        let largest = new(0x00ab_e8b3);
        let pn = new(0x00ac_5c02);

        let truncated = pn.truncate(Some(largest)).unwrap();
        assert_eq!(truncated.expand(Some(largest)), pn);
    }

    #[test]
    fn first_packet_test() {
        // before anything is received, a full-length zero expands to zero
        let truncated = new(0).truncate(None).unwrap();
        assert_eq!(truncated.bitsize(), 8);
        assert_eq!(truncated.expand(None).as_u64(), 0);
    }

    /// This implementation follows the RFC pseudo code closely so the
    /// optimized version can be checked against it
    fn rfc_decoder(largest_pn: u64, truncated_pn: u64, pn_nbits: u32) -> u64 {
        let expected_pn = largest_pn + 1;
        let pn_win = 1u64 << pn_nbits;
        let pn_hwin = pn_win / 2;
        let pn_mask = pn_win - 1;

        let candidate_pn = (expected_pn & !pn_mask) | truncated_pn;
        if expected_pn.checked_sub(pn_hwin).map_or(false, |low| candidate_pn <= low)
            && candidate_pn < (1u64 << 62) - pn_win
        {
            return candidate_pn + pn_win;
        }
        if candidate_pn > expected_pn + pn_hwin && candidate_pn >= pn_win {
            return candidate_pn - pn_win;
        }
        candidate_pn
    }

    #[test]
    fn truncate_expand_property_test() {
        check!()
            .with_type::<(u64, u64)>()
            .cloned()
            .for_each(|(largest, pn)| {
                let largest = new(largest & MAX_VARINT_VALUE);
                let pn = new(pn & MAX_VARINT_VALUE);

                if let Some(truncated) = pn.truncate(Some(largest)) {
                    assert_eq!(pn, truncated.expand(Some(largest)));
                }
            });
    }

    #[test]
    fn rfc_differential_test() {
        check!()
            .with_type::<(u64, u32, u8)>()
            .cloned()
            .for_each(|(largest, truncated, len)| {
                let space = PacketNumberSpace::Initial;
                let largest = largest & MAX_VARINT_VALUE;
                let bytesize = (len as usize % 4) + 1;
                let len = PacketNumberLen::for_bytesize(bytesize, space).unwrap();
                let truncated = truncated & (len.max_value() as u32);
                let truncated = TruncatedPacketNumber::new(truncated, len);

                let rfc_value = rfc_decoder(largest, truncated.into_u64(), truncated.bitsize() as u32)
                    .min(MAX_VARINT_VALUE);
                let actual = truncated
                    .expand(Some(new(largest)))
                    .as_u64();

                assert_eq!(actual, rfc_value);
            });
    }
}
