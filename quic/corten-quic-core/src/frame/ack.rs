// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    frame::{
        ack_elicitation::{AckElicitable, AckElicitation},
        Tag,
    },
    varint::VarInt,
};
use core::{convert::TryInto, ops::RangeInclusive, time::Duration};
use corten_codec::{
    decoder_invariant, decoder_parameterized_value, decoder_value, DecoderBuffer, DecoderError,
    Encoder, EncoderValue,
};

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.3
//# Receivers send ACK frames (types 0x02 and 0x03) to inform senders of
//# packets they have received and processed.  The ACK frame contains one
//# or more ACK Ranges.  ACK Ranges identify acknowledged packets.  If
//# the frame type is 0x03, ACK frames also contain the cumulative count
//# of QUIC packets with associated ECN marks received on the connection
//# up until this point.

const ACK_TAG: Tag = 0x02;
const ACK_W_ECN_TAG: Tag = 0x03;

/// Decoding more ranges than this is refused outright: a small frame can
/// otherwise claim an enormous range count
pub const MAX_ACK_RANGES: usize = 256;

const ACK_RANGE_DECODING_ERROR: DecoderError =
    DecoderError::InvariantViolation("invalid ACK ranges");

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.3
//# ACK Frame {
//#   Type (i) = 0x02..0x03,
//#   Largest Acknowledged (i),
//#   ACK Delay (i),
//#   ACK Range Count (i),
//#   First ACK Range (i),
//#   ACK Range (..) ...,
//#   [ECN Counts (..)],
//# }

#[derive(Clone, PartialEq, Eq)]
pub struct Ack<AckRanges> {
    /// The acknowledgement delay as carried on the wire, shifted by the
    /// peer's ack_delay_exponent
    pub ack_delay: VarInt,

    pub ack_ranges: AckRanges,

    pub ecn_counts: Option<EcnCounts>,
}

impl<A> Ack<A> {
    #[inline]
    pub fn tag(&self) -> Tag {
        if self.ecn_counts.is_some() {
            ACK_W_ECN_TAG
        } else {
            ACK_TAG
        }
    }

    //= https://www.rfc-editor.org/rfc/rfc9000#section-19.3
    //# ACK Delay:  A variable-length integer encoding the acknowledgment
    //# delay in microseconds; see Section 13.2.5.  It is decoded by
    //# multiplying the value in the field by 2 to the power of the
    //# ack_delay_exponent transport parameter sent by the sender of the
    //# ACK frame

    /// Decodes the delay with the peer's exponent, saturating on overflow
    #[inline]
    pub fn ack_delay(&self, ack_delay_exponent: u8) -> Duration {
        // the exponent is capped at 20 but the wire value spans 62 bits,
        // so the product can exceed u64; widen before shifting
        let micros = (self.ack_delay.as_u64() as u128)
            .checked_shl(ack_delay_exponent as u32)
            .unwrap_or(u128::MAX);
        let micros = u64::try_from(micros).unwrap_or(u64::MAX);
        Duration::from_micros(micros)
    }
}

impl<A: AckRanges> Ack<A> {
    #[inline]
    pub fn ack_ranges(&self) -> A::Iter {
        self.ack_ranges.ack_ranges()
    }

    #[inline]
    pub fn largest_acknowledged(&self) -> VarInt {
        self.ack_ranges.largest_acknowledged()
    }
}

impl<A> AckElicitable for Ack<A> {
    #[inline]
    fn ack_elicitation(&self) -> AckElicitation {
        AckElicitation::NonEliciting
    }
}

impl<A: core::fmt::Debug> core::fmt::Debug for Ack<A> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Ack")
            .field("ack_delay", &self.ack_delay)
            .field("ack_ranges", &self.ack_ranges)
            .field("ecn_counts", &self.ecn_counts)
            .finish()
    }
}

decoder_parameterized_value!(
    impl<'a> Ack<AckRangesDecoder<'a>> {
        fn decode(tag: Tag, buffer: Buffer) -> Result<Self> {
            let (largest_acknowledged, buffer) = buffer.decode()?;
            let (ack_delay, buffer) = buffer.decode()?;
            let (ack_ranges, buffer) = buffer.decode_parameterized(largest_acknowledged)?;

            let (ecn_counts, buffer) = if tag == ACK_W_ECN_TAG {
                let (ecn_counts, buffer) = buffer.decode()?;
                (Some(ecn_counts), buffer)
            } else {
                (None, buffer)
            };

            let frame = Ack {
                ack_delay,
                ack_ranges,
                ecn_counts,
            };

            Ok((frame, buffer))
        }
    }
);

impl<A: AckRanges> EncoderValue for Ack<A> {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.tag());

        let mut iter = self.ack_ranges.ack_ranges();

        let first_ack_range = iter.next().expect("at least one ack range is required");
        let (mut smallest, largest_acknowledged) = first_ack_range.into_inner();
        let first_ack_range = largest_acknowledged - smallest;

        let ack_range_count: VarInt = iter
            .len()
            .try_into()
            .expect("ack range count cannot exceed VarInt::MAX");

        buffer.encode(&largest_acknowledged);
        buffer.encode(&self.ack_delay);
        buffer.encode(&ack_range_count);
        buffer.encode(&first_ack_range);

        for range in iter {
            let (start, end) = range.into_inner();

            //= https://www.rfc-editor.org/rfc/rfc9000#section-19.3.1
            //# Gap:  A variable-length integer indicating the number of
            //# contiguous unacknowledged packets preceding the packet number
            //# one lower than the smallest in the preceding ACK Range.
            let gap = smallest - end - VarInt::from_u8(2);
            let ack_range = end - start;

            buffer.encode(&gap);
            buffer.encode(&ack_range);
            smallest = start;
        }

        if let Some(ecn_counts) = self.ecn_counts.as_ref() {
            buffer.encode(ecn_counts);
        }
    }
}

/// A view over the ranges of an ACK frame, iterated in descending packet
/// number order
pub trait AckRanges {
    type Iter: Iterator<Item = RangeInclusive<VarInt>> + ExactSizeIterator;

    fn ack_ranges(&self) -> Self::Iter;

    fn largest_acknowledged(&self) -> VarInt {
        *self
            .ack_ranges()
            .next()
            .expect("at least one ack range is required")
            .end()
    }
}

#[derive(Clone, Copy)]
pub struct AckRangesDecoder<'a> {
    largest_acknowledged: VarInt,
    ack_range_count: VarInt,
    range_buffer: DecoderBuffer<'a>,
}

impl<'a> AckRanges for AckRangesDecoder<'a> {
    type Iter = AckRangesIter<'a>;

    #[inline]
    fn ack_ranges(&self) -> Self::Iter {
        AckRangesIter {
            largest_acknowledged: self.largest_acknowledged,
            ack_range_count: self.ack_range_count,
            range_buffer: self.range_buffer,
        }
    }

    #[inline]
    fn largest_acknowledged(&self) -> VarInt {
        self.largest_acknowledged
    }
}

impl<'a> PartialEq for AckRangesDecoder<'a> {
    fn eq(&self, other: &Self) -> bool {
        self.ack_ranges().eq(other.ack_ranges())
    }
}

impl<'a> Eq for AckRangesDecoder<'a> {}

impl<'a> core::fmt::Debug for AckRangesDecoder<'a> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_list().entries(self.ack_ranges()).finish()
    }
}

decoder_parameterized_value!(
    impl<'a> AckRangesDecoder<'a> {
        fn decode(largest_acknowledged: VarInt, buffer: Buffer) -> Result<AckRangesDecoder<'a>> {
            //= https://www.rfc-editor.org/rfc/rfc9000#section-19.3
            //# ACK Range Count:  A variable-length integer specifying the
            //# number of ACK Range fields in the frame.
            let (mut ack_range_count, buffer) = buffer.decode::<VarInt>()?;

            // the count excludes the first range
            ack_range_count = ack_range_count
                .checked_add(VarInt::from_u8(1))
                .ok_or(ACK_RANGE_DECODING_ERROR)?;

            decoder_invariant!(
                ack_range_count <= MAX_ACK_RANGES,
                "ack range count exceeds the configured maximum"
            );

            let mut iter = AckRangesIter {
                largest_acknowledged,
                ack_range_count,
                range_buffer: buffer.peek(),
            };

            // every gap/length pair must decode without underflowing
            for _ in 0..*ack_range_count {
                iter.next().ok_or(ACK_RANGE_DECODING_ERROR)?;
            }

            let used = buffer.len() - iter.range_buffer.len();
            let (range_buffer, remaining) = buffer.decode_slice(used)?;

            #[allow(clippy::useless_conversion)]
            let range_buffer = range_buffer.into();

            let ack_ranges = AckRangesDecoder {
                largest_acknowledged,
                ack_range_count,
                range_buffer,
            };

            Ok((ack_ranges, remaining))
        }
    }
);

#[derive(Clone, Copy)]
pub struct AckRangesIter<'a> {
    largest_acknowledged: VarInt,
    ack_range_count: VarInt,
    range_buffer: DecoderBuffer<'a>,
}

impl<'a> Iterator for AckRangesIter<'a> {
    type Item = RangeInclusive<VarInt>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.ack_range_count = self.ack_range_count.checked_sub(VarInt::from_u8(1))?;

        let largest = self.largest_acknowledged;
        let (len, buffer) = self.range_buffer.decode::<VarInt>().ok()?;
        self.range_buffer = buffer;

        let start = largest.checked_sub(len)?;

        // look ahead to the gap so the next call knows its largest value
        if *self.ack_range_count > 0 {
            let (gap, buffer) = self.range_buffer.decode::<VarInt>().ok()?;
            self.range_buffer = buffer;

            self.largest_acknowledged = start
                .checked_sub(gap)?
                .checked_sub(VarInt::from_u8(2))?;
        }

        Some(start..=largest)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let count = self.ack_range_count.as_u64() as usize;
        (count, Some(count))
    }
}

impl<'a> ExactSizeIterator for AckRangesIter<'a> {}

//= https://www.rfc-editor.org/rfc/rfc9000#section-19.3.2
//# ECN Counts {
//#   ECT0 Count (i),
//#   ECT1 Count (i),
//#   ECN-CE Count (i),
//# }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EcnCounts {
    pub ect_0_count: VarInt,
    pub ect_1_count: VarInt,
    pub ce_count: VarInt,
}

decoder_value!(
    impl<'a> EcnCounts {
        fn decode(buffer: Buffer) -> Result<Self> {
            let (ect_0_count, buffer) = buffer.decode()?;
            let (ect_1_count, buffer) = buffer.decode()?;
            let (ce_count, buffer) = buffer.decode()?;

            let counts = EcnCounts {
                ect_0_count,
                ect_1_count,
                ce_count,
            };

            Ok((counts, buffer))
        }
    }
);

impl EncoderValue for EcnCounts {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&self.ect_0_count);
        encoder.encode(&self.ect_1_count);
        encoder.encode(&self.ce_count);
    }
}
