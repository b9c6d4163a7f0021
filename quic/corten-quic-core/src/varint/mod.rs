// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use core::{
    convert::{TryFrom, TryInto},
    fmt,
    ops::Deref,
};
use corten_codec::{decoder_value, Encoder, EncoderValue};

//= https://www.rfc-editor.org/rfc/rfc9000#section-16
//# The QUIC variable-length integer encoding reserves the two most
//# significant bits of the first byte to encode the base 2 logarithm of
//# the integer encoding length in bytes.  The integer value is encoded
//# on the remaining bits, in network byte order.

//= https://www.rfc-editor.org/rfc/rfc9000#section-16
//# This means that integers are encoded on 1, 2, 4, or 8 bytes and can
//# encode 6-, 14-, 30-, or 62-bit values, respectively.

pub const MAX_VARINT_VALUE: u64 = (1 << 62) - 1;

#[derive(Debug)]
pub struct VarIntError;

impl fmt::Display for VarIntError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "varint range exceeded")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for VarIntError {}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct VarInt(u64);

impl fmt::Display for VarInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl VarInt {
    pub const MAX: Self = Self(MAX_VARINT_VALUE);

    pub const ZERO: Self = Self(0);

    #[inline]
    pub fn new(v: u64) -> Result<Self, VarIntError> {
        if v > MAX_VARINT_VALUE {
            return Err(VarIntError);
        }
        Ok(Self(v))
    }

    pub const fn from_u8(v: u8) -> Self {
        Self(v as u64)
    }

    pub const fn from_u16(v: u16) -> Self {
        Self(v as u64)
    }

    pub const fn from_u32(v: u32) -> Self {
        Self(v as u64)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn checked_add(self, value: Self) -> Option<Self> {
        Self::new(self.0.checked_add(value.0)?).ok()
    }

    #[inline]
    pub fn checked_add_usize(self, value: usize) -> Option<Self> {
        let value: Self = value.try_into().ok()?;
        self.checked_add(value)
    }

    #[inline]
    #[must_use]
    pub fn saturating_add(self, value: Self) -> Self {
        Self::new(self.0.saturating_add(value.0)).unwrap_or(Self::MAX)
    }

    #[inline]
    pub fn checked_sub(self, value: Self) -> Option<Self> {
        Some(Self(self.0.checked_sub(value.0)?))
    }

    #[inline]
    #[must_use]
    pub fn saturating_sub(self, value: Self) -> Self {
        Self(self.0.saturating_sub(value.0))
    }

    #[inline]
    pub fn checked_mul(self, value: Self) -> Option<Self> {
        Self::new(self.0.checked_mul(value.0)?).ok()
    }

    #[inline]
    #[must_use]
    pub fn saturating_mul(self, value: Self) -> Self {
        Self::new(self.0.saturating_mul(value.0)).unwrap_or(Self::MAX)
    }

    /// Re-encodes a replacement value into the bytes previously occupied by
    /// `self`, which must have been encoded with `encode` at the same
    /// position.
    ///
    /// The replacement keeps the original encoding length so surrounding
    /// bytes do not move. The replacement value must therefore fit in the
    /// original encoding.
    #[inline]
    pub fn encode_updated<E: Encoder>(self, replacement: Self, encoder: &mut E) {
        let len = self.encoding_size();
        debug_assert!(
            replacement.encoding_size() <= len,
            "the replacement encoding size must not exceed the previous value"
        );
        encode_with_len(replacement.0, len, encoder);
    }
}

#[inline]
fn encoding_size(x: u64) -> usize {
    debug_assert!(x <= MAX_VARINT_VALUE);

    match x {
        0..=63 => 1,
        64..=16_383 => 2,
        16_384..=1_073_741_823 => 4,
        _ => 8,
    }
}

#[inline]
fn encode_with_len<E: Encoder>(x: u64, len: usize, encoder: &mut E) {
    // the two-bit length prefix is the base 2 logarithm of the length
    let prefix = (len.trailing_zeros() as u64) << (len * 8 - 2);
    let bytes = (prefix | x).to_be_bytes();

    encoder.write_sized(len, |buffer| {
        buffer.copy_from_slice(&bytes[(8 - len)..]);
    });
}

impl EncoderValue for VarInt {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encode_with_len(self.0, encoding_size(self.0), encoder);
    }

    #[inline]
    fn encoding_size(&self) -> usize {
        encoding_size(self.0)
    }

    #[inline]
    fn encoding_size_for_encoder<E: Encoder>(&self, _encoder: &E) -> usize {
        encoding_size(self.0)
    }
}

decoder_value!(
    impl<'a> VarInt {
        fn decode(buffer: Buffer) -> Result<Self> {
            let header = buffer.peek_byte(0)?;

            Ok(match (header >> 6) & 0b11 {
                0b00 => {
                    let value = header & ((1 << 6) - 1);
                    let buffer = buffer.skip(1)?;
                    (Self(value.into()), buffer)
                }
                0b01 => {
                    let (value, buffer) = buffer.decode::<u16>()?;
                    let value = value & ((1 << 14) - 1);
                    (Self(value.into()), buffer)
                }
                0b10 => {
                    let (value, buffer) = buffer.decode::<u32>()?;
                    let value = value & ((1 << 30) - 1);
                    (Self(value.into()), buffer)
                }
                0b11 => {
                    let (value, buffer) = buffer.decode::<u64>()?;
                    let value = value & ((1 << 62) - 1);
                    (Self(value), buffer)
                }
                _ => unreachable!(),
            })
        }
    }
);

impl AsRef<u64> for VarInt {
    #[inline]
    fn as_ref(&self) -> &u64 {
        &self.0
    }
}

impl Deref for VarInt {
    type Target = u64;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

macro_rules! impl_from_lesser {
    ($ty:ty) => {
        impl From<$ty> for VarInt {
            #[inline]
            fn from(value: $ty) -> Self {
                Self(value.into())
            }
        }
    };
}

impl_from_lesser!(u8);
impl_from_lesser!(u16);
impl_from_lesser!(u32);

impl From<VarInt> for u64 {
    #[inline]
    fn from(v: VarInt) -> u64 {
        v.0
    }
}

impl TryFrom<usize> for VarInt {
    type Error = VarIntError;

    #[inline]
    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value as u64)
    }
}

impl TryInto<usize> for VarInt {
    type Error = <usize as TryFrom<u64>>::Error;

    #[inline]
    fn try_into(self) -> Result<usize, Self::Error> {
        self.0.try_into()
    }
}

impl TryFrom<u64> for VarInt {
    type Error = VarIntError;

    #[inline]
    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl core::ops::Add for VarInt {
    type Output = Self;

    #[inline]
    #[track_caller]
    fn add(self, rhs: Self) -> Self {
        if cfg!(debug_assertions) {
            self.checked_add(rhs).expect("VarInt overflow occurred")
        } else {
            Self(self.0 + rhs.0)
        }
    }
}

impl core::ops::Add<usize> for VarInt {
    type Output = Self;

    #[inline]
    #[track_caller]
    fn add(self, rhs: usize) -> Self {
        if cfg!(debug_assertions) {
            self.checked_add_usize(rhs).expect("VarInt overflow occurred")
        } else {
            Self(self.0 + rhs as u64)
        }
    }
}

impl core::ops::AddAssign<Self> for VarInt {
    #[inline]
    #[track_caller]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl core::ops::AddAssign<usize> for VarInt {
    #[inline]
    #[track_caller]
    fn add_assign(&mut self, rhs: usize) {
        *self = *self + rhs;
    }
}

impl core::ops::Sub for VarInt {
    type Output = Self;

    #[inline]
    #[track_caller]
    fn sub(self, rhs: Self) -> Self {
        // Bounds check is inherited from u64
        Self(self.0 - rhs.0)
    }
}

impl core::ops::Sub<usize> for VarInt {
    type Output = Self;

    #[inline]
    #[track_caller]
    fn sub(self, rhs: usize) -> Self {
        // Bounds check is inherited from u64
        Self(self.0 - rhs as u64)
    }
}

impl core::ops::SubAssign<Self> for VarInt {
    #[inline]
    #[track_caller]
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0
    }
}

impl core::ops::Div for VarInt {
    type Output = Self;

    #[inline]
    #[track_caller]
    fn div(self, rhs: Self) -> Self {
        Self(self.0 / rhs.0)
    }
}

impl PartialEq<u64> for VarInt {
    #[inline]
    fn eq(&self, other: &u64) -> bool {
        self.0.eq(other)
    }
}

impl PartialEq<usize> for VarInt {
    #[inline]
    fn eq(&self, other: &usize) -> bool {
        self.0.eq(&(*other as u64))
    }
}

impl PartialOrd<u64> for VarInt {
    #[inline]
    fn partial_cmp(&self, other: &u64) -> Option<core::cmp::Ordering> {
        self.0.partial_cmp(other)
    }
}

impl PartialOrd<usize> for VarInt {
    #[inline]
    fn partial_cmp(&self, other: &usize) -> Option<core::cmp::Ordering> {
        self.0.partial_cmp(&(*other as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bolero::check;
    use corten_codec::{DecoderBuffer, EncoderBuffer};

    fn round_trip(value: VarInt) -> (VarInt, usize) {
        let mut bytes = [0u8; 8];
        let mut encoder = EncoderBuffer::new(&mut bytes);
        encoder.encode(&value);
        let len = encoder.len();

        let decoder = DecoderBuffer::new(&bytes[..len]);
        let (actual, remaining) = decoder.decode::<VarInt>().unwrap();
        assert!(remaining.is_empty());
        (actual, len)
    }

    #[test]
    fn table_example_test() {
        // (value, expected encoding size)
        let examples = [
            (0u64, 1),
            (42, 1),
            (63, 1),
            (64, 2),
            (15_293, 2),
            (16_383, 2),
            (16_384, 4),
            (494_878_333, 4),
            ((1 << 30) - 1, 4),
            (1 << 30, 8),
            (151_288_809_941_952_652, 8),
            (MAX_VARINT_VALUE, 8),
        ];

        for (value, size) in examples {
            let value = VarInt::new(value).unwrap();
            let (actual, len) = round_trip(value);
            assert_eq!(value, actual);
            assert_eq!(len, size, "value {value} should encode to {size} bytes");
        }
    }

    #[test]
    fn non_minimal_decode_test() {
        // RFC 9000 does not require minimal encodings on the wire: the
        // two-byte form of 37 must decode the same as the one-byte form
        let bytes = [0x40, 37];
        let (value, _) = DecoderBuffer::new(&bytes).decode::<VarInt>().unwrap();
        assert_eq!(value, VarInt::from_u8(37));
    }

    #[test]
    fn truncated_decode_test() {
        // a four-byte length prefix with only two bytes available
        let bytes = [0x80, 0x01];
        assert!(DecoderBuffer::new(&bytes).decode::<VarInt>().is_err());
    }

    #[test]
    fn overflow_test() {
        assert!(VarInt::new(MAX_VARINT_VALUE).is_ok());
        assert!(VarInt::new(MAX_VARINT_VALUE + 1).is_err());
        assert!(VarInt::new(u64::MAX).is_err());
    }

    #[test]
    fn round_trip_property_test() {
        check!().with_type::<u64>().cloned().for_each(|value| {
            let value = VarInt::new(value & MAX_VARINT_VALUE).unwrap();
            let (actual, len) = round_trip(value);
            assert_eq!(value, actual);
            assert!(matches!(len, 1 | 2 | 4 | 8));
        });
    }

    #[test]
    fn encode_updated_test() {
        let mut bytes = [0u8; 8];
        let mut encoder = EncoderBuffer::new(&mut bytes);
        let placeholder = VarInt::from_u32(1 << 29);
        encoder.encode(&placeholder);

        encoder.set_position(0);
        placeholder.encode_updated(VarInt::from_u32(1200), &mut encoder);

        let (actual, _) = DecoderBuffer::new(&bytes[..4]).decode::<VarInt>().unwrap();
        assert_eq!(actual, VarInt::from_u32(1200));
    }
}
