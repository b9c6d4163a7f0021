// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    encoder::{Encoder, EncoderLenEstimator},
    DecoderBuffer, DecoderBufferMut,
};
use byteorder::{ByteOrder, NetworkEndian};
use core::{convert::TryFrom, mem::size_of};

pub trait EncoderValue: Sized {
    /// Encodes the value into the encoder
    fn encode<E: Encoder>(&self, encoder: &mut E);

    /// Encodes the value into the encoder, while potentially mutating the value itself
    #[inline]
    fn encode_mut<E: Encoder>(&mut self, encoder: &mut E) {
        self.encode(encoder)
    }

    /// Returns the encoding size with no buffer constraints
    #[inline]
    fn encoding_size(&self) -> usize {
        self.encoding_size_for_encoder(&EncoderLenEstimator::new(usize::MAX))
    }

    /// Returns the encoding size for the given encoder's capacity
    #[inline]
    fn encoding_size_for_encoder<E: Encoder>(&self, encoder: &E) -> usize {
        let mut estimator = EncoderLenEstimator::new(encoder.remaining_capacity());
        self.encode(&mut estimator);
        estimator.len()
    }

    /// Encodes the value into the encoder with a prefix of `Len`
    #[inline]
    fn encode_with_len_prefix<Len: TryFrom<usize> + EncoderValue, E: Encoder>(
        &self,
        encoder: &mut E,
    ) where
        Len::Error: core::fmt::Debug,
    {
        let len = self.encoding_size_for_encoder(encoder);
        let len: Len = Len::try_from(len).expect("invalid conversion");
        len.encode(encoder);
        self.encode(encoder);
    }

    #[cfg(feature = "alloc")]
    fn encode_to_vec(&self) -> alloc::vec::Vec<u8> {
        let len = self.encoding_size();
        let mut buffer = alloc::vec![0u8; len];
        self.encode(&mut crate::EncoderBuffer::new(&mut buffer));
        buffer
    }
}

impl EncoderValue for u8 {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.write_sized(size_of::<Self>(), |buf| {
            buf[0] = *self;
        })
    }

    #[inline]
    fn encoding_size(&self) -> usize {
        size_of::<Self>()
    }

    #[inline]
    fn encoding_size_for_encoder<E: Encoder>(&self, _encoder: &E) -> usize {
        size_of::<Self>()
    }
}

macro_rules! encoder_value_network_endian {
    ($call:ident, $ty:ty) => {
        impl EncoderValue for $ty {
            #[inline]
            fn encode<E: Encoder>(&self, encoder: &mut E) {
                encoder.write_sized(size_of::<Self>(), |buf| {
                    NetworkEndian::$call(buf, *self);
                })
            }

            #[inline]
            fn encoding_size(&self) -> usize {
                size_of::<Self>()
            }

            #[inline]
            fn encoding_size_for_encoder<E: Encoder>(&self, _encoder: &E) -> usize {
                size_of::<Self>()
            }
        }
    };
}

encoder_value_network_endian!(write_u16, u16);
encoder_value_network_endian!(write_u32, u32);
encoder_value_network_endian!(write_u64, u64);
encoder_value_network_endian!(write_u128, u128);

macro_rules! encoder_value_slice {
    ($ty:ty, |$self:ident| $value:expr) => {
        impl EncoderValue for $ty {
            #[inline]
            fn encode<E: Encoder>(&$self, encoder: &mut E) {
                encoder.write_slice($value)
            }

            #[inline]
            fn encoding_size(&self) -> usize {
                self.len()
            }

            #[inline]
            fn encoding_size_for_encoder<E: Encoder>(&self, _encoder: &E) -> usize {
                self.len()
            }
        }
    };
}

encoder_value_slice!(&[u8], |self| self);
encoder_value_slice!(&mut [u8], |self| self);
encoder_value_slice!(DecoderBuffer<'_>, |self| self.as_less_safe_slice());
encoder_value_slice!(DecoderBufferMut<'_>, |self| self.as_less_safe_slice());

impl EncoderValue for () {
    #[inline]
    fn encode<E: Encoder>(&self, _encoder: &mut E) {}

    #[inline]
    fn encoding_size(&self) -> usize {
        0
    }

    #[inline]
    fn encoding_size_for_encoder<E: Encoder>(&self, _encoder: &E) -> usize {
        0
    }
}

impl<A: EncoderValue, B: EncoderValue> EncoderValue for (A, B) {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        self.0.encode(encoder);
        self.1.encode(encoder);
    }

    #[inline]
    fn encoding_size(&self) -> usize {
        self.0.encoding_size() + self.1.encoding_size()
    }

    #[inline]
    fn encoding_size_for_encoder<E: Encoder>(&self, encoder: &E) -> usize {
        self.0.encoding_size_for_encoder(encoder) + self.1.encoding_size_for_encoder(encoder)
    }
}

impl<T: EncoderValue> EncoderValue for Option<T> {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        if let Some(value) = self {
            value.encode(encoder)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{DecoderBuffer, Encoder, EncoderBuffer, EncoderValue};

    #[test]
    fn round_trip_primitives() {
        let mut bytes = [0u8; 15];
        let mut encoder = EncoderBuffer::new(&mut bytes);
        encoder.encode(&0x12u8);
        encoder.encode(&0x3456u16);
        encoder.encode(&0x789a_bcdeu32);
        encoder.encode(&0x1122_3344_5566_7788u64);
        assert_eq!(encoder.len(), 15);

        let buffer = DecoderBuffer::new(&bytes);
        let (a, buffer) = buffer.decode::<u8>().unwrap();
        let (b, buffer) = buffer.decode::<u16>().unwrap();
        let (c, buffer) = buffer.decode::<u32>().unwrap();
        let (d, buffer) = buffer.decode::<u64>().unwrap();
        assert_eq!(a, 0x12);
        assert_eq!(b, 0x3456);
        assert_eq!(c, 0x789a_bcde);
        assert_eq!(d, 0x1122_3344_5566_7788);
        assert!(buffer.is_empty());
    }

    #[test]
    fn len_prefix_round_trip() {
        let mut bytes = [0u8; 6];
        let mut encoder = EncoderBuffer::new(&mut bytes);
        let data: &[u8] = &[1, 2, 3, 4, 5];
        encoder.encode_with_len_prefix::<u8, _>(&data);
        assert_eq!(bytes, [5, 1, 2, 3, 4, 5]);

        let buffer = DecoderBuffer::new(&bytes);
        let (slice, buffer) = buffer.decode_slice_with_len_prefix::<u8>().unwrap();
        assert_eq!(slice, [1u8, 2, 3, 4, 5][..]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn write_repeated_pads() {
        let mut bytes = [0xffu8; 6];
        let mut encoder = EncoderBuffer::new(&mut bytes);
        encoder.encode(&1u8);
        encoder.write_repeated(4, 0);
        assert_eq!(&bytes[0..6], &[1, 0, 0, 0, 0, 0xff]);
    }
}
