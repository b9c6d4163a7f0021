// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

macro_rules! impl_buffer {
    ($name:ident, $result:ident, $value:ident, $value_call:ident, $parameterized:ident, $parameterized_call:ident, $split:ident) => {
        impl<'a> $name<'a> {
            /// Splits off a slice of `count` bytes from the front of the buffer
            #[inline]
            pub fn decode_slice(self, count: usize) -> $result<'a, $name<'a>> {
                self.ensure_len(count)?;

                let (slice, remaining) = self.bytes.$split(count);

                Ok((Self::new(slice), Self::new(remaining)))
            }

            /// Decodes a value of type `T`, splitting the consumed bytes from the buffer
            #[inline]
            pub fn decode<T: $value<'a>>(self) -> $result<'a, T> {
                T::$value_call(self)
            }

            /// Splits off a slice prefixed by a length of type `Length`
            #[inline]
            pub fn decode_slice_with_len_prefix<
                Length: $value<'a> + core::convert::TryInto<usize>,
            >(
                self,
            ) -> $result<'a, Self> {
                let (len, buffer) = self.decode::<Length>()?;
                let len = len
                    .try_into()
                    .map_err(|_| DecoderError::LengthCapacityExceeded)?;
                buffer.decode_slice(len)
            }

            /// Decodes a value of type `T` prefixed by a length of type `Length`.
            ///
            /// The `T` decoder must consume the entire prefixed slice.
            #[inline]
            pub fn decode_with_len_prefix<
                Length: $value<'a> + core::convert::TryInto<usize>,
                T: $value<'a>,
            >(
                self,
            ) -> $result<'a, T> {
                let (slice, buffer) = self.decode_slice_with_len_prefix::<Length>()?;
                let (value, slice) = slice.decode::<T>()?;
                slice.ensure_empty()?;
                Ok((value, buffer))
            }

            /// Decodes a value whose wire format depends on a `parameter`
            #[inline]
            pub fn decode_parameterized<T: $parameterized<'a>>(
                self,
                parameter: T::Parameter,
            ) -> $result<'a, T> {
                T::$parameterized_call(parameter, self)
            }

            /// Skips `count` bytes, discarding them
            #[inline]
            pub fn skip(self, count: usize) -> Result<$name<'a>, DecoderError> {
                self.decode_slice(count).map(|(_, buffer)| buffer)
            }

            /// Skips a number of bytes encoded as a length prefix of type `Length`
            #[inline]
            pub fn skip_with_len_prefix<Length: $value<'a> + core::convert::TryInto<usize>>(
                self,
            ) -> Result<$name<'a>, DecoderError> {
                let (len, buffer) = self.decode::<Length>()?;
                let len = len
                    .try_into()
                    .map_err(|_| DecoderError::LengthCapacityExceeded)?;
                buffer.skip(len)
            }

            /// Creates a non-consuming `DecoderBuffer` view of the current buffer
            #[inline]
            #[must_use]
            pub fn peek(&'a self) -> crate::DecoderBuffer<'a> {
                crate::DecoderBuffer::new(self.bytes)
            }

            /// Returns the single byte at `index` without consuming it
            #[inline]
            pub fn peek_byte(&self, index: usize) -> Result<u8, DecoderError> {
                self.bytes
                    .get(index)
                    .cloned()
                    .ok_or(DecoderError::UnexpectedEof(index))
            }

            /// Returns a `DecoderBuffer` view of the given `range`
            #[inline]
            pub fn peek_range(
                &self,
                range: core::ops::Range<usize>,
            ) -> Result<crate::DecoderBuffer, DecoderError> {
                let end = range.end;
                self.bytes
                    .get(range)
                    .map(|bytes| bytes.into())
                    .ok_or(DecoderError::UnexpectedEof(end))
            }

            /// Returns an error if the buffer is not empty
            #[inline]
            pub fn ensure_empty(&self) -> Result<(), DecoderError> {
                if !self.is_empty() {
                    Err(DecoderError::UnexpectedBytes(self.len()))
                } else {
                    Ok(())
                }
            }

            /// Returns an error if the buffer does not have at least `len` bytes
            #[inline]
            pub fn ensure_len(&self, len: usize) -> Result<(), DecoderError> {
                if self.len() < len {
                    Err(DecoderError::UnexpectedEof(len))
                } else {
                    Ok(())
                }
            }

            /// Returns the number of bytes in the buffer
            #[inline]
            pub fn len(&self) -> usize {
                self.bytes.len()
            }

            /// Returns true if the buffer has a length of 0
            #[inline]
            pub fn is_empty(&self) -> bool {
                self.bytes.is_empty()
            }

            /// Borrows the buffer's slice. This should be used with caution, as it
            /// removes any panic protection this struct provides.
            #[inline]
            pub fn as_less_safe_slice(&'a self) -> &'a [u8] {
                self.bytes
            }
        }

        impl<'a> PartialEq<[u8]> for $name<'a> {
            #[inline]
            fn eq(&self, rhs: &[u8]) -> bool {
                let bytes: &[u8] = self.bytes.as_ref();
                bytes.eq(rhs)
            }
        }
    };
}

pub mod buffer;
pub mod buffer_mut;
#[macro_use]
pub mod value;

pub use buffer::*;
pub use buffer_mut::*;
pub use value::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecoderError {
    UnexpectedEof(usize),
    UnexpectedBytes(usize),
    LengthCapacityExceeded,
    InvariantViolation(&'static str),
}

use core::fmt;

impl fmt::Display for DecoderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::UnexpectedEof(len) => write!(f, "unexpected eof: {len}"),
            Self::UnexpectedBytes(len) => write!(f, "unexpected bytes: {len}"),
            Self::LengthCapacityExceeded => write!(
                f,
                "length could not be represented in platform's usize type"
            ),
            Self::InvariantViolation(msg) => write!(f, "{msg}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecoderError {}

impl From<DecoderError> for &'static str {
    fn from(error: DecoderError) -> Self {
        match error {
            DecoderError::UnexpectedEof(_len) => "unexpected eof",
            DecoderError::UnexpectedBytes(_len) => "unexpected bytes",
            DecoderError::LengthCapacityExceeded => {
                "length could not be represented in platform's usize type"
            }
            DecoderError::InvariantViolation(msg) => msg,
        }
    }
}

#[macro_export]
macro_rules! decoder_invariant {
    ($expr:expr, $invariant:expr) => {
        if !($expr) {
            return ::core::result::Result::Err(
                $crate::decoder::DecoderError::InvariantViolation($invariant).into(),
            );
        }
    };
}
