// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::decoder::{
    value::{DecoderParameterizedValueMut, DecoderValueMut},
    DecoderError,
};

pub type DecoderBufferMutResult<'a, T> = Result<(T, DecoderBufferMut<'a>), DecoderError>;

/// DecoderBufferMut is a panic-free byte buffer for decoding untrusted input
/// that will be mutated in place, e.g. for in-place decryption
#[derive(Debug, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct DecoderBufferMut<'a> {
    bytes: &'a mut [u8],
}

impl<'a> DecoderBufferMut<'a> {
    /// Create a new `DecoderBufferMut` from a mutable byte slice
    #[inline]
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }

    /// Freeze the buffer into a read-only `DecoderBuffer`
    #[inline]
    pub fn freeze(self) -> crate::DecoderBuffer<'a> {
        crate::DecoderBuffer::new(self.bytes)
    }

    /// Move out the buffer's slice. This should be used with caution, as it
    /// removes any panic protection this struct provides.
    #[inline]
    pub fn into_less_safe_slice(self) -> &'a mut [u8] {
        self.bytes
    }

    /// Borrows the buffer's slice mutably. This should be used with caution,
    /// as it removes any panic protection this struct provides.
    #[inline]
    pub fn as_less_safe_slice_mut(&mut self) -> &mut [u8] {
        self.bytes
    }
}

impl_buffer!(
    DecoderBufferMut,
    DecoderBufferMutResult,
    DecoderValueMut,
    decode_mut,
    DecoderParameterizedValueMut,
    decode_parameterized_mut,
    split_at_mut
);

impl<'a> From<&'a mut [u8]> for DecoderBufferMut<'a> {
    #[inline]
    fn from(bytes: &'a mut [u8]) -> Self {
        Self::new(bytes)
    }
}
