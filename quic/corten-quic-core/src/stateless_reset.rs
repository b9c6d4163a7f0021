// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use core::fmt;
use corten_codec::{decoder_value, Encoder, EncoderValue};
use subtle::ConstantTimeEq;

//= https://www.rfc-editor.org/rfc/rfc9000#section-10.3
//# A stateless reset token is specific to a connection ID.  An endpoint
//# issues a stateless reset token by including the value in the
//# Stateless Reset Token field of a NEW_CONNECTION_ID frame.

pub const TOKEN_LEN: usize = 16;

/// A 16-byte stateless reset token
///
/// Tokens are compared in constant time: an attacker must not be able to
/// probe for a valid token by timing comparisons.
#[derive(Clone, Copy, Debug, Eq, Hash)]
pub struct Token([u8; TOKEN_LEN]);

impl Token {
    pub const ZEROED: Self = Self([0; TOKEN_LEN]);

    #[inline]
    pub fn into_inner(self) -> [u8; TOKEN_LEN] {
        self.0
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl PartialEq for Token {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl From<[u8; TOKEN_LEN]> for Token {
    #[inline]
    fn from(bytes: [u8; TOKEN_LEN]) -> Self {
        Self(bytes)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InvalidTokenLen;

impl fmt::Display for InvalidTokenLen {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "stateless reset tokens are exactly {TOKEN_LEN} bytes")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for InvalidTokenLen {}

impl TryFrom<&[u8]> for Token {
    type Error = InvalidTokenLen;

    #[inline]
    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; TOKEN_LEN] = slice.try_into().map_err(|_| InvalidTokenLen)?;
        Ok(Self(bytes))
    }
}

decoder_value!(
    impl<'a> Token {
        fn decode(buffer: Buffer) -> Result<Self> {
            let (slice, buffer) = buffer.decode_slice(TOKEN_LEN)?;
            let token = Token::try_from(slice.as_less_safe_slice()).expect("length checked above");
            Ok((token, buffer))
        }
    }
);

impl EncoderValue for Token {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.write_slice(&self.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_test() {
        assert!(Token::try_from(&[0u8; 16][..]).is_ok());
        assert!(Token::try_from(&[0u8; 15][..]).is_err());
        assert!(Token::try_from(&[0u8; 17][..]).is_err());
    }

    #[test]
    fn equality_test() {
        let a = Token::from([1u8; 16]);
        let b = Token::from([1u8; 16]);
        let c = Token::from([2u8; 16]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
