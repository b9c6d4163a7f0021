// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The QUIC connection identifier: an opaque byte sequence chosen by each
//! endpoint, carried in packet headers to route datagrams to connections.

use core::fmt;
use corten_codec::{decoder_invariant, decoder_value, Encoder, EncoderValue};

//= https://www.rfc-editor.org/rfc/rfc9000#section-17.2
//# In QUIC version 1, this value MUST NOT exceed 20 bytes.
pub const MAX_LEN: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Error(&'static str);

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

const EXCEEDED_MAX_LEN: Error = Error("the connection id exceeds 20 bytes");

/// An opaque connection identifier of 0 to 20 bytes
#[derive(Clone, Copy, Eq, Hash)]
pub struct Id {
    bytes: [u8; MAX_LEN],
    len: u8,
}

impl Id {
    /// The distinguished zero-length connection id
    pub const EMPTY: Self = Self {
        bytes: [0; MAX_LEN],
        len: 0,
    };

    /// An 8-byte id for unit tests
    #[cfg(any(test, feature = "testing"))]
    pub const TEST_ID: Self = Self {
        bytes: [
            0x74, 0x65, 0x73, 0x74, 0x20, 0x63, 0x69, 0x64, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        ],
        len: 8,
    };

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl PartialEq for Id {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialOrd for Id {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Id {
    #[inline]
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl AsRef<[u8]> for Id {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "connection::Id({self})")
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("empty");
        }

        for byte in self.as_bytes() {
            write!(f, "{byte:02x}")?;
        }

        Ok(())
    }
}

impl TryFrom<&[u8]> for Id {
    type Error = Error;

    #[inline]
    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        if slice.len() > MAX_LEN {
            return Err(EXCEEDED_MAX_LEN);
        }

        let mut bytes = [0; MAX_LEN];
        bytes[..slice.len()].copy_from_slice(slice);

        Ok(Self {
            bytes,
            len: slice.len() as u8,
        })
    }
}

decoder_value!(
    impl<'a> Id {
        fn decode(buffer: Buffer) -> Result<Self> {
            let (slice, buffer) = buffer.decode_slice_with_len_prefix::<u8>()?;
            decoder_invariant!(slice.len() <= MAX_LEN, "connection id exceeds max length");

            let id = Id::try_from(slice.as_less_safe_slice()).expect("length validated above");

            Ok((id, buffer))
        }
    }
);

impl EncoderValue for Id {
    /// Encodes the id with its one-byte length prefix
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&self.len);
        encoder.write_slice(self.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corten_codec::{DecoderBuffer, EncoderBuffer};

    #[test]
    fn length_bounds_test() {
        assert!(Id::try_from(&[0u8; 0][..]).is_ok());
        assert!(Id::try_from(&[0u8; 20][..]).is_ok());
        assert!(Id::try_from(&[0u8; 21][..]).is_err());
    }

    #[test]
    fn round_trip_test() {
        for len in [0usize, 1, 8, 20] {
            let source: Vec<u8> = (0..len as u8).collect();
            let id = Id::try_from(&source[..]).unwrap();

            let mut bytes = [0u8; 21];
            let mut encoder = EncoderBuffer::new(&mut bytes);
            encoder.encode(&id);
            let written = encoder.len();
            assert_eq!(written, len + 1);

            let (decoded, remaining) = DecoderBuffer::new(&bytes[..written])
                .decode::<Id>()
                .unwrap();
            assert!(remaining.is_empty());
            assert_eq!(decoded, id);
            assert_eq!(decoded.as_bytes(), &source[..]);
        }
    }

    #[test]
    fn equality_test() {
        let a = Id::try_from(&[1u8, 2, 3][..]).unwrap();
        let b = Id::try_from(&[1u8, 2, 3][..]).unwrap();
        let c = Id::try_from(&[1u8, 2, 3, 4][..]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(Id::EMPTY, Id::try_from(&[][..]).unwrap());
    }

    #[test]
    fn hex_display_test() {
        let id = Id::try_from(&[0x83u8, 0x94, 0xc8, 0xf0][..]).unwrap();
        assert_eq!(format!("{id}"), "8394c8f0");
        assert_eq!(format!("{}", Id::EMPTY), "empty");
    }
}
