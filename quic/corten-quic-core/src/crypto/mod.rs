// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The cryptographic trait surface consumed by the transport
//!
//! Receiving works through the following pipeline: a `ProtectedPayload` has
//! header protection removed (which reveals the truncated packet number and
//! produces an `EncryptedPayload`), the packet number is expanded against
//! the largest received in the space, and the payload is AEAD-opened with
//! the expanded number as the nonce input. Sending runs the pipeline in
//! reverse: seal first, then mask the header using a sample of the
//! ciphertext.

pub mod handshake;
pub mod header_crypto;
pub mod initial;
pub mod key;
pub mod label;
pub mod one_rtt;
pub mod packet_protection;
pub mod payload;
pub mod retry;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod zero_rtt;

pub use handshake::*;
pub use header_crypto::*;
pub use initial::*;
pub use key::*;
pub use one_rtt::*;
pub use payload::*;
pub use retry::RetryKey;
pub use zero_rtt::*;

use crate::packet::number::{PacketNumber, PacketNumberLen, PacketNumberSpace, TruncatedPacketNumber};
use corten_codec::{DecoderError, EncoderBuffer};

//= https://www.rfc-editor.org/rfc/rfc9001#section-2.1
//# Data is protected using a number of encryption levels:
//#
//# *  Initial keys
//# *  Early data (0-RTT) keys
//# *  Handshake keys
//# *  1-RTT keys

/// The four encryption levels
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Initial,
    ZeroRtt,
    Handshake,
    OneRtt,
}

impl Level {
    /// The packet number space packets at this level belong to
    #[inline]
    pub fn packet_number_space(self) -> PacketNumberSpace {
        match self {
            Level::Initial => PacketNumberSpace::Initial,
            Level::Handshake => PacketNumberSpace::Handshake,
            Level::ZeroRtt | Level::OneRtt => PacketNumberSpace::ApplicationData,
        }
    }
}

/// Aggregates the per-level key types of a crypto provider
pub trait CryptoSuite {
    type InitialKey: InitialKey<HeaderKey = Self::InitialHeaderKey>;
    type InitialHeaderKey: InitialHeaderKey;
    type HandshakeKey: HandshakeKey;
    type HandshakeHeaderKey: HandshakeHeaderKey;
    type OneRttKey: OneRttKey;
    type OneRttHeaderKey: OneRttHeaderKey;
    type ZeroRttKey: ZeroRttKey;
    type ZeroRttHeaderKey: ZeroRttHeaderKey;
    type RetryKey: RetryKey;
}

/// Applies header protection to an `EncryptedPayload`, using a sample of
/// the fresh ciphertext
#[inline]
pub fn protect<'a, K: HeaderKey>(
    crypto: &K,
    payload: EncryptedPayload<'a>,
) -> Result<ProtectedPayload<'a>, DecoderError> {
    let sample = payload.header_protection_sample(crypto.sealing_sample_len())?;
    let mask = crypto.sealing_header_protection_mask(sample);

    Ok(apply_header_protection(mask, payload))
}

/// Removes header protection from a `ProtectedPayload`, revealing the
/// truncated packet number
#[inline]
pub fn unprotect<'a, K: HeaderKey>(
    crypto: &K,
    space: PacketNumberSpace,
    payload: ProtectedPayload<'a>,
) -> Result<(TruncatedPacketNumber, EncryptedPayload<'a>), DecoderError> {
    let sample = payload.header_protection_sample(crypto.opening_sample_len())?;
    let mask = crypto.opening_header_protection_mask(sample);

    remove_header_protection(space, mask, payload)
}

/// Seals a cleartext packet in place
///
/// `payload` holds the encoded header, truncated packet number and
/// cleartext body; `tag_len` bytes are reserved past the current position
/// for the AEAD tag.
#[inline]
pub fn encrypt<'a, K: Key>(
    key: &K,
    packet_number: PacketNumber,
    packet_number_len: PacketNumberLen,
    header_len: usize,
    mut payload: EncoderBuffer<'a>,
) -> Result<(EncryptedPayload<'a>, EncoderBuffer<'a>), packet_protection::Error> {
    // reserve bytes for the tag
    payload.advance_position(key.tag_len());

    let (payload, remaining) = payload.split_off();

    let header_with_pn_len = header_len + packet_number_len.bytesize();
    debug_assert!(header_with_pn_len < payload.len());

    let (header, body) = payload.split_at_mut(header_with_pn_len);
    key.encrypt(packet_number.as_crypto_nonce(), header, body)?;

    Ok((
        EncryptedPayload::new(header_len, packet_number_len, payload),
        EncoderBuffer::new(remaining),
    ))
}

/// Opens an `EncryptedPayload` in place, returning the header and the
/// cleartext body with the tag removed
#[inline]
pub fn decrypt<'a, K: Key>(
    key: &K,
    packet_number: PacketNumber,
    payload: EncryptedPayload<'a>,
) -> Result<(&'a mut [u8], &'a mut [u8]), packet_protection::Error> {
    let (header, payload) = payload.split_mut();
    key.decrypt(packet_number.as_crypto_nonce(), header, payload)?;

    // remove the tag from the payload
    let payload_len = payload.len() - key.tag_len();
    let payload = &mut payload[..payload_len];

    Ok((header, payload))
}
