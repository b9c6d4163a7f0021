// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::hkdf;
use corten_codec::{Encoder, EncoderBuffer};
use corten_quic_core::crypto::label::QUIC_IV_12;
use zeroize::Zeroize;

pub use crate::ring_aead::NONCE_LEN;

/// The per-direction packet protection IV
pub struct Iv([u8; NONCE_LEN]);

impl Iv {
    #[inline]
    pub fn new(secret: &hkdf::Prk) -> Self {
        let mut bytes = [0u8; NONCE_LEN];

        secret
            .expand(&[&QUIC_IV_12], IvLen)
            .expect("label size verified")
            .fill(&mut bytes)
            .expect("fill size verified");

        Self(bytes)
    }

    //= https://www.rfc-editor.org/rfc/rfc9001#section-5.3
    //# The nonce, N, is formed by combining the packet
    //# protection IV with the packet number.  The 62 bits of the
    //# reconstructed QUIC packet number in network byte order are left-
    //# padded with zeros to the size of the IV.  The exclusive OR of the
    //# padded packet number and the IV forms the AEAD nonce.

    #[inline]
    pub fn nonce(&self, packet_number: u64) -> [u8; NONCE_LEN] {
        let mut nonce = [0; NONCE_LEN];
        let mut encoder = EncoderBuffer::new(&mut nonce);

        encoder.encode(&0u32);
        encoder.encode(&packet_number);

        for (a, b) in nonce.iter_mut().zip(self.0.iter()) {
            *a ^= b;
        }

        nonce
    }
}

impl Drop for Iv {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

struct IvLen;

impl hkdf::KeyType for IvLen {
    #[inline]
    fn len(&self) -> usize {
        NONCE_LEN
    }
}
