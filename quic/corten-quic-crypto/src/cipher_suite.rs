// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    hkdf,
    iv::Iv,
    ring_aead::{self as aead, quic},
};
use corten_quic_core::crypto::{label, packet_protection};

//= https://www.rfc-editor.org/rfc/rfc9001#section-5.3
//# QUIC can use any of the cipher suites defined in [TLS13] with the
//# exception of TLS_AES_128_CCM_8_SHA256.

/// The TLS 1.3 cipher suites supported for packet protection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CipherSuiteId {
    TlsAes128GcmSha256,
    TlsAes256GcmSha384,
    TlsChacha20Poly1305Sha256,
}

impl CipherSuiteId {
    pub(crate) fn hkdf(self) -> hkdf::Algorithm {
        match self {
            Self::TlsAes128GcmSha256 => hkdf::HKDF_SHA256,
            Self::TlsAes256GcmSha384 => hkdf::HKDF_SHA384,
            Self::TlsChacha20Poly1305Sha256 => hkdf::HKDF_SHA256,
        }
    }

    pub(crate) fn aead(self) -> &'static aead::Algorithm {
        match self {
            Self::TlsAes128GcmSha256 => &aead::AES_128_GCM,
            Self::TlsAes256GcmSha384 => &aead::AES_256_GCM,
            Self::TlsChacha20Poly1305Sha256 => &aead::CHACHA20_POLY1305,
        }
    }

    //= https://www.rfc-editor.org/rfc/rfc9001#section-5.4.3
    //# AEAD algorithms that are based on AES [AES] use AES in Electronic
    //# Codebook (ECB) mode for header protection.

    //= https://www.rfc-editor.org/rfc/rfc9001#section-5.4.4
    //# When AEAD_CHACHA20_POLY1305 is in use, header protection uses the
    //# raw ChaCha20 function

    pub(crate) fn hp(self) -> &'static quic::Algorithm {
        match self {
            Self::TlsAes128GcmSha256 => &quic::AES_128,
            Self::TlsAes256GcmSha384 => &quic::AES_256,
            Self::TlsChacha20Poly1305Sha256 => &quic::CHACHA20,
        }
    }

    pub(crate) fn key_label(self) -> &'static [u8] {
        match self {
            Self::TlsAes128GcmSha256 => &label::QUIC_KEY_16,
            Self::TlsAes256GcmSha384 | Self::TlsChacha20Poly1305Sha256 => &label::QUIC_KEY_32,
        }
    }

    pub(crate) fn hp_label(self) -> &'static [u8] {
        match self {
            Self::TlsAes128GcmSha256 => &label::QUIC_HP_16,
            Self::TlsAes256GcmSha384 | Self::TlsChacha20Poly1305Sha256 => &label::QUIC_HP_32,
        }
    }

    /// The "quic ku" label producing the next traffic secret; the output
    /// length is the hash length
    pub(crate) fn ku_label(self) -> &'static [u8] {
        match self {
            Self::TlsAes128GcmSha256 | Self::TlsChacha20Poly1305Sha256 => &label::QUIC_KU_32,
            Self::TlsAes256GcmSha384 => &label::QUIC_KU_48,
        }
    }

    //= https://www.rfc-editor.org/rfc/rfc9001#section-6.6
    //# For AEAD_AES_128_GCM and AEAD_AES_256_GCM, the confidentiality limit
    //# is 2^23 encrypted packets.
    //# For AEAD_CHACHA20_POLY1305, the confidentiality limit is greater
    //# than the number of possible packets (2^62) and so can be disregarded.

    pub(crate) fn confidentiality_limit(self) -> u64 {
        match self {
            Self::TlsAes128GcmSha256 | Self::TlsAes256GcmSha384 => 1 << 23,
            Self::TlsChacha20Poly1305Sha256 => 1 << 62,
        }
    }

    //= https://www.rfc-editor.org/rfc/rfc9001#section-6.6
    //# For AEAD_AES_128_GCM and AEAD_AES_256_GCM, the integrity limit is
    //# 2^52 invalid packets.
    //# For AEAD_CHACHA20_POLY1305, the integrity limit is 2^36 invalid
    //# packets.

    pub(crate) fn integrity_limit(self) -> u64 {
        match self {
            Self::TlsAes128GcmSha256 | Self::TlsAes256GcmSha384 => 1 << 52,
            Self::TlsChacha20Poly1305Sha256 => 1 << 36,
        }
    }
}

/// Packet protection state for a single direction: the AEAD key, the IV,
/// and the secret it was expanded from (retained for key updates)
pub(crate) struct PacketKey {
    key: aead::LessSafeKey,
    iv: Iv,
    secret: hkdf::Prk,
    id: CipherSuiteId,
}

impl PacketKey {
    pub(crate) fn new(secret: hkdf::Prk, id: CipherSuiteId) -> Self {
        let key = secret
            .expand(&[id.key_label()], id.aead())
            .expect("label size verified")
            .into();
        let key = aead::LessSafeKey::new(key);
        let iv = Iv::new(&secret);

        Self {
            key,
            iv,
            secret,
            id,
        }
    }

    //= https://www.rfc-editor.org/rfc/rfc9001#section-6.1
    //# The endpoint creates a new write secret from the existing write
    //# secret as performed in Section 7.2 of [TLS13].  This uses the KDF
    //# function provided by TLS with a label of "quic ku".

    /// Derives the next generation of this key
    pub(crate) fn derive_next(&self) -> Self {
        let next_secret = self
            .secret
            .expand(&[self.id.ku_label()], self.id.hkdf())
            .expect("label size verified")
            .into();

        Self::new(next_secret, self.id)
    }

    pub(crate) fn tag_len(&self) -> usize {
        self.key.algorithm().tag_len()
    }

    pub(crate) fn confidentiality_limit(&self) -> u64 {
        self.id.confidentiality_limit()
    }

    pub(crate) fn integrity_limit(&self) -> u64 {
        self.id.integrity_limit()
    }

    /// Seals `payload` in place; the final `tag_len` bytes receive the tag
    pub(crate) fn encrypt(
        &self,
        packet_number: u64,
        header: &[u8],
        payload: &mut [u8],
    ) -> Result<(), packet_protection::Error> {
        let nonce = aead::Nonce::assume_unique_for_key(self.iv.nonce(packet_number));
        let aad = aead::Aad::from(header);

        let data_len = payload
            .len()
            .checked_sub(self.tag_len())
            .ok_or(packet_protection::Error::INTERNAL_ERROR)?;
        let (data, tag_slot) = payload.split_at_mut(data_len);

        let tag = self
            .key
            .seal_in_place_separate_tag(nonce, aad, data)
            .map_err(|_| packet_protection::Error::INTERNAL_ERROR)?;
        tag_slot.copy_from_slice(tag.as_ref());

        Ok(())
    }

    /// Opens `payload` (ciphertext plus tag) in place
    pub(crate) fn decrypt(
        &self,
        packet_number: u64,
        header: &[u8],
        payload: &mut [u8],
    ) -> Result<(), packet_protection::Error> {
        let nonce = aead::Nonce::assume_unique_for_key(self.iv.nonce(packet_number));
        let aad = aead::Aad::from(header);

        self.key
            .open_in_place(nonce, aad, payload)
            .map_err(|_| packet_protection::Error::DECRYPT_ERROR)?;

        Ok(())
    }
}

impl core::fmt::Debug for PacketKey {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("PacketKey").field("id", &self.id).finish()
    }
}

/// A sealer/opener pair for one encryption level
#[derive(Debug)]
pub(crate) struct KeyPair {
    pub(crate) sealer: PacketKey,
    pub(crate) opener: PacketKey,
}

impl KeyPair {
    /// Builds the pair from the TLS-delivered secrets, oriented by the
    /// local endpoint type
    pub(crate) fn new(
        endpoint: corten_quic_core::endpoint::Type,
        secrets: crate::SecretPair,
        id: CipherSuiteId,
    ) -> Self {
        let client = PacketKey::new(secrets.client, id);
        let server = PacketKey::new(secrets.server, id);

        let (sealer, opener) = match endpoint {
            corten_quic_core::endpoint::Type::Client => (client, server),
            corten_quic_core::endpoint::Type::Server => (server, client),
        };

        Self { sealer, opener }
    }
}
