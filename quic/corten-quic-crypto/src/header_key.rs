// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{cipher_suite::CipherSuiteId, hkdf, ring_aead::quic};
use core::fmt;
use corten_quic_core::crypto::{self, HeaderProtectionMask};

/// A header protection key for one direction
pub struct HeaderKey(quic::HeaderProtectionKey);

impl crypto::HeaderKey for HeaderKey {
    #[inline]
    fn opening_header_protection_mask(&self, sample: &[u8]) -> HeaderProtectionMask {
        self.header_protection_mask(sample)
    }

    #[inline]
    fn opening_sample_len(&self) -> usize {
        self.0.algorithm().sample_len()
    }

    #[inline]
    fn sealing_header_protection_mask(&self, sample: &[u8]) -> HeaderProtectionMask {
        self.header_protection_mask(sample)
    }

    #[inline]
    fn sealing_sample_len(&self) -> usize {
        self.0.algorithm().sample_len()
    }
}

impl HeaderKey {
    //= https://www.rfc-editor.org/rfc/rfc9001#section-5.4.1
    //# The header protection key uses the "quic hp" label
    pub(crate) fn new(secret: &hkdf::Prk, id: CipherSuiteId) -> Self {
        let key = secret
            .expand(&[id.hp_label()], id.hp())
            .expect("label size verified")
            .into();

        Self(key)
    }

    #[inline]
    fn header_protection_mask(&self, sample: &[u8]) -> HeaderProtectionMask {
        self.0
            .new_mask(sample)
            .expect("sample length already checked")
    }
}

impl fmt::Debug for HeaderKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HeaderKey").finish()
    }
}

/// Header protection for both directions of one encryption level
#[derive(Debug)]
pub struct HeaderKeyPair {
    pub(crate) sealer: HeaderKey,
    pub(crate) opener: HeaderKey,
}

impl crypto::HeaderKey for HeaderKeyPair {
    #[inline]
    fn opening_header_protection_mask(&self, sample: &[u8]) -> HeaderProtectionMask {
        crypto::HeaderKey::opening_header_protection_mask(&self.opener, sample)
    }

    #[inline]
    fn opening_sample_len(&self) -> usize {
        crypto::HeaderKey::opening_sample_len(&self.opener)
    }

    #[inline]
    fn sealing_header_protection_mask(&self, sample: &[u8]) -> HeaderProtectionMask {
        crypto::HeaderKey::sealing_header_protection_mask(&self.sealer, sample)
    }

    #[inline]
    fn sealing_sample_len(&self) -> usize {
        crypto::HeaderKey::sealing_sample_len(&self.sealer)
    }
}

macro_rules! header_key {
    ($name:ident) => {
        #[derive(Debug)]
        pub struct $name(pub(crate) crate::header_key::HeaderKeyPair);

        impl corten_quic_core::crypto::HeaderKey for $name {
            #[inline]
            fn opening_header_protection_mask(
                &self,
                sample: &[u8],
            ) -> corten_quic_core::crypto::HeaderProtectionMask {
                corten_quic_core::crypto::HeaderKey::opening_header_protection_mask(
                    &self.0, sample,
                )
            }

            #[inline]
            fn opening_sample_len(&self) -> usize {
                corten_quic_core::crypto::HeaderKey::opening_sample_len(&self.0)
            }

            #[inline]
            fn sealing_header_protection_mask(
                &self,
                sample: &[u8],
            ) -> corten_quic_core::crypto::HeaderProtectionMask {
                corten_quic_core::crypto::HeaderKey::sealing_header_protection_mask(
                    &self.0, sample,
                )
            }

            #[inline]
            fn sealing_sample_len(&self) -> usize {
                corten_quic_core::crypto::HeaderKey::sealing_sample_len(&self.0)
            }
        }

        impl From<crate::header_key::HeaderKeyPair> for $name {
            fn from(key: crate::header_key::HeaderKeyPair) -> Self {
                Self(key)
            }
        }
    };
}
