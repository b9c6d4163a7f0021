// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    cipher_suite::{CipherSuiteId, KeyPair},
    header_key::{HeaderKey, HeaderKeyPair},
    SecretPair,
};
use corten_quic_core::endpoint;

/// Builds the packet and header keys for one level from the secrets the
/// TLS provider negotiated
pub(crate) fn new_key_set(
    endpoint: endpoint::Type,
    secrets: SecretPair,
    id: CipherSuiteId,
) -> (KeyPair, HeaderKeyPair) {
    let client_header = HeaderKey::new(&secrets.client, id);
    let server_header = HeaderKey::new(&secrets.server, id);

    let (sealer, opener) = match endpoint {
        endpoint::Type::Client => (client_header, server_header),
        endpoint::Type::Server => (server_header, client_header),
    };

    let header_keys = HeaderKeyPair { sealer, opener };
    let keys = KeyPair::new(endpoint, secrets, id);

    (keys, header_keys)
}

// Generates a level key type delegating to the negotiated key pair
macro_rules! negotiated_key {
    ($name:ident, $header_key_name:ident) => {
        header_key!($header_key_name);

        #[derive(Debug)]
        pub struct $name(pub(crate) crate::cipher_suite::KeyPair);

        impl $name {
            pub fn new(
                endpoint: corten_quic_core::endpoint::Type,
                secrets: crate::SecretPair,
                id: crate::cipher_suite::CipherSuiteId,
            ) -> (Self, $header_key_name) {
                let (keys, header_keys) = crate::negotiated::new_key_set(endpoint, secrets, id);
                (Self(keys), header_keys.into())
            }
        }

        impl corten_quic_core::crypto::Key for $name {
            #[inline]
            fn decrypt(
                &self,
                packet_number: u64,
                header: &[u8],
                payload: &mut [u8],
            ) -> Result<(), corten_quic_core::crypto::packet_protection::Error> {
                self.0.opener.decrypt(packet_number, header, payload)
            }

            #[inline]
            fn encrypt(
                &self,
                packet_number: u64,
                header: &[u8],
                payload: &mut [u8],
            ) -> Result<(), corten_quic_core::crypto::packet_protection::Error> {
                self.0.sealer.encrypt(packet_number, header, payload)
            }

            #[inline]
            fn tag_len(&self) -> usize {
                self.0.sealer.tag_len()
            }

            #[inline]
            fn aead_confidentiality_limit(&self) -> u64 {
                self.0.sealer.confidentiality_limit()
            }

            #[inline]
            fn aead_integrity_limit(&self) -> u64 {
                self.0.opener.integrity_limit()
            }
        }
    };
}
