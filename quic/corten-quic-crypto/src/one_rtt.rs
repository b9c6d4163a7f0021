// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::cipher_suite::KeyPair;
use corten_quic_core::crypto;

negotiated_key!(OneRttKey, OneRttHeaderKey);

impl crypto::OneRttKey for OneRttKey {
    //= https://www.rfc-editor.org/rfc/rfc9001#section-6.1
    //# An endpoint initiates a key update by updating its packet protection
    //# write secret and using that to protect new packets.

    fn derive_next_key(&self) -> Self {
        Self(KeyPair {
            sealer: self.0.sealer.derive_next(),
            opener: self.0.opener.derive_next(),
        })
    }
}

impl crypto::OneRttHeaderKey for OneRttHeaderKey {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cipher_suite::CipherSuiteId, hkdf, SecretPair};
    use corten_quic_core::{
        crypto::{HeaderKey as _, Key as _, OneRttKey as _},
        endpoint,
    };

    fn secrets() -> SecretPair {
        let salt = hkdf::Salt::new(hkdf::HKDF_SHA256, b"one rtt test salt");
        SecretPair {
            client: salt.extract(b"client application traffic secret"),
            server: salt.extract(b"server application traffic secret"),
        }
    }

    fn seal_open(client: &OneRttKey, server: &OneRttKey) -> Result<(), ()> {
        let header = [0x40u8, 1, 2, 3];
        let payload = b"application data";

        let mut sealed = Vec::new();
        sealed.extend_from_slice(payload);
        sealed.resize(payload.len() + client.tag_len(), 0);
        client.encrypt(7, &header, &mut sealed).map_err(|_| ())?;

        server.decrypt(7, &header, &mut sealed).map_err(|_| ())?;
        assert_eq!(&sealed[..payload.len()], payload);
        Ok(())
    }

    #[test]
    fn round_trip_test() {
        for id in [
            CipherSuiteId::TlsAes128GcmSha256,
            CipherSuiteId::TlsAes256GcmSha384,
            CipherSuiteId::TlsChacha20Poly1305Sha256,
        ] {
            let (client, client_header) =
                OneRttKey::new(endpoint::Type::Client, secrets(), id);
            let (server, server_header) =
                OneRttKey::new(endpoint::Type::Server, secrets(), id);

            seal_open(&client, &server).unwrap();

            // each side's sealing mask matches the peer's opening mask
            let sample = [0x5au8; 32];
            let sample = &sample[..client_header.sealing_sample_len()];
            assert_eq!(
                client_header.sealing_header_protection_mask(sample),
                server_header.opening_header_protection_mask(sample),
            );
        }
    }

    #[test]
    fn key_update_round_trip_test() {
        let id = CipherSuiteId::TlsAes128GcmSha256;
        let (client, _) = OneRttKey::new(endpoint::Type::Client, secrets(), id);
        let (server, _) = OneRttKey::new(endpoint::Type::Server, secrets(), id);

        let next_client = client.derive_next_key();
        let next_server = server.derive_next_key();

        // the updated generations interoperate
        seal_open(&next_client, &next_server).unwrap();

        // the previous generation cannot open packets from the next
        let header = [0x40u8];
        let payload = b"after the update";
        let mut sealed = Vec::new();
        sealed.extend_from_slice(payload);
        sealed.resize(payload.len() + next_client.tag_len(), 0);
        next_client.encrypt(1, &header, &mut sealed).unwrap();
        assert!(server.decrypt(1, &header, &mut sealed).is_err());
    }
}
