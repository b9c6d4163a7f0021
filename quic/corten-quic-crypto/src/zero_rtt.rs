// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    cipher_suite::{CipherSuiteId, PacketKey},
    header_key::{HeaderKey, HeaderKeyPair},
    hkdf::Prk,
};
use corten_quic_core::crypto;

header_key!(ZeroRttHeaderKey);

//= https://www.rfc-editor.org/rfc/rfc9001#section-5.1
//# The keys used to protect 0-RTT packets come from the
//# client_early_traffic_secret.

/// 0-RTT packet protection: a single secret covers the one direction the
/// level carries (client to server)
#[derive(Debug)]
pub struct ZeroRttKey {
    sealer: PacketKey,
    opener: PacketKey,
}

impl ZeroRttKey {
    pub fn new(secret: Prk, id: CipherSuiteId) -> (Self, ZeroRttHeaderKey) {
        let header_key = HeaderKey::new(&secret, id);
        let header_keys = HeaderKeyPair {
            sealer: HeaderKey::new(&secret, id),
            opener: header_key,
        };

        let key = Self {
            sealer: PacketKey::new(secret.clone(), id),
            opener: PacketKey::new(secret, id),
        };

        (key, header_keys.into())
    }
}

impl crypto::Key for ZeroRttKey {
    #[inline]
    fn decrypt(
        &self,
        packet_number: u64,
        header: &[u8],
        payload: &mut [u8],
    ) -> Result<(), crypto::packet_protection::Error> {
        self.opener.decrypt(packet_number, header, payload)
    }

    #[inline]
    fn encrypt(
        &self,
        packet_number: u64,
        header: &[u8],
        payload: &mut [u8],
    ) -> Result<(), crypto::packet_protection::Error> {
        self.sealer.encrypt(packet_number, header, payload)
    }

    #[inline]
    fn tag_len(&self) -> usize {
        self.sealer.tag_len()
    }

    #[inline]
    fn aead_confidentiality_limit(&self) -> u64 {
        self.sealer.confidentiality_limit()
    }

    #[inline]
    fn aead_integrity_limit(&self) -> u64 {
        self.opener.integrity_limit()
    }
}

impl crypto::ZeroRttKey for ZeroRttKey {}
impl crypto::ZeroRttHeaderKey for ZeroRttHeaderKey {}
