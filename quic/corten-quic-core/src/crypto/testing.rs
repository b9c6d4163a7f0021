// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Null cryptography for exercising the packet pipeline in tests

use crate::crypto::{self, HeaderProtectionMask};

pub use crate::crypto::key::testing::Key;

/// A header key producing an all-zero mask, leaving headers unchanged
#[derive(Debug, Default)]
pub struct HeaderKey;

impl crypto::HeaderKey for HeaderKey {
    fn opening_header_protection_mask(&self, _sample: &[u8]) -> HeaderProtectionMask {
        Default::default()
    }

    fn opening_sample_len(&self) -> usize {
        16
    }

    fn sealing_header_protection_mask(&self, _sample: &[u8]) -> HeaderProtectionMask {
        Default::default()
    }

    fn sealing_sample_len(&self) -> usize {
        16
    }
}

impl crypto::InitialHeaderKey for HeaderKey {}
impl crypto::HandshakeHeaderKey for HeaderKey {}
impl crypto::OneRttHeaderKey for HeaderKey {}
impl crypto::ZeroRttHeaderKey for HeaderKey {}

impl crypto::InitialKey for Key {
    type HeaderKey = HeaderKey;

    fn new_server(_connection_id: &[u8]) -> (Self, Self::HeaderKey) {
        (Self::default(), HeaderKey)
    }

    fn new_client(_connection_id: &[u8]) -> (Self, Self::HeaderKey) {
        (Self::default(), HeaderKey)
    }
}

impl crypto::HandshakeKey for Key {}

impl crypto::OneRttKey for Key {
    fn derive_next_key(&self) -> Self {
        Self::default()
    }
}

impl crypto::ZeroRttKey for Key {}

#[derive(Clone, Copy, Debug, Default)]
pub struct RetryKey;

impl crypto::RetryKey for RetryKey {
    fn generate_tag(_pseudo_packet: &[u8]) -> crate::crypto::retry::IntegrityTag {
        Default::default()
    }

    fn validate(
        _pseudo_packet: &[u8],
        _tag: crate::crypto::retry::IntegrityTag,
    ) -> Result<(), crate::crypto::packet_protection::Error> {
        Ok(())
    }
}

/// A full suite of null keys
#[derive(Clone, Copy, Debug, Default)]
pub struct Suite;

impl crypto::CryptoSuite for Suite {
    type InitialKey = Key;
    type InitialHeaderKey = HeaderKey;
    type HandshakeKey = Key;
    type HandshakeHeaderKey = HeaderKey;
    type OneRttKey = Key;
    type OneRttHeaderKey = HeaderKey;
    type ZeroRttKey = Key;
    type ZeroRttHeaderKey = HeaderKey;
    type RetryKey = RetryKey;
}
