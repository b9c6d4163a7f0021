// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! ring-backed implementation of the corten-quic-core crypto traits:
//! the HKDF key schedule, AEAD packet protection and header protection
//! for the TLS 1.3 cipher suites QUIC v1 uses.

#[macro_use]
mod header_key;
#[macro_use]
mod negotiated;

mod cipher_suite;
mod iv;

#[doc(hidden)]
pub use ring::{aead as ring_aead, constant_time, hkdf, hkdf::Prk};

pub use cipher_suite::CipherSuiteId;
pub use header_key::HeaderKey;

/// The per-direction traffic secrets delivered by the TLS provider for
/// one encryption level
#[derive(Clone)]
pub struct SecretPair {
    pub client: Prk,
    pub server: Prk,
}

pub mod handshake;
pub mod initial;
pub mod one_rtt;
pub mod retry;
pub mod zero_rtt;

/// The crypto suite assembled from this crate's key types
#[derive(Clone, Copy, Debug, Default)]
pub struct Suite;

impl corten_quic_core::crypto::CryptoSuite for Suite {
    type InitialKey = initial::InitialKey;
    type InitialHeaderKey = initial::InitialHeaderKey;
    type HandshakeKey = handshake::HandshakeKey;
    type HandshakeHeaderKey = handshake::HandshakeHeaderKey;
    type OneRttKey = one_rtt::OneRttKey;
    type OneRttHeaderKey = one_rtt::OneRttHeaderKey;
    type ZeroRttKey = zero_rtt::ZeroRttKey;
    type ZeroRttHeaderKey = zero_rtt::ZeroRttHeaderKey;
    type RetryKey = retry::RetryKey;
}
