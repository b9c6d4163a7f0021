// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::crypto;

/// Packet protection keys for the 1-RTT encryption level
pub trait OneRttKey: crypto::Key + Sized {
    //= https://www.rfc-editor.org/rfc/rfc9001#section-6.1
    //# The endpoint creates a new write secret from the existing write
    //# secret as performed in Section 7.2 of [TLS13].  This uses the KDF
    //# function provided by TLS with a label of "quic ku".

    /// Derives the next key generation for a key update.
    ///
    /// The header protection key is not updated.
    fn derive_next_key(&self) -> Self;
}

pub trait OneRttHeaderKey: crypto::HeaderKey {}
