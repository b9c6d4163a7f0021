// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::crypto;

/// Packet protection keys for the Handshake encryption level
pub trait HandshakeKey: crypto::Key {}

pub trait HandshakeHeaderKey: crypto::HeaderKey {}
