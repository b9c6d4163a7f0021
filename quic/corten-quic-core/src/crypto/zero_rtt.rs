// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::crypto;

/// Packet protection keys for the 0-RTT encryption level
pub trait ZeroRttKey: crypto::Key {}

pub trait ZeroRttHeaderKey: crypto::HeaderKey {}
