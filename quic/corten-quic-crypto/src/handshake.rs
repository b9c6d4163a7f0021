// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use corten_quic_core::crypto;

negotiated_key!(HandshakeKey, HandshakeHeaderKey);

impl crypto::HandshakeKey for HandshakeKey {}
impl crypto::HandshakeHeaderKey for HandshakeHeaderKey {}
