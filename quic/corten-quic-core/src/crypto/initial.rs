// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::crypto;
use hex_literal::hex;

/// Packet protection keys for the Initial encryption level
///
/// The marker trait keeps Initial keys from being used with packets of any
/// other level; misuse is caught by the type system.
pub trait InitialKey: crypto::Key + Sized {
    type HeaderKey: crypto::HeaderKey;

    fn new_server(connection_id: &[u8]) -> (Self, Self::HeaderKey);
    fn new_client(connection_id: &[u8]) -> (Self, Self::HeaderKey);
}

pub trait InitialHeaderKey: crypto::HeaderKey {}

//= https://www.rfc-editor.org/rfc/rfc9001#section-5.2
//# initial_salt = 0x38762cf7f55934b34d179ae6a4c80cadccbb7f0a

pub const INITIAL_SALT: [u8; 20] = hex!("38762cf7f55934b34d179ae6a4c80cadccbb7f0a");

//= https://www.rfc-editor.org/rfc/rfc9001#section-5.2
//# client_initial_secret = HKDF-Expand-Label(initial_secret,
//#                                           "client in", "",
//#                                           Hash.length)

pub const INITIAL_CLIENT_LABEL: [u8; 9] = *b"client in";

//= https://www.rfc-editor.org/rfc/rfc9001#section-5.2
//# server_initial_secret = HKDF-Expand-Label(initial_secret,
//#                                           "server in", "",
//#                                           Hash.length)

pub const INITIAL_SERVER_LABEL: [u8; 9] = *b"server in";

//= https://www.rfc-editor.org/rfc/rfc9001#appendix-A
//# These packets use an 8-byte client-chosen Destination Connection ID
//# of 0x8394c8f03e515708.

pub const EXAMPLE_DCID: [u8; 8] = hex!("8394c8f03e515708");

//= https://www.rfc-editor.org/rfc/rfc9001#appendix-A.1
//# initial_secret = HKDF-Extract(initial_salt, cid)
//#     = 7db5df06e7a69e432496adedb0085192
//#       3595221596ae2ae9fb8115c1e9ed0a44

pub const EXAMPLE_INITIAL_SECRET: [u8; 32] = hex!(
    "
    7db5df06e7a69e432496adedb0085192
    3595221596ae2ae9fb8115c1e9ed0a44
    "
);

//= https://www.rfc-editor.org/rfc/rfc9001#appendix-A.1
//# client_initial_secret
//#     = HKDF-Expand-Label(initial_secret, "client in", "", 32)
//#     = c00cf151ca5be075ed0ebfb5c80323c4
//#       2d6b7db67881289af4008f1f6c357aea

pub const EXAMPLE_CLIENT_INITIAL_SECRET: [u8; 32] = hex!(
    "
    c00cf151ca5be075ed0ebfb5c80323c4
    2d6b7db67881289af4008f1f6c357aea
    "
);

//= https://www.rfc-editor.org/rfc/rfc9001#appendix-A.1
//# server_initial_secret
//#     = HKDF-Expand-Label(initial_secret, "server in", "", 32)
//#     = 3c199828fd139efd216c155ad844cc81
//#       fb82fa8d7446fa7d78be803acdda951b

pub const EXAMPLE_SERVER_INITIAL_SECRET: [u8; 32] = hex!(
    "
    3c199828fd139efd216c155ad844cc81
    fb82fa8d7446fa7d78be803acdda951b
    "
);

//= https://www.rfc-editor.org/rfc/rfc9001#appendix-A.1
//# key = HKDF-Expand-Label(client_initial_secret, "quic key", "", 16)
//#     = 1f369613dd76d5467730efcbe3b1a22d

pub const EXAMPLE_CLIENT_INITIAL_KEY: [u8; 16] = hex!("1f369613dd76d5467730efcbe3b1a22d");

//= https://www.rfc-editor.org/rfc/rfc9001#appendix-A.1
//# iv  = HKDF-Expand-Label(client_initial_secret, "quic iv", "", 12)
//#     = fa044b2f42a3fd3b46fb255c

pub const EXAMPLE_CLIENT_INITIAL_IV: [u8; 12] = hex!("fa044b2f42a3fd3b46fb255c");

//= https://www.rfc-editor.org/rfc/rfc9001#appendix-A.1
//# hp  = HKDF-Expand-Label(client_initial_secret, "quic hp", "", 16)
//#     = 9f50449e04a0e810283a1e9933adedd2

pub const EXAMPLE_CLIENT_INITIAL_HP: [u8; 16] = hex!("9f50449e04a0e810283a1e9933adedd2");

//= https://www.rfc-editor.org/rfc/rfc9001#appendix-A.1
//# key = HKDF-Expand-Label(server_initial_secret, "quic key", "", 16)
//#     = cf3a5331653c364c88f0f379b6067e37

pub const EXAMPLE_SERVER_INITIAL_KEY: [u8; 16] = hex!("cf3a5331653c364c88f0f379b6067e37");

//= https://www.rfc-editor.org/rfc/rfc9001#appendix-A.1
//# iv  = HKDF-Expand-Label(server_initial_secret, "quic iv", "", 12)
//#     = 0ac1493ca1905853b0bba03e

pub const EXAMPLE_SERVER_INITIAL_IV: [u8; 12] = hex!("0ac1493ca1905853b0bba03e");

//= https://www.rfc-editor.org/rfc/rfc9001#appendix-A.1
//# hp  = HKDF-Expand-Label(server_initial_secret, "quic hp", "", 16)
//#     = c206b8d9b9f0f37644430b490eeaa314

pub const EXAMPLE_SERVER_INITIAL_HP: [u8; 16] = hex!("c206b8d9b9f0f37644430b490eeaa314");
