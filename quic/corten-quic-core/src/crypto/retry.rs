// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::crypto::packet_protection;
use hex_literal::hex;

//= https://www.rfc-editor.org/rfc/rfc9001#section-5.8
//# The Retry Integrity Tag is a 128-bit field that is computed as the
//# output of AEAD_AES_128_GCM [AEAD] used with the following inputs:
//#
//# *  The secret key, K, is 128 bits equal to
//#    0xbe0c690b9f66575a1d766b54e368c84e.
//#
//# *  The nonce, N, is 96 bits equal to 0x461599d35d632bf2239825bb.
//#
//# *  The plaintext, P, is empty.
//#
//# *  The associated data, A, is the contents of the Retry Pseudo-
//#    Packet

pub const SECRET_KEY: [u8; 16] = hex!("be0c690b9f66575a1d766b54e368c84e");
pub const NONCE: [u8; 12] = hex!("461599d35d632bf2239825bb");

pub const INTEGRITY_TAG_LEN: usize = 16;
pub type IntegrityTag = [u8; INTEGRITY_TAG_LEN];

/// Computes and checks Retry integrity tags over the pseudo-packet
pub trait RetryKey {
    fn generate_tag(pseudo_packet: &[u8]) -> IntegrityTag;

    fn validate(pseudo_packet: &[u8], tag: IntegrityTag)
        -> Result<(), packet_protection::Error>;
}
