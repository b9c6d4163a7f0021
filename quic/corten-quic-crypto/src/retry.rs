// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{constant_time, ring_aead as aead};
use corten_quic_core::crypto::{
    packet_protection,
    retry::{self, IntegrityTag},
};

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

lazy_static::lazy_static! {
    static ref SECRET_KEY: aead::LessSafeKey = {
        let key = aead::UnboundKey::new(&aead::AES_128_GCM, &retry::SECRET_KEY)
            .expect("the key length is fixed");
        aead::LessSafeKey::new(key)
    };
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RetryKey;

impl corten_quic_core::crypto::RetryKey for RetryKey {
    fn generate_tag(pseudo_packet: &[u8]) -> IntegrityTag {
        let nonce = aead::Nonce::assume_unique_for_key(retry::NONCE);
        let tag = SECRET_KEY
            .seal_in_place_separate_tag(nonce, aead::Aad::from(pseudo_packet), &mut [])
            .expect("an empty payload never exceeds the aead limit");

        tag.as_ref()
            .try_into()
            .expect("AES-128-GCM tags are 16 bytes")
    }

    fn validate(
        pseudo_packet: &[u8],
        tag: IntegrityTag,
    ) -> Result<(), packet_protection::Error> {
        let expected = Self::generate_tag(pseudo_packet);

        constant_time::verify_slices_are_equal(&expected, &tag)
            .map_err(|_| packet_protection::Error::DECRYPT_ERROR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corten_quic_core::crypto::RetryKey as _;
    use hex_literal::hex;

    //= https://www.rfc-editor.org/rfc/rfc9001#appendix-A.4
    //= type=test
    //# This shows a Retry packet that might be sent in response to the
    //# Initial packet in Appendix A.2.  The integrity check includes the
    //# client-chosen connection ID value of 0x8394c8f03e515708, but that
    //# value is not included in the final Retry packet:
    //#
    //# ff000000010008f067a5502a4262b574 6f6b656e04a265ba2eff4d829058fb3f
    //# 0f2496ba

    const EXPECTED_TAG: [u8; 16] = hex!("04a265ba2eff4d829058fb3f0f2496ba");

    fn rfc_pseudo_packet() -> Vec<u8> {
        let mut pseudo = Vec::new();
        // length-prefixed original destination connection id
        pseudo.push(8);
        pseudo.extend_from_slice(&hex!("8394c8f03e515708"));
        // the Retry packet with the integrity tag removed
        pseudo.extend_from_slice(&hex!("ff000000010008f067a5502a4262b574 6f6b656e"));
        pseudo
    }

    #[test]
    fn rfc_tag_test() {
        assert_eq!(RetryKey::generate_tag(&rfc_pseudo_packet()), EXPECTED_TAG);
    }

    #[test]
    fn validate_test() {
        assert!(RetryKey::validate(&rfc_pseudo_packet(), EXPECTED_TAG).is_ok());

        let mut bad_tag = EXPECTED_TAG;
        bad_tag[0] ^= 1;
        assert!(RetryKey::validate(&rfc_pseudo_packet(), bad_tag).is_err());

        let mut tampered = rfc_pseudo_packet();
        tampered[1] ^= 1;
        assert!(RetryKey::validate(&tampered, EXPECTED_TAG).is_err());
    }
}
