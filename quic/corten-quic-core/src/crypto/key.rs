// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::crypto::packet_protection;

/// Packet protection keys for a single direction at one encryption level
pub trait Key: Send {
    /// Opens a sealed payload in place
    ///
    /// `payload` carries the ciphertext followed by the AEAD tag; `header`
    /// is the associated data.
    fn decrypt(
        &self,
        packet_number: u64,
        header: &[u8],
        payload: &mut [u8],
    ) -> Result<(), packet_protection::Error>;

    /// Seals a payload in place
    ///
    /// The final `tag_len` bytes of `payload` receive the AEAD tag.
    fn encrypt(
        &self,
        packet_number: u64,
        header: &[u8],
        payload: &mut [u8],
    ) -> Result<(), packet_protection::Error>;

    /// Length of the appended tag
    fn tag_len(&self) -> usize;

    //= https://www.rfc-editor.org/rfc/rfc9001#section-6.6
    //# Endpoints MUST count the number of encrypted packets for each set of
    //# keys.  If the total number of encrypted packets with the same key
    //# exceeds the confidentiality limit for the selected AEAD, the endpoint
    //# MUST stop using those keys.

    /// Maximum number of packets this key may encrypt
    fn aead_confidentiality_limit(&self) -> u64;

    /// Maximum number of failed decryptions tolerated for this key
    fn aead_integrity_limit(&self) -> u64;
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use crate::crypto::packet_protection;

    /// A no-op key for exercising the packet pipeline without real
    /// cryptography
    #[derive(Debug)]
    pub struct Key {
        pub fail_on_decrypt: bool,
    }

    impl Default for Key {
        fn default() -> Self {
            Self {
                fail_on_decrypt: false,
            }
        }
    }

    impl super::Key for Key {
        fn decrypt(
            &self,
            _packet_number: u64,
            _header: &[u8],
            _payload: &mut [u8],
        ) -> Result<(), packet_protection::Error> {
            if self.fail_on_decrypt {
                return Err(packet_protection::Error::DECRYPT_ERROR);
            }
            Ok(())
        }

        fn encrypt(
            &self,
            _packet_number: u64,
            _header: &[u8],
            _payload: &mut [u8],
        ) -> Result<(), packet_protection::Error> {
            Ok(())
        }

        fn tag_len(&self) -> usize {
            0
        }

        fn aead_confidentiality_limit(&self) -> u64 {
            u64::MAX
        }

        fn aead_integrity_limit(&self) -> u64 {
            u64::MAX
        }
    }
}
