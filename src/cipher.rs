//! Cipher construction and the envelope seal/open primitives
//!
//! This is the only module that touches the AEAD crates directly. Everything
//! else encrypts and decrypts through [`RootCipher`], which bundles the
//! algorithm choice, the nonce length, and the envelope layout:
//!
//! ```text
//! [ nonce (12 or 24 bytes) ][ ciphertext + 16-byte tag ]
//! ```
// Copyright 2025 Drover Maintainers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};

use crate::error::{KeyringError, KeyringResult};
use crate::key_types::EncryptionAlgorithm;

/// A ready-to-use AEAD cipher bound to one root key.
///
/// Constructed once per key, at registration time, and safe for unlimited
/// concurrent use. Each seal call draws a fresh random nonce; there is no
/// shared state between invocations.
pub enum RootCipher {
    Aes256Gcm(Aes256Gcm),
    XChaCha20Poly1305(XChaCha20Poly1305),
}

impl core::fmt::Debug for RootCipher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Aes256Gcm(_) => f.write_str("RootCipher::Aes256Gcm"),
            Self::XChaCha20Poly1305(_) => f.write_str("RootCipher::XChaCha20Poly1305"),
        }
    }
}

impl RootCipher {
    /// Build a cipher for `algorithm` from raw key bytes.
    ///
    /// Fails with `InvalidKeySize` when the key length does not match the
    /// algorithm; no cipher is returned.
    pub fn build(algorithm: EncryptionAlgorithm, key_bytes: &[u8]) -> KeyringResult<Self> {
        let invalid_size = || KeyringError::InvalidKeySize {
            algorithm,
            expected: algorithm.key_len(),
            actual: key_bytes.len(),
        };
        if key_bytes.len() != algorithm.key_len() {
            return Err(invalid_size());
        }
        match algorithm {
            EncryptionAlgorithm::Aes256Gcm => {
                let cipher = Aes256Gcm::new_from_slice(key_bytes).map_err(|_| invalid_size())?;
                Ok(RootCipher::Aes256Gcm(cipher))
            }
            EncryptionAlgorithm::XChaCha20Poly1305 => {
                let cipher =
                    XChaCha20Poly1305::new_from_slice(key_bytes).map_err(|_| invalid_size())?;
                Ok(RootCipher::XChaCha20Poly1305(cipher))
            }
        }
    }

    pub fn algorithm(&self) -> EncryptionAlgorithm {
        match self {
            RootCipher::Aes256Gcm(_) => EncryptionAlgorithm::Aes256Gcm,
            RootCipher::XChaCha20Poly1305(_) => EncryptionAlgorithm::XChaCha20Poly1305,
        }
    }

    pub fn nonce_len(&self) -> usize {
        self.algorithm().nonce_len()
    }

    /// Seal `plaintext` under a fresh random nonce, returning the envelope.
    ///
    /// The nonce comes from the OS CSPRNG on every call, so two seals of
    /// identical plaintext produce different envelopes.
    pub fn seal(&self, plaintext: &[u8]) -> KeyringResult<Vec<u8>> {
        match self {
            RootCipher::Aes256Gcm(cipher) => {
                let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
                let sealed = cipher
                    .encrypt(&nonce, plaintext)
                    .map_err(|_| KeyringError::EncryptionFailed)?;
                let mut envelope = Vec::with_capacity(nonce.len() + sealed.len());
                envelope.extend_from_slice(&nonce);
                envelope.extend_from_slice(&sealed);
                Ok(envelope)
            }
            RootCipher::XChaCha20Poly1305(cipher) => {
                let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
                let sealed = cipher
                    .encrypt(&nonce, plaintext)
                    .map_err(|_| KeyringError::EncryptionFailed)?;
                let mut envelope = Vec::with_capacity(nonce.len() + sealed.len());
                envelope.extend_from_slice(&nonce);
                envelope.extend_from_slice(&sealed);
                Ok(envelope)
            }
        }
    }

    /// Open an envelope produced by [`RootCipher::seal`].
    ///
    /// Fails with `MalformedCiphertext` when the envelope cannot even hold a
    /// nonce, and with the undifferentiated `DecryptionFailed` on any
    /// authentication failure — the caller learns nothing about whether the
    /// nonce, ciphertext, or tag was at fault.
    pub fn open(&self, envelope: &[u8]) -> KeyringResult<Vec<u8>> {
        if envelope.len() < self.nonce_len() {
            return Err(KeyringError::MalformedCiphertext);
        }
        let (nonce, sealed) = envelope.split_at(self.nonce_len());
        match self {
            RootCipher::Aes256Gcm(cipher) => cipher
                .decrypt(Nonce::from_slice(nonce), sealed)
                .map_err(|_| KeyringError::DecryptionFailed),
            RootCipher::XChaCha20Poly1305(cipher) => cipher
                .decrypt(XNonce::from_slice(nonce), sealed)
                .map_err(|_| KeyringError::DecryptionFailed),
        }
    }
}
