//! Root key type definitions and the key generator
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


use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{KeyringError, KeyringResult};

/// Unique identifier for a root key
pub type KeyId = Uuid;

/// AEAD algorithm a root key is bound to for its whole lifetime.
///
/// The binding is fixed at key creation; existing key material is never
/// migrated to a different algorithm. Rotation produces a brand-new key,
/// possibly under the other algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncryptionAlgorithm {
    /// AES-256 in Galois/Counter Mode: 96-bit random nonce, 128-bit tag.
    #[serde(rename = "aes256-gcm")]
    Aes256Gcm,
    /// Extended-nonce ChaCha20-Poly1305: 192-bit random nonce, 128-bit tag.
    /// With a nonce this large, accidental collision stays negligible even
    /// at high encryption volume without a counter, which the 96-bit-nonce
    /// algorithm cannot guarantee at scale.
    #[serde(rename = "xchacha20poly1305")]
    XChaCha20Poly1305,
}

impl EncryptionAlgorithm {
    /// Required key length in bytes.
    pub const fn key_len(&self) -> usize {
        match self {
            EncryptionAlgorithm::Aes256Gcm => 32,
            EncryptionAlgorithm::XChaCha20Poly1305 => 32,
        }
    }

    /// Length in bytes of the nonce prefixed to every envelope.
    pub const fn nonce_len(&self) -> usize {
        match self {
            EncryptionAlgorithm::Aes256Gcm => 12,
            EncryptionAlgorithm::XChaCha20Poly1305 => 24,
        }
    }

    /// Wire name, as stored in key files.
    pub const fn as_str(&self) -> &'static str {
        match self {
            EncryptionAlgorithm::Aes256Gcm => "aes256-gcm",
            EncryptionAlgorithm::XChaCha20Poly1305 => "xchacha20poly1305",
        }
    }
}

impl fmt::Display for EncryptionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncryptionAlgorithm {
    type Err = KeyringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aes256-gcm" => Ok(EncryptionAlgorithm::Aes256Gcm),
            "xchacha20poly1305" => Ok(EncryptionAlgorithm::XChaCha20Poly1305),
            other => Err(KeyringError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Root key metadata. Immutable once assigned, except for the active flag,
/// which the external rotation protocol flips when it promotes or demotes a
/// key cluster-wide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootKeyMeta {
    /// Globally unique key identifier. Must equal the identifier derived
    /// from the key's storage location.
    #[serde(rename = "KeyID")]
    pub key_id: KeyId,
    #[serde(rename = "Algorithm")]
    pub algorithm: EncryptionAlgorithm,
    /// Whether this key is currently preferred for new encryptions.
    /// Uniqueness of the active key is enforced by the rotation protocol,
    /// not here.
    #[serde(rename = "Active")]
    pub active: bool,
    #[serde(rename = "CreateTime")]
    pub create_time: DateTime<Utc>,
}

impl RootKeyMeta {
    /// Structural validation applied by the keystore loader. Returns the
    /// reason a record must be rejected.
    pub fn validate(&self) -> Result<(), String> {
        if self.key_id.is_nil() {
            return Err("missing key ID".to_string());
        }
        Ok(())
    }
}

/// Raw secret bytes of a root key.
///
/// Wiped on drop. `Debug` is redacted so key material cannot leak through
/// logs, error chains, or panic messages.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial(Vec<u8>);

impl KeyMaterial {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial(REDACTED)")
    }
}

/// A root key: metadata plus raw material.
///
/// Built either by [`RootKey::generate`] or by the keystore loader. Never
/// mutated in place — rotation always creates a new key.
#[derive(Debug, Clone)]
pub struct RootKey {
    pub meta: RootKeyMeta,
    material: KeyMaterial,
}

impl RootKey {
    /// Generate a fresh root key for `algorithm`.
    ///
    /// Pure generation: a new v4 ID, a creation timestamp, and key material
    /// of exactly the algorithm's length drawn from the OS CSPRNG. No disk
    /// write and no registry side effect, so the rotation caller can retry
    /// persistence or registration without inconsistent discarded state.
    /// The key starts inactive; activation is the caller's policy.
    pub fn generate(algorithm: EncryptionAlgorithm) -> KeyringResult<Self> {
        let mut bytes = vec![0u8; algorithm.key_len()];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|_| KeyringError::Randomness)?;
        Ok(Self {
            meta: RootKeyMeta {
                key_id: Uuid::new_v4(),
                algorithm,
                active: false,
                create_time: Utc::now(),
            },
            material: KeyMaterial::new(bytes),
        })
    }

    /// Reassemble a key from stored parts. Used by the keystore loader.
    pub fn from_parts(meta: RootKeyMeta, material: KeyMaterial) -> Self {
        Self { meta, material }
    }

    pub fn material(&self) -> &KeyMaterial {
        &self.material
    }

    /// Consume the key, returning it with the active flag set. For rotation
    /// callers whose policy promotes the freshly generated key.
    pub fn into_active(mut self) -> Self {
        self.meta.active = true;
        self
    }
}
