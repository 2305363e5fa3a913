//! Concurrency-safe root-key registry and the encrypt/decrypt engine
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


use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::info;

use crate::cipher::RootCipher;
use crate::error::{KeyringError, KeyringResult};
use crate::key_types::{KeyId, RootKey, RootKeyMeta};
use crate::keystore::Keystore;

/// One registered key: metadata, raw material, and its constructed cipher.
/// The cipher is built once, at registration, never per operation.
struct KeyringEntry {
    key: RootKey,
    cipher: Arc<RootCipher>,
}

/// In-memory registry of root keys, keyed by ID.
///
/// One instance is owned by the server process, built once at startup from
/// the keystore, and shared by reference with request handlers. A single
/// reader/writer lock guards the whole map; lookups clone the cipher handle
/// under the read lock and do the seal/open work after the guard is
/// dropped, so concurrent encrypt/decrypt callers never serialize on each
/// other. Encrypt and decrypt are synchronous and CPU-bound.
pub struct Keyring {
    entries: RwLock<HashMap<KeyId, KeyringEntry>>,
}

impl std::fmt::Debug for Keyring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyring").finish_non_exhaustive()
    }
}

impl Keyring {
    /// An empty keyring. No key is usable until registered via `add_key`.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Build a keyring from every key persisted in `keystore`.
    ///
    /// This is the once-per-process startup path. A corrupt key file or a
    /// key that cannot be registered fails the whole construction; the
    /// owning process must refuse to serve rather than run with a partially
    /// populated keyring.
    pub async fn from_keystore(keystore: &Keystore) -> KeyringResult<Self> {
        let keyring = Self::new();
        for key in keystore.load_all().await? {
            keyring.add_key(key)?;
        }
        Ok(keyring)
    }

    /// Register a key, constructing its cipher.
    ///
    /// The cipher is built before the write lock is taken, so the lock is
    /// held only for the map insert. On a construction error nothing is
    /// registered — add is all-or-nothing. Adding an ID that already exists
    /// replaces the entry, which is how metadata updates such as the active
    /// flag land in memory.
    pub fn add_key(&self, key: RootKey) -> KeyringResult<()> {
        let cipher = Arc::new(RootCipher::build(
            key.meta.algorithm,
            key.material().as_bytes(),
        )?);
        let key_id = key.meta.key_id;
        let algorithm = key.meta.algorithm;
        self.write().insert(key_id, KeyringEntry { key, cipher });
        info!(key_id = %key_id, algorithm = %algorithm, "Added key to keyring");
        Ok(())
    }

    /// Raw key material by ID.
    pub fn get_key(&self, key_id: &KeyId) -> KeyringResult<Vec<u8>> {
        let entries = self.read();
        let entry = entries
            .get(key_id)
            .ok_or(KeyringError::KeyNotFound(*key_id))?;
        Ok(entry.key.material().as_bytes().to_vec())
    }

    /// Drop a key from the registry. Idempotent: removing an absent ID is a
    /// successful no-op.
    ///
    /// The on-disk key file is untouched — destroying durable material is a
    /// separate, explicit decision (`Keystore::purge_key`). Callers that
    /// still need to decrypt historical envelopes must keep rotated keys
    /// registered rather than removing them immediately.
    pub fn remove_key(&self, key_id: &KeyId) {
        if self.write().remove(key_id).is_some() {
            info!(key_id = %key_id, "Removed key from keyring");
        }
    }

    /// Metadata snapshot of every registered key, for the rotation protocol
    /// and operator listings. No key material is exposed.
    pub fn list_meta(&self) -> Vec<RootKeyMeta> {
        self.read().values().map(|e| e.key.meta.clone()).collect()
    }

    fn cipher_for(&self, key_id: &KeyId) -> KeyringResult<Arc<RootCipher>> {
        self.read()
            .get(key_id)
            .map(|e| Arc::clone(&e.cipher))
            .ok_or(KeyringError::KeyNotFound(*key_id))
    }

    /// Encrypt `plaintext` under the key named by `key_id`, returning the
    /// envelope (nonce prefix plus sealed output). The variable store must
    /// record the key ID it used alongside the envelope.
    pub fn encrypt(&self, plaintext: &[u8], key_id: &KeyId) -> KeyringResult<Vec<u8>> {
        let cipher = self.cipher_for(key_id)?;
        cipher.seal(plaintext)
    }

    /// Decrypt an envelope under the key it was encrypted with. The caller
    /// supplies the recorded key ID; the keyring never infers which key
    /// decrypts a given envelope. `KeyNotFound` when that key has been
    /// rotated out of the registry.
    pub fn decrypt(&self, envelope: &[u8], key_id: &KeyId) -> KeyringResult<Vec<u8>> {
        let cipher = self.cipher_for(key_id)?;
        cipher.open(envelope)
    }

    // A poisoned lock means a panic during a plain map operation; the map
    // itself is still structurally sound, so recover the guard.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<KeyId, KeyringEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<KeyId, KeyringEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Keyring {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_types::EncryptionAlgorithm;
    use std::collections::HashSet;

    const ALGORITHMS: [EncryptionAlgorithm; 2] = [
        EncryptionAlgorithm::Aes256Gcm,
        EncryptionAlgorithm::XChaCha20Poly1305,
    ];

    #[test]
    fn test_add_get_remove() {
        let keyring = Keyring::new();
        let key = RootKey::generate(EncryptionAlgorithm::Aes256Gcm).unwrap();
        let key_id = key.meta.key_id;
        let material = key.material().as_bytes().to_vec();

        keyring.add_key(key).unwrap();
        assert_eq!(keyring.get_key(&key_id).unwrap(), material);

        keyring.remove_key(&key_id);
        assert!(matches!(
            keyring.get_key(&key_id),
            Err(KeyringError::KeyNotFound(id)) if id == key_id
        ));

        // Removing an absent ID is a no-op, not an error.
        keyring.remove_key(&key_id);
    }

    #[test]
    fn test_add_rejects_wrong_key_length() {
        let keyring = Keyring::new();
        let key = RootKey::generate(EncryptionAlgorithm::Aes256Gcm).unwrap();
        // A key whose material is too short for its stated algorithm.
        let key = RootKey::from_parts(
            key.meta.clone(),
            crate::key_types::KeyMaterial::new(vec![0u8; 16]),
        );
        let key_id = key.meta.key_id;

        let err = keyring.add_key(key).unwrap_err();
        assert!(matches!(err, KeyringError::InvalidKeySize { actual: 16, .. }));
        // All-or-nothing: nothing was registered.
        assert!(matches!(
            keyring.get_key(&key_id),
            Err(KeyringError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_add_same_id_replaces_entry() {
        let keyring = Keyring::new();
        let key = RootKey::generate(EncryptionAlgorithm::Aes256Gcm).unwrap();
        let key_id = key.meta.key_id;

        keyring.add_key(key.clone()).unwrap();
        assert!(!keyring.list_meta()[0].active);

        keyring.add_key(key.into_active()).unwrap();
        let meta = keyring.list_meta();
        assert_eq!(meta.len(), 1);
        assert!(meta[0].active);
        assert_eq!(meta[0].key_id, key_id);
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        for algorithm in ALGORITHMS {
            let keyring = Keyring::new();
            let key = RootKey::generate(algorithm).unwrap();
            let key_id = key.meta.key_id;
            keyring.add_key(key).unwrap();

            for plaintext in [&b""[..], b"db_password=hunter2"] {
                let envelope = keyring.encrypt(plaintext, &key_id).unwrap();
                assert_eq!(keyring.decrypt(&envelope, &key_id).unwrap(), plaintext);
            }
        }
    }

    #[test]
    fn test_identical_plaintexts_produce_distinct_envelopes() {
        let keyring = Keyring::new();
        let key = RootKey::generate(EncryptionAlgorithm::Aes256Gcm).unwrap();
        let key_id = key.meta.key_id;
        keyring.add_key(key).unwrap();

        let a = keyring.encrypt(b"same", &key_id).unwrap();
        let b = keyring.encrypt(b"same", &key_id).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_decrypt_after_rotation_out_is_key_not_found() {
        let keyring = Keyring::new();
        let key = RootKey::generate(EncryptionAlgorithm::XChaCha20Poly1305).unwrap();
        let key_id = key.meta.key_id;
        keyring.add_key(key).unwrap();

        let envelope = keyring.encrypt(b"historical secret", &key_id).unwrap();
        keyring.remove_key(&key_id);

        assert!(matches!(
            keyring.decrypt(&envelope, &key_id),
            Err(KeyringError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_unknown_key_id_on_encrypt() {
        let keyring = Keyring::new();
        let err = keyring.encrypt(b"plaintext", &uuid::Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, KeyringError::KeyNotFound(_)));
    }

    #[test]
    fn test_concurrent_encrypt_decrypt() {
        let keyring = Arc::new(Keyring::new());
        let key = RootKey::generate(EncryptionAlgorithm::Aes256Gcm).unwrap();
        let key_id = key.meta.key_id;
        keyring.add_key(key).unwrap();

        let mut handles = Vec::new();
        for worker in 0..8 {
            let keyring = Arc::clone(&keyring);
            handles.push(std::thread::spawn(move || {
                let mut envelopes = Vec::new();
                for i in 0..200 {
                    let plaintext = format!("worker {} message {}", worker, i);
                    let envelope = keyring.encrypt(plaintext.as_bytes(), &key_id).unwrap();
                    assert_eq!(
                        keyring.decrypt(&envelope, &key_id).unwrap(),
                        plaintext.as_bytes()
                    );
                    envelopes.push(envelope);
                }
                envelopes
            }));
        }

        let all: Vec<Vec<u8>> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let distinct: HashSet<&Vec<u8>> = all.iter().collect();
        assert_eq!(distinct.len(), all.len(), "no two envelopes may collide");
    }
}
