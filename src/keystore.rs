//! Durable on-disk keystore, one JSON file per root key
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


use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{KeyringError, KeyringResult};
use crate::key_types::{KeyId, KeyMaterial, RootKey, RootKeyMeta};

/// Extension for key files. Anything else in the keystore directory is
/// skipped by the loader.
pub const KEY_FILE_EXT: &str = "json";

/// On-disk store for root keys: `<dir>/<key_id>.json`.
///
/// Every persist is a full-file rewrite, so a lost race between two writers
/// is last-write-wins on metadata, never torn data. Serializing concurrent
/// rotations is the rotation protocol's job, not this store's.
pub struct Keystore {
    path: PathBuf,
}

/// On-disk record: metadata plus base64-encoded raw key bytes.
#[derive(Serialize, Deserialize)]
struct StoredKey {
    #[serde(rename = "Meta")]
    meta: RootKeyMeta,
    #[serde(rename = "Key")]
    key: String,
}

impl Keystore {
    /// Open the keystore directory, creating it if needed. The directory is
    /// restricted to owner access.
    pub async fn open<P: AsRef<Path>>(path: P) -> KeyringResult<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, std::fs::Permissions::from_mode(0o700)).await?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn key_file_path(&self, key_id: &KeyId) -> PathBuf {
        self.path.join(format!("{}.{}", key_id, KEY_FILE_EXT))
    }

    /// Serialize a root key to its key file, owner read/write only.
    ///
    /// Writing an ID that already has a file replaces it; this is how
    /// active-flag updates reach disk.
    pub async fn persist_key(&self, key: &RootKey) -> KeyringResult<()> {
        let stored = StoredKey {
            meta: key.meta.clone(),
            key: BASE64.encode(key.material().as_bytes()),
        };
        let json = serde_json::to_string_pretty(&stored)?;
        let path = self.key_file_path(&key.meta.key_id);
        fs::write(&path, json).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).await?;
        }
        debug!(key_id = %key.meta.key_id, path = %path.display(), "Persisted root key");
        Ok(())
    }

    /// Load every key file in the keystore directory (non-recursive).
    ///
    /// Subdirectories and stray files (wrong extension, name that is not a
    /// key ID) are skipped — an administrator leaving a note in the
    /// directory is not a reason to refuse startup. A file that does look
    /// like a key file must parse and validate completely; any failure
    /// aborts the whole load, so the keyring can never come up partially
    /// populated without the operator being told.
    pub async fn load_all(&self) -> KeyringResult<Vec<RootKey>> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(KEY_FILE_EXT) {
                debug!(path = %path.display(), "Skipping non-key file in keystore");
                continue;
            }
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            let file_id = match Uuid::parse_str(stem) {
                Ok(id) => id,
                Err(_) => {
                    debug!(path = %path.display(), "Skipping file without a key-shaped name");
                    continue;
                }
            };
            keys.push(self.load_key(&path, &file_id).await?);
        }
        info!(count = keys.len(), path = %self.path.display(), "Loaded keystore");
        Ok(keys)
    }

    /// Deserialize one key file, checking it against the ID derived from
    /// its file name. That check defends against a key file being renamed
    /// or substituted on disk.
    async fn load_key(&self, path: &Path, expected_id: &KeyId) -> KeyringResult<RootKey> {
        let corrupt = |reason: String| KeyringError::CorruptKeyFile {
            path: path.to_path_buf(),
            reason,
        };

        let raw = fs::read_to_string(path).await?;
        // Parse the complete record first; only then decode its key field.
        let stored: StoredKey = serde_json::from_str(&raw).map_err(|e| corrupt(e.to_string()))?;
        stored.meta.validate().map_err(corrupt)?;
        if stored.meta.key_id != *expected_id {
            return Err(corrupt(format!(
                "embedded key ID {} does not match file name",
                stored.meta.key_id
            )));
        }
        let material = BASE64
            .decode(&stored.key)
            .map_err(|e| corrupt(format!("invalid key encoding: {}", e)))?;
        Ok(RootKey::from_parts(stored.meta, KeyMaterial::new(material)))
    }

    /// Delete a key's file from disk. Idempotent.
    ///
    /// Deliberately separate from `Keyring::remove_key`: dropping a key from
    /// the in-memory registry never destroys durable material, because that
    /// destruction is irreversible. Purging is its own explicit decision.
    pub async fn purge_key(&self, key_id: &KeyId) -> KeyringResult<()> {
        let path = self.key_file_path(key_id);
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!(key_id = %key_id, "Purged root key file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
