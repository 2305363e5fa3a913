//! Error types for the root-key keyring
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


use std::path::PathBuf;
use thiserror::Error;

use crate::key_types::{EncryptionAlgorithm, KeyId};

/// Keyring errors
#[derive(Error, Debug)]
pub enum KeyringError {
    /// A file in the keystore directory looked like a key file but could not
    /// be parsed, failed metadata validation, or did not match its
    /// filename-derived ID. Fatal during startup load, never silently
    /// skipped — distinct from "not a key file", which is skipped.
    #[error("corrupt key file {path}: {reason}")]
    CorruptKeyFile { path: PathBuf, reason: String },

    #[error("unsupported encryption algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid key size for {algorithm}: expected {expected} bytes, got {actual}")]
    InvalidKeySize {
        algorithm: EncryptionAlgorithm,
        expected: usize,
        actual: usize,
    },

    #[error("no such key in keyring: {0}")]
    KeyNotFound(KeyId),

    /// The envelope is shorter than the nonce its key's algorithm requires.
    #[error("malformed ciphertext")]
    MalformedCiphertext,

    /// Authentication failed. Carries no detail about whether the nonce,
    /// ciphertext, or tag was at fault.
    #[error("decryption failed")]
    DecryptionFailed,

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("randomness source failed")]
    Randomness,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for keyring operations
pub type KeyringResult<T> = Result<T, KeyringError>;
