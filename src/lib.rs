//! Root-key keyring for the Drover control plane
//!
//! Manages the symmetric keys that protect cluster-stored secure variables
//! at rest: key lifecycle (generation, on-disk persistence, in-memory
//! registration, removal), multi-algorithm authenticated encryption, and the
//! encrypt/decrypt contract the variable store consumes.
//!
//! Rotation callers must hold the order generate → persist → register: a key
//! becomes reachable by encrypt/decrypt callers only after it is durable on
//! disk, and a failure before registration leaves the keyring unchanged.
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


pub mod cipher;
pub mod error;
pub mod key_types;
pub mod keyring;
pub mod keystore;

pub use cipher::RootCipher;
pub use error::{KeyringError, KeyringResult};
pub use key_types::{EncryptionAlgorithm, KeyId, KeyMaterial, RootKey, RootKeyMeta};
pub use keyring::Keyring;
pub use keystore::{Keystore, KEY_FILE_EXT};
