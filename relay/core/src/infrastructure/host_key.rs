// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Transfer gateway host identity
//!
//! The host key is generated once (Ed25519, PKCS#8 PEM) and reused across
//! restarts so clients keep seeing the same server fingerprint. Existing key
//! files in any format russh understands (OpenSSH, PKCS#1 RSA) are accepted
//! as-is.

use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use ed25519_dalek::SigningKey;
use rand_core::OsRng;
use russh_keys::key::KeyPair;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum HostKeyError {
    #[error("Failed to create host key directory '{}' - {source}", .path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode host key - {0}")]
    Encode(String),

    #[error("Failed to write host key to file '{}' - {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read host key from file '{}' - {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse host key '{}' - {message}", .path.display())]
    Decode { path: PathBuf, message: String },
}

/// Generate and persist a host key at `path` unless a file already exists
///
/// Returns `true` when a new key was written.
pub fn ensure_host_key(path: &Path) -> Result<bool, HostKeyError> {
    if path.exists() {
        debug!(path = %path.display(), "Host key present");
        return Ok(false);
    }

    let key = SigningKey::generate(&mut OsRng);
    let pem = key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| HostKeyError::Encode(e.to_string()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| HostKeyError::CreateDirectory {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let write_err = |source: std::io::Error| HostKeyError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
        .map_err(write_err)?;
    file.write_all(pem.as_bytes()).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;

    info!(path = %path.display(), "Generated new host key");
    Ok(true)
}

/// Read the host key at `path` for the SSH server
pub fn load_host_key(path: &Path) -> Result<KeyPair, HostKeyError> {
    let pem = std::fs::read_to_string(path).map_err(|source| HostKeyError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    if let Ok(key) = SigningKey::from_pkcs8_pem(&pem) {
        return Ok(KeyPair::Ed25519(key));
    }

    russh_keys::decode_secret_key(&pem, None).map_err(|e| HostKeyError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    #[test]
    fn test_generates_once_with_owner_only_mode() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/dir/slurp_host_key");

        assert!(ensure_host_key(&path).unwrap());
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        let first = std::fs::read(&path).unwrap();
        assert!(!ensure_host_key(&path).unwrap());
        assert_eq!(std::fs::read(&path).unwrap(), first);
    }

    #[test]
    fn test_generated_key_loads() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("key");
        ensure_host_key(&path).unwrap();

        let key = load_host_key(&path).unwrap();
        assert!(matches!(key, KeyPair::Ed25519(_)));
    }

    #[test]
    fn test_garbage_key_is_decode_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("key");
        std::fs::write(&path, "not a key").unwrap();

        assert!(matches!(load_host_key(&path), Err(HostKeyError::Decode { .. })));
        assert!(matches!(
            load_host_key(&temp.path().join("absent")),
            Err(HostKeyError::Read { .. })
        ));
    }
}
