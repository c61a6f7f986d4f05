// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Transfer Credentials
//!
//! A credential is the one-time secret a client presents as its SSH user name
//! when pushing a build. It is bound to exactly one stage and is valid from
//! stage creation until the stage is committed or deleted.
//!
//! Randomness comes from an injected [`SecretSource`] so that tests can pin
//! the generated value while production always draws from the OS CSPRNG.

use rand_core::{OsRng, RngCore};
use thiserror::Error;

/// Number of random bytes behind every credential (hex-encoded to 32 chars)
pub const CREDENTIAL_BYTES: usize = 16;

#[derive(Debug, Error)]
#[error("Failed to read secure random bytes: {0}")]
pub struct EntropyError(pub String);

/// Capability for drawing unpredictable bytes
pub trait SecretSource: Send + Sync {
    fn fill(&self, dest: &mut [u8]) -> Result<(), EntropyError>;
}

/// Operating system CSPRNG
#[derive(Debug, Default, Clone, Copy)]
pub struct OsSecretSource;

impl SecretSource for OsSecretSource {
    fn fill(&self, dest: &mut [u8]) -> Result<(), EntropyError> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(|e| EntropyError(e.to_string()))
    }
}

/// One-time transfer secret
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    /// Generate a fresh credential from `source`
    pub fn generate(source: &dyn SecretSource) -> Result<Self, EntropyError> {
        let mut bytes = [0u8; CREDENTIAL_BYTES];
        source.fill(&mut bytes)?;
        Ok(Self(hex::encode(bytes)))
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

// Keep secrets out of debug logs.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(..)")
    }
}

/// Set of currently valid credentials
///
/// Membership is the sole authorization predicate of the transfer gateway.
/// No uniqueness check happens here; callers hand in freshly generated values.
#[derive(Debug, Default)]
pub struct CredentialSet {
    live: Vec<Credential>,
}

impl CredentialSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, credential: Credential) {
        self.live.push(credential);
    }

    /// Remove the first match; absent credentials are ignored
    pub fn remove(&mut self, credential: &Credential) -> bool {
        match self.live.iter().position(|c| c == credential) {
            Some(index) => {
                self.live.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, candidate: &str) -> bool {
        self.live.iter().any(|c| c.as_str() == candidate)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Deterministic source repeating one byte
    pub(crate) struct FixedSecretSource(pub u8);

    impl SecretSource for FixedSecretSource {
        fn fill(&self, dest: &mut [u8]) -> Result<(), EntropyError> {
            dest.fill(self.0);
            Ok(())
        }
    }

    #[test]
    fn test_generate_is_32_hex_chars() {
        let credential = Credential::generate(&OsSecretSource).unwrap();
        assert_eq!(credential.as_str().len(), 32);
        assert!(credential.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_uses_injected_source() {
        let credential = Credential::generate(&FixedSecretSource(1)).unwrap();
        assert_eq!(credential.as_str(), "01010101010101010101010101010101");
    }

    #[test]
    fn test_os_source_does_not_repeat() {
        let a = Credential::generate(&OsSecretSource).unwrap();
        let b = Credential::generate(&OsSecretSource).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_set_remove_first_match_only() {
        let mut set = CredentialSet::new();
        let c = Credential::from_string("abc");
        set.add(c.clone());
        set.add(c.clone());
        assert!(set.remove(&c));
        assert!(set.contains("abc"));
        assert!(set.remove(&c));
        assert!(!set.contains("abc"));
        assert!(!set.remove(&c));
        assert!(set.is_empty());
    }

    #[test]
    fn test_debug_redacts() {
        let c = Credential::from_string("topsecret");
        assert!(!format!("{:?}", c).contains("topsecret"));
    }
}
