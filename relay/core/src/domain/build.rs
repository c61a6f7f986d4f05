// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Caller-assigned staging name
///
/// Doubles as the directory name under the build root and as the blob id in
/// the store, so it must be a single, non-empty path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BuildId(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildIdError {
    #[error("Missing build id")]
    Empty,

    #[error("Invalid build id '{0}': must be a single path component")]
    InvalidComponent(String),
}

impl BuildId {
    pub fn parse(raw: impl Into<String>) -> Result<Self, BuildIdError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(BuildIdError::Empty);
        }
        if raw == "." || raw == ".." || raw.contains('/') || raw.contains('\\') || raw.contains('\0') {
            return Err(BuildIdError::InvalidComponent(raw));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Staging directory for this build under `build_root`
    pub fn staging_dir(&self, build_root: &Path) -> PathBuf {
        build_root.join(&self.0)
    }
}

impl TryFrom<String> for BuildId {
    type Error = BuildIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<BuildId> for String {
    fn from(id: BuildId) -> Self {
        id.0
    }
}

impl std::fmt::Display for BuildId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_plain_names() {
        let id = BuildId::parse("build-42").unwrap();
        assert_eq!(id.as_str(), "build-42");
        assert_eq!(id.staging_dir(Path::new("/var/db/slurp/build")), PathBuf::from("/var/db/slurp/build/build-42"));
    }

    #[test]
    fn test_parse_rejects_empty_and_traversal() {
        assert_eq!(BuildId::parse(""), Err(BuildIdError::Empty));
        assert!(matches!(BuildId::parse(".."), Err(BuildIdError::InvalidComponent(_))));
        assert!(matches!(BuildId::parse("a/b"), Err(BuildIdError::InvalidComponent(_))));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: BuildId = serde_json::from_str("\"b1\"").unwrap();
        assert_eq!(ok.to_string(), "b1");
        assert!(serde_json::from_str::<BuildId>("\"\"").is_err());
    }
}
