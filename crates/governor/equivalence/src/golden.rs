//! Golden-set integrity.
//!
//! The golden set is a directory of reference fixtures. Its hash covers every
//! regular file's relative path and content, visited in sorted order, so the
//! same tree hashes the same on every machine.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::EquivalenceResult;

pub const STATUS_OK: u16 = 200;
pub const STATUS_UNPROCESSABLE: u16 = 422;

/// Outcome of a golden-set check, meant to gate promotion decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldenSetVerification {
    pub can_proceed: bool,
    /// 200 when the tree matches, 422 otherwise.
    pub status_code: u16,
    pub computed_hash: Option<String>,
    pub expected_hash: String,
    pub message: String,
}

impl GoldenSetVerification {
    fn rejected(expected: &str, computed: Option<String>, message: String) -> Self {
        warn!(status = STATUS_UNPROCESSABLE, reason = %message, "Golden set rejected");
        Self {
            can_proceed: false,
            status_code: STATUS_UNPROCESSABLE,
            computed_hash: computed,
            expected_hash: expected.to_string(),
            message,
        }
    }
}

/// Hex blake3 digest of the tree rooted at `root`.
pub fn hash_golden_set(root: &Path) -> EquivalenceResult<String> {
    let mut hasher = blake3::Hasher::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        hasher.update(relative.as_bytes());
        hasher.update(&[0]);
        hasher.update(&fs::read(entry.path())?);
        hasher.update(&[0]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// Compare the tree at `root` with `expected_hash`.
pub fn verify_golden_set(root: Option<&Path>, expected_hash: &str) -> GoldenSetVerification {
    let Some(root) = root else {
        return GoldenSetVerification::rejected(
            expected_hash,
            None,
            "golden set path not configured".into(),
        );
    };
    if !root.is_dir() {
        return GoldenSetVerification::rejected(
            expected_hash,
            None,
            format!("golden set path {} does not exist", root.display()),
        );
    }

    let computed = match hash_golden_set(root) {
        Ok(hash) => hash,
        Err(e) => {
            return GoldenSetVerification::rejected(
                expected_hash,
                None,
                format!("golden set hash failed: {}", e),
            )
        }
    };

    if !computed.eq_ignore_ascii_case(expected_hash.trim()) {
        return GoldenSetVerification::rejected(
            expected_hash,
            Some(computed),
            "golden set hash mismatch".into(),
        );
    }

    info!(path = %root.display(), "Golden set verified");
    GoldenSetVerification {
        can_proceed: true,
        status_code: STATUS_OK,
        computed_hash: Some(computed),
        expected_hash: expected_hash.to_string(),
        message: "golden set verified".into(),
    }
}
