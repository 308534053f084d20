//! Crash-Tolerant File Writes
//!
//! Settings and locally stored assets are the only durable state this crate
//! owns, so writes must never leave a torn file behind. Content goes to a
//! sibling staging file that is synced and renamed into place; platforms
//! where rename-over-existing can fail get a backup swap instead.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::core::{CoreError, CoreResult};

// =============================================================================
// Identifier Validation
// =============================================================================

/// Checks that a caller-supplied identifier is usable as one path component.
///
/// Owner and record ids become directory names under the storage root, so
/// anything that could escape a single component is rejected: `..`, path
/// separators, drive colons, control characters. `label` names the offending
/// field in the returned message.
pub fn validate_path_id_component(id: &str, label: &str) -> Result<(), String> {
    let id = id.trim();
    if id.is_empty() {
        return Err(format!("{label} must not be empty"));
    }
    if id.contains("..") {
        return Err(format!("{label} must not contain '..'"));
    }
    if id.contains(['/', '\\', ':']) {
        return Err(format!("{label} must not contain path separators"));
    }
    if id.chars().any(char::is_control) {
        return Err(format!("{label} must not contain control characters"));
    }
    Ok(())
}

// =============================================================================
// Atomic Writes
// =============================================================================

/// Writes `bytes` to `path` so a crash leaves either the previous content or
/// the new content, never a partial file. Parent directories are created as
/// needed.
pub fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let staged = sibling(path, "tmp");
    {
        let mut writer = BufWriter::new(File::create(&staged)?);
        writer.write_all(bytes)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    promote(&staged, path)
}

/// Serializes `value` as pretty-printed JSON and writes it atomically.
pub fn atomic_write_json_pretty<T: serde::Serialize>(path: &Path, value: &T) -> CoreResult<()> {
    atomic_write_bytes(path, &serde_json::to_vec_pretty(value)?)
}

/// Returns `path` with `.{suffix}` appended to its file name.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push('.');
    name.push_str(suffix);
    path.with_file_name(name)
}

/// Moves the staged file over `dest`.
///
/// Rename-over-existing is not atomic on every platform (Windows being the
/// usual offender), so an existing destination is parked as a `.bak` sibling
/// first and restored if the final rename fails.
fn promote(staged: &Path, dest: &Path) -> CoreResult<()> {
    if !dest.exists() {
        std::fs::rename(staged, dest)?;
        return Ok(());
    }

    let parked = sibling(dest, "bak");
    let _ = std::fs::remove_file(&parked);
    std::fs::rename(dest, &parked)?;

    if let Err(e) = std::fs::rename(staged, dest) {
        let _ = std::fs::rename(&parked, dest);
        let _ = std::fs::remove_file(staged);
        return Err(CoreError::IoError(e));
    }
    let _ = std::fs::remove_file(&parked);
    Ok(())
}
