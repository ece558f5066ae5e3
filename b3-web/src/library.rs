//! Audio file listing

use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};

/// Base names of the files in `dir` with extension `ext`, sorted case-insensitively
///
/// The extension comparison ignores case; subdirectories are not searched.
pub async fn list_audio_files(dir: &Path, ext: &str) -> Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| Error::Internal(format!("Failed to read {}: {}", dir.display(), e)))?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::Internal(format!("Failed to read {}: {}", dir.display(), e)))?
    {
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(ext));
        if !matches {
            continue;
        }
        let is_file = entry.file_type().await.map(|t| !t.is_dir()).unwrap_or(false);
        if !is_file {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            files.push(name.to_string());
        }
    }

    files.sort_by_key(|name| name.to_lowercase());
    debug!("Found {} .{} files in {}", files.len(), ext, dir.display());
    Ok(files)
}
