//! Atomic replace and write-once primitives

use crate::io::error::StoreError;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Build a hidden sibling temp path so the final rename stays on one filesystem.
///
/// Temp names start with `.` and end in `.tmp`; the watcher ignores both.
fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    let unique = uuid::Uuid::new_v4().simple().to_string();
    path.with_file_name(format!(".{name}.{}.tmp", &unique[..8]))
}

fn write_temp(path: &Path, bytes: &[u8]) -> Result<PathBuf, StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    let tmp = temp_path_for(path);
    let mut file = File::create(&tmp).map_err(|e| StoreError::io(&tmp, e))?;
    let written = file.write_all(bytes).and_then(|()| file.sync_all());
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(StoreError::io(&tmp, e));
    }
    Ok(tmp)
}

/// Replace `path` with `bytes` atomically.
///
/// Readers observe either the previous content or the new content, never a
/// truncated file. Parent directories are created as needed.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = write_temp(path, bytes)?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        StoreError::io(path, e)
    })
}

/// Create `path` with `bytes`, failing if it already exists.
///
/// The content is staged in a temp file and published with `hard_link`, which
/// refuses to replace an existing target. Two racing writers cannot both
/// succeed and the winner's file is always complete.
///
/// # Errors
///
/// Returns `StoreError::AlreadyExists` if `path` already exists.
pub fn write_once(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if path.exists() {
        return Err(StoreError::AlreadyExists {
            path: path.to_path_buf(),
        });
    }
    let tmp = write_temp(path, bytes)?;
    let linked = fs::hard_link(&tmp, path);
    let _ = fs::remove_file(&tmp);
    match linked {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(StoreError::AlreadyExists {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

/// Returns true for staging files produced by this module.
pub fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .map(|n| {
            let n = n.to_string_lossy();
            n.starts_with('.') || n.ends_with(".tmp")
        })
        .unwrap_or(false)
}
