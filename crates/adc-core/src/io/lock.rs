//! File locking with backoff retry

use crate::io::error::StoreError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::time::Duration;

/// File lock guard that automatically releases on drop
#[derive(Debug)]
pub struct FileLock {
    file: File,
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Acquire an exclusive advisory lock on `path` with backoff retry
///
/// Attempts to acquire the lock with exponential backoff:
/// - Attempt 0: No wait
/// - Attempt 1: 50ms wait
/// - Attempt 2: 100ms wait
/// - Attempt n: 50ms * 2^(n-1)
///
/// The lock file is created if missing and left in place afterwards.
///
/// # Errors
///
/// Returns `StoreError::LockTimeout` if the lock is still held by someone else
/// after `max_retries` attempts.
pub fn acquire_lock(path: &Path, max_retries: u32) -> Result<FileLock, StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| StoreError::io(path, e))?;

    for attempt in 0..=max_retries {
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(FileLock { file }),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                if attempt < max_retries {
                    let wait_ms = 50u64 * (1 << attempt.min(10));
                    std::thread::sleep(Duration::from_millis(wait_ms));
                }
            }
            Err(e) => return Err(StoreError::io(path, e)),
        }
    }

    Err(StoreError::LockTimeout {
        path: path.to_path_buf(),
        retries: max_retries,
    })
}
