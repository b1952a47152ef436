//! Crash-safe file I/O for the deployment root
//!
//! Every file that crosses a process boundary goes through this module:
//!
//! - **Atomic replace**: temp file + fsync + rename, so readers never see
//!   partial JSON (state records, status snapshots, request files)
//! - **Write once**: temp file + hard link, so a response file is created
//!   exactly once and never overwritten
//! - **File locking**: advisory locks with exponential backoff retry
//!
//! # Example
//!
//! ```rust,no_run
//! use agent_deploy_core::io::{atomic_write, write_once};
//! use std::path::Path;
//!
//! let state = Path::new("/tmp/adc/state/A1.json");
//! atomic_write(state, br#"{"agent_id":"A1"}"#).unwrap();
//!
//! let response = Path::new("/tmp/adc/responses/req_1_response.json");
//! write_once(response, b"{}").unwrap();
//! assert!(write_once(response, b"{}").is_err());
//! ```

pub mod atomic;
pub mod error;
pub mod lock;

pub use atomic::{atomic_write, is_temp_file, write_once};
pub use error::StoreError;
pub use lock::{FileLock, acquire_lock};
