//! Signal delivery and exit-status decoding.

use std::process::ExitStatus;

/// Signals the supervisor sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Term,
    Kill,
}

impl Signal {
    #[cfg(unix)]
    fn as_raw(self) -> libc::c_int {
        match self {
            Self::Term => libc::SIGTERM,
            Self::Kill => libc::SIGKILL,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Term => "SIGTERM",
            Self::Kill => "SIGKILL",
        }
    }
}

/// Send `signal` to `pid`.
///
/// Returns `Ok(false)` when the process no longer exists (ESRCH).
#[cfg(unix)]
pub fn send_signal(pid: u32, signal: Signal) -> std::io::Result<bool> {
    let Ok(raw_pid) = libc::pid_t::try_from(pid) else {
        return Ok(false);
    };
    if raw_pid <= 1 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("refusing to signal pid {pid}"),
        ));
    }
    // SAFETY: kill() has no memory-safety preconditions; pid is a positive
    // process id, never 0 or -1, so only that one process is targeted.
    let rc = unsafe { libc::kill(raw_pid, signal.as_raw()) };
    if rc == 0 {
        return Ok(true);
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(not(unix))]
pub fn send_signal(_pid: u32, _signal: Signal) -> std::io::Result<bool> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "signals are only supported on Unix",
    ))
}

/// Check whether an OS process with the given PID exists.
///
/// Uses `kill(pid, 0)`, which checks existence without delivering a signal. A zombie
/// still counts as existing. Always `false` on non-Unix platforms.
pub fn is_pid_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        let Ok(raw_pid) = libc::pid_t::try_from(pid) else {
            return false;
        };
        if raw_pid <= 0 {
            return false;
        }
        // SAFETY: signal 0 performs only the existence and permission check.
        let rc = unsafe { libc::kill(raw_pid, 0) };
        rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        false
    }
}

/// Exit code of a finished process; a signal death is recorded as `-signal`.
pub fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Command;

    #[test]
    fn test_exit_code_plain() {
        let status = Command::new("/bin/sh").args(["-c", "exit 3"]).status().unwrap();
        assert_eq!(exit_code_of(status), 3);
    }

    #[test]
    fn test_exit_code_signal_is_negative() {
        let mut child = Command::new("/bin/sh").args(["-c", "exec sleep 30"]).spawn().unwrap();
        assert!(send_signal(child.id(), Signal::Term).unwrap());
        let status = child.wait().unwrap();
        assert_eq!(exit_code_of(status), -libc::SIGTERM);
    }

    #[test]
    fn test_pid_liveness() {
        assert!(is_pid_alive(std::process::id()));
        let mut child = Command::new("/bin/sh").args(["-c", "exit 0"]).spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        assert!(!is_pid_alive(pid));
    }

    #[test]
    fn test_refuses_init() {
        assert!(send_signal(1, Signal::Term).is_err());
    }
}
