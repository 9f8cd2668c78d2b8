//! Platform-agnostic process control functions.

use crate::error::{AppError, Result};

/// Check if a process is alive by PID.
#[cfg(unix)]
pub fn is_process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// Check if a process is alive by PID.
#[cfg(not(unix))]
pub fn is_process_alive(pid: u32) -> bool {
    std::process::Command::new("tasklist")
        .args(["/FI", &format!("PID eq {pid}"), "/NH"])
        .output()
        .map(|out| String::from_utf8_lossy(&out.stdout).contains(&pid.to_string()))
        .unwrap_or(false)
}

/// Send SIGTERM to the process group led by `pid`, or to `pid` alone when it
/// has no group of its own.
#[cfg(unix)]
pub fn graceful_signal(pid: u32) -> Result<()> {
    use nix::sys::signal::{kill, killpg, Signal};
    use nix::unistd::{getpgid, Pid};

    let target = Pid::from_raw(pid as i32);
    match getpgid(Some(target)) {
        Ok(pgid) if pgid == target => killpg(pgid, Signal::SIGTERM).map_err(|e| {
            AppError::process(format!(
                "Failed to send SIGTERM to process group {}: {}",
                pgid.as_raw(),
                e
            ))
        }),
        Ok(_) => kill(target, Signal::SIGTERM)
            .map_err(|e| AppError::process(format!("Failed to send SIGTERM to PID {}: {}", pid, e))),
        // Leader already reaped; the group it led may still have members.
        Err(_) => signal_orphaned_group(target, Signal::SIGTERM),
    }
}

#[cfg(unix)]
fn signal_orphaned_group(pgid: nix::unistd::Pid, signal: nix::sys::signal::Signal) -> Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::killpg;

    match killpg(pgid, signal) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(AppError::process(format!(
            "Failed to send {} to process group {}: {}",
            signal,
            pgid.as_raw(),
            e
        ))),
    }
}

/// Whether any process is left in the group led by `pgid`, including the
/// leader itself.
#[cfg(unix)]
pub fn group_alive(pgid: u32) -> bool {
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    killpg(Pid::from_raw(pgid as i32), None).is_ok()
}

#[cfg(not(unix))]
pub fn group_alive(pgid: u32) -> bool {
    is_process_alive(pgid)
}

/// There is no console-free graceful signal on this platform.
#[cfg(not(unix))]
pub fn graceful_signal(pid: u32) -> Result<()> {
    force_kill(pid)
}

#[cfg(not(unix))]
pub fn force_kill(pid: u32) -> Result<()> {
    let output = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .output()
        .map_err(|e| AppError::process(format!("Failed to run taskkill: {e}")))?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr.trim();
        Err(AppError::process(format!(
            "taskkill failed for pid {}: {}",
            pid,
            if detail.is_empty() {
                "(no output)"
            } else {
                detail
            }
        )))
    }
}

#[cfg(unix)]
pub fn force_kill(pid: u32) -> Result<()> {
    use nix::sys::signal::{kill, killpg, Signal};
    use nix::unistd::{getpgid, Pid};

    let target = Pid::from_raw(pid as i32);
    match getpgid(Some(target)) {
        Ok(pgid) if pgid == target => killpg(pgid, Signal::SIGKILL).map_err(|e| {
            AppError::process(format!(
                "Failed to kill process group {} (from pid {}): {}",
                pgid.as_raw(),
                pid,
                e
            ))
        }),
        Ok(_) => kill(target, Signal::SIGKILL)
            .map_err(|e| AppError::process(format!("Failed to kill process {}: {}", pid, e))),
        Err(_) => signal_orphaned_group(target, Signal::SIGKILL),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn current_process_is_alive() {
        assert!(is_process_alive(std::process::id()));
    }

    #[test]
    fn signalling_a_vanished_group_is_ok() {
        // pid_max on Linux never reaches this value
        let pid = i32::MAX as u32 - 1;
        assert!(!group_alive(pid));
        assert!(graceful_signal(pid).is_ok());
        assert!(force_kill(pid).is_ok());
    }

    #[test]
    fn own_group_is_alive() {
        let pgid = nix::unistd::getpgrp().as_raw() as u32;
        assert!(group_alive(pgid));
    }
}
