// src/exec/signal.rs

//! Thin wrappers over OS signal delivery.
//!
//! Supervised children run in their own process group (pgid == child pid), so
//! stopping a service signals the whole group: a `sh -c` wrapper, reloaders
//! and worker processes all go down together.

use std::io;

use tracing::trace;

/// Which signal to deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// SIGTERM: ask politely.
    Terminate,
    /// SIGKILL: no cleanup.
    Kill,
}

#[cfg(unix)]
fn to_nix(sig: StopSignal) -> nix::sys::signal::Signal {
    use nix::sys::signal::Signal;
    match sig {
        StopSignal::Terminate => Signal::SIGTERM,
        StopSignal::Kill => Signal::SIGKILL,
    }
}

/// Signal every process in the group led by `pgid`.
///
/// A group that no longer exists is not an error.
#[cfg(unix)]
pub fn signal_group(pgid: u32, sig: StopSignal) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    trace!(pgid, ?sig, "signalling process group");
    match killpg(Pid::from_raw(pgid as i32), to_nix(sig)) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(io::Error::from(e)),
    }
}

/// Signal a single process.
///
/// A process that no longer exists is not an error.
#[cfg(unix)]
pub fn signal_pid(pid: u32, sig: StopSignal) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    trace!(pid, ?sig, "signalling process");
    match kill(Pid::from_raw(pid as i32), to_nix(sig)) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(io::Error::from(e)),
    }
}

#[cfg(not(unix))]
pub fn signal_group(_pgid: u32, _sig: StopSignal) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "process groups are only supported on unix",
    ))
}

#[cfg(not(unix))]
pub fn signal_pid(pid: u32, _sig: StopSignal) -> io::Result<()> {
    let status = std::process::Command::new("taskkill")
        .args(["/F", "/PID", &pid.to_string()])
        .status()?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("taskkill exited with {status}")))
    }
}
