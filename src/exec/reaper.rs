// src/exec/reaper.rs

//! Port Reaper: make a TCP port free before a service is (re)started.
//!
//! A stale process still listening on a service port would answer health
//! probes with stale state, so every run starts by killing whatever owns the
//! configured ports.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::errors::{Result, StackError};
use crate::exec::signal::{StopSignal, signal_pid};

/// A process listening on a port. Queried fresh on every attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortBinding {
    pub port: u16,
    pub pid: u32,
}

/// Outcome of [`PortReaper::reap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReapResult {
    pub port: u16,
    /// True if a listener was found and killed.
    pub killed: bool,
    /// The (first) pid that was killed.
    pub pid: Option<u32>,
}

/// How listeners are discovered and killed.
///
/// Production code uses [`SystemPorts`]; tests can provide an implementation
/// that doesn't touch real processes. Lookups may block (they walk `/proc` or
/// run `lsof`) and are called from the blocking pool.
pub trait PortInspector: Send + Sync + 'static {
    /// Every process currently listening on `port`.
    fn listeners(&self, port: u16) -> Result<Vec<PortBinding>>;

    /// Forcefully terminate `pid`.
    fn kill(&self, pid: u32) -> Result<()>;
}

/// Default inspector backed by the operating system.
///
/// - Linux: `/proc/net/tcp{,6}` for listening sockets, `/proc/<pid>/fd` to map
///   socket inodes to owners.
/// - Other unix: `lsof`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPorts;

impl PortInspector for SystemPorts {
    fn listeners(&self, port: u16) -> Result<Vec<PortBinding>> {
        let pids = system_listeners(port).map_err(|e| StackError::PortLookup {
            port,
            reason: format!("{e:#}"),
        })?;
        Ok(pids.into_iter().map(|pid| PortBinding { port, pid }).collect())
    }

    fn kill(&self, pid: u32) -> Result<()> {
        signal_pid(pid, StopSignal::Kill)?;
        Ok(())
    }
}

/// Frees ports by killing their listeners.
#[derive(Debug, Clone)]
pub struct PortReaper<I: PortInspector = SystemPorts> {
    inspector: Arc<I>,
    grace: Duration,
    poll_interval: Duration,
}

impl PortReaper<SystemPorts> {
    pub fn new(grace: Duration) -> Self {
        Self::with_inspector(SystemPorts, grace)
    }
}

impl<I: PortInspector> PortReaper<I> {
    pub fn with_inspector(inspector: I, grace: Duration) -> Self {
        Self {
            inspector: Arc::new(inspector),
            grace,
            poll_interval: Duration::from_millis(50),
        }
    }

    pub fn inspector(&self) -> &I {
        self.inspector.as_ref()
    }

    /// Kill whatever listens on `port` and wait for the port to be released.
    ///
    /// - No listener: `killed = false`, never an error.
    /// - Listener(s): SIGKILL each, then re-query until the port is free or
    ///   the grace period runs out (`PortStillBound`).
    /// - The supervisor's own pid is never killed.
    pub async fn reap(&self, port: u16) -> Result<ReapResult> {
        let pids = self.foreign_listeners(port).await?;
        if pids.is_empty() {
            debug!(port, "no listener on port");
            return Ok(ReapResult {
                port,
                killed: false,
                pid: None,
            });
        }

        for pid in &pids {
            info!(port, pid, "killing stale listener");
            self.inspector.kill(*pid)?;
        }

        let started = Instant::now();
        loop {
            sleep(self.poll_interval).await;
            let remaining = self.foreign_listeners(port).await?;
            if remaining.is_empty() {
                info!(port, elapsed_ms = started.elapsed().as_millis(), "port released");
                return Ok(ReapResult {
                    port,
                    killed: true,
                    pid: pids.first().copied(),
                });
            }
            if started.elapsed() >= self.grace {
                return Err(StackError::PortStillBound {
                    port,
                    pids: remaining,
                    waited: started.elapsed(),
                });
            }
        }
    }

    async fn foreign_listeners(&self, port: u16) -> Result<Vec<u32>> {
        let inspector = Arc::clone(&self.inspector);
        let bindings = tokio::task::spawn_blocking(move || inspector.listeners(port))
            .await
            .map_err(|e| StackError::PortLookup {
                port,
                reason: format!("lookup task failed: {e}"),
            })??;

        let own = std::process::id();
        let mut pids = Vec::new();
        for binding in bindings {
            if binding.pid == own {
                warn!(port, "port is held by this process; not reaping it");
                continue;
            }
            if !pids.contains(&binding.pid) {
                pids.push(binding.pid);
            }
        }
        Ok(pids)
    }
}

#[cfg(target_os = "linux")]
fn system_listeners(port: u16) -> anyhow::Result<Vec<u32>> {
    procfs::listening_pids(port)
}

#[cfg(all(unix, not(target_os = "linux")))]
fn system_listeners(port: u16) -> anyhow::Result<Vec<u32>> {
    use anyhow::Context;

    let output = std::process::Command::new("lsof")
        .args(["-nP", "-t", &format!("-iTCP:{port}"), "-sTCP:LISTEN"])
        .output()
        .context("failed to execute lsof")?;

    // lsof exits 1 with no output when nothing matches.
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout
        .lines()
        .filter_map(|l| l.trim().parse::<u32>().ok())
        .collect())
}

#[cfg(not(unix))]
fn system_listeners(_port: u16) -> anyhow::Result<Vec<u32>> {
    anyhow::bail!("port inspection is not supported on this platform")
}

#[cfg(target_os = "linux")]
mod procfs {
    use std::collections::HashSet;
    use std::fs;
    use std::io::ErrorKind;

    use anyhow::{Context, Result};

    /// TCP state code for LISTEN in `/proc/net/tcp`.
    const TCP_LISTEN: &str = "0A";

    pub(super) fn listening_pids(port: u16) -> Result<Vec<u32>> {
        let mut inodes = HashSet::new();
        for table in ["/proc/net/tcp", "/proc/net/tcp6"] {
            match fs::read_to_string(table) {
                Ok(text) => inodes.extend(listening_inodes(&text, port)),
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e).with_context(|| format!("reading {table}")),
            }
        }
        if inodes.is_empty() {
            return Ok(Vec::new());
        }
        owners_of(&inodes)
    }

    /// Socket inodes in LISTEN state on `port`, from one `/proc/net/tcp*` table.
    pub(super) fn listening_inodes(table: &str, port: u16) -> HashSet<u64> {
        let mut found = HashSet::new();
        for line in table.lines().skip(1) {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 10 || fields[3] != TCP_LISTEN {
                continue;
            }
            let local_port = fields[1]
                .rsplit_once(':')
                .and_then(|(_, hex)| u16::from_str_radix(hex, 16).ok());
            if local_port != Some(port) {
                continue;
            }
            if let Ok(inode) = fields[9].parse::<u64>() {
                if inode != 0 {
                    found.insert(inode);
                }
            }
        }
        found
    }

    fn owners_of(inodes: &HashSet<u64>) -> Result<Vec<u32>> {
        let mut pids = Vec::new();
        for entry in fs::read_dir("/proc").context("reading /proc")? {
            let Ok(entry) = entry else { continue };
            let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            // Processes owned by other users are unreadable; skip them.
            let Ok(fds) = fs::read_dir(entry.path().join("fd")) else {
                continue;
            };
            for fd in fds.flatten() {
                let Ok(target) = fs::read_link(fd.path()) else { continue };
                let target = target.to_string_lossy();
                let inode = target
                    .strip_prefix("socket:[")
                    .and_then(|s| s.strip_suffix(']'))
                    .and_then(|s| s.parse::<u64>().ok());
                if inode.is_some_and(|i| inodes.contains(&i)) {
                    pids.push(pid);
                    break;
                }
            }
        }
        Ok(pids)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        const TABLE: &str = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 0100007F:1F40 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 424242 1 0000000000000000 100 0 0 10 0
   1: 0100007F:1F40 0100007F:C350 01 00000000:00000000 00:00000000 00000000  1000        0 515151 1 0000000000000000 20 4 30 10 -1
   2: 00000000:2135 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 737373 1 0000000000000000 100 0 0 10 0
";

        #[test]
        fn parses_listen_entries_for_port() {
            // 0x1F40 == 8000, 0x2135 == 8501
            assert_eq!(listening_inodes(TABLE, 8000), HashSet::from([424242]));
            assert_eq!(listening_inodes(TABLE, 8501), HashSet::from([737373]));
            assert!(listening_inodes(TABLE, 9000).is_empty());
        }
    }
}
