//! Process spawning
//!
//! Helpers are started detached with a cleared environment. A short-lived
//! thread reaps each child so it never lingers as a zombie.

use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use super::{HostError, ProcessSpawner};

/// Spawner backed by `std::process::Command`
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandSpawner;

impl ProcessSpawner for CommandSpawner {
    fn spawn(&self, path: &str, argv: &[String], envp: &[String]) -> Result<(), HostError> {
        let mut cmd = Command::new(path);
        if let Some((arg0, rest)) = argv.split_first() {
            cmd.arg0(arg0);
            cmd.args(rest);
        }

        cmd.env_clear();
        for entry in envp {
            match entry.split_once('=') {
                Some((key, value)) if !key.is_empty() => {
                    cmd.env(key, value);
                }
                _ => warn!("Ignoring malformed environment entry: {}", entry),
            }
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let mut child = cmd.spawn().map_err(|source| HostError::Spawn {
            path: path.to_string(),
            source,
        })?;

        let pid = child.id();
        debug!(path, pid, "spawned helper process");

        let reaper = std::thread::Builder::new()
            .name(format!("reap-{}", pid))
            .spawn(move || {
                let _ = child.wait();
            });
        if let Err(e) = reaper {
            warn!("Failed to start reaper for pid {}: {}", pid, e);
        }

        Ok(())
    }
}
