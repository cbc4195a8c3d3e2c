//! Process supervision for spawned language servers.
//!
//! Factored out of the inline spawn logic that used to live directly in
//! `LspClientBuilder::build`, so that [`super::manager::LSPManager`] can
//! spawn several servers (one per language) through a single, shared
//! lifecycle path.

use std::process::Stdio;
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;

use crate::error::LspError;

/// Tracks PIDs of every language-server child process spawned by this
/// binary, so shutdown can account for stragglers. Only direct child PIDs
/// are tracked; Rust has no portable process-group enumeration without an
/// extra OS-specific dependency, so a killed child's own descendants (if
/// any) are not swept.
fn tracked_pids() -> &'static std::sync::Mutex<std::collections::HashSet<u32>> {
    static PIDS: OnceLock<std::sync::Mutex<std::collections::HashSet<u32>>> = OnceLock::new();
    PIDS.get_or_init(|| std::sync::Mutex::new(std::collections::HashSet::new()))
}

/// Supervises the lifecycle of one language-server child process.
#[derive(Debug)]
pub struct ProcessSupervisor {
    child: Arc<Mutex<async_process::Child>>,
    pid: u32,
}

impl ProcessSupervisor {
    /// Spawns `command` with `args` in `workspace_root`, wiring stdin/stdout
    /// as pipes (for LSP framing) and inheriting stderr (so the server's
    /// own diagnostics land in this process's stderr alongside `tracing`
    /// output).
    ///
    /// ## Errors
    /// Returns [`LspError::ServerStartFailed`] if the process cannot be
    /// spawned or its stdio handles cannot be captured.
    pub fn spawn(
        command: &str,
        args: &[String],
        workspace_root: &std::path::Path,
    ) -> Result<(Self, async_process::ChildStdout, async_process::ChildStdin), LspError> {
        let mut cmd = async_process::Command::new(command);
        cmd.args(args)
            .current_dir(workspace_root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| LspError::ServerStartFailed(format!("failed to spawn '{command}': {e}")))?;

        let pid = child.id();
        tracked_pids().lock().unwrap().insert(pid);

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LspError::ServerStartFailed("failed to capture stdout".to_string()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| LspError::ServerStartFailed("failed to capture stdin".to_string()))?;

        Ok((
            Self {
                child: Arc::new(Mutex::new(child)),
                pid,
            },
            stdout,
            stdin,
        ))
    }

    /// The OS process ID of the supervised child.
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Keeps a shared handle to the child alive (used by `LspClient` to
    /// prevent `kill_on_drop` from firing while the client is in use).
    #[must_use]
    pub fn child_handle(&self) -> Arc<Mutex<async_process::Child>> {
        Arc::clone(&self.child)
    }

    /// Waits up to `grace` for the process to exit on its own (after a
    /// `shutdown`/`exit` LSP handshake), then force-kills it if it hasn't.
    pub async fn terminate(&self, grace: std::time::Duration) {
        let mut child = self.child.lock().await;
        let exited = tokio::time::timeout(grace, async {
            loop {
                if let Ok(Some(_status)) = child.try_status() {
                    return;
                }
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
        })
        .await
        .is_ok();

        if !exited {
            let _ = child.kill();
        }
        tracked_pids().lock().unwrap().remove(&self.pid);
    }
}
