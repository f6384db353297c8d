//! Asynchronous line channel to an engine
//!
//! The core never spawns or kills engines on its own; it is handed an
//! [`EngineChannel`] and only sends and receives lines over it. Each direction
//! is FIFO. There is no ordering guarantee across the two directions.
//!
//! Two ways to get a channel:
//!
//! - [`EngineChannel::pair`] for an in-process engine (and for tests), which
//!   gets the matching [`EngineEndpoint`].
//! - [`EngineProcess::spawn`] for an external UCI binary; stdin/stdout are
//!   pumped by two background tasks and the child is killed when the handle
//!   drops.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Controller side of the engine channel
#[derive(Debug)]
pub struct EngineChannel {
    pub commands: mpsc::UnboundedSender<String>,
    pub events: mpsc::UnboundedReceiver<String>,
}

/// Engine side of an in-process channel
#[derive(Debug)]
pub struct EngineEndpoint {
    pub commands: mpsc::UnboundedReceiver<String>,
    pub events: mpsc::UnboundedSender<String>,
}

impl EngineEndpoint {
    /// Next command line, or `None` once the controller side is gone
    pub async fn recv(&mut self) -> Option<String> {
        self.commands.recv().await
    }

    /// Emit one engine line; `false` once the controller side is gone
    pub fn send(&self, line: impl Into<String>) -> bool {
        self.events.send(line.into()).is_ok()
    }
}

impl EngineChannel {
    /// Connected channel/endpoint pair
    pub fn pair() -> (EngineChannel, EngineEndpoint) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (
            EngineChannel {
                commands: command_tx,
                events: event_rx,
            },
            EngineEndpoint {
                commands: command_rx,
                events: event_tx,
            },
        )
    }
}

/// A running engine binary
///
/// Holds the child process; dropping it kills the engine.
#[derive(Debug)]
pub struct EngineProcess {
    path: PathBuf,
    child: Child,
}

impl EngineProcess {
    /// Launch a UCI engine binary and wire it to a fresh channel
    pub fn spawn(path: impl AsRef<Path>) -> std::io::Result<(EngineProcess, EngineChannel)> {
        let path = path.as_ref().to_path_buf();
        let mut child = Command::new(&path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("engine stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("engine stdout unavailable"))?;

        let (channel, endpoint) = EngineChannel::pair();
        let EngineEndpoint {
            commands: mut command_rx,
            events: event_tx,
        } = endpoint;

        tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(line) = command_rx.recv().await {
                let write = async {
                    stdin.write_all(line.as_bytes()).await?;
                    stdin.write_all(b"\n").await?;
                    stdin.flush().await
                };
                if let Err(e) = write.await {
                    warn!("[ENGINE] Failed to write to engine stdin: {e}");
                    break;
                }
            }
            debug!("[ENGINE] Command pump finished");
        });

        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if event_tx.send(line).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("[ENGINE] Engine stdout closed");
                        break;
                    }
                    Err(e) => {
                        warn!("[ENGINE] Failed to read engine stdout: {e}");
                        break;
                    }
                }
            }
        });

        info!("[ENGINE] Spawned engine process {:?}", path);
        Ok((EngineProcess { path, child }, channel))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// OS process id, while the child is still running
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Kill the child and wait for it to exit
    pub async fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill().await
    }
}
