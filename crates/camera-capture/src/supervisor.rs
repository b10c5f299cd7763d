//! Capture Process Supervisor
//!
//! Starts one external capture process per session, forwards its output to
//! the log and reports its termination exactly once on the exit channel.
//! There is no retry here; what happens after an exit is the caller's call.

use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::args::{build_command, LaunchConfig};
use crate::error::{LaunchError, RuntimeError};
use crate::host::HostInfo;
use crate::types::{CameraMode, SessionSettings};

/// Grace period between SIGTERM and SIGKILL on terminate
const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// Monotonic id of one capture session
pub type SessionId = u64;

/// Termination report for one capture process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub session: SessionId,
    pub mode: CameraMode,
    /// Exit code, if the process exited normally
    pub code: Option<i32>,
    /// Terminating signal, if any
    pub signal: Option<i32>,
}

impl ProcessExit {
    pub fn from_status(session: SessionId, mode: CameraMode, status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&status);
        #[cfg(not(unix))]
        let signal = None;

        Self {
            session,
            mode,
            code: status.code(),
            signal,
        }
    }

    /// Exit with code 0
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// The exit as a crash report
    pub fn crash(&self) -> RuntimeError {
        RuntimeError::ProcessCrashed {
            code: self.code,
            signal: self.signal,
        }
    }
}

/// Handle to one running capture process
///
/// Dropping the handle without [`CaptureSupervisor::terminate`] also stops
/// the process. `alive` turns false once the process has been reaped.
#[derive(Debug)]
pub struct ProcessHandle {
    session: SessionId,
    mode: CameraMode,
    pid: Option<u32>,
    stop: Option<oneshot::Sender<()>>,
    alive: watch::Receiver<bool>,
}

impl ProcessHandle {
    pub fn new(
        session: SessionId,
        mode: CameraMode,
        pid: Option<u32>,
        stop: oneshot::Sender<()>,
        alive: watch::Receiver<bool>,
    ) -> Self {
        Self {
            session,
            mode,
            pid,
            stop: Some(stop),
            alive,
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn mode(&self) -> CameraMode {
        self.mode
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// False once the process has been reaped; its pid may be reused after that
    pub fn is_alive(&self) -> bool {
        *self.alive.borrow()
    }

    /// Ask the watcher task to stop the process
    pub fn request_stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }

    /// Wait until the process has been reaped
    pub async fn reaped(&mut self) {
        // A dropped sender means the watcher is gone and the child with it
        let _ = self.alive.wait_for(|alive| !*alive).await;
    }
}

/// Launch / terminate / signal contract for capture processes
#[async_trait]
pub trait CaptureSupervisor: Send + Sync {
    /// Start the capture process for `settings`
    ///
    /// Termination, for any reason, is reported once on `exits`.
    async fn launch(
        &self,
        session: SessionId,
        settings: &SessionSettings,
        exits: mpsc::Sender<ProcessExit>,
    ) -> Result<ProcessHandle, LaunchError>;

    /// Stop the process behind `handle`; returns once it has been reaped
    async fn terminate(&self, mut handle: ProcessHandle) {
        info!("Terminating {} capture (session {})", handle.mode(), handle.session());
        handle.request_stop();
        handle.reaped().await;
        debug!("{} capture session {} reaped", handle.mode(), handle.session());
    }

    /// Deliver the out-of-band control signal (capture photo / toggle recording)
    fn signal(&self, handle: &ProcessHandle) -> Result<(), LaunchError>;
}

/// Supervisor running real child processes
pub struct ProcessSupervisor {
    config: LaunchConfig,
    host: Arc<dyn HostInfo>,
}

impl ProcessSupervisor {
    pub fn new(config: LaunchConfig, host: Arc<dyn HostInfo>) -> Self {
        Self { config, host }
    }
}

#[async_trait]
impl CaptureSupervisor for ProcessSupervisor {
    async fn launch(
        &self,
        session: SessionId,
        settings: &SessionSettings,
        exits: mpsc::Sender<ProcessExit>,
    ) -> Result<ProcessHandle, LaunchError> {
        let mode = settings.mode();
        let (program, args) = build_command(&self.config, settings, self.host.platform());
        info!("Launching {} capture: {} {}", mode, program, args.join(" "));

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LaunchError::SpawnFailure(format!("{}: {}", program, e)))?;

        let pid = child.id();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(stdout, mode, false));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(stderr, mode, true));
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let (alive_tx, alive_rx) = watch::channel(true);
        tokio::spawn(watch_process(child, session, mode, stop_rx, alive_tx, exits));

        info!("Started {} capture (session {}, pid {:?})", mode, session, pid);
        Ok(ProcessHandle::new(session, mode, pid, stop_tx, alive_rx))
    }

    fn signal(&self, handle: &ProcessHandle) -> Result<(), LaunchError> {
        let pid = handle
            .pid()
            .ok_or_else(|| LaunchError::SignalFailure("process has no pid".to_string()))?;
        if !handle.is_alive() {
            return Err(LaunchError::SignalFailure(format!("pid {} already exited", pid)));
        }
        send_signal(pid, libc::SIGUSR1)
            .map_err(|e| LaunchError::SignalFailure(format!("pid {}: {}", pid, e)))?;
        debug!("Sent SIGUSR1 to {} capture pid {}", handle.mode(), pid);
        Ok(())
    }
}

fn send_signal(pid: u32, signal: libc::c_int) -> std::io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "pid out of range"))?;
    if unsafe { libc::kill(pid, signal) } != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Log process output line by line until EOF
///
/// Output is not required to be UTF-8; the pipe must stay open for the
/// whole life of the process or its next write raises SIGPIPE.
async fn forward_output<R: AsyncRead + Unpin>(stream: R, mode: CameraMode, is_stderr: bool) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(|c: char| c == '\r' || c == '\n');
                if is_stderr {
                    error!("{} capture stderr: {}", mode, line);
                } else {
                    info!("{} capture: {}", mode, line);
                }
            }
            Err(e) => {
                debug!("{} capture output closed: {}", mode, e);
                break;
            }
        }
    }
}

async fn watch_process(
    mut child: Child,
    session: SessionId,
    mode: CameraMode,
    stop: oneshot::Receiver<()>,
    alive: watch::Sender<bool>,
    exits: mpsc::Sender<ProcessExit>,
) {
    let exited = tokio::select! {
        status = child.wait() => Some(status),
        _ = stop => None,
    };
    let status = match exited {
        Some(status) => status,
        None => stop_child(&mut child, mode).await,
    };

    alive.send_replace(false);

    let exit = match status {
        Ok(status) => ProcessExit::from_status(session, mode, status),
        Err(e) => {
            error!("Failed to wait on {} capture: {}", mode, e);
            ProcessExit {
                session,
                mode,
                code: None,
                signal: None,
            }
        }
    };

    info!(
        "{} capture exited (session {}, code {:?}, signal {:?})",
        mode, session, exit.code, exit.signal
    );
    if exits.send(exit).await.is_err() {
        debug!("Exit receiver dropped for session {}", session);
    }
}

/// SIGTERM, then SIGKILL after the grace period
async fn stop_child(child: &mut Child, mode: CameraMode) -> std::io::Result<ExitStatus> {
    if let Some(pid) = child.id() {
        if let Err(e) = send_signal(pid, libc::SIGTERM) {
            warn!("SIGTERM to {} capture failed: {}", mode, e);
        }
        if let Ok(status) = tokio::time::timeout(TERMINATE_GRACE, child.wait()).await {
            return status;
        }
        warn!("{} capture ignored SIGTERM, killing", mode);
    }
    child.start_kill()?;
    child.wait().await
}
