use crate::error::{DocPressError, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(25);
// Tail of stderr kept in error messages.
const STDERR_TAIL_BYTES: u64 = 4096;

/// A spawned render engine that is killed and reaped on every exit path.
pub(crate) struct ScopedChild {
    engine: &'static str,
    child: Child,
    stderr: File,
}

#[derive(Debug)]
pub(crate) struct FinishedProcess {
    pub status: ExitStatus,
    pub stderr: String,
}

impl ScopedChild {
    /// Spawn with stdin/stdout detached and stderr captured to an anonymous temp file, so a
    /// chatty engine can never block on a full pipe.
    ///
    /// On unix the engine leads its own process group so helpers it forks die with it.
    pub fn spawn(engine: &'static str, command: &mut Command) -> Result<Self> {
        let stderr = tempfile::tempfile()?;
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        let child = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr.try_clone()?))
            .spawn()
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    DocPressError::RendererUnavailable {
                        engine,
                        message: err.to_string(),
                    }
                }
                _ => DocPressError::Io(err),
            })?;
        tracing::debug!(engine, pid = child.id(), "render engine started");
        Ok(Self {
            engine,
            child,
            stderr,
        })
    }

    /// Wait for the process to exit, killing it once `timeout` has elapsed.
    pub fn wait_with_timeout(mut self, timeout: Duration) -> Result<FinishedProcess> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = self.child.try_wait()? {
                let stderr = self.stderr_tail();
                return Ok(FinishedProcess { status, stderr });
            }
            if Instant::now() >= deadline {
                tracing::warn!(
                    engine = self.engine,
                    timeout_ms = timeout.as_millis() as u64,
                    "render engine timed out; killing"
                );
                return Err(DocPressError::RendererTimeout {
                    engine: self.engine,
                    timeout,
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn stderr_tail(&mut self) -> String {
        let mut buf = Vec::new();
        let len = self.stderr.metadata().map(|m| m.len()).unwrap_or(0);
        let start = len.saturating_sub(STDERR_TAIL_BYTES);
        if self.stderr.seek(SeekFrom::Start(start)).is_ok() {
            let _ = self.stderr.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).trim().to_string()
    }
}

impl ScopedChild {
    #[cfg(unix)]
    fn kill_group(&self) {
        let Ok(pgid) = libc::pid_t::try_from(self.child.id()) else {
            return;
        };
        // SAFETY: kill(2) with a negative pid only signals the group led by our child.
        if unsafe { libc::kill(-pgid, libc::SIGKILL) } != 0 {
            tracing::debug!(
                engine = self.engine,
                error = %std::io::Error::last_os_error(),
                "could not signal engine process group"
            );
        }
    }

    #[cfg(not(unix))]
    fn kill_group(&self) {}
}

impl Drop for ScopedChild {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            self.kill_group();
            let _ = self.child.kill();
            let _ = self.child.wait();
            tracing::debug!(engine = self.engine, "render engine terminated");
        }
    }
}

/// Run `command` to completion within `timeout`, turning a non-zero exit into
/// [`DocPressError::RendererFailed`].
pub(crate) fn run_engine(
    engine: &'static str,
    command: &mut Command,
    timeout: Duration,
) -> Result<FinishedProcess> {
    let finished = ScopedChild::spawn(engine, command)?.wait_with_timeout(timeout)?;
    if !finished.status.success() {
        return Err(DocPressError::RendererFailed {
            engine,
            status: finished.status.to_string(),
            stderr: finished.stderr,
        });
    }
    Ok(finished)
}
