//! Runs invocations as child processes.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::{CancelHandle, ExternalTool, Invocation, ToolError, ToolOutput};

/// How often a running child is checked for exit, timeout and cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long to wait for the pipes to drain after killing a child.
///
/// A grandchild that inherited the pipes can keep them open after the
/// kill; past this point whatever was captured so far is used.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// [`ExternalTool`] backed by `std::process`.
///
/// Stdout and stderr are drained on reader threads so a chatty tool cannot
/// block on a full pipe while we poll it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessTool;

impl ProcessTool {
    pub fn new() -> Self {
        Self
    }
}

impl ExternalTool for ProcessTool {
    fn run(&self, invocation: &Invocation, cancel: &CancelHandle) -> Result<ToolOutput, ToolError> {
        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled {
                label: invocation.label.clone(),
                output: ToolOutput::default(),
            });
        }

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(ref dir) = invocation.cwd {
            cmd.current_dir(dir);
        }

        tracing::debug!("Spawning {}", invocation.command_line());

        let mut child = cmd.spawn().map_err(|source| ToolError::SpawnFailed {
            program: invocation.program.clone(),
            source,
        })?;

        let stdout = child.stdout.take().map(Capture::spawn);
        let stderr = child.stderr.take().map(Capture::spawn);

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(source) => {
                    kill(&mut child);
                    return Err(ToolError::Io {
                        label: invocation.label.clone(),
                        source,
                    });
                }
            }

            if cancel.is_cancelled() {
                kill(&mut child);
                return Err(ToolError::Cancelled {
                    label: invocation.label.clone(),
                    output: partial_output(stdout, stderr),
                });
            }

            if let Some(timeout) = invocation.timeout {
                if started.elapsed() >= timeout {
                    kill(&mut child);
                    return Err(ToolError::TimedOut {
                        label: invocation.label.clone(),
                        timeout,
                        output: partial_output(stdout, stderr),
                    });
                }
            }

            thread::sleep(POLL_INTERVAL);
        };

        Ok(ToolOutput {
            exit_code: status.code(),
            stdout: Capture::finish(stdout, None),
            stderr: Capture::finish(stderr, None),
        })
    }
}

/// One output stream drained on its own thread.
///
/// Bytes are appended to a shared buffer as they arrive, so a killed
/// child's output up to the kill is still available.
struct Capture {
    buf: Arc<Mutex<Vec<u8>>>,
    handle: JoinHandle<()>,
}

impl Capture {
    fn spawn<R: Read + Send + 'static>(mut reader: R) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let handle = thread::spawn(move || {
            let mut chunk = [0u8; 8192];
            loop {
                match reader.read(&mut chunk) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => sink.lock().extend_from_slice(&chunk[..n]),
                }
            }
        });
        Self { buf, handle }
    }

    /// Collect the stream. With a grace period, stop waiting for EOF once it
    /// has passed; without one, wait for EOF.
    fn finish(capture: Option<Self>, grace: Option<Duration>) -> String {
        let Some(capture) = capture else {
            return String::new();
        };

        match grace {
            None => {
                let _ = capture.handle.join();
            }
            Some(grace) => {
                let deadline = Instant::now() + grace;
                while !capture.handle.is_finished() && Instant::now() < deadline {
                    thread::sleep(Duration::from_millis(10));
                }
                if capture.handle.is_finished() {
                    let _ = capture.handle.join();
                }
            }
        }

        let bytes = std::mem::take(&mut *capture.buf.lock());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Output a killed child printed before it died.
fn partial_output(stdout: Option<Capture>, stderr: Option<Capture>) -> ToolOutput {
    ToolOutput {
        exit_code: None,
        stdout: Capture::finish(stdout, Some(DRAIN_GRACE)),
        stderr: Capture::finish(stderr, Some(DRAIN_GRACE)),
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
