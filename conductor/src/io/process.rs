//! Child processes with a deadline, capped capture, and a detached mode.

use std::borrow::Cow;
use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// One output stream, capped at the capture limit.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StreamCapture {
    pub bytes: Vec<u8>,
    /// Bytes drained from the pipe but not kept.
    pub dropped: usize,
}

impl StreamCapture {
    fn drain<R: Read>(mut reader: R, limit: usize) -> Result<Self> {
        let mut capture = Self::default();
        let mut chunk = [0u8; 8192];
        loop {
            let n = reader.read(&mut chunk).context("read child output")?;
            if n == 0 {
                return Ok(capture);
            }
            let room = limit.saturating_sub(capture.bytes.len()).min(n);
            capture.bytes.extend_from_slice(&chunk[..room]);
            capture.dropped += n - room;
        }
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    fn append_to(&self, label: &str, out: &mut String) {
        out.push_str(label);
        out.push_str(":\n");
        out.push_str(&self.text());
        if self.dropped > 0 {
            out.push_str(&format!("\n[{} truncated {} bytes]", label.to_lowercase(), self.dropped));
        }
    }
}

/// What a bounded run produced.
#[derive(Debug)]
pub struct ProcessOutcome {
    pub status: ExitStatus,
    pub stdout: StreamCapture,
    pub stderr: StreamCapture,
    /// The deadline passed and the child was killed.
    pub timed_out: bool,
}

impl ProcessOutcome {
    /// Exit code, or `-1` when the child was terminated by a signal.
    pub fn exit_code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }

    /// The `STDOUT / STDERR / Exit Code` block shell results are reported in.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.stdout.append_to("STDOUT", &mut out);
        out.push('\n');
        self.stderr.append_to("STDERR", &mut out);
        out.push_str(&format!("\nExit Code: {}", self.exit_code()));
        out
    }
}

/// Deadline and capture cap applied to a child process.
#[derive(Debug, Clone, Copy)]
pub struct Bounded {
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

impl Bounded {
    pub fn new(timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            timeout,
            output_limit_bytes,
        }
    }

    /// Run `cmd` to completion or the deadline, feeding `stdin` if given.
    ///
    /// Both pipes are drained on scoped threads while the child runs, so a
    /// chatty child never blocks on a full pipe. On unix the child leads its
    /// own process group and the deadline kills the whole group, so
    /// grandchildren holding the pipes cannot outlive it.
    #[instrument(skip_all, fields(timeout_secs = self.timeout.as_secs()))]
    pub fn run(&self, mut cmd: Command, stdin: Option<&[u8]>) -> Result<ProcessOutcome> {
        cmd.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut cmd, 0);

        let mut child = cmd.spawn().context("spawn command")?;
        debug!(pid = child.id(), "child started");
        let stdout = child.stdout.take().ok_or_else(|| anyhow!("stdout not piped"))?;
        let stderr = child.stderr.take().ok_or_else(|| anyhow!("stderr not piped"))?;
        let limit = self.output_limit_bytes;

        let (status, timed_out, stdout, stderr) = thread::scope(|scope| -> Result<_> {
            let out = scope.spawn(move || StreamCapture::drain(stdout, limit));
            let err = scope.spawn(move || StreamCapture::drain(stderr, limit));
            if let Some(input) = stdin {
                feed(&mut child, input)?;
            }
            let (status, timed_out) = self.wait(&mut child)?;
            let stdout = out.join().map_err(|_| anyhow!("stdout reader panicked"))??;
            let stderr = err.join().map_err(|_| anyhow!("stderr reader panicked"))??;
            Ok((status, timed_out, stdout, stderr))
        })?;

        if stdout.dropped > 0 || stderr.dropped > 0 {
            warn!(
                stdout_dropped = stdout.dropped,
                stderr_dropped = stderr.dropped,
                "child output exceeded capture limit"
            );
        }
        debug!(exit_code = ?status.code(), timed_out, "child finished");
        Ok(ProcessOutcome {
            status,
            stdout,
            stderr,
            timed_out,
        })
    }

    fn wait(&self, child: &mut Child) -> Result<(ExitStatus, bool)> {
        if let Some(status) = child.wait_timeout(self.timeout).context("wait for child")? {
            return Ok((status, false));
        }
        warn!(timeout_secs = self.timeout.as_secs(), "deadline passed, killing child");
        kill_tree(child)?;
        Ok((child.wait().context("reap killed child")?, true))
    }
}

/// Kill the child's process group (the child is its leader).
#[cfg(unix)]
#[allow(unsafe_code)]
fn kill_tree(child: &mut Child) -> Result<()> {
    let pgid = libc::pid_t::try_from(child.id()).context("child pid out of range")?;
    // SAFETY: kill(2) takes plain integers and touches no memory of ours.
    let res = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if res == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    debug!(%err, "process group kill failed, killing child only");
    child.kill().context("kill child")
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) -> Result<()> {
    child.kill().context("kill child")
}

/// Write `input` and close stdin. A child that exits without reading is not an error.
fn feed(child: &mut Child, input: &[u8]) -> Result<()> {
    let mut pipe = child.stdin.take().ok_or_else(|| anyhow!("stdin not piped"))?;
    if let Err(err) = pipe.write_all(input) {
        warn!(%err, "child closed stdin early");
    }
    Ok(())
}

/// Start `cmd` without waiting for it; output is discarded. Returns the pid.
#[instrument(skip_all)]
pub fn spawn_detached(mut cmd: Command) -> Result<u32> {
    let child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("spawn detached command")?;
    debug!(pid = child.id(), "detached child started");
    Ok(child.id())
}
