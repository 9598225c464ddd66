//! Running tool process with a merged output stream

use crate::error::{Error, Result};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

/// Lines buffered between the pipe readers and the consumer
const LINE_CHANNEL_CAPACITY: usize = 256;

/// Result of waiting for the next output line
#[derive(Debug, PartialEq, Eq)]
pub enum ReadEvent {
    /// One line, decoded lossily and trimmed (may be empty)
    Line(String),
    /// No line arrived within the read timeout
    Idle,
    /// Both stdout and stderr reached end of stream
    Closed,
}

/// A spawned tool process whose stdout and stderr are read as one line stream
pub struct ToolProcess {
    child: Child,
    lines: mpsc::Receiver<String>,
}

impl ToolProcess {
    /// Spawn `command` with both output pipes forwarded into one channel
    ///
    /// Each pipe gets its own reader task; the channel closes once both pipes hit
    /// end of stream. Stdin is closed so the tool can never block on a prompt.
    pub fn spawn(mut command: Command) -> Result<Self> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|e| Error::ExternalTool(format!("failed to start download process: {e}")))?;

        let (tx, lines) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, tx));
        }

        Ok(Self { child, lines })
    }

    /// OS process id, if the process has not been reaped yet
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait up to `timeout` for the next line
    pub async fn next_line(&mut self, timeout: Duration) -> ReadEvent {
        match tokio::time::timeout(timeout, self.lines.recv()).await {
            Ok(Some(line)) => ReadEvent::Line(line),
            Ok(None) => ReadEvent::Closed,
            Err(_) => ReadEvent::Idle,
        }
    }

    /// Forcefully terminate the process and reap it
    pub async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::debug!(error = %e, "kill failed, process probably already exited");
        }
    }

    /// Wait up to `timeout` for the process to exit
    ///
    /// Returns `None` if the process is still running when the timeout expires.
    pub async fn wait(&mut self, timeout: Duration) -> Result<Option<ExitStatus>> {
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(status) => Ok(Some(status?)),
            Err(_) => Ok(None),
        }
    }
}

async fn forward_lines<R>(reader: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer).await {
            Ok(0) => break,
            Ok(_) => {
                // yt-dlp may emit carriage-return progress updates on one line
                for segment in buffer.split(|&b| b == b'\r') {
                    let line = String::from_utf8_lossy(segment).trim().to_string();
                    if tx.send(line).await.is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "output pipe read failed");
                break;
            }
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut command = Command::new("/bin/sh");
        command.arg("-c").arg(script).kill_on_drop(true);
        command
    }

    async fn collect(process: &mut ToolProcess) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            match process.next_line(Duration::from_secs(5)).await {
                ReadEvent::Line(line) => lines.push(line),
                ReadEvent::Closed => return lines,
                ReadEvent::Idle => panic!("unexpected idle read"),
            }
        }
    }

    #[tokio::test]
    async fn merges_stdout_and_stderr() {
        let mut process = ToolProcess::spawn(sh("echo out; echo err 1>&2")).unwrap();
        let mut lines = collect(&mut process).await;
        lines.sort();
        assert_eq!(lines, vec!["err".to_string(), "out".to_string()]);

        let status = process.wait(Duration::from_secs(5)).await.unwrap().unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn invalid_utf8_is_decoded_lossily() {
        let mut process = ToolProcess::spawn(sh("printf 'caf\\351 ok\\n'")).unwrap();
        let lines = collect(&mut process).await;
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("caf"));
        assert!(lines[0].ends_with(" ok"));
    }

    #[tokio::test]
    async fn carriage_returns_split_lines() {
        let mut process = ToolProcess::spawn(sh("printf ' 10%%\\r 20%%\\n'")).unwrap();
        let lines = collect(&mut process).await;
        assert_eq!(lines, vec!["10%".to_string(), "20%".to_string()]);
    }

    #[tokio::test]
    async fn silent_process_reads_idle_then_kill_closes_stream() {
        let mut process = ToolProcess::spawn(sh("exec sleep 30")).unwrap();
        assert_eq!(
            process.next_line(Duration::from_millis(100)).await,
            ReadEvent::Idle
        );

        process.kill().await;
        let status = process.wait(Duration::from_secs(5)).await.unwrap();
        assert!(status.is_some_and(|s| !s.success()));
        assert_eq!(
            process.next_line(Duration::from_secs(5)).await,
            ReadEvent::Closed
        );
    }

    #[tokio::test]
    async fn spawn_failure_is_an_external_tool_error() {
        let result = ToolProcess::spawn(Command::new("/nonexistent/binary"));
        assert!(matches!(result, Err(Error::ExternalTool(_))));
    }

    #[tokio::test]
    async fn exit_code_is_reported() {
        let mut process = ToolProcess::spawn(sh("exit 3")).unwrap();
        assert!(collect(&mut process).await.is_empty());
        let status = process.wait(Duration::from_secs(5)).await.unwrap().unwrap();
        assert_eq!(status.code(), Some(3));
    }
}
