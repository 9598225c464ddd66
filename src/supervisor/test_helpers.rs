//! Shared helpers for supervisor tests: a scripted stand-in for yt-dlp.

use crate::config::Config;
use crate::error::Result;
use crate::supervisor::Supervisor;
use crate::tool::{Invocation, MediaTool};
use crate::types::{JobId, JobRecord};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;

/// Argument handling shared by every fake tool script
///
/// Answers `--version` and leaves the output template in `$out`.
const PRELUDE: &str = r#"
if [ "$1" = "--version" ]; then
  echo "2024.12.06"
  exit 0
fi
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then
    out="$2"
    shift
  fi
  shift
done
file=$(printf '%s' "$out" | sed -e 's/%(title)s/Test Clip/' -e 's/%(ext)s/mp4/')
dir=$(dirname "$file")
"#;

/// Writes a 2 MiB media file and reports it like yt-dlp does
pub(crate) const SUCCESS_BODY: &str = r#"
echo "[youtube] abc123: Downloading webpage"
echo "[download] Destination: $file"
echo "[download]  45.2% of 10.00MiB at 1.00MiB/s ETA 00:05"
head -c 2097152 /dev/zero > "$file"
echo "[download] 100% of 10.00MiB in 00:00:01"
exit 0
"#;

/// Exits without printing anything after dropping an unrelated file
pub(crate) const SILENT_FAILURE_BODY: &str = r#"
echo "leftover" > "$dir/junk.txt"
exit 3
"#;

/// Reports an extractor error and fails
pub(crate) const ERROR_BODY: &str = r#"
echo "[youtube] abc123: Downloading webpage"
echo "ERROR: [youtube] abc123: Video unavailable"
exit 1
"#;

/// Claims success without producing a file
pub(crate) const NO_FILE_BODY: &str = r#"
echo "[youtube] abc123: Downloading webpage"
echo "[info] abc123: nothing to do"
exit 0
"#;

/// Produces a file far below the minimum size
pub(crate) const SMALL_FILE_BODY: &str = r#"
echo "[download] Destination: $file"
head -c 2048 /dev/zero > "$file"
echo "[download] 100% of 2.00KiB in 00:00:01"
exit 0
"#;

/// A fake yt-dlp plus an isolated working directory
pub(crate) struct TestEnv {
    /// Kept alive for the duration of the test
    pub(crate) work: TempDir,
    pub(crate) scripts: TempDir,
    pub(crate) config: Config,
}

impl TestEnv {
    pub(crate) fn work_dir(&self) -> &Path {
        self.work.path()
    }

    /// File the stalling script writes its pid to
    pub(crate) fn pid_file(&self) -> PathBuf {
        self.scripts.path().join("stall.pid")
    }
}

/// Create a test environment whose tool runs `body` after the shared prelude
pub(crate) fn test_env(body: &str) -> TestEnv {
    let work = tempfile::tempdir().unwrap();
    let scripts = tempfile::tempdir().unwrap();

    let script = scripts.path().join("fake-yt-dlp.sh");
    std::fs::write(&script, format!("{PRELUDE}{body}")).unwrap();

    let mut config = Config::default();
    config.tool.binary_path = Some(PathBuf::from("/bin/sh"));
    config.tool.base_args = vec![script.to_string_lossy().into_owned()];
    config.supervisor.probe_timeout = Duration::from_secs(2);
    config.supervisor.read_timeout = Duration::from_millis(100);
    config.supervisor.stall_timeout = Duration::from_secs(1);
    config.supervisor.settle_delay = Duration::from_millis(50);
    config.supervisor.shutdown_timeout = Duration::from_secs(5);
    config.storage.work_dir = work.path().to_path_buf();

    TestEnv {
        work,
        scripts,
        config,
    }
}

/// Script body that records its pid and then hangs without output
pub(crate) fn stall_body(pid_file: &Path) -> String {
    format!(
        "echo $$ > \"{}\"\nexec sleep 30\n",
        pid_file.display()
    )
}

/// Create a supervisor for the environment
pub(crate) async fn create_test_supervisor(env: &TestEnv) -> Supervisor {
    Supervisor::new(env.config.clone()).await.unwrap()
}

/// Poll until the job reaches `completed` or `error`
pub(crate) async fn wait_for_terminal(supervisor: &Supervisor, id: JobId) -> JobRecord {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let record = supervisor.progress(id).await.unwrap();
        if record.status.is_terminal() {
            return record;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {id} did not finish, last record: {record:?}"
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

/// A tool whose probe panics, to exercise task failure handling
pub(crate) struct PanickingTool;

#[async_trait::async_trait]
impl MediaTool for PanickingTool {
    async fn probe(&self, _timeout: Duration) -> Result<String> {
        panic!("probe exploded");
    }

    fn download_command(&self, _invocation: &Invocation) -> Command {
        Command::new("/bin/false")
    }

    fn name(&self) -> &str {
        "panicking-tool"
    }

    fn install_hint(&self) -> &str {
        "none"
    }
}

/// Convenience for building a supervisor around [`PanickingTool`]
pub(crate) async fn create_panicking_supervisor(env: &TestEnv) -> Supervisor {
    Supervisor::with_tool(env.config.clone(), Arc::new(PanickingTool))
        .await
        .unwrap()
}
