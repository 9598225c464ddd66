//! Common test utilities for media-dl integration tests

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use media_dl::{Config, Supervisor};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

/// Fake yt-dlp: answers `--version`, then downloads a 3 MiB "video" whose title
/// contains characters that must not reach the file name
pub const FAKE_TOOL: &str = r#"
if [ "$1" = "--version" ]; then
  echo "2024.12.06"
  exit 0
fi
out=""
url=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift ;;
    --) url="$2"; shift ;;
  esac
  shift
done
case "$url" in
  *fail*)
    echo "ERROR: Unsupported URL: $url"
    exit 1
    ;;
esac
file=$(printf '%s' "$out" | sed -e 's/%(title)s/Café: live?/' -e 's/%(ext)s/webm/')
echo "[info] Downloading format 22"
echo "[download] Destination: $file"
echo "[download]  10.0% of 3.00MiB at 1.00MiB/s ETA 00:03"
head -c 3145728 /dev/zero > "$file"
echo "[download] 100% of 3.00MiB in 00:00:01"
exit 0
"#;

/// A running service over a scripted tool
pub struct TestService {
    pub app: Router,
    pub supervisor: Arc<Supervisor>,
    pub work_dir: TempDir,
    _scripts: TempDir,
}

impl TestService {
    pub fn work_path(&self) -> PathBuf {
        self.work_dir.path().to_path_buf()
    }

    /// Send a request through the router
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, body.to_vec())
    }

    pub async fn get_json(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let (status, _, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    pub async fn start(&self, url: &str) -> String {
        let request = Request::builder()
            .method("POST")
            .uri("/api/download")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::json!({ "url": url }).to_string()))
            .unwrap();
        let (status, _, body) = self.send(request).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        json["download_id"].as_str().unwrap().to_string()
    }

    pub async fn cleanup(&self, id: &str) -> serde_json::Value {
        let request = Request::builder()
            .method("DELETE")
            .uri(format!("/api/cleanup/{id}"))
            .body(Body::empty())
            .unwrap();
        let (_, _, body) = self.send(request).await;
        serde_json::from_slice(&body).unwrap()
    }

    /// Poll the progress endpoint until the job is completed or failed
    pub async fn wait_for_terminal(&self, id: &str) -> serde_json::Value {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let (status, json) = self.get_json(&format!("/api/progress/{id}")).await;
            assert_eq!(status, StatusCode::OK);
            if json["status"] == "completed" || json["status"] == "error" {
                return json;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "job {id} did not finish: {json}"
            );
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }
}

/// Start a service whose tool runs `script` through `/bin/sh`
pub async fn start_service(script: &str) -> TestService {
    let work_dir = tempfile::tempdir().unwrap();
    let scripts = tempfile::tempdir().unwrap();
    let script_path = scripts.path().join("yt-dlp.sh");
    std::fs::write(&script_path, script).unwrap();

    let mut config = Config::default();
    config.tool.binary_path = Some(PathBuf::from("/bin/sh"));
    config.tool.base_args = vec![script_path.to_string_lossy().into_owned()];
    config.supervisor.read_timeout = Duration::from_millis(100);
    config.supervisor.stall_timeout = Duration::from_secs(2);
    config.supervisor.settle_delay = Duration::from_millis(50);
    config.storage.work_dir = work_dir.path().to_path_buf();
    config.validate().unwrap();

    let supervisor = Arc::new(Supervisor::new(config).await.unwrap());
    let app = media_dl::api::create_router(supervisor.clone(), supervisor.get_config());

    TestService {
        app,
        supervisor,
        work_dir,
        _scripts: scripts,
    }
}
