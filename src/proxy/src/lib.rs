/* src/proxy/src/lib.rs */

mod cache;
mod handler;
mod state;
mod ws;

use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use preview_core::RunnerError;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub use cache::StaticCache;
pub use state::ProxyState;

const GRACEFUL_SHUTDOWN: Duration = Duration::from_secs(5);

/// A running proxy instance: one per project restart (spec.md §4.4, §4.5).
pub struct ProxyHandle {
  loading: Arc<std::sync::atomic::AtomicBool>,
  shutdown: Option<oneshot::Sender<()>>,
  join: JoinHandle<()>,
}

impl ProxyHandle {
  /// Bind `listen_port`, forwarding to `upstream_port`, serving static
  /// assets found under `exe_dir` (or `./static` as fallback). Starts in
  /// `loading=true` mode.
  pub async fn start(listen_port: u16, upstream_port: u16, exe_dir: &Path) -> Result<Self, RunnerError> {
    let cache = Arc::new(StaticCache::load(exe_dir)?);
    let state = ProxyState::new(upstream_port, cache);
    let loading = state.loading.clone();

    let app = Router::new().fallback(handler::handle).with_state(state);

    let listener = TcpListener::bind(("0.0.0.0", listen_port))
      .await
      .map_err(|err| RunnerError::unavailable(format!("proxy bind {listen_port} failed: {err}")))?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let join = tokio::spawn(async move {
      let result = axum::serve(listener, app)
        .with_graceful_shutdown(async {
          let _ = shutdown_rx.await;
        })
        .await;
      if let Err(err) = result {
        warn!(error = %err, "proxy server exited with error");
      }
    });

    info!(listen_port, upstream_port, "proxy started");
    Ok(Self { loading, shutdown: Some(shutdown_tx), join })
  }

  pub fn set_loading(&self, loading: bool) {
    self.loading.store(loading, Ordering::Release);
  }

  pub fn is_loading(&self) -> bool {
    self.loading.load(Ordering::Acquire)
  }

  /// Graceful shutdown with a 5-second deadline, then force-abort.
  pub async fn stop(mut self) {
    if let Some(tx) = self.shutdown.take() {
      let _ = tx.send(());
    }
    if tokio::time::timeout(GRACEFUL_SHUTDOWN, &mut self.join).await.is_err() {
      warn!("proxy graceful shutdown timed out, forcing close");
      self.join.abort();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::net::TcpListener as StdTcpListener;

  fn write_static_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let static_dir = dir.path().join("static");
    std::fs::create_dir(&static_dir).unwrap();
    std::fs::write(static_dir.join("loading.html"), "<html><head></head><body>loading</body></html>")
      .unwrap();
    std::fs::write(static_dir.join("heartbeat.js"), "hb()").unwrap();
    std::fs::write(static_dir.join("navigation.js"), "nav()").unwrap();
    dir
  }

  fn free_port() -> u16 {
    StdTcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
  }

  #[tokio::test]
  async fn serves_loading_page_while_loading() {
    let dir = write_static_dir();
    let port = free_port();
    let handle = ProxyHandle::start(port, free_port(), dir.path()).await.unwrap();
    assert!(handle.is_loading());

    let resp = reqwest::get(format!("http://127.0.0.1:{port}/dashboard")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.text().await.unwrap();
    assert!(body.contains("loading"));

    handle.stop().await;
  }

  #[tokio::test]
  async fn rejects_asset_requests_while_loading() {
    let dir = write_static_dir();
    let port = free_port();
    let handle = ProxyHandle::start(port, free_port(), dir.path()).await.unwrap();

    let client = reqwest::Client::new();
    let resp = client
      .get(format!("http://127.0.0.1:{port}/assets/app.js"))
      .header("accept", "application/javascript")
      .send()
      .await
      .unwrap();
    assert_eq!(resp.status(), 503);
    assert_eq!(resp.headers().get("retry-after").unwrap(), "2");

    handle.stop().await;
  }

  #[tokio::test]
  async fn options_short_circuits_with_cors() {
    let dir = write_static_dir();
    let port = free_port();
    let handle = ProxyHandle::start(port, free_port(), dir.path()).await.unwrap();

    let client = reqwest::Client::new();
    let resp =
      client.request(reqwest::Method::OPTIONS, format!("http://127.0.0.1:{port}/anything")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers().get("access-control-allow-origin").unwrap(), "*");

    handle.stop().await;
  }

  #[tokio::test]
  async fn set_loading_flips_mode() {
    let dir = write_static_dir();
    let port = free_port();
    let handle = ProxyHandle::start(port, free_port(), dir.path()).await.unwrap();
    handle.set_loading(false);
    assert!(!handle.is_loading());
    handle.stop().await;
  }

  #[tokio::test]
  async fn live_mode_injects_scripts_and_overrides_cache_headers() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/"))
      .respond_with(
        ResponseTemplate::new(200)
          .set_body_raw(b"<html><head><title>t</title></head><body>hi</body></html>".to_vec(), "text/html")
          .insert_header("etag", "\"abc\"")
          .insert_header("cache-control", "max-age=3600"),
      )
      .mount(&mock_server)
      .await;
    let upstream_port = mock_server.address().port();

    let dir = write_static_dir();
    let port = free_port();
    let handle = ProxyHandle::start(port, upstream_port, dir.path()).await.unwrap();
    handle.set_loading(false);

    let resp = reqwest::get(format!("http://127.0.0.1:{port}/")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.headers().get("etag").is_none());
    assert_eq!(resp.headers().get("cache-control").unwrap(), "no-store, no-cache, must-revalidate, proxy-revalidate, max-age=0");
    assert_eq!(resp.headers().get("access-control-allow-origin").unwrap(), "*");

    let body = resp.text().await.unwrap();
    assert!(body.contains("hb()"));
    assert!(body.contains("nav()"));
    assert!(body.contains("hi"));

    handle.stop().await;
  }

  #[tokio::test]
  async fn live_mode_returns_503_when_upstream_unreachable() {
    let dir = write_static_dir();
    let port = free_port();
    let unreachable_upstream = free_port();
    let handle = ProxyHandle::start(port, unreachable_upstream, dir.path()).await.unwrap();
    handle.set_loading(false);

    let resp = reqwest::get(format!("http://127.0.0.1:{port}/")).await.unwrap();
    assert_eq!(resp.status(), 503);
    assert_eq!(resp.headers().get("access-control-allow-origin").unwrap(), "*");

    handle.stop().await;
  }
}
