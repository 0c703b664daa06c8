/* src/proxy/src/state.rs */

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use preview_injector::ScriptInjector;

use crate::cache::StaticCache;

#[derive(Clone)]
pub struct ProxyState {
  pub upstream_port: u16,
  pub loading: Arc<AtomicBool>,
  pub cache: Arc<StaticCache>,
  pub client: reqwest::Client,
  pub injector: Arc<ScriptInjector>,
}

impl ProxyState {
  pub fn new(upstream_port: u16, cache: Arc<StaticCache>) -> Self {
    let mut injector = ScriptInjector::new();
    injector.add_script(Some(cache.navigation_js()), vec![], true);
    injector.add_script(Some(cache.heartbeat_js()), vec![], true);

    Self {
      upstream_port,
      loading: Arc::new(AtomicBool::new(true)),
      cache,
      client: reqwest::Client::new(),
      injector: Arc::new(injector),
    }
  }

  pub fn is_loading(&self) -> bool {
    self.loading.load(Ordering::Acquire)
  }

  pub fn upstream_base(&self) -> String {
    format!("http://127.0.0.1:{}", self.upstream_port)
  }

  pub fn upstream_ws_base(&self) -> String {
    format!("ws://127.0.0.1:{}", self.upstream_port)
  }
}
