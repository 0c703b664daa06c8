/* src/api/src/port.rs */

use preview_core::RunnerError;

/// Pick a free ephemeral TCP port by binding to port 0 and releasing it
/// immediately; there's an unavoidable race before the caller rebinds it,
/// but it's the same tradeoff every "find a free port" helper makes.
pub fn allocate_ephemeral_port() -> Result<u16, RunnerError> {
  std::net::TcpListener::bind(("127.0.0.1", 0))
    .and_then(|listener| listener.local_addr())
    .map(|addr| addr.port())
    .map_err(|err| RunnerError::unavailable(format!("failed to allocate ephemeral port: {err}")))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn allocates_a_nonzero_port() {
    let port = allocate_ephemeral_port().unwrap();
    assert!(port > 0);
  }
}
