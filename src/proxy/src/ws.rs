/* src/proxy/src/ws.rs */

// WebSocket proxying. A raw byte-for-byte TCP splice can't produce a
// Sec-WebSocket-Accept the client will accept (it depends on a key only the
// terminating handshake sees), so both legs are handled as real WebSocket
// endpoints: axum terminates the client handshake, tokio-tungstenite
// performs the upstream handshake, and messages are relayed between them.

use axum::extract::ws::{Message as AxumMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;
use tracing::warn;

pub(crate) fn is_websocket_upgrade(headers: &axum::http::HeaderMap) -> bool {
  let has_upgrade = headers
    .get(axum::http::header::UPGRADE)
    .and_then(|v| v.to_str().ok())
    .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));
  let has_connection = headers
    .get(axum::http::header::CONNECTION)
    .and_then(|v| v.to_str().ok())
    .is_some_and(|v| v.to_ascii_lowercase().contains("upgrade"));
  has_upgrade && has_connection
}

/// Bridge an already-upgraded client socket to `upstream_url`, copying
/// messages in both directions until either side closes or errors.
pub async fn bridge(client: WebSocket, upstream_url: String) {
  let (upstream, _response) = match tokio_tungstenite::connect_async(&upstream_url).await {
    Ok(pair) => pair,
    Err(err) => {
      warn!(upstream_url, error = %err, "websocket upstream connect failed");
      return;
    }
  };

  let (mut client_tx, mut client_rx) = client.split();
  let (mut upstream_tx, mut upstream_rx) = upstream.split();

  let client_to_upstream = async {
    while let Some(Ok(msg)) = client_rx.next().await {
      let forwarded = match axum_to_upstream(msg) {
        Some(m) => m,
        None => continue,
      };
      let is_close = matches!(forwarded, UpstreamMessage::Close(_));
      if upstream_tx.send(forwarded).await.is_err() || is_close {
        break;
      }
    }
  };

  let upstream_to_client = async {
    while let Some(Ok(msg)) = upstream_rx.next().await {
      let forwarded = match upstream_to_axum(msg) {
        Some(m) => m,
        None => continue,
      };
      let is_close = matches!(forwarded, AxumMessage::Close(_));
      if client_tx.send(forwarded).await.is_err() || is_close {
        break;
      }
    }
  };

  tokio::select! {
    () = client_to_upstream => {},
    () = upstream_to_client => {},
  }
}

fn axum_to_upstream(msg: AxumMessage) -> Option<UpstreamMessage> {
  Some(match msg {
    AxumMessage::Text(t) => UpstreamMessage::Text(t.as_str().into()),
    AxumMessage::Binary(b) => UpstreamMessage::Binary(b),
    AxumMessage::Ping(p) => UpstreamMessage::Ping(p),
    AxumMessage::Pong(p) => UpstreamMessage::Pong(p),
    AxumMessage::Close(c) => {
      UpstreamMessage::Close(c.map(|f| tokio_tungstenite::tungstenite::protocol::CloseFrame {
        code: f.code.into(),
        reason: f.reason.as_str().into(),
      }))
    }
  })
}

fn upstream_to_axum(msg: UpstreamMessage) -> Option<AxumMessage> {
  Some(match msg {
    UpstreamMessage::Text(t) => AxumMessage::Text(t.as_str().into()),
    UpstreamMessage::Binary(b) => AxumMessage::Binary(b),
    UpstreamMessage::Ping(p) => AxumMessage::Ping(p),
    UpstreamMessage::Pong(p) => AxumMessage::Pong(p),
    UpstreamMessage::Close(c) => {
      AxumMessage::Close(c.map(|f| axum::extract::ws::CloseFrame {
        code: f.code.into(),
        reason: f.reason.as_str().into(),
      }))
    }
    UpstreamMessage::Frame(_) => return None,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::http::HeaderMap;

  #[test]
  fn detects_websocket_upgrade() {
    let mut headers = HeaderMap::new();
    headers.insert(axum::http::header::UPGRADE, "websocket".parse().unwrap());
    headers.insert(axum::http::header::CONNECTION, "Upgrade".parse().unwrap());
    assert!(is_websocket_upgrade(&headers));
  }

  #[test]
  fn rejects_plain_request() {
    let headers = HeaderMap::new();
    assert!(!is_websocket_upgrade(&headers));
  }

  #[test]
  fn requires_both_headers() {
    let mut headers = HeaderMap::new();
    headers.insert(axum::http::header::UPGRADE, "websocket".parse().unwrap());
    assert!(!is_websocket_upgrade(&headers));
  }
}
