/* src/proxy/src/handler.rs */

use axum::body::{to_bytes, Body};
use axum::extract::{FromRequestParts, Request, State};
use axum::extract::ws::WebSocketUpgrade;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use preview_injector::ScriptInjector;
use tracing::warn;

use crate::state::ProxyState;
use crate::ws;

const CORS_HEADERS: &[(header::HeaderName, &str)] = &[
  (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
  (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS"),
  (header::ACCESS_CONTROL_ALLOW_HEADERS, "Accept, Authorization, Content-Type, Upgrade, Connection"),
];

fn apply_cors(headers: &mut HeaderMap) {
  for (name, value) in CORS_HEADERS.iter() {
    headers.insert(name.clone(), HeaderValue::from_static(*value));
  }
}

/// Build a bare error response that still carries CORS headers: spec.md
/// §4.4 makes no carve-out for error paths.
fn cors_error(status: StatusCode) -> Response {
  let mut headers = HeaderMap::new();
  apply_cors(&mut headers);
  (status, headers).into_response()
}

fn wants_html(headers: &HeaderMap, path: &str) -> bool {
  let accepts_html = headers
    .get(header::ACCEPT)
    .and_then(|v| v.to_str().ok())
    .is_some_and(|v| v.to_ascii_lowercase().contains("text/html"));
  let last_segment = path.rsplit('/').next().unwrap_or("");
  let no_extension = !last_segment.contains('.');
  accepts_html || no_extension || path.ends_with('/')
}

/// Entry point for every request the proxy receives, dispatched by mode
/// (spec.md §4.4).
pub async fn handle(State(state): State<ProxyState>, req: Request) -> Response {
  if req.method() == Method::OPTIONS {
    let mut headers = HeaderMap::new();
    apply_cors(&mut headers);
    return (StatusCode::OK, headers).into_response();
  }

  if state.is_loading() {
    return handle_loading(&state, &req);
  }

  if ws::is_websocket_upgrade(req.headers()) {
    return handle_websocket_upgrade(state, req).await;
  }

  handle_http_proxy(state, req).await
}

fn handle_loading(state: &ProxyState, req: &Request) -> Response {
  let mut headers = HeaderMap::new();
  apply_cors(&mut headers);

  if wants_html(req.headers(), req.uri().path()) {
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
    (StatusCode::OK, headers, state.cache.loading_html()).into_response()
  } else {
    headers.insert(header::RETRY_AFTER, HeaderValue::from_static("2"));
    headers.insert(
      header::CACHE_CONTROL,
      HeaderValue::from_static("no-store, no-cache, must-revalidate"),
    );
    (StatusCode::SERVICE_UNAVAILABLE, headers).into_response()
  }
}

async fn handle_websocket_upgrade(state: ProxyState, req: Request) -> Response {
  let upstream_url =
    format!("{}{}", state.upstream_ws_base(), req.uri().path_and_query().map_or("", |pq| pq.as_str()));
  let (mut parts, _body) = req.into_parts();
  match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
    Ok(upgrade) => upgrade.on_upgrade(move |socket| ws::bridge(socket, upstream_url)),
    Err(rejection) => rejection.into_response(),
  }
}

async fn handle_http_proxy(state: ProxyState, req: Request) -> Response {
  let path_and_query = req.uri().path_and_query().map_or("", |pq| pq.as_str()).to_string();
  let url = format!("{}{}", state.upstream_base(), path_and_query);

  let method = match reqwest::Method::from_bytes(req.method().as_str().as_bytes()) {
    Ok(m) => m,
    Err(_) => return cors_error(StatusCode::BAD_REQUEST),
  };

  let mut builder = state.client.request(method, &url);
  for (name, value) in req.headers() {
    if name != header::HOST {
      builder = builder.header(name.as_str(), value.as_bytes());
    }
  }

  let body_bytes = match to_bytes(req.into_body(), usize::MAX).await {
    Ok(b) => b,
    Err(_) => return cors_error(StatusCode::BAD_REQUEST),
  };
  if !body_bytes.is_empty() {
    builder = builder.body(body_bytes);
  }

  let upstream = match builder.send().await {
    Ok(resp) => resp,
    Err(err) => {
      warn!(url, error = %err, "upstream proxy request failed");
      return cors_error(StatusCode::SERVICE_UNAVAILABLE);
    }
  };

  build_response(&state, upstream).await
}

async fn build_response(state: &ProxyState, upstream: reqwest::Response) -> Response {
  let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
  let is_html = upstream
    .headers()
    .get(header::CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .is_some_and(|v| v.to_ascii_lowercase().contains("text/html"));

  let mut headers = HeaderMap::new();
  for (name, value) in upstream.headers() {
    if matches!(
      name.as_str(),
      "content-length" | "cache-control" | "etag" | "last-modified"
    ) {
      continue;
    }
    if let (Ok(name), Ok(value)) = (
      header::HeaderName::from_bytes(name.as_str().as_bytes()),
      HeaderValue::from_bytes(value.as_bytes()),
    ) {
      headers.insert(name, value);
    }
  }
  headers.insert(
    header::CACHE_CONTROL,
    HeaderValue::from_static("no-store, no-cache, must-revalidate, proxy-revalidate, max-age=0"),
  );
  headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
  headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
  apply_cors(&mut headers);

  if is_html {
    return match upstream.bytes().await {
      Ok(body) => {
        let injected = inject_html(&state.injector, &body);
        (status, headers, injected).into_response()
      }
      Err(err) => {
        warn!(error = %err, "failed to buffer upstream html body");
        (status, headers, Body::empty()).into_response()
      }
    };
  }

  let stream = upstream.bytes_stream();
  (status, headers, Body::from_stream(stream)).into_response()
}

fn inject_html(injector: &ScriptInjector, body: &[u8]) -> Vec<u8> {
  match injector.inject_into(body) {
    Ok(injected) => injected,
    Err(err) => {
      warn!(error = %err, "html injection failed, serving original body");
      body.to_vec()
    }
  }
}
