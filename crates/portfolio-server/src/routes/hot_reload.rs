//! Hot reload WebSocket for development.
//!
//! `GET /ws` only exists in dev mode. Each upgraded socket is registered
//! with the [`ReloadRegistry`] and receives a `reload` text frame whenever
//! the content watcher fires.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};

use crate::error::{ApiError, ApiResult};
use crate::reload::{RELOAD_MESSAGE, ReloadRegistry, ReloadSignal};
use crate::router::RouteGroup;
use crate::state::AppState;

/// Client snippet inserted into pages served in dev mode.
///
/// Reconnects with backoff when the server restarts.
pub const RELOAD_CLIENT_SCRIPT: &str = r#"<script>
(function () {
  var delay = 1000;
  function connect() {
    var ws = new WebSocket((location.protocol === "https:" ? "wss://" : "ws://") + location.host + "/ws");
    ws.onopen = function () { delay = 1000; console.log("hot reload connected"); };
    ws.onmessage = function (event) { if (event.data === "reload") { location.reload(); } };
    ws.onclose = function () {
      setTimeout(connect, delay);
      delay = Math.min(delay * 1.5, 30000);
    };
  }
  connect();
})();
</script>
"#;

/// Build the hot reload route.
pub fn routes(state: &AppState) -> RouteGroup {
    RouteGroup::new("").get("/ws", state.bind(upgrade))
}

/// GET /ws - Upgrade to a reload socket.
async fn upgrade(state: AppState, req: Request) -> ApiResult<Response> {
    if !state.config().dev_mode {
        return Err(ApiError::NotFound("Not found".to_string()));
    }

    let (mut parts, _body) = req.into_parts();
    let ws = WebSocketUpgrade::from_request_parts(&mut parts, &())
        .await
        .map_err(|rejection| {
            tracing::debug!(%rejection, "Rejected non-upgrade request on /ws");
            ApiError::NotImplemented("WebSocket upgrade required".to_string())
        })?;

    let registry = state.reload().clone();
    Ok(ws.on_upgrade(move |socket| serve_client(socket, registry)))
}

/// Forward reload signals to one socket until either side closes.
async fn serve_client(socket: WebSocket, registry: Arc<ReloadRegistry>) {
    let (id, mut signals) = registry.register().await;
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            signal = signals.recv() => match signal {
                Some(ReloadSignal::Reload) => {
                    if sender.send(Message::Text(RELOAD_MESSAGE.into())).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    registry.remove(id).await;
}
