// src/reload/server.rs

//! WebSocket endpoint for live reload listeners.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::reload::hub::ReloadHub;

/// Text frame pushed to listeners after each successful build.
pub const RELOAD_MESSAGE: &str = "reload";

const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(10);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Pause before the next `accept` after a failed one: doubles per
/// consecutive failure, capped at [`ACCEPT_BACKOFF_MAX`].
fn next_accept_backoff(previous: Option<Duration>) -> Duration {
    match previous {
        None => ACCEPT_BACKOFF_MIN,
        Some(d) => (d * 2).min(ACCEPT_BACKOFF_MAX),
    }
}

/// Running live reload server. Dropping it does **not** stop the server; call
/// [`shutdown`](Self::shutdown).
#[derive(Debug)]
pub struct ReloadServerHandle {
    local_addr: SocketAddr,
    accept_loop: JoinHandle<()>,
}

impl ReloadServerHandle {
    /// Address actually bound (useful when the configured port was 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting and close every open listener connection.
    pub async fn shutdown(self) {
        self.accept_loop.abort();
        // Aborting drops the accept loop's JoinSet, which aborts the
        // per-connection tasks with it.
        let _ = self.accept_loop.await;
        debug!("live reload server stopped");
    }
}

/// Bind `addr` and serve websocket upgrades on `path` until shut down.
///
/// Each upgraded connection registers with `hub` and is deregistered when the
/// peer closes, errors, or is dropped by the hub.
pub async fn spawn_reload_server(
    addr: SocketAddr,
    path: &str,
    hub: ReloadHub,
) -> Result<ReloadServerHandle> {
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    let path: Arc<str> = Arc::from(path);

    info!(address = %local_addr, path = %path, "live reload server listening");

    let accept_loop = tokio::spawn(async move {
        let mut connections = JoinSet::new();
        let mut backoff: Option<Duration> = None;

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        backoff = None;
                        connections.spawn(serve_listener(
                            stream,
                            peer,
                            Arc::clone(&path),
                            hub.clone(),
                        ));
                    }
                    Err(err) => {
                        let pause = next_accept_backoff(backoff);
                        backoff = Some(pause);
                        warn!(error = %err, retry_in_ms = pause.as_millis() as u64, "failed to accept live reload connection");
                        tokio::time::sleep(pause).await;
                    }
                },
                // Reap finished connection tasks so the set does not grow.
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }
    });

    Ok(ReloadServerHandle {
        local_addr,
        accept_loop,
    })
}

async fn serve_listener(stream: TcpStream, peer: SocketAddr, path: Arc<str>, hub: ReloadHub) {
    let expected = Arc::clone(&path);
    let check_path = move |req: &Request, resp: Response| {
        if req.uri().path() == &*expected {
            Ok(resp)
        } else {
            let mut err = ErrorResponse::new(Some("not found".to_string()));
            *err.status_mut() = StatusCode::NOT_FOUND;
            Err(err)
        }
    };

    let ws = match accept_hdr_async(stream, check_path).await {
        Ok(ws) => ws,
        Err(err) => {
            debug!(%peer, error = %err, "live reload handshake failed");
            return;
        }
    };

    let (id, mut signals) = hub.register();
    info!(%peer, listener = id, "live reload listener connected");

    let (mut sink, mut incoming) = ws.split();

    loop {
        tokio::select! {
            signal = signals.recv() => match signal {
                Some(signal) => {
                    if let Err(err) = sink.send(Message::Text(RELOAD_MESSAGE.to_string())).await {
                        debug!(%peer, listener = id, error = %err, "failed to push reload");
                        break;
                    }
                    debug!(%peer, listener = id, cycle = signal.cycle, "reload pushed");
                }
                // The hub dropped us.
                None => break,
            },
            msg = incoming.next() => match msg {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!(%peer, listener = id, error = %err, "live reload read error");
                    break;
                }
            },
        }
    }

    hub.deregister(id);
    let _ = sink.close().await;
    info!(%peer, listener = id, "live reload listener disconnected");
}
