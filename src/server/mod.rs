//! Panel-facing TCP server.
//!
//! Thin façade over the session engine: accept a socket, run the
//! handshake, register the session by its panel-supplied id, and drain
//! its notifications to the log. One session per connection; nothing
//! survives a disconnect.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::session::{Session, SessionOptions};

/// Live sessions keyed by `session_id`.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::default()
    }

    /// Look up a session by panel id.
    pub fn get(&self, session_id: &str) -> Result<Arc<Session>> {
        self.sessions
            .get(session_id)
            .map(|entry| Arc::clone(&entry))
            .ok_or_else(|| Error::SessionNotFound(session_id.to_owned()))
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    fn insert(&self, session: Arc<Session>) {
        let id = session.session_id().to_owned();
        if let Some(previous) = self.sessions.insert(id.clone(), session) {
            warn!(session_id = %id, "replacing existing session with same id");
            previous.shutdown();
        }
    }

    fn remove(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }
}

/// The accept loop and its shared state.
pub struct PanelServer {
    config: Config,
    registry: Arc<SessionRegistry>,
    shutdown: CancellationToken,
}

impl PanelServer {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            registry: SessionRegistry::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Token cancelling the accept loop and every session.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Accept panel connections until shutdown.
    pub async fn run(&self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.config.server.listen_port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Config(format!("failed to bind {addr}: {e}")))?;
        info!(%addr, "listening for panel connections");

        let active = Arc::new(AtomicUsize::new(0));
        loop {
            let accepted = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => accepted,
            };
            let (socket, peer) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            };

            if active.load(Ordering::Relaxed) >= self.config.server.max_connections {
                warn!(%peer, "connection limit reached, dropping");
                continue;
            }

            if let Err(e) = socket.set_nodelay(true) {
                debug!(%peer, error = %e, "set_nodelay failed");
            }

            let options = SessionOptions::from_config(&self.config);
            let registry = Arc::clone(&self.registry);
            let shutdown = self.shutdown.clone();
            let active = Arc::clone(&active);
            active.fetch_add(1, Ordering::Relaxed);
            tokio::spawn(async move {
                handle_panel(socket, peer, options, registry, shutdown).await;
                active.fetch_sub(1, Ordering::Relaxed);
            });
        }

        info!("server stopped accepting connections");
        Ok(())
    }
}

async fn handle_panel(
    socket: tokio::net::TcpStream,
    peer: std::net::SocketAddr,
    options: SessionOptions,
    registry: Arc<SessionRegistry>,
    shutdown: CancellationToken,
) {
    let session = match Session::connect(socket, options, &shutdown).await {
        Ok(session) => Arc::new(session),
        Err(e) => {
            warn!(%peer, error = %e, "handshake failed");
            return;
        }
    };

    let session_id = session.session_id().to_owned();
    info!(%peer, %session_id, "panel connected");

    let Some(mut notifications) = session.take_notifications() else {
        return;
    };
    registry.insert(Arc::clone(&session));

    while let Some(message) = notifications.recv().await {
        debug!(%session_id, message = message.name(), "notification");
    }

    registry.remove(&session_id);
    info!(%peer, %session_id, "panel disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_miss_is_session_not_found() {
        let registry = SessionRegistry::new();
        let err = registry.get("panel-42").unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(id) if id == "panel-42"));
    }

    #[test]
    fn test_registry_starts_empty() {
        let registry = SessionRegistry::new();
        assert_eq!(registry.active_count(), 0);
        assert!(registry.session_ids().is_empty());
    }
}
