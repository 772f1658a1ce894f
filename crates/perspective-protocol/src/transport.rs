//! Unix socket transport: bind, accept, and the handshake responder.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use perspective_types::{ClientId, Request, Response, ServerMessage, PROTOCOL_VERSION};
use tokio::net::UnixListener;
use tracing::{debug, info, warn};

use crate::connection::{split, MessageReceiver, MessageSender};
use crate::error::ProtocolError;

/// Identities handed out when the peer pid is unavailable. Kept well above
/// the pid range so the two never collide.
const ANONYMOUS_CLIENT_BASE: u32 = 0x8000_0000;

/// The listening side of the perspective service socket.
pub struct ServiceListener {
    listener: UnixListener,
    path: PathBuf,
    next_anonymous: AtomicU32,
}

/// An accepted connection that has not completed the handshake yet.
pub struct PendingConnection {
    pub client: ClientId,
    tx: MessageSender,
    rx: MessageReceiver,
}

/// An accepted, handshaken client connection.
pub struct ServiceConnection {
    pub client: ClientId,
    pub tx: MessageSender,
    pub rx: MessageReceiver,
}

impl ServiceListener {
    /// Bind the service socket, replacing a stale socket file left behind by
    /// a previous run. Fails if another service still answers on `path`.
    pub fn bind(path: &Path) -> Result<Self, ProtocolError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if path.exists() {
            if std::os::unix::net::UnixStream::connect(path).is_ok() {
                return Err(ProtocolError::Connection(format!(
                    "{} is in use by a running service",
                    path.display()
                )));
            }
            debug!(path = %path.display(), "removing stale socket");
            std::fs::remove_file(path)?;
        }

        let listener = UnixListener::bind(path)
            .map_err(|e| ProtocolError::Connection(format!("bind {}: {e}", path.display())))?;

        info!(path = %path.display(), "service socket bound");
        Ok(Self {
            listener,
            path: path.to_path_buf(),
            next_anonymous: AtomicU32::new(ANONYMOUS_CLIENT_BASE),
        })
    }

    /// Path this listener is bound to.
    pub fn local_path(&self) -> &Path {
        &self.path
    }

    /// Accept a connection and resolve its client identity. The handshake
    /// is left to [`PendingConnection::handshake`].
    pub async fn accept(&self) -> Result<PendingConnection, ProtocolError> {
        let (stream, _) = self
            .listener
            .accept()
            .await
            .map_err(|e| ProtocolError::Connection(e.to_string()))?;

        let pid = stream
            .peer_cred()
            .ok()
            .and_then(|cred| cred.pid())
            .and_then(|pid| u32::try_from(pid).ok());
        let client = match pid {
            Some(pid) => ClientId(pid),
            None => ClientId(self.next_anonymous.fetch_add(1, Ordering::Relaxed)),
        };

        let (tx, rx) = split(stream);
        debug!(client = %client, "accepted client");
        Ok(PendingConnection { client, tx, rx })
    }
}

impl PendingConnection {
    /// Complete the Hello/Welcome handshake.
    pub async fn handshake(self) -> Result<ServiceConnection, ProtocolError> {
        let Self {
            client,
            mut tx,
            mut rx,
        } = self;
        handshake_responder(&mut tx, &mut rx).await?;
        Ok(ServiceConnection { client, tx, rx })
    }
}

impl Drop for ServiceListener {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove socket");
        }
    }
}

async fn handshake_responder(
    tx: &mut MessageSender,
    rx: &mut MessageReceiver,
) -> Result<(), ProtocolError> {
    let hello: Request = rx.recv().await?.ok_or(ProtocolError::StreamClosed)?;
    match hello {
        Request::Hello { version } => {
            if version.major != PROTOCOL_VERSION.major {
                let err = ProtocolError::VersionMismatch {
                    remote: version.to_string(),
                    local: PROTOCOL_VERSION.to_string(),
                };
                let _ = tx
                    .send(&ServerMessage::Response(Response::Error(err.to_string())))
                    .await;
                return Err(err);
            }
            tx.send(&ServerMessage::Response(Response::Welcome {
                version: PROTOCOL_VERSION,
            }))
            .await
        }
        other => Err(ProtocolError::Handshake(format!(
            "expected Hello, got {other:?}"
        ))),
    }
}
