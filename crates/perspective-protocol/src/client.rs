//! Client library for the perspective service.

use std::path::Path;

use perspective_types::{PerspectiveState, Request, Response, ServerMessage, PROTOCOL_VERSION};
use tokio::net::UnixStream;
use tracing::{debug, trace};

use crate::connection::{split, MessageReceiver, MessageSender};
use crate::error::ProtocolError;

/// A connection to the perspective service.
pub struct PerspectiveClient {
    tx: MessageSender,
    rx: MessageReceiver,
}

impl PerspectiveClient {
    /// Connect to the service socket and perform the handshake.
    pub async fn connect(path: &Path) -> Result<Self, ProtocolError> {
        let stream = UnixStream::connect(path)
            .await
            .map_err(|e| ProtocolError::Connection(format!("{}: {e}", path.display())))?;
        let (tx, rx) = split(stream);
        let mut client = Self { tx, rx };

        client
            .tx
            .send(&Request::Hello {
                version: PROTOCOL_VERSION,
            })
            .await?;
        match client.response().await? {
            Response::Welcome { version } if version.major == PROTOCOL_VERSION.major => {
                debug!(%version, "connected to perspective service");
                Ok(client)
            }
            Response::Welcome { version } => Err(ProtocolError::VersionMismatch {
                remote: version.to_string(),
                local: PROTOCOL_VERSION.to_string(),
            }),
            other => Err(ProtocolError::Handshake(format!(
                "expected Welcome, got {other:?}"
            ))),
        }
    }

    /// Ask the service to start the perspective. Returns once queued.
    pub async fn start(&mut self) -> Result<(), ProtocolError> {
        self.call(Request::Start).await.and_then(expect_ack)
    }

    /// Ask the service to stop the perspective. Returns once queued.
    pub async fn stop(&mut self) -> Result<(), ProtocolError> {
        self.call(Request::Stop).await.and_then(expect_ack)
    }

    /// Whether the perspective is running.
    pub async fn is_running(&mut self) -> Result<bool, ProtocolError> {
        match self.call(Request::IsRunning).await? {
            Response::Running(running) => Ok(running),
            other => Err(ProtocolError::UnexpectedResponse(format!("{other:?}"))),
        }
    }

    /// Register for lifecycle events. The connection is handed over to the
    /// returned stream; dropping it unregisters.
    pub async fn subscribe(mut self) -> Result<EventStream, ProtocolError> {
        match self.call(Request::RegisterCallback).await? {
            Response::Registered => Ok(EventStream {
                _tx: self.tx,
                rx: self.rx,
            }),
            other => Err(ProtocolError::UnexpectedResponse(format!("{other:?}"))),
        }
    }

    async fn call(&mut self, request: Request) -> Result<Response, ProtocolError> {
        self.tx.send(&request).await?;
        match self.response().await? {
            Response::Error(reason) => Err(ProtocolError::Rejected(reason)),
            response => Ok(response),
        }
    }

    async fn response(&mut self) -> Result<Response, ProtocolError> {
        loop {
            let msg: ServerMessage = self.rx.recv().await?.ok_or(ProtocolError::StreamClosed)?;
            match msg {
                ServerMessage::Response(response) => return Ok(response),
                ServerMessage::Event(state) => trace!(%state, "skipping event while awaiting response"),
            }
        }
    }
}

fn expect_ack(response: Response) -> Result<(), ProtocolError> {
    match response {
        Response::Ack => Ok(()),
        other => Err(ProtocolError::UnexpectedResponse(format!("{other:?}"))),
    }
}

/// Lifecycle events delivered to a registered client.
pub struct EventStream {
    // Dropping the write half half-closes the socket, which the service
    // reads as the client going away.
    _tx: MessageSender,
    rx: MessageReceiver,
}

impl EventStream {
    /// Wait for the next state change.
    ///
    /// Returns `None` once the service closes the connection.
    pub async fn next_event(&mut self) -> Result<Option<PerspectiveState>, ProtocolError> {
        loop {
            match self.rx.recv::<ServerMessage>().await? {
                Some(ServerMessage::Event(state)) => return Ok(Some(state)),
                Some(ServerMessage::Response(response)) => {
                    trace!(?response, "ignoring stray response on event stream");
                }
                None => return Ok(None),
            }
        }
    }
}
