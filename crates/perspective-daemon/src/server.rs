//! The client-facing socket service.

use std::path::Path;
use std::time::Duration;

use perspective_protocol::{
    PendingConnection, ProtocolError, ServiceConnection, ServiceListener,
};
use perspective_types::{ClientId, PerspectiveState, Request, Response, ServerMessage};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::controller::Controller;
use crate::error::ControllerError;
use crate::registry::EventSink;

/// How long a new client gets to send its Hello.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Serves controller requests over the service socket.
pub struct Service {
    listener: ServiceListener,
    controller: Controller,
}

impl Service {
    pub fn new(listener: ServiceListener, controller: Controller) -> Self {
        Self {
            listener,
            controller,
        }
    }

    pub fn local_path(&self) -> &Path {
        self.listener.local_path()
    }

    /// Accept clients until `cancel` fires. Each connection is handshaken
    /// and served on its own task.
    pub async fn run(self, cancel: CancellationToken) {
        info!(path = %self.listener.local_path().display(), "service accepting clients");
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(pending) => {
                        let controller = self.controller.clone();
                        let cancel = cancel.child_token();
                        tokio::spawn(async move {
                            let client = pending.client;
                            let result = match handshake(pending).await {
                                Ok(connection) => serve_connection(connection, controller, cancel).await,
                                Err(e) => Err(e),
                            };
                            if let Err(e) = result {
                                debug!(%client, error = %e, "client connection ended with error");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "failed to accept client"),
                },
            }
        }
        info!("service stopped");
    }
}

async fn handshake(pending: PendingConnection) -> Result<ServiceConnection, ProtocolError> {
    tokio::time::timeout(HANDSHAKE_TIMEOUT, pending.handshake())
        .await
        .map_err(|_| {
            ProtocolError::Handshake(format!("no Hello within {HANDSHAKE_TIMEOUT:?}"))
        })?
}

async fn serve_connection(
    connection: ServiceConnection,
    controller: Controller,
    cancel: CancellationToken,
) -> Result<(), ProtocolError> {
    let ServiceConnection {
        client,
        mut tx,
        mut rx,
    } = connection;

    // Frame reads are not cancel-safe, so they get their own task.
    let (requests_tx, mut requests) = mpsc::channel::<Request>(16);
    let reader = tokio::spawn(async move {
        loop {
            match rx.recv::<Request>().await {
                Ok(Some(request)) => {
                    if requests_tx.send(request).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    debug!(%client, error = %e, "failed to read request");
                    break;
                }
            }
        }
    });

    let mut events = None;
    let result = loop {
        tokio::select! {
            () = cancel.cancelled() => break Ok(()),
            request = requests.recv() => {
                let Some(request) = request else {
                    debug!(%client, "client disconnected");
                    break Ok(());
                };
                let response = handle_request(request, client, &controller, &mut events);
                if let Err(e) = tx.send(&ServerMessage::Response(response)).await {
                    break Err(e);
                }
            }
            Some(state) = next_event(&mut events) => {
                if let Err(e) = tx.send(&ServerMessage::Event(state)).await {
                    break Err(e);
                }
            }
        }
    };

    reader.abort();
    result
}

fn handle_request(
    request: Request,
    client: ClientId,
    controller: &Controller,
    events: &mut Option<mpsc::UnboundedReceiver<PerspectiveState>>,
) -> Response {
    debug!(%client, ?request, "request");
    match request {
        Request::Hello { .. } => Response::Error("handshake already completed".to_string()),
        Request::Start => acknowledge(controller.request_start()),
        Request::Stop => acknowledge(controller.request_stop()),
        Request::IsRunning => Response::Running(controller.is_running()),
        Request::RegisterCallback => {
            let (sink, rx) = EventSink::channel();
            match controller.register_callback(client, Some(sink)) {
                Ok(()) => {
                    *events = Some(rx);
                    Response::Registered
                }
                Err(e) => Response::Error(e.to_string()),
            }
        }
    }
}

fn acknowledge(result: Result<(), ControllerError>) -> Response {
    match result {
        Ok(()) => Response::Ack,
        Err(e) => Response::Error(e.to_string()),
    }
}

async fn next_event(
    events: &mut Option<mpsc::UnboundedReceiver<PerspectiveState>>,
) -> Option<PerspectiveState> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
