//! Unix stream framing.

use std::io::ErrorKind;

use bincode::{Decode, Encode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tracing::trace;

use crate::error::ProtocolError;
use crate::wire::{decode_message, encode_message, MAX_MESSAGE_SIZE};

/// Split a connected stream into framed halves.
pub fn split(stream: UnixStream) -> (MessageSender, MessageReceiver) {
    let (read, write) = stream.into_split();
    (MessageSender::new(write), MessageReceiver::new(read))
}

/// Sends length-prefixed bincode messages over the write half of a socket.
pub struct MessageSender {
    stream: OwnedWriteHalf,
}

impl MessageSender {
    fn new(stream: OwnedWriteHalf) -> Self {
        Self { stream }
    }

    /// Send a message, encoding it as length-prefixed bincode.
    pub async fn send<T: Encode>(&mut self, msg: &T) -> Result<(), ProtocolError> {
        let frame = encode_message(msg)?;
        self.stream
            .write_all(&frame)
            .await
            .map_err(|e| ProtocolError::Connection(e.to_string()))?;

        trace!(len = frame.len() - 4, "sent message");
        Ok(())
    }

    /// Shut down the write direction (signal no more data).
    pub async fn finish(mut self) -> Result<(), ProtocolError> {
        self.stream
            .shutdown()
            .await
            .map_err(|e| ProtocolError::Connection(e.to_string()))
    }
}

/// Receives length-prefixed bincode messages from the read half of a socket.
pub struct MessageReceiver {
    stream: OwnedReadHalf,
}

impl MessageReceiver {
    fn new(stream: OwnedReadHalf) -> Self {
        Self { stream }
    }

    /// Receive and decode a message.
    ///
    /// Returns `None` if the peer closed the stream between frames.
    pub async fn recv<T: Decode<()>>(&mut self) -> Result<Option<T>, ProtocolError> {
        let mut len_buf = [0u8; 4];
        match self.stream.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(ProtocolError::Connection(e.to_string())),
        }

        let len = u32::from_be_bytes(len_buf);
        if len > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::Deserialization(format!(
                "message size {len} exceeds maximum {MAX_MESSAGE_SIZE}"
            )));
        }

        let mut payload = vec![0u8; len as usize];
        match self.stream.read_exact(&mut payload).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(ProtocolError::StreamClosed);
            }
            Err(e) => return Err(ProtocolError::Connection(e.to_string())),
        }

        let msg = decode_message(&payload)?;
        trace!(len, "received message");
        Ok(Some(msg))
    }
}
