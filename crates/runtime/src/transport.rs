//! Pipe transport over the worker process's stdio streams.
//!
//! Frames are a 4-byte little-endian length prefix followed by that many
//! bytes of UTF-8 JSON. The transport is split into a sender half (owned by
//! the connection's writer task) and a receiver half (a read loop that
//! forwards decoded frames into an in-memory channel until EOF).

use crate::error::{Error, Result};
use futures_util::future::BoxFuture;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

/// Frames larger than this are treated as stream corruption.
const MAX_FRAME_LEN: u32 = 256 * 1024 * 1024;

/// Object-safe sender half of a transport.
pub trait Transport: Send {
    /// Serializes and writes one frame.
    fn send(&mut self, message: Value) -> BoxFuture<'_, Result<()>>;
}

/// Object-safe receiver half of a transport.
pub trait TransportReceiver: Send {
    /// Runs the read loop until EOF or the message channel closes.
    fn run(self: Box<Self>) -> BoxFuture<'static, Result<()>>;
}

/// The pieces a [`crate::connection::Connection`] is built from.
pub struct TransportParts {
    /// Sender half, taken by the connection's writer task
    pub sender: Box<dyn Transport>,
    /// Receiver half, taken by the connection's reader task
    pub receiver: Box<dyn TransportReceiver>,
    /// Channel carrying frames decoded by the receiver
    pub message_rx: mpsc::UnboundedReceiver<Value>,
}

/// Length-prefixed JSON transport over a pair of byte streams.
///
/// `W` is the worker's stdin (host writes), `R` is the worker's stdout
/// (host reads). Tests substitute `tokio::io::duplex` pipes.
pub struct PipeTransport<W, R> {
    sender: PipeTransportSender<W>,
    receiver: PipeTransportReceiver<R>,
}

impl<W, R> PipeTransport<W, R>
where
    W: AsyncWrite + Unpin + Send + 'static,
    R: AsyncRead + Unpin + Send + 'static,
{
    /// Creates a transport plus the channel its receiver decodes into.
    pub fn new(writer: W, reader: R) -> (Self, mpsc::UnboundedReceiver<Value>) {
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let transport = Self {
            sender: PipeTransportSender { writer },
            receiver: PipeTransportReceiver { reader, message_tx },
        };
        (transport, message_rx)
    }

    /// Splits into sender and receiver halves.
    pub fn into_parts(self) -> (PipeTransportSender<W>, PipeTransportReceiver<R>) {
        (self.sender, self.receiver)
    }

    /// Boxes the halves into [`TransportParts`] for the connection layer.
    pub fn into_transport_parts(self, message_rx: mpsc::UnboundedReceiver<Value>) -> TransportParts {
        let (sender, receiver) = self.into_parts();
        TransportParts {
            sender: Box::new(sender),
            receiver: Box::new(receiver),
            message_rx,
        }
    }
}

/// Writing half of a [`PipeTransport`].
pub struct PipeTransportSender<W> {
    writer: W,
}

impl<W> PipeTransportSender<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Writes one length-prefixed JSON frame and flushes.
    pub async fn send(&mut self, message: Value) -> Result<()> {
        let payload = serde_json::to_vec(&message)?;
        let length = u32::try_from(payload.len())
            .map_err(|_| Error::TransportError("Frame exceeds u32 length".to_string()))?;

        self.writer
            .write_all(&length.to_le_bytes())
            .await
            .map_err(|e| Error::TransportError(format!("Failed to write length prefix: {e}")))?;
        self.writer
            .write_all(&payload)
            .await
            .map_err(|e| Error::TransportError(format!("Failed to write frame: {e}")))?;
        self.writer
            .flush()
            .await
            .map_err(|e| Error::TransportError(format!("Failed to flush frame: {e}")))?;

        Ok(())
    }
}

impl<W> Transport for PipeTransportSender<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn send(&mut self, message: Value) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { PipeTransportSender::send(self, message).await })
    }
}

/// Reading half of a [`PipeTransport`].
pub struct PipeTransportReceiver<R> {
    reader: R,
    message_tx: mpsc::UnboundedSender<Value>,
}

impl<R> PipeTransportReceiver<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Reads frames and forwards them until EOF or the channel closes.
    ///
    /// A clean EOF at a frame boundary returns `Ok(())`; EOF inside a frame
    /// is a transport error.
    pub async fn run(mut self) -> Result<()> {
        loop {
            let mut length_buf = [0u8; 4];
            match self.reader.read_exact(&mut length_buf).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    // Worker closed its stdout at a frame boundary.
                    return Ok(());
                }
                Err(e) => {
                    return Err(Error::TransportError(format!(
                        "Failed to read length prefix: {e}"
                    )));
                }
            }

            let length = u32::from_le_bytes(length_buf);
            if length > MAX_FRAME_LEN {
                return Err(Error::TransportError(format!(
                    "Frame length {length} exceeds maximum"
                )));
            }

            let mut payload = vec![0u8; length as usize];
            self.reader
                .read_exact(&mut payload)
                .await
                .map_err(|e| Error::TransportError(format!("Failed to read frame body: {e}")))?;

            let message: Value = serde_json::from_slice(&payload)?;
            tracing::trace!(len = length, "received frame");

            if self.message_tx.send(message).is_err() {
                // Connection side dropped the channel; shut down quietly.
                return Ok(());
            }
        }
    }
}

impl<R> TransportReceiver for PipeTransportReceiver<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    fn run(self: Box<Self>) -> BoxFuture<'static, Result<()>> {
        Box::pin(async move { PipeTransportReceiver::run(*self).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn test_length_prefix_encoding() {
        let length: u32 = 1234;
        let bytes = length.to_le_bytes();

        assert_eq!(bytes[0], (length & 0xFF) as u8);
        assert_eq!(bytes[1], ((length >> 8) & 0xFF) as u8);
        assert_eq!(u32::from_le_bytes(bytes), length);
    }

    #[tokio::test]
    async fn test_send_message_framing() {
        let (stdin_read, stdin_write) = tokio::io::duplex(1024);
        let (stdout_read, _stdout_write) = tokio::io::duplex(1024);

        let (transport, _rx) = PipeTransport::new(stdin_write, stdout_read);
        let (mut sender, _receiver) = transport.into_parts();

        let test_message = serde_json::json!({
            "method": "CloseBrowser",
            "params": [1]
        });

        sender.send(test_message.clone()).await.unwrap();

        let (mut read_half, _write_half) = tokio::io::split(stdin_read);
        let mut len_buf = [0u8; 4];
        read_half.read_exact(&mut len_buf).await.unwrap();
        let length = u32::from_le_bytes(len_buf) as usize;

        let mut msg_buf = vec![0u8; length];
        read_half.read_exact(&mut msg_buf).await.unwrap();

        let received: Value = serde_json::from_slice(&msg_buf).unwrap();
        assert_eq!(received, test_message);
    }

    #[tokio::test]
    async fn test_multiple_messages_in_sequence() {
        let (_stdin_read, stdin_write) = tokio::io::duplex(4096);
        let (stdout_read, mut stdout_write) = tokio::io::duplex(4096);

        let (transport, mut rx) = PipeTransport::new(stdin_write, stdout_read);
        let (_sender, receiver) = transport.into_parts();

        let read_task = tokio::spawn(async move { receiver.run().await });

        let messages = vec![
            serde_json::json!({"method": "NotifyAddressChanged", "params": [1, "a"]}),
            serde_json::json!({"method": "NotifyTitleChanged", "params": [1, "b"]}),
            serde_json::json!({"id": 3, "result": null}),
        ];

        for msg in &messages {
            let payload = serde_json::to_vec(msg).unwrap();
            let length = payload.len() as u32;
            stdout_write.write_all(&length.to_le_bytes()).await.unwrap();
            stdout_write.write_all(&payload).await.unwrap();
        }
        stdout_write.flush().await.unwrap();

        for expected in &messages {
            let received = rx.recv().await.unwrap();
            assert_eq!(&received, expected);
        }

        drop(stdout_write);
        let result = read_task.await.unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_eof_at_frame_boundary_is_clean() {
        let (_stdin_read, stdin_write) = tokio::io::duplex(1024);
        let (stdout_read, stdout_write) = tokio::io::duplex(1024);

        let (transport, _rx) = PipeTransport::new(stdin_write, stdout_read);
        let (_sender, receiver) = transport.into_parts();

        drop(stdout_write);

        let result = receiver.run().await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_eof_inside_frame_is_error() {
        let (_stdin_read, stdin_write) = tokio::io::duplex(1024);
        let (stdout_read, mut stdout_write) = tokio::io::duplex(1024);

        let (transport, _rx) = PipeTransport::new(stdin_write, stdout_read);
        let (_sender, receiver) = transport.into_parts();

        // Announce a 100-byte frame but close after 2 bytes.
        stdout_write.write_all(&100u32.to_le_bytes()).await.unwrap();
        stdout_write.write_all(&[0x7b, 0x22]).await.unwrap();
        stdout_write.flush().await.unwrap();
        drop(stdout_write);

        let result = receiver.run().await;
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read frame body")
        );
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (_stdin_read, stdin_write) = tokio::io::duplex(1024);
        let (stdout_read, mut stdout_write) = tokio::io::duplex(1024);

        let (transport, _rx) = PipeTransport::new(stdin_write, stdout_read);
        let (_sender, receiver) = transport.into_parts();

        stdout_write
            .write_all(&u32::MAX.to_le_bytes())
            .await
            .unwrap();
        stdout_write.flush().await.unwrap();

        let result = receiver.run().await;
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("exceeds maximum")
        );
    }
}
