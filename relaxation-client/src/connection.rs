//! The single TCP stream to the coordinator.
//!
//! [`Connection`] owns the stream for its whole lifetime. Dropping it releases
//! the socket, so every exit path of the exchange closes it exactly once;
//! [`Connection::close`] adds an orderly write shutdown for the paths that end
//! without an error.

use std::{io, net::SocketAddr};

use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
};
use tracing::{debug, info, warn};

use crate::{
    codec::{Codec, MESSAGE_LEN, Message},
    error::{ClientError, Result, SendStage},
};

/// What one receive produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Received {
    Message(Message),
    /// The coordinator closed the stream on a message boundary.
    Closed,
}

pub struct Connection<S = TcpStream> {
    stream: S,
    codec: Codec,
    peer: Option<SocketAddr>,
}

impl Connection<TcpStream> {
    /// Opens the stream. A refused or failed connect is final.
    pub async fn connect(addr: SocketAddr, codec: Codec) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ClientError::Connect { addr, source })?;

        info!(peer = %addr, byte_order = ?codec.byte_order(), "connected to coordinator");

        let mut connection = Self::from_stream(stream, codec);
        connection.peer = Some(addr);
        Ok(connection)
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn from_stream(stream: S, codec: Codec) -> Self {
        Self {
            stream,
            codec,
            peer: None,
        }
    }

    /// Writes one full record; `stage` names it in the error if the write fails.
    pub async fn send_message(&mut self, message: &Message, stage: SendStage) -> Result<()> {
        let frame = self.codec.encode(message);
        self.write_frame(&frame)
            .await
            .map_err(|source| ClientError::Send { stage, source })?;

        debug!(
            index = message.index,
            temperature = message.temperature,
            "sent message"
        );
        Ok(())
    }

    async fn write_frame(&mut self, frame: &[u8; MESSAGE_LEN]) -> io::Result<()> {
        self.stream.write_all(frame).await?;
        self.stream.flush().await
    }

    /// Waits for one full record, reassembling it if the coordinator's bytes
    /// arrive in pieces.
    ///
    /// End of stream before any byte of a record is [`Received::Closed`]; end
    /// of stream inside a record is a receive error. A reset before the first
    /// byte also counts as closed: a coordinator that hangs up with our report
    /// still unread makes the kernel answer with RST instead of FIN.
    pub async fn receive_message(&mut self) -> Result<Received> {
        let mut frame = [0u8; MESSAGE_LEN];
        let mut filled = 0;

        while filled < MESSAGE_LEN {
            let read = match self.stream.read(&mut frame[filled..]).await {
                Ok(read) => read,
                Err(error) if filled == 0 && error.kind() == io::ErrorKind::ConnectionReset => {
                    debug!(?error, "coordinator reset the stream");
                    return Ok(Received::Closed);
                }
                Err(error) => return Err(ClientError::Recv(error)),
            };

            if read == 0 {
                if filled == 0 {
                    debug!("coordinator closed the stream");
                    return Ok(Received::Closed);
                }
                return Err(ClientError::Recv(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("stream ended after {filled} of {MESSAGE_LEN} bytes"),
                )));
            }
            filled += read;
        }

        let message = self.codec.decode(&frame)?;
        debug!(
            index = message.index,
            temperature = message.temperature,
            "received message"
        );
        Ok(Received::Message(message))
    }

    /// Shuts down the write half, then drops the stream.
    pub async fn close(mut self) {
        if let Err(error) = self.stream.shutdown().await {
            warn!(?error, peer = ?self.peer, "failed to shut down coordinator stream cleanly");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        pin::Pin,
        task::{Context, Poll},
    };

    use tokio::io::{ReadBuf, duplex};

    use super::*;
    use crate::codec::ByteOrder;

    /// Yields `prefix`, then fails every read the way a reset socket does.
    struct ResetAfter {
        prefix: Vec<u8>,
    }

    impl AsyncRead for ResetAfter {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if self.prefix.is_empty() {
                return Poll::Ready(Err(io::ErrorKind::ConnectionReset.into()));
            }
            let len = self.prefix.len().min(buf.remaining());
            buf.put_slice(&self.prefix[..len]);
            let rest = self.prefix.split_off(len);
            self.prefix = rest;
            Poll::Ready(Ok(()))
        }
    }

    impl AsyncWrite for ResetAfter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn sends_fixed_width_records() {
        let (client, mut coordinator) = duplex(64);
        let mut connection = Connection::from_stream(client, Codec::default());

        connection
            .send_message(&Message::new(1, 100.0), SendStage::Initial)
            .await
            .expect("send");

        let mut frame = [0u8; MESSAGE_LEN];
        coordinator.read_exact(&mut frame).await.expect("read");
        assert_eq!(
            Codec::default().decode(&frame).expect("decode"),
            Message::new(1, 100.0)
        );
    }

    #[tokio::test]
    async fn reassembles_a_record_split_across_writes() {
        let (client, mut coordinator) = duplex(64);
        let codec = Codec::new(ByteOrder::Big);
        let mut connection = Connection::from_stream(client, codec);

        let frame = codec.encode(&Message::new(3, 21.5));
        let writer = tokio::spawn(async move {
            coordinator.write_all(&frame[..3]).await.expect("first part");
            tokio::task::yield_now().await;
            coordinator.write_all(&frame[3..]).await.expect("second part");
            coordinator
        });

        let received = connection.receive_message().await.expect("receive");
        assert_eq!(received, Received::Message(Message::new(3, 21.5)));
        drop(writer.await.expect("writer task"));
    }

    #[tokio::test]
    async fn zero_bytes_is_closed() {
        let (client, coordinator) = duplex(64);
        let mut connection = Connection::from_stream(client, Codec::default());
        drop(coordinator);

        let received = connection.receive_message().await.expect("receive");
        assert_eq!(received, Received::Closed);
    }

    #[tokio::test]
    async fn truncated_record_is_a_receive_error() {
        let (client, mut coordinator) = duplex(64);
        let mut connection = Connection::from_stream(client, Codec::default());

        coordinator.write_all(&[0x01, 0x00, 0x00]).await.expect("write");
        drop(coordinator);

        let err = connection
            .receive_message()
            .await
            .expect_err("partial record must fail");
        match err {
            ClientError::Recv(source) => {
                assert_eq!(source.kind(), io::ErrorKind::UnexpectedEof)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_to_a_closed_peer_reports_the_stage() {
        let (client, coordinator) = duplex(64);
        let mut connection = Connection::from_stream(client, Codec::default());
        drop(coordinator);

        let err = connection
            .send_message(&Message::new(1, 1.0), SendStage::Update)
            .await
            .expect_err("peer is gone");
        assert!(matches!(
            err,
            ClientError::Send {
                stage: SendStage::Update,
                ..
            }
        ));
        assert_eq!(err.to_string(), "unable to send updated temperature");
    }

    #[tokio::test]
    async fn reset_before_a_record_is_closed() {
        let stream = ResetAfter { prefix: Vec::new() };
        let mut connection = Connection::from_stream(stream, Codec::default());

        let received = connection.receive_message().await.expect("receive");
        assert_eq!(received, Received::Closed);
    }

    #[tokio::test]
    async fn reset_inside_a_record_is_a_receive_error() {
        let stream = ResetAfter {
            prefix: vec![0x01, 0x00],
        };
        let mut connection = Connection::from_stream(stream, Codec::default());

        let err = connection
            .receive_message()
            .await
            .expect_err("partial record must fail");
        match err {
            ClientError::Recv(source) => {
                assert_eq!(source.kind(), io::ErrorKind::ConnectionReset)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn close_signals_end_of_stream_to_the_peer() {
        let (client, mut coordinator) = duplex(64);
        let connection = Connection::from_stream(client, Codec::default());
        connection.close().await;

        let mut rest = Vec::new();
        let read = coordinator.read_to_end(&mut rest).await.expect("read");
        assert_eq!(read, 0);
    }
}
