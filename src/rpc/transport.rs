// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Client-side framed TCP connection.
//!
//! `send` writes one already-framed message, `recv` yields exactly one
//! delimited message, and a closed peer is reported as
//! [`TransportError::PeerClosed`].

use bytes::BytesMut;
use futures_util::StreamExt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::FramedRead;
use tracing::{debug, trace};

use crate::engine_core::errors::TransportError;
use crate::protocol::framing::FrameCodec;

pub struct Connection {
    frames: FramedRead<OwnedReadHalf, FrameCodec>,
    writer: OwnedWriteHalf,
    peer: SocketAddr,
}

impl Connection {
    pub async fn connect(
        address: &str,
        connect_timeout: Duration,
        max_message_size: usize,
    ) -> Result<Self, TransportError> {
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| TransportError::Timeout(connect_timeout))?
            .map_err(|source| TransportError::Connect {
                addr: address.to_string(),
                source,
            })?;
        stream.set_nodelay(true)?;
        let conn = Self::from_stream(stream, max_message_size)?;
        debug!("Connected to {}", conn.peer);
        Ok(conn)
    }

    pub fn from_stream(stream: TcpStream, max_message_size: usize) -> Result<Self, TransportError> {
        let peer = stream.peer_addr()?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            frames: FramedRead::new(reader, FrameCodec::new().max_message_size(max_message_size)),
            writer,
            peer,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.writer.local_addr()?)
    }

    /// Write one framed message.
    pub async fn send(&mut self, framed: &[u8]) -> Result<(), TransportError> {
        trace!("Sending {} bytes to {}", framed.len(), self.peer);
        self.writer.write_all(framed).await?;
        Ok(())
    }

    /// Wait for the next framed message.
    pub async fn recv(&mut self) -> Result<BytesMut, TransportError> {
        match self.frames.next().await {
            Some(message) => message,
            None => Err(TransportError::PeerClosed),
        }
    }

    /// Cheap liveness check for an idle connection.
    ///
    /// Dead if the peer closed it, if bytes arrived that nobody asked for,
    /// or if a previous reply left data in the read buffer.
    pub fn is_alive(&self) -> bool {
        if !self.frames.read_buffer().is_empty() {
            return false;
        }
        let mut peek = [0u8; 1];
        match self.frames.get_ref().try_read(&mut peek) {
            Ok(_) => false,
            Err(e) => e.kind() == io::ErrorKind::WouldBlock,
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").field("peer", &self.peer).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_send_recv_and_peer_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 3];
            stream.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b"{}\n");
            // Two replies in one segment, then close
            stream.write_all(b"[1]\n[2]\n").await.unwrap();
        });

        let mut conn = Connection::connect(&addr, Duration::from_secs(1), 1024)
            .await
            .unwrap();
        conn.send(b"{}\n").await.unwrap();
        assert_eq!(&conn.recv().await.unwrap()[..], b"[1]");
        assert_eq!(&conn.recv().await.unwrap()[..], b"[2]");
        server.await.unwrap();
        assert!(conn.recv().await.unwrap_err().is_peer_closed());
    }

    #[tokio::test]
    async fn test_is_alive_detects_closed_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let conn = Connection::connect(&addr, Duration::from_secs(1), 1024)
            .await
            .unwrap();
        let (stream, _) = listener.accept().await.unwrap();
        assert!(conn.is_alive());

        drop(stream);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!conn.is_alive());
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = Connection::connect(&addr, Duration::from_secs(1), 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }
}
