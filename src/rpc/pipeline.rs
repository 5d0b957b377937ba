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

//! Per-connection send and receive loops of the server.

use anyhow::{Context, Result};
use bytes::Bytes;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::engine_core::constants::limits;
use crate::engine_core::errors::TransportError;
use crate::protocol::framing::FrameCodec;
use crate::protocol::payload::OutboundQueue;
use crate::rpc::dispatch::dispatch;
use crate::rpc::registry::Registry;

/// Drain the outbound queue into the socket.
///
/// Returns `Ok` once every sender is gone. A failed write shuts the socket
/// down and is returned so the connection's other tasks stop too.
pub async fn send_loop<W>(mut writer: W, mut queue: mpsc::Receiver<Bytes>) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(framed) = queue.recv().await {
        trace!("Sending {} bytes", framed.len());
        if let Err(e) = writer.write_all(&framed).await {
            let _ = writer.shutdown().await;
            return Err(e.into());
        }
    }
    writer.flush().await?;
    let _ = writer.shutdown().await;
    Ok(())
}

/// Read framed messages and dispatch them one after another.
///
/// The peer closing its end ends the loop without error. The queue is
/// dropped on return, which lets the send loop finish.
pub async fn receive_loop<R>(
    frames: &mut FramedRead<R, FrameCodec>,
    registry: &Arc<Registry>,
    queue: OutboundQueue,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    loop {
        match frames.next().await {
            None | Some(Err(TransportError::PeerClosed)) => {
                debug!("Peer closed the connection");
                return Ok(());
            }
            Some(Err(e)) => return Err(e).context("Failed to read message"),
            Some(Ok(payload)) => {
                trace!("Received {} bytes", payload.len());
                dispatch(&payload, registry, &queue).await?;
            }
        }
    }
}

/// Serve one accepted connection until the peer leaves, a write fails, or
/// `shutdown` fires.
pub async fn serve_connection(
    stream: TcpStream,
    registry: Arc<Registry>,
    max_message_size: usize,
    shutdown: CancellationToken,
) -> Result<()> {
    let (reader, writer) = stream.into_split();
    let (queue, outbound) = mpsc::channel(limits::OUTBOUND_QUEUE_CAPACITY);
    let mut send_task = tokio::spawn(send_loop(writer, outbound));
    let mut frames = FramedRead::new(reader, FrameCodec::new().max_message_size(max_message_size));

    tokio::select! {
        received = receive_loop(&mut frames, &registry, queue) => {
            // Queue is closed now: let the send loop flush what is left,
            // unless the server stops first
            tokio::select! {
                sent = &mut send_task => flatten(sent).and(received),
                _ = shutdown.cancelled() => {
                    send_task.abort();
                    debug!("Connection cancelled by server shutdown while flushing");
                    received
                }
            }
        }
        sent = &mut send_task => flatten(sent),
        _ = shutdown.cancelled() => {
            send_task.abort();
            debug!("Connection cancelled by server shutdown");
            Ok(())
        }
    }
}

fn flatten(joined: Result<Result<(), TransportError>, tokio::task::JoinError>) -> Result<()> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) if e.is_peer_closed() => Ok(()),
        Ok(Err(e)) => Err(e).context("Failed to write message"),
        Err(e) => Err(e).context("Send loop aborted"),
    }
}
