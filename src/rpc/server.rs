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

//! TCP JSON-RPC server.
//!
//! Services are registered up front; `start()` freezes the registry, binds
//! the listener and spawns the accept loop. Each accepted connection gets
//! its own send and receive loops (see [`crate::rpc::pipeline`]).

use anyhow::{anyhow, Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{lookup_host, TcpListener, TcpSocket};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::engine_core::constants::limits;
use crate::engine_core::traits::Service;
use crate::rpc::pipeline::serve_connection;
use crate::rpc::registry::Registry;

pub struct Server {
    config: ServerConfig,
    registry: Registry,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            registry: Registry::new(),
        }
    }

    /// Expose every method of `service` as `"<TypeName>.<method>"`.
    pub fn register<S: Service>(&mut self, service: S) -> &mut Self {
        self.registry.register(service);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the listener and start accepting connections in the background.
    pub async fn start(self) -> Result<RunningServer> {
        let listener = bind(&self.config).await?;
        let local_addr = listener.local_addr()?;
        info!(
            "JSON-RPC server listening on {} ({} methods)",
            local_addr,
            self.registry.len()
        );

        let shutdown = CancellationToken::new();
        let accept = tokio::spawn(accept_loop(
            listener,
            Arc::new(self.registry),
            self.config.max_message_size,
            shutdown.clone(),
        ));

        Ok(RunningServer {
            local_addr,
            shutdown,
            accept,
        })
    }
}

/// Handle to a started server.
pub struct RunningServer {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    accept: JoinHandle<()>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Token that stops the server when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop accepting, cancel every connection and wait until they are gone.
    pub async fn shutdown(self) -> Result<()> {
        self.shutdown.cancel();
        self.accept.await.context("Accept loop panicked")
    }

    /// Wait until the server stops (through its shutdown token).
    pub async fn wait(self) -> Result<()> {
        self.accept.await.context("Accept loop panicked")
    }
}

async fn bind(config: &ServerConfig) -> Result<TcpListener> {
    let address = config.address();
    let addr = lookup_host(&address)
        .await
        .with_context(|| format!("Failed to resolve {address}"))?
        .next()
        .ok_or_else(|| anyhow!("No address found for {address}"))?;

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    set_reuse_port(&socket, config.reuse_port)?;
    socket
        .bind(addr)
        .with_context(|| format!("Failed to bind {addr}"))?;
    Ok(socket.listen(limits::LISTEN_BACKLOG)?)
}

#[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
fn set_reuse_port(socket: &TcpSocket, enabled: bool) -> std::io::Result<()> {
    socket.set_reuseport(enabled)
}

#[cfg(not(all(unix, not(any(target_os = "solaris", target_os = "illumos")))))]
fn set_reuse_port(_socket: &TcpSocket, enabled: bool) -> std::io::Result<()> {
    if enabled {
        warn!("SO_REUSEPORT is not supported on this platform, ignoring");
    }
    Ok(())
}

async fn accept_loop(
    listener: TcpListener,
    registry: Arc<Registry>,
    max_message_size: usize,
    shutdown: CancellationToken,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("Failed to set TCP_NODELAY for {}: {}", peer, e);
                    }
                    debug!("Accepted connection from {}", peer);
                    let registry = Arc::clone(&registry);
                    let token = shutdown.child_token();
                    connections.spawn(async move {
                        match serve_connection(stream, registry, max_message_size, token).await {
                            Ok(()) => debug!("Connection from {} closed", peer),
                            Err(e) => warn!("Connection from {} failed: {:#}", peer, e),
                        }
                    });
                }
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    // Typically fd exhaustion; back off instead of spinning
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    drop(listener);
    debug!("Waiting for {} connection(s) to close", connections.len());
    while connections.join_next().await.is_some() {}
    info!("JSON-RPC server stopped");
}
