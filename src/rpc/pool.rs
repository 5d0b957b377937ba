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

//! Bounded client connection pool.
//!
//! At most `max_open` connections are checked out at once (a semaphore
//! slot per checkout). Idle connections are checked before reuse and a
//! connection marked broken is dropped instead of going back to the pool.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, trace};

use crate::config::PoolConfig;
use crate::engine_core::errors::TransportError;
use crate::rpc::transport::Connection;

#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    config: PoolConfig,
    address: String,
    slots: Arc<Semaphore>,
    // Never held across an await
    idle: Mutex<Vec<Connection>>,
}

impl PoolInner {
    fn take_idle(&self) -> Option<Connection> {
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        while let Some(conn) = idle.pop() {
            if conn.is_alive() {
                return Some(conn);
            }
            debug!("Discarding stale connection to {}", conn.peer_addr());
        }
        None
    }

    fn release(&self, conn: Connection) {
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.config.max_idle {
            trace!("Returning connection to {} to the pool", conn.peer_addr());
            idle.push(conn);
        }
    }
}

impl ConnectionPool {
    pub fn new(config: PoolConfig) -> Self {
        let address = config.address();
        Self {
            inner: Arc::new(PoolInner {
                slots: Arc::new(Semaphore::new(config.max_open)),
                idle: Mutex::new(Vec::with_capacity(config.max_idle)),
                address,
                config,
            }),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Check out a connection: a healthy idle one, or a fresh one while
    /// fewer than `max_open` are in use. Waits up to `acquire_timeout`
    /// when the pool is exhausted.
    pub async fn acquire(&self) -> Result<PooledConnection, TransportError> {
        let slots = Arc::clone(&self.inner.slots);
        let permit = match self.inner.config.acquire_timeout {
            Some(limit) => tokio::time::timeout(limit, slots.acquire_owned())
                .await
                .map_err(|_| TransportError::PoolTimeout(limit))?,
            None => slots.acquire_owned().await,
        }
        .map_err(|_| TransportError::PoolClosed)?;

        let conn = match self.inner.take_idle() {
            Some(conn) => conn,
            None => {
                Connection::connect(
                    &self.inner.address,
                    self.inner.config.connect_timeout,
                    self.inner.config.max_message_size,
                )
                .await?
            }
        };

        Ok(PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(&self.inner),
            broken: false,
            _permit: permit,
        })
    }

    /// Connections waiting for reuse.
    pub fn idle_count(&self) -> usize {
        self.inner
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Free checkout slots.
    pub fn available(&self) -> usize {
        self.inner.slots.available_permits()
    }

    /// Refuse further checkouts and drop the idle connections.
    pub fn close(&self) {
        self.inner.slots.close();
        self.inner
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// A checked-out connection. Dropping it releases it back to the pool.
pub struct PooledConnection {
    conn: Option<Connection>,
    pool: Arc<PoolInner>,
    broken: bool,
    // Dropped after `Drop::drop` returned the connection, so a waiter finds it idle
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// Flag the connection so it is closed instead of reused.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    /// Close the connection and free its slot.
    pub fn discard(mut self) {
        self.mark_broken();
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("broken", &self.broken)
            .finish_non_exhaustive()
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection present until drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if self.broken {
                debug!("Dropping broken connection to {}", conn.peer_addr());
            } else {
                self.pool.release(conn);
            }
        }
    }
}
