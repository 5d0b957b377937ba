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

//! Pooled JSON-RPC client.
//!
//! A call checks out one connection for its whole round trip: one framed
//! message out, one framed message back. Batch replies are matched to the
//! requests by `id`, since the server answers in completion order.

use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::PoolConfig;
use crate::engine_core::constants::jsonrpc;
use crate::engine_core::errors::{ClientError, TransportError};
use crate::engine_core::models::{Request, Response};
use crate::protocol::payload::{encode_requests, parse_responses};
use crate::rpc::pool::ConnectionPool;

pub struct Client {
    pool: ConnectionPool,
    request_timeout: Option<Duration>,
    next_id: AtomicU64,
}

impl Client {
    pub fn new(pool: ConnectionPool) -> Self {
        Self {
            request_timeout: pool.config().request_timeout,
            pool,
            next_id: AtomicU64::new(1),
        }
    }

    /// Client with its own pool. No connection is opened until the first call.
    pub fn connect(config: PoolConfig) -> Self {
        Self::new(ConnectionPool::new(config))
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Fresh request id, unique for the lifetime of this client.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Send one request and wait for its reply.
    pub async fn call(&self, request: Request) -> Result<Response, ClientError> {
        let mut replies = self.round_trip(true, std::slice::from_ref(&request)).await?;
        if replies.len() != 1 {
            return Err(ClientError::Correlation(format!(
                "expected 1 response, got {}",
                replies.len()
            )));
        }
        let reply = replies.remove(0);
        // A null id is how the server answers a payload it could not read
        if !reply.id.is_null() && reply.id != request.id {
            return Err(ClientError::Correlation(format!(
                "response id {} does not match request id {}",
                reply.id, request.id
            )));
        }
        Ok(reply)
    }

    /// Send `requests` as one batch. The result is aligned with `requests`.
    pub async fn call_multiple(&self, requests: Vec<Request>) -> Result<Vec<Response>, ClientError> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        let replies = self.round_trip(false, &requests).await?;
        correlate(&requests, replies)
    }

    /// Send `requests` as one batch and return the replies in server order.
    pub async fn call_unordered(&self, requests: Vec<Request>) -> Result<Vec<Response>, ClientError> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        self.round_trip(false, &requests).await
    }

    async fn round_trip(&self, is_single: bool, requests: &[Request]) -> Result<Vec<Response>, ClientError> {
        let framed = encode_requests(is_single, requests)?;
        let mut conn = self.pool.acquire().await?;

        let exchange = async {
            conn.send(&framed).await?;
            conn.recv().await
        };
        let received = match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .unwrap_or(Err(TransportError::Timeout(limit))),
            None => exchange.await,
        };

        match received {
            Ok(payload) => {
                let replies = parse_responses(&payload);
                if replies.is_err() {
                    conn.mark_broken();
                }
                Ok(replies?)
            }
            Err(e) => {
                // Whatever arrives late on this connection belongs to this call
                debug!("Discarding connection to {} after {}", conn.peer_addr(), e);
                conn.discard();
                Err(e.into())
            }
        }
    }
}

/// Match `replies` to `requests` by id. The output has one response per
/// request, in request order. Requests sharing an id take replies with that
/// id first come, first served.
pub fn correlate(requests: &[Request], replies: Vec<Response>) -> Result<Vec<Response>, ClientError> {
    if let [only] = replies.as_slice() {
        let unreadable = only
            .error
            .as_ref()
            .is_some_and(|e| e.code == jsonrpc::ERROR_PARSE);
        if unreadable && only.id.is_null() {
            if let Some(error) = replies.into_iter().next().and_then(|r| r.error) {
                warn!("Batch rejected by server: [{}] {}", error.code, error.message);
                return Err(ClientError::Rejected(error));
            }
            return Err(ClientError::Correlation("empty rejection".to_string()));
        }
    }

    let mut slots: HashMap<String, VecDeque<usize>> = HashMap::new();
    for (index, request) in requests.iter().enumerate() {
        slots.entry(slot_key(&request.id)).or_default().push_back(index);
    }

    let mut filled: Vec<Option<Response>> = vec![None; requests.len()];
    for reply in replies {
        let index = slots
            .get_mut(&slot_key(&reply.id))
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| {
                ClientError::Correlation(format!("unexpected response with id {}", reply.id))
            })?;
        filled[index] = Some(reply);
    }

    filled
        .into_iter()
        .zip(requests)
        .map(|(reply, request)| {
            reply.ok_or_else(|| {
                ClientError::Correlation(format!("no response for request id {}", request.id))
            })
        })
        .collect()
}

// The server echoes a non-scalar id as null
fn slot_key(id: &Value) -> String {
    match id {
        Value::Array(_) | Value::Object(_) => Value::Null.to_string(),
        scalar => scalar.to_string(),
    }
}
