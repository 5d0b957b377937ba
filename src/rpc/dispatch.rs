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

//! Fan-out / fan-in dispatch of one decoded payload.
//!
//! Every request of a batch runs in its own task. Results are collected in
//! completion order through a `JoinSet`, so the reply is NOT in request
//! order: callers correlate by `id`.

use anyhow::Result;
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::engine_core::errors::DispatchError;
use crate::engine_core::models::{ErrorObject, RawRequest, Response};
use crate::protocol::payload::{parse_requests, send, validate, OutboundQueue};
use crate::rpc::registry::Registry;

/// Decode `payload`, run every request, and queue one framed reply.
pub async fn dispatch(payload: &[u8], registry: &Arc<Registry>, queue: &OutboundQueue) -> Result<()> {
    let (is_single, requests) = match parse_requests(payload) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!("Rejecting payload: {}", e);
            let reply = Response::error(ErrorObject::parse_error(), Value::Null);
            return send(queue, true, &[reply]).await;
        }
    };

    let count = requests.len();
    let responses = fan_out(requests, registry).await;
    debug!(
        "Dispatched {} request(s), replying with {} response(s)",
        count,
        responses.len()
    );
    send(queue, is_single, &responses).await
}

/// Run each request in its own task and gather the responses as they finish.
pub async fn fan_out(requests: Vec<RawRequest>, registry: &Arc<Registry>) -> Vec<Response> {
    let mut tasks = JoinSet::new();
    for raw in requests {
        let registry = Arc::clone(registry);
        tasks.spawn(async move {
            execute(raw, &registry)
                .await
                .unwrap_or_else(DispatchError::into_response)
        });
    }

    let mut responses = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(response) => responses.push(response),
            // Handler panics are caught inside the task; this is a cancelled runtime
            Err(e) => error!("Dispatch task failed: {}", e),
        }
    }
    responses
}

/// Validate, look up and invoke a single request.
pub async fn execute(raw: RawRequest, registry: &Registry) -> Result<Response, DispatchError> {
    let request = validate(raw)?;
    let Some(handle) = registry.lookup(&request.method) else {
        return Err(DispatchError::MethodNotFound {
            method: request.method,
            id: request.id,
        });
    };

    let outcome = AssertUnwindSafe(handle.invoke(request.params))
        .catch_unwind()
        .await;
    match outcome {
        Ok(Ok(value)) => Ok(Response::result(into_result(value), request.id)),
        Ok(Err(source)) => {
            debug!("{} failed: {}", request.method, source);
            Err(DispatchError::Handler {
                id: request.id,
                source,
            })
        }
        Err(_) => {
            warn!("{} panicked", request.method);
            Err(DispatchError::Panicked { id: request.id })
        }
    }
}

/// Arrays are the result sequence as-is; anything else becomes `[value]`.
fn into_result(value: Value) -> Vec<Value> {
    match value {
        Value::Array(values) => values,
        other => vec![other],
    }
}
