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

//! JSON-RPC payload encoding.
//!
//! Decides single vs. batch from the JSON root type (object vs. array),
//! validates request shape, and serializes replies into framed bytes.

use anyhow::{Context, Result};
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::trace;

use crate::engine_core::constants::framing;
use crate::engine_core::errors::{DispatchError, ParseError};
use crate::engine_core::models::{RawRequest, Request, Response};
use crate::protocol::framing::frame;

/// Outbound queue of already-framed messages for one connection.
///
/// Bounded: a peer that stops reading stalls the dispatcher instead of
/// growing the queue.
pub type OutboundQueue = mpsc::Sender<Bytes>;

/// Decode a request payload into `(is_single, requests)`.
///
/// A root object is a single request, a root array is a batch. Anything
/// else, an empty batch, or undecodable bytes is a [`ParseError`]. A batch
/// element that is not an object is kept as an all-null request so that it
/// is answered with -32600 without aborting its siblings.
pub fn parse_requests(payload: &[u8]) -> Result<(bool, Vec<RawRequest>), ParseError> {
    let root: Value = serde_json::from_slice(payload)?;
    match root {
        Value::Object(_) => Ok((true, vec![raw_request(root)])),
        Value::Array(items) => {
            if items.is_empty() {
                return Err(ParseError("empty batch".to_string()));
            }
            Ok((false, items.into_iter().map(raw_request).collect()))
        }
        other => Err(ParseError(format!(
            "expected an object or an array, found {}",
            json_kind(&other)
        ))),
    }
}

fn raw_request(value: Value) -> RawRequest {
    match value {
        Value::Object(_) => serde_json::from_value(value).unwrap_or_default(),
        _ => RawRequest::default(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn is_scalar_or_null(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

/// True iff `method` is a string, `id` is scalar or null, `params` is a sequence.
pub fn valid_request(raw: &RawRequest) -> bool {
    raw.method.is_string() && is_scalar_or_null(&raw.id) && raw.params.is_array()
}

/// Turn a wire request into a typed [`Request`].
///
/// On failure the error carries the id to echo back. A non-scalar id cannot
/// be echoed and is reported as null.
pub fn validate(raw: RawRequest) -> Result<Request, DispatchError> {
    if !valid_request(&raw) {
        let id = if is_scalar_or_null(&raw.id) {
            raw.id
        } else {
            Value::Null
        };
        return Err(DispatchError::InvalidRequest { id });
    }

    let jsonrpc = match raw.jsonrpc {
        Value::String(v) => v,
        _ => crate::engine_core::constants::jsonrpc::VERSION.to_string(),
    };
    let (Value::String(method), Value::Array(params)) = (raw.method, raw.params) else {
        return Err(DispatchError::InvalidRequest { id: raw.id });
    };

    Ok(Request {
        jsonrpc,
        method,
        params,
        id: raw.id,
    })
}

/// Decode a response payload (client side). Same root-type rule as requests.
pub fn parse_responses(payload: &[u8]) -> Result<Vec<Response>, ParseError> {
    let root: Value = serde_json::from_slice(payload)?;
    let items = match root {
        Value::Object(_) => vec![root],
        Value::Array(items) if !items.is_empty() => items,
        Value::Array(_) => return Err(ParseError("empty batch".to_string())),
        other => {
            return Err(ParseError(format!(
                "expected an object or an array, found {}",
                json_kind(&other)
            )))
        }
    };

    items
        .into_iter()
        .map(|item| {
            let resp: Response = serde_json::from_value(item)?;
            if resp.result.is_some() == resp.error.is_some() {
                return Err(ParseError(
                    "response must carry exactly one of result or error".to_string(),
                ));
            }
            Ok(resp)
        })
        .collect()
}

/// Serialize `items` as one object when single, else as an array, and frame it.
fn encode<T: Serialize>(is_single: bool, items: &[T]) -> serde_json::Result<Bytes> {
    let body = match items {
        [only] if is_single => serde_json::to_vec(only)?,
        _ => serde_json::to_vec(items)?,
    };
    trace!("Encoded {} bytes", body.len());
    Ok(frame(&body, framing::SENTINEL))
}

/// Encode a single request or a batch as one framed message.
pub fn encode_requests(is_single: bool, requests: &[Request]) -> serde_json::Result<Bytes> {
    encode(is_single, requests)
}

/// Encode a reply as one framed message.
pub fn encode_responses(is_single: bool, responses: &[Response]) -> serde_json::Result<Bytes> {
    encode(is_single, responses)
}

/// Encode `responses` and push the framed bytes onto the outbound queue.
///
/// Waits while the queue is full; the connection's send loop performs the write.
pub async fn send(queue: &OutboundQueue, is_single: bool, responses: &[Response]) -> Result<()> {
    let framed = encode_responses(is_single, responses).context("Failed to serialize response")?;
    queue
        .send(framed)
        .await
        .map_err(|_| anyhow::anyhow!("Outbound queue closed"))
}
