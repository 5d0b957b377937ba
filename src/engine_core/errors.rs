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

// Error taxonomy shared by the server and the client

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::engine_core::constants::jsonrpc;
use crate::engine_core::models::{ErrorObject, Response};

/// Malformed top-level payload. Always answered with a single -32700.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Parse error: {0}")]
pub struct ParseError(pub String);

impl From<serde_json::Error> for ParseError {
    fn from(e: serde_json::Error) -> Self {
        ParseError(e.to_string())
    }
}

/// Failure raised by a service handler.
///
/// The code and message travel back to the caller verbatim.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("[{code}] {message}")]
pub struct HandlerError {
    pub code: i32,
    pub message: String,
    pub data: Option<Value>,
}

impl HandlerError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Convenience for handlers rejecting their positional arguments.
    pub fn invalid_params(detail: impl std::fmt::Display) -> Self {
        Self::new(jsonrpc::ERROR_INVALID_PARAMS, jsonrpc::MESSAGE_INVALID_PARAMS)
            .with_data(Value::String(detail.to_string()))
    }
}

impl From<HandlerError> for ErrorObject {
    fn from(e: HandlerError) -> Self {
        ErrorObject {
            code: e.code,
            message: e.message,
            data: e.data,
        }
    }
}

/// Per-request failure inside a dispatched batch.
///
/// Each variant carries the id of the request it belongs to so the error
/// response can still be correlated. Siblings in the batch are unaffected.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Invalid Request")]
    InvalidRequest { id: Value },

    #[error("Method not found: {method}")]
    MethodNotFound { method: String, id: Value },

    #[error("Handler failed: {source}")]
    Handler {
        id: Value,
        #[source]
        source: HandlerError,
    },

    #[error("Handler panicked")]
    Panicked { id: Value },
}

impl DispatchError {
    pub fn id(&self) -> &Value {
        match self {
            DispatchError::InvalidRequest { id }
            | DispatchError::MethodNotFound { id, .. }
            | DispatchError::Handler { id, .. }
            | DispatchError::Panicked { id } => id,
        }
    }

    pub fn into_response(self) -> Response {
        match self {
            DispatchError::InvalidRequest { id } => {
                Response::error(ErrorObject::invalid_request(), id)
            }
            DispatchError::MethodNotFound { id, .. } => {
                Response::error(ErrorObject::method_not_found(), id)
            }
            DispatchError::Handler { id, source } => Response::error(source.into(), id),
            DispatchError::Panicked { id } => Response::error(ErrorObject::internal_error(), id),
        }
    }
}

/// Connection-level failures.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The peer closed its end. Not an error for a server connection.
    #[error("Peer closed the connection")]
    PeerClosed,

    #[error("I/O error: {0}")]
    Io(std::io::Error),

    #[error("Message length {len} exceeds max limit of {limit} bytes")]
    FrameTooLarge { len: usize, limit: usize },

    #[error("Connection closed with {0} bytes of an unterminated message")]
    TruncatedFrame(usize),

    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("No pooled connection became available within {0:?}")]
    PoolTimeout(Duration),

    #[error("Connection pool is closed")]
    PoolClosed,
}

// Resets and aborts are the peer going away, same as a clean EOF
impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match e.kind() {
            ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof => TransportError::PeerClosed,
            _ => TransportError::Io(e),
        }
    }
}

impl TransportError {
    pub fn is_peer_closed(&self) -> bool {
        matches!(self, TransportError::PeerClosed)
    }
}

/// Errors surfaced to callers of `Client::call` / `Client::call_multiple`.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Response correlation failed: {0}")]
    Correlation(String),

    #[error("Server rejected the payload: [{}] {}", .0.code, .0.message)]
    Rejected(ErrorObject),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {var}")]
    InvalidValue { var: &'static str, value: String },
}
