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

//! wirerpc Constants - Single source of truth for all configuration values.
//!
//! This module centralizes protocol error codes, framing bytes and
//! configuration defaults so the server and the client agree on them.

/// JSON-RPC 2.0 Error Codes
pub mod jsonrpc {
    /// Protocol version carried by every request and response
    pub const VERSION: &str = "2.0";

    /// Parse error (standard JSON-RPC)
    pub const ERROR_PARSE: i32 = -32700;
    /// Invalid request (standard JSON-RPC)
    pub const ERROR_INVALID_REQUEST: i32 = -32600;
    /// Method not found (standard JSON-RPC)
    pub const ERROR_METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params (standard JSON-RPC), available to handlers
    pub const ERROR_INVALID_PARAMS: i32 = -32602;
    /// Internal error (standard JSON-RPC), only used when a handler panics
    pub const ERROR_INTERNAL: i32 = -32603;

    pub const MESSAGE_PARSE: &str = "Parse error";
    pub const MESSAGE_INVALID_REQUEST: &str = "Invalid Request";
    pub const MESSAGE_METHOD_NOT_FOUND: &str = "Method not found";
    pub const MESSAGE_INVALID_PARAMS: &str = "Invalid params";
    pub const MESSAGE_INTERNAL: &str = "Internal error";
}

/// Message framing on the byte stream
pub mod framing {
    /// End-of-message marker appended after every JSON payload.
    /// Compact serde_json output never contains a raw newline.
    pub const SENTINEL: &[u8] = b"\n";
}

/// Transport Limits (DoS Protection)
pub mod limits {
    /// Maximum allowed framed message size (10 MB)
    pub const MAX_MESSAGE_SIZE_BYTES: usize = 10 * 1024 * 1024;
    /// Backlog passed to listen(2)
    pub const LISTEN_BACKLOG: u32 = 1024;
    /// Encoded replies buffered per connection before dispatch waits on the writer
    pub const OUTBOUND_QUEUE_CAPACITY: usize = 64;
}

/// Connection pool defaults
pub mod pool {
    pub const DEFAULT_MAX_OPEN: usize = 10;
    pub const DEFAULT_MAX_IDLE: usize = 5;
    pub const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 30_000;
    pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
    pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
}

/// Configuration Environment Variables
pub mod config {
    pub const ENV_HOST: &str = "WIRERPC_HOST";
    pub const ENV_PORT: &str = "WIRERPC_PORT";
    pub const ENV_REUSE_PORT: &str = "WIRERPC_REUSE_PORT";
    pub const ENV_POOL_MAX_OPEN: &str = "WIRERPC_POOL_MAX_OPEN";
    pub const ENV_POOL_MAX_IDLE: &str = "WIRERPC_POOL_MAX_IDLE";
    pub const ENV_ACQUIRE_TIMEOUT_MS: &str = "WIRERPC_ACQUIRE_TIMEOUT_MS";
    pub const ENV_REQUEST_TIMEOUT_MS: &str = "WIRERPC_REQUEST_TIMEOUT_MS";
    pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
    pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";

    pub const DEFAULT_HOST: &str = "127.0.0.1";
    pub const DEFAULT_PORT: u16 = 9234;
}
