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

//! JSON-RPC message records.
//!
//! Plain data structures exchanged on the wire. They are built once per
//! call and dropped after the write completes; the `id` field is the only
//! thing used to correlate a response with its request.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine_core::constants::jsonrpc;

/// A well-formed call: string method, positional params, scalar or null id.
///
/// A null id marks a notification. This engine still answers notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub method: String,
    pub params: Vec<Value>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub id: Value,
}

impl Request {
    pub fn new(method: impl Into<String>, params: Vec<Value>, id: impl Into<Value>) -> Self {
        Self {
            jsonrpc: jsonrpc::VERSION.to_string(),
            method: method.into(),
            params,
            id: id.into(),
        }
    }

    pub fn notification(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self::new(method, params, Value::Null)
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_null()
    }
}

/// Request as it arrives from the wire, before validation.
///
/// Every field is kept as raw JSON (missing fields become `null`) so that a
/// structurally broken request can still be answered with its own id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRequest {
    #[serde(default)]
    pub jsonrpc: Value,
    #[serde(default)]
    pub method: Value,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Value,
}

impl From<Request> for RawRequest {
    fn from(req: Request) -> Self {
        Self {
            jsonrpc: Value::String(req.jsonrpc),
            method: Value::String(req.method),
            params: Value::Array(req.params),
            id: req.id,
        }
    }
}

/// Reply to one request. Exactly one of `result` / `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
    #[serde(default)]
    pub id: Value,
}

impl Response {
    pub fn result(values: Vec<Value>, id: Value) -> Self {
        Self {
            jsonrpc: jsonrpc::VERSION.to_string(),
            result: Some(values),
            error: None,
            id,
        }
    }

    pub fn error(error: ErrorObject, id: Value) -> Self {
        Self {
            jsonrpc: jsonrpc::VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i32,
    pub message: String,
    /// `Some(Value::Null)` is written as an absent field.
    #[serde(default, skip_serializing_if = "data_is_absent")]
    pub data: Option<Value>,
}

fn data_is_absent(data: &Option<Value>) -> bool {
    matches!(data, None | Some(Value::Null))
}

impl ErrorObject {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = (!data.is_null()).then_some(data);
        self
    }

    pub fn parse_error() -> Self {
        Self::new(jsonrpc::ERROR_PARSE, jsonrpc::MESSAGE_PARSE)
    }

    pub fn invalid_request() -> Self {
        Self::new(jsonrpc::ERROR_INVALID_REQUEST, jsonrpc::MESSAGE_INVALID_REQUEST)
    }

    pub fn method_not_found() -> Self {
        Self::new(jsonrpc::ERROR_METHOD_NOT_FOUND, jsonrpc::MESSAGE_METHOD_NOT_FOUND)
    }

    pub fn internal_error() -> Self {
        Self::new(jsonrpc::ERROR_INTERNAL, jsonrpc::MESSAGE_INTERNAL)
    }
}
