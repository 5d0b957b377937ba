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

//! wirerpc: JSON-RPC 2.0 over sentinel-framed TCP.
//!
//! A server that fans every request of a batch out to its own task and
//! replies in completion order, and a pooled client that matches the
//! replies back to its requests by `id`.

pub mod config;
pub mod engine_core;
pub mod protocol;
pub mod rpc;
pub mod services;
