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

//! Server and client runtime: registry, dispatch, connection loops,
//! framed client connections, the pool and the correlating client.

pub mod client;
pub mod dispatch;
pub mod pipeline;
pub mod pool;
pub mod registry;
pub mod server;
pub mod transport;

pub use client::{correlate, Client};
pub use pool::{ConnectionPool, PooledConnection};
pub use registry::Registry;
pub use server::{RunningServer, Server};
pub use transport::Connection;
