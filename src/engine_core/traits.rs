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

//! Service Trait.
//!
//! Defines the interface through which user code exposes operations to the
//! dispatch engine. Every name returned by [`Service::methods`] is installed
//! in the registry as `"<TypeName>.<method>"`.

use async_trait::async_trait;
use serde_json::Value;

use crate::engine_core::errors::HandlerError;

#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Public operations of this service, by bare name.
    fn methods(&self) -> &'static [&'static str];

    /// Invoke `method` with positional `params`.
    ///
    /// An array result is sent back as the result sequence; any other value
    /// is wrapped into a one-element sequence.
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, HandlerError>;

    /// Registry prefix. Defaults to the short Rust type name of the service.
    fn name(&self) -> String {
        short_type_name(std::any::type_name_of_val(self)).to_string()
    }
}

/// `my_crate::svc::Calculator<u8>` -> `Calculator`
pub fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Service for Echo {
        fn methods(&self) -> &'static [&'static str] {
            &["echo"]
        }

        async fn call(&self, _method: &str, params: Vec<Value>) -> Result<Value, HandlerError> {
            Ok(Value::Array(params))
        }
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("a::b::Calculator"), "Calculator");
        assert_eq!(short_type_name("Calculator"), "Calculator");
        assert_eq!(short_type_name("a::Wrapper<b::Inner>"), "Wrapper");
    }

    #[test]
    fn test_default_name_uses_concrete_type() {
        assert_eq!(Echo.name(), "Echo");
        let boxed: Box<dyn Service> = Box::new(Echo);
        assert_eq!(boxed.name(), "Echo");
    }
}
