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

//! Service Registry.
//!
//! Maps `"Type.Method"` keys to the service instance that implements them.
//! Built once before the server starts and shared read-only afterwards.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::engine_core::errors::HandlerError;
use crate::engine_core::traits::Service;

/// One installed operation: the owning service plus the bare method name.
#[derive(Clone)]
pub struct MethodHandle {
    service: Arc<dyn Service>,
    method: &'static str,
}

impl MethodHandle {
    pub async fn invoke(&self, params: Vec<Value>) -> Result<Value, HandlerError> {
        self.service.call(self.method, params).await
    }

    pub fn method(&self) -> &'static str {
        self.method
    }
}

impl std::fmt::Debug for MethodHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodHandle")
            .field("service", &self.service.name())
            .field("method", &self.method)
            .finish()
    }
}

#[derive(Clone, Default, Debug)]
pub struct Registry {
    methods: HashMap<String, MethodHandle>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install every method of `service` under `"<TypeName>.<method>"`.
    ///
    /// A later registration of the same key replaces the earlier one.
    pub fn register<S: Service>(&mut self, service: S) -> &mut Self {
        self.register_arc(Arc::new(service))
    }

    pub fn register_arc(&mut self, service: Arc<dyn Service>) -> &mut Self {
        let type_name = service.name();
        for &method in service.methods() {
            let key = format!("{type_name}.{method}");
            debug!("Registering {}", key);
            self.methods.insert(
                key,
                MethodHandle {
                    service: Arc::clone(&service),
                    method,
                },
            );
        }
        self
    }

    pub fn lookup(&self, key: &str) -> Option<&MethodHandle> {
        self.methods.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.methods.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct Greeter {
        greeting: &'static str,
    }

    #[async_trait]
    impl Service for Greeter {
        fn methods(&self) -> &'static [&'static str] {
            &["hello", "bye"]
        }

        async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, HandlerError> {
            match method {
                "hello" => Ok(json!(format!("{} {}", self.greeting, params[0]))),
                _ => Ok(json!("bye")),
            }
        }
    }

    #[test]
    fn test_register_installs_type_prefixed_keys() {
        let mut registry = Registry::new();
        registry.register(Greeter { greeting: "hi" });
        assert_eq!(registry.keys(), vec!["Greeter.bye", "Greeter.hello"]);
        assert!(registry.contains("Greeter.hello"));
        assert!(registry.lookup("Greeter.nope").is_none());
    }

    #[test]
    fn test_register_twice_does_not_duplicate() {
        let mut registry = Registry::new();
        registry.register(Greeter { greeting: "hi" });
        registry.register(Greeter { greeting: "hey" });
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_later_registration_overwrites() {
        let mut registry = Registry::new();
        registry
            .register(Greeter { greeting: "hi" })
            .register(Greeter { greeting: "hey" });
        let handle = registry.lookup("Greeter.hello").unwrap();
        assert_eq!(handle.method(), "hello");
        let out = handle.invoke(vec![json!("bob")]).await.unwrap();
        assert_eq!(out, json!("hey \"bob\""));
    }
}
