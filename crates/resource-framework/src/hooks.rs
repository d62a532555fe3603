//! # Lifecycle Hooks
//!
//! Named, asynchronous side effects. The API fires `init-before` and `init-after` while it is
//! built; controllers fire `<resource>-<action>-before` and `<resource>-<action>-after` around
//! every create, update and delete. Firing a name nobody registered is a no-op.
//!
//! Each hook runs under the configured timeout; expiry fails the surrounding operation with
//! `HOOK_TIMEOUT`.

use crate::error::FrameworkError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const HOOK_TIMEOUT: &str = "HOOK_TIMEOUT";

#[async_trait]
pub trait Hook: Send + Sync {
    async fn run(&self, args: &Value) -> Result<(), FrameworkError>;
}

/// Registry of hooks by name. Hooks under one name run in registration order.
#[derive(Clone)]
pub struct Hooks {
    hooks: HashMap<String, Vec<Arc<dyn Hook>>>,
    timeout: Duration,
}

impl Hooks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            hooks: HashMap::new(),
            timeout,
        }
    }

    pub fn register(&mut self, name: impl Into<String>, hook: Arc<dyn Hook>) {
        self.hooks.entry(name.into()).or_default().push(hook);
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.hooks.contains_key(name)
    }

    /// Runs every hook registered under `name`, stopping at the first failure.
    pub async fn run(&self, name: &str, args: &Value) -> Result<(), FrameworkError> {
        let Some(hooks) = self.hooks.get(name) else {
            return Ok(());
        };
        debug!(hook = name, count = hooks.len(), "Running hooks");

        for hook in hooks {
            match tokio::time::timeout(self.timeout, hook.run(args)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(hook = name, error = %e, "Hook failed");
                    return Err(e);
                }
                Err(_) => {
                    warn!(hook = name, timeout_ms = self.timeout.as_millis() as u64, "Hook timed out");
                    return Err(FrameworkError::coded(HOOK_TIMEOUT));
                }
            }
        }
        Ok(())
    }
}

impl Default for Hooks {
    fn default() -> Self {
        Self::new(Duration::from_millis(30_000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct Record(Arc<Mutex<Vec<Value>>>);

    #[async_trait]
    impl Hook for Record {
        async fn run(&self, args: &Value) -> Result<(), FrameworkError> {
            self.0.lock().unwrap().push(args.clone());
            Ok(())
        }
    }

    struct Stall;

    #[async_trait]
    impl Hook for Stall {
        async fn run(&self, _args: &Value) -> Result<(), FrameworkError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_runs_registered_hooks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = Hooks::default();
        hooks.register("init-after", Arc::new(Record(seen.clone())));

        hooks.run("init-after", &json!({"n": 1})).await.unwrap();
        hooks.run("unknown", &json!({})).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![json!({"n": 1})]);
    }

    #[tokio::test]
    async fn test_timeout() {
        let mut hooks = Hooks::new(Duration::from_millis(10));
        hooks.register("slow", Arc::new(Stall));

        let err = hooks.run("slow", &Value::Null).await.unwrap_err();
        assert!(matches!(err, FrameworkError::Coded { ref code, .. } if code == HOOK_TIMEOUT));
    }
}
