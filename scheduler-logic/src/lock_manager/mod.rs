pub mod redis;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// A fenced, TTL-bounded, named lease granting exclusive execution of
/// a fleet-wide single-flight task (`spec.md` §4.4, GLOSSARY).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub name: String,
    pub token: u64,
    pub node_id: String,
}

#[async_trait]
pub trait LockManager: Send + Sync {
    /// Attempts to acquire `name`. Returns `None` if already held by
    /// another node.
    async fn acquire(&self, name: &str, node_id: &str, ttl: Duration) -> Result<Option<Lease>>;

    /// Extends the TTL of a held lease. Returns `false` (and the
    /// holder must abort its pass) if the lease was lost.
    async fn renew(&self, lease: &Lease, ttl: Duration) -> Result<bool>;

    /// Releases a held lease. A no-op if it was already lost.
    async fn release(&self, lease: &Lease) -> Result<()>;

    /// Node id currently holding `name`, if any. A read-only probe: also
    /// doubles as the cheapest possible reachability check for the
    /// backing store.
    async fn current_holder(&self, name: &str) -> Result<Option<String>>;
}

#[cfg(test)]
pub mod fake {
    use std::{collections::HashMap, sync::Mutex};

    use super::*;

    /// In-memory `LockManager` for `TransferLoop` scenario tests.
    #[derive(Default)]
    pub struct FakeLockManager {
        held: Mutex<HashMap<String, (u64, String)>>,
        next_token: Mutex<u64>,
    }

    impl FakeLockManager {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl LockManager for FakeLockManager {
        async fn acquire(
            &self,
            name: &str,
            node_id: &str,
            _ttl: Duration,
        ) -> Result<Option<Lease>> {
            let mut held = self.held.lock().unwrap();
            if held.contains_key(name) {
                return Ok(None);
            }
            let mut next_token = self.next_token.lock().unwrap();
            *next_token += 1;
            held.insert(name.to_string(), (*next_token, node_id.to_string()));
            Ok(Some(Lease {
                name: name.to_string(),
                token: *next_token,
                node_id: node_id.to_string(),
            }))
        }

        async fn renew(&self, lease: &Lease, _ttl: Duration) -> Result<bool> {
            let held = self.held.lock().unwrap();
            Ok(held.get(&lease.name).map(|(token, _)| *token) == Some(lease.token))
        }

        async fn release(&self, lease: &Lease) -> Result<()> {
            let mut held = self.held.lock().unwrap();
            if held.get(&lease.name).map(|(token, _)| *token) == Some(lease.token) {
                held.remove(&lease.name);
            }
            Ok(())
        }

        async fn current_holder(&self, name: &str) -> Result<Option<String>> {
            Ok(self.held.lock().unwrap().get(name).map(|(_, node_id)| node_id.clone()))
        }
    }
}
