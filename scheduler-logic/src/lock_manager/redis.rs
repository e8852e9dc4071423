use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;

use super::{Lease, LockManager};
use crate::error::Result;

/// Redis-backed fenced lease: `SET key value NX PX ttl` for
/// acquisition, a monotonic counter for the fencing token, and a
/// compare-and-delete Lua script for release so a node can never
/// release (or renew) a lease it no longer holds.
#[derive(Clone)]
pub struct RedisLockManager {
    connection: redis::aio::ConnectionManager,
    prefix: String,
}

impl RedisLockManager {
    pub async fn new(
        connection_string: impl Into<String>,
        prefix: impl Into<String>,
    ) -> std::result::Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string.into())?;
        let connection = redis::aio::ConnectionManager::new(client).await?;
        Ok(Self {
            connection,
            prefix: prefix.into(),
        })
    }

    fn lock_key(&self, name: &str) -> String {
        format!("{}:lock:{name}", self.prefix)
    }

    fn token_key(&self, name: &str) -> String {
        format!("{}:lock:{name}:token", self.prefix)
    }

    fn value_of(lease: &Lease) -> String {
        format!("{}:{}", lease.token, lease.node_id)
    }
}

#[async_trait]
impl LockManager for RedisLockManager {
    async fn acquire(&self, name: &str, node_id: &str, ttl: Duration) -> Result<Option<Lease>> {
        let mut conn = self.connection.clone();
        let token: u64 = conn.incr(self.token_key(name), 1u64).await?;
        let lease = Lease {
            name: name.to_string(),
            token,
            node_id: node_id.to_string(),
        };

        let value = Self::value_of(&lease);
        let acquired: bool = redis::cmd("SET")
            .arg(self.lock_key(name))
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async::<_, Option<String>>(&mut conn)
            .await?
            .is_some();

        Ok(if acquired { Some(lease) } else { None })
    }

    async fn renew(&self, lease: &Lease, ttl: Duration) -> Result<bool> {
        let script = redis::Script::new(
            r#"
            if redis.call('GET', KEYS[1]) == ARGV[1] then
                redis.call('PEXPIRE', KEYS[1], ARGV[2])
                return 1
            end
            return 0
            "#,
        );

        let mut conn = self.connection.clone();
        let renewed: i64 = script
            .key(self.lock_key(&lease.name))
            .arg(Self::value_of(lease))
            .arg(ttl.as_millis() as u64)
            .invoke_async(&mut conn)
            .await?;
        Ok(renewed == 1)
    }

    async fn release(&self, lease: &Lease) -> Result<()> {
        let script = redis::Script::new(
            r#"
            if redis.call('GET', KEYS[1]) == ARGV[1] then
                redis.call('DEL', KEYS[1])
            end
            return 1
            "#,
        );

        let mut conn = self.connection.clone();
        let _: i64 = script
            .key(self.lock_key(&lease.name))
            .arg(Self::value_of(lease))
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn current_holder(&self, name: &str) -> Result<Option<String>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(self.lock_key(name)).await?;
        Ok(value.and_then(|v| v.split_once(':').map(|(_, node_id)| node_id.to_string())))
    }
}
