use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisResult};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error};
use uuid::Uuid;

pub fn refresh_token_key(token: &str) -> String {
    format!("refresh_token:{token}")
}

pub fn user_tokens_key(user_id: Uuid) -> String {
    format!("user_tokens:{user_id}")
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("refresh ledger call timed out after {0:?}")]
    Timeout(Duration),
    #[error("refresh ledger store error: {0}")]
    Store(String),
    #[error("refresh ledger holds malformed user id '{0}'")]
    Corrupt(String),
}

impl From<redis::RedisError> for LedgerError {
    fn from(value: redis::RedisError) -> Self {
        Self::Store(value.to_string())
    }
}

/// Maps opaque refresh credentials to user ids, with a per-user index of
/// live credentials for bulk revocation.
#[async_trait]
pub trait RefreshLedger: Send + Sync {
    /// Store `token -> user_id` and index the token under the user; both the
    /// mapping and the user's index expire after `ttl`.
    async fn put(&self, user_id: Uuid, token: &str, ttl: Duration) -> Result<(), LedgerError>;
    async fn get(&self, token: &str) -> Result<Option<Uuid>, LedgerError>;
    /// Idempotent: an unknown token is already deleted. Returns whether this
    /// call removed the mapping, so at most one caller observes `true`.
    async fn delete(&self, token: &str) -> Result<bool, LedgerError>;
    async fn delete_all(&self, user_id: Uuid) -> Result<(), LedgerError>;
    async fn members(&self, user_id: Uuid) -> Result<Vec<String>, LedgerError>;
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

// ---------------- Redis Implementation ----------------

#[derive(Clone)]
pub struct RedisRefreshLedger {
    manager: ConnectionManager,
    op_timeout: Duration,
}

impl RedisRefreshLedger {
    pub async fn connect(redis_url: &str, op_timeout: Duration) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;
        let manager = ConnectionManager::new(client)
            .await
            .context("Failed to create Redis connection manager")?;
        Ok(Self::new(manager, op_timeout))
    }

    pub fn new(manager: ConnectionManager, op_timeout: Duration) -> Self {
        Self {
            manager,
            op_timeout,
        }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, LedgerError>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result.map_err(|err| {
                error!(error = ?err, "refresh ledger command failed");
                LedgerError::from(err)
            }),
            Err(_) => Err(LedgerError::Timeout(self.op_timeout)),
        }
    }
}

#[async_trait]
impl RefreshLedger for RedisRefreshLedger {
    async fn put(&self, user_id: Uuid, token: &str, ttl: Duration) -> Result<(), LedgerError> {
        let mut conn = self.manager.clone();
        let millis = ttl_millis(ttl);
        let set_key = user_tokens_key(user_id);
        let pipeline = redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(refresh_token_key(token))
            .arg(user_id.to_string())
            .arg("PX")
            .arg(millis)
            .ignore()
            .cmd("SADD")
            .arg(&set_key)
            .arg(token)
            .ignore()
            .cmd("PEXPIRE")
            .arg(&set_key)
            .arg(millis)
            .ignore()
            .clone();
        self.bounded(pipeline.query_async::<_, ()>(&mut conn)).await
    }

    async fn get(&self, token: &str) -> Result<Option<Uuid>, LedgerError> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = self.bounded(conn.get(refresh_token_key(token))).await?;
        raw.map(|value| Uuid::parse_str(&value).map_err(|_| LedgerError::Corrupt(value)))
            .transpose()
    }

    async fn delete(&self, token: &str) -> Result<bool, LedgerError> {
        let Some(user_id) = self.get(token).await? else {
            debug!("refresh token already absent");
            return Ok(false);
        };
        let mut conn = self.manager.clone();
        let removed: u64 = self.bounded(conn.del(refresh_token_key(token))).await?;
        // SREM removes one member in place, so a concurrent put for the same
        // user cannot be clobbered.
        let _: () = self.bounded(conn.srem(user_tokens_key(user_id), token)).await?;
        Ok(removed > 0)
    }

    async fn delete_all(&self, user_id: Uuid) -> Result<(), LedgerError> {
        let mut conn = self.manager.clone();
        let set_key = user_tokens_key(user_id);
        let tokens: Vec<String> = self.bounded(conn.smembers(&set_key)).await?;
        for token in &tokens {
            let _: () = self.bounded(conn.del(refresh_token_key(token))).await?;
        }
        let _: () = self.bounded(conn.del(&set_key)).await?;
        debug!(user_id = %user_id, revoked = tokens.len(), "revoked all refresh tokens");
        Ok(())
    }

    async fn members(&self, user_id: Uuid) -> Result<Vec<String>, LedgerError> {
        let mut conn = self.manager.clone();
        self.bounded(conn.smembers(user_tokens_key(user_id))).await
    }
}

// ---------------- In-Memory Implementation (Tests) ----------------

#[derive(Default)]
struct MemoryState {
    tokens: HashMap<String, (Uuid, Instant)>,
    user_sets: HashMap<Uuid, (BTreeSet<String>, Instant)>,
}

impl MemoryState {
    fn purge_expired(&mut self, now: Instant) {
        self.tokens.retain(|_, (_, expires)| *expires > now);
        self.user_sets.retain(|_, (_, expires)| *expires > now);
    }
}

/// Process-local ledger with the same TTL semantics as the Redis backend.
#[derive(Default)]
pub struct InMemoryRefreshLedger {
    inner: Mutex<MemoryState>,
}

impl InMemoryRefreshLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefreshLedger for InMemoryRefreshLedger {
    async fn put(&self, user_id: Uuid, token: &str, ttl: Duration) -> Result<(), LedgerError> {
        let mut guard = self.inner.lock().await;
        let now = Instant::now();
        guard.purge_expired(now);
        let expires = now + ttl;
        guard.tokens.insert(token.to_string(), (user_id, expires));
        let entry = guard
            .user_sets
            .entry(user_id)
            .or_insert_with(|| (BTreeSet::new(), expires));
        entry.0.insert(token.to_string());
        entry.1 = expires;
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<Option<Uuid>, LedgerError> {
        let mut guard = self.inner.lock().await;
        guard.purge_expired(Instant::now());
        Ok(guard.tokens.get(token).map(|(user_id, _)| *user_id))
    }

    async fn delete(&self, token: &str) -> Result<bool, LedgerError> {
        let mut guard = self.inner.lock().await;
        guard.purge_expired(Instant::now());
        let Some((user_id, _)) = guard.tokens.remove(token) else {
            return Ok(false);
        };
        let now_empty = match guard.user_sets.get_mut(&user_id) {
            Some((members, _)) => {
                members.remove(token);
                members.is_empty()
            }
            None => false,
        };
        if now_empty {
            guard.user_sets.remove(&user_id);
        }
        Ok(true)
    }

    async fn delete_all(&self, user_id: Uuid) -> Result<(), LedgerError> {
        let mut guard = self.inner.lock().await;
        if let Some((members, _)) = guard.user_sets.remove(&user_id) {
            for token in members {
                guard.tokens.remove(&token);
            }
        }
        Ok(())
    }

    async fn members(&self, user_id: Uuid) -> Result<Vec<String>, LedgerError> {
        let mut guard = self.inner.lock().await;
        guard.purge_expired(Instant::now());
        Ok(guard
            .user_sets
            .get(&user_id)
            .map(|(members, _)| members.iter().cloned().collect())
            .unwrap_or_default())
    }
}
