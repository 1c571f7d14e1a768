#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use auth_service::config::{AuthConfig, DEFAULT_PUBLIC_ROUTES, DEFAULT_USER_ROUTES};
use auth_service::directory::{DirectoryError, InMemoryUserDirectory, User, UserDirectory};
use auth_service::ledger::{InMemoryRefreshLedger, LedgerError, RefreshLedger};
use auth_service::password::PasswordHasher;
use auth_service::service::{SignupRequest, BOOTSTRAP_ADMIN_NAME};
use auth_service::tokens::{TokenConfig, TokenIssuer};
use auth_service::AuthCore;
use uuid::Uuid;

pub const ACCESS_SECRET: &str = "test-access-secret";
pub const REFRESH_SECRET: &str = "test-refresh-secret";
pub const ACCESS_TTL_SECONDS: i64 = 900;

pub fn auth_config() -> AuthConfig {
    AuthConfig {
        access_secret: ACCESS_SECRET.to_string(),
        refresh_secret: REFRESH_SECRET.to_string(),
        tokens: TokenConfig {
            issuer: "auth-service-test".to_string(),
            audience: "auth-service-test".to_string(),
            access_ttl_seconds: ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: 3600,
        },
        public_routes: DEFAULT_PUBLIC_ROUTES.iter().map(|r| r.to_string()).collect(),
        user_routes: DEFAULT_USER_ROUTES.iter().map(|r| r.to_string()).collect(),
        store_timeout: Duration::from_secs(2),
    }
}

pub fn fast_hasher() -> PasswordHasher {
    PasswordHasher::with_cost(64, 1).expect("argon2 params")
}

pub struct Harness {
    pub config: AuthConfig,
    pub core: Arc<AuthCore>,
    pub directory: Arc<InMemoryUserDirectory>,
    pub ledger: Arc<InMemoryRefreshLedger>,
}

pub async fn core_with(
    directory: Arc<dyn UserDirectory>,
    ledger: Arc<dyn RefreshLedger>,
) -> Result<AuthCore> {
    let config = auth_config();
    let issuer = TokenIssuer::new(
        config.tokens.clone(),
        &config.access_secret,
        &config.refresh_secret,
    );
    Ok(AuthCore::new(directory, ledger, issuer, fast_hasher()).await?)
}

pub async fn harness() -> Result<Harness> {
    let config = auth_config();
    let directory = Arc::new(InMemoryUserDirectory::new());
    let ledger = Arc::new(InMemoryRefreshLedger::new());
    let core = core_with(directory.clone(), ledger.clone()).await?;
    Ok(Harness {
        config,
        core: Arc::new(core),
        directory,
        ledger,
    })
}

pub fn signup(name: &str, email: &str, password: &str) -> SignupRequest {
    SignupRequest {
        name: name.to_string(),
        email: email.to_string(),
        password: password.to_string(),
        password_confirm: password.to_string(),
    }
}

/// Harness with the administrator already bootstrapped.
pub async fn harness_with_admin() -> Result<Harness> {
    let harness = harness().await?;
    harness
        .core
        .signup(signup(BOOTSTRAP_ADMIN_NAME, "admin@example.com", "admin-pass"))
        .await?;
    Ok(harness)
}

/// Ledger whose deletes always fail; everything else is in memory.
#[derive(Default)]
pub struct FailingDeleteLedger {
    inner: InMemoryRefreshLedger,
}

#[async_trait]
impl RefreshLedger for FailingDeleteLedger {
    async fn put(&self, user_id: Uuid, token: &str, ttl: Duration) -> Result<(), LedgerError> {
        self.inner.put(user_id, token, ttl).await
    }

    async fn get(&self, token: &str) -> Result<Option<Uuid>, LedgerError> {
        self.inner.get(token).await
    }

    async fn delete(&self, _token: &str) -> Result<bool, LedgerError> {
        Err(LedgerError::Store("connection reset".into()))
    }

    async fn delete_all(&self, user_id: Uuid) -> Result<(), LedgerError> {
        self.inner.delete_all(user_id).await
    }

    async fn members(&self, user_id: Uuid) -> Result<Vec<String>, LedgerError> {
        self.inner.members(user_id).await
    }
}

/// Ledger where every call times out.
#[derive(Default)]
pub struct StalledLedger;

#[async_trait]
impl RefreshLedger for StalledLedger {
    async fn put(&self, _user_id: Uuid, _token: &str, _ttl: Duration) -> Result<(), LedgerError> {
        Err(LedgerError::Timeout(Duration::from_millis(5)))
    }

    async fn get(&self, _token: &str) -> Result<Option<Uuid>, LedgerError> {
        Err(LedgerError::Timeout(Duration::from_millis(5)))
    }

    async fn delete(&self, _token: &str) -> Result<bool, LedgerError> {
        Err(LedgerError::Timeout(Duration::from_millis(5)))
    }

    async fn delete_all(&self, _user_id: Uuid) -> Result<(), LedgerError> {
        Err(LedgerError::Timeout(Duration::from_millis(5)))
    }

    async fn members(&self, _user_id: Uuid) -> Result<Vec<String>, LedgerError> {
        Err(LedgerError::Timeout(Duration::from_millis(5)))
    }
}

/// In-memory directory whose calls time out once `stall` is set.
#[derive(Default)]
pub struct StallingDirectory {
    pub inner: InMemoryUserDirectory,
    pub stall: AtomicBool,
}

impl StallingDirectory {
    fn check(&self) -> Result<(), DirectoryError> {
        if self.stall.load(Ordering::SeqCst) {
            Err(DirectoryError::Timeout(Duration::from_millis(5)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl UserDirectory for StallingDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DirectoryError> {
        self.check()?;
        self.inner.find_by_id(id).await
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<User>, DirectoryError> {
        self.check()?;
        self.inner.find_by_name(name).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> {
        self.check()?;
        self.inner.find_by_email(email).await
    }

    async fn insert(&self, user: User) -> Result<User, DirectoryError> {
        self.check()?;
        self.inner.insert(user).await
    }

    async fn update(&self, user: User) -> Result<User, DirectoryError> {
        self.check()?;
        self.inner.update(user).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DirectoryError> {
        self.check()?;
        self.inner.delete(id).await
    }
}
