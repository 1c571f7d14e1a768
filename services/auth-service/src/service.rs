use std::sync::Arc;

use common_auth::{Role, UserClaims};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::directory::{DirectoryError, User, UserDirectory};
use crate::error::{ServiceError, ServiceResult};
use crate::ledger::{LedgerError, RefreshLedger};
use crate::password::{PasswordError, PasswordHasher};
use crate::tokens::{TokenIssuer, TokenPair};

/// Name the first account must carry; it becomes the administrator.
pub const BOOTSTRAP_ADMIN_NAME: &str = "admin";

#[derive(Debug, Clone)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

/// Partial update of a directory record. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub name: String,
    pub role: String,
}

pub struct AuthCore {
    directory: Arc<dyn UserDirectory>,
    ledger: Arc<dyn RefreshLedger>,
    issuer: TokenIssuer,
    hasher: PasswordHasher,
    /// Held across the admin-slot decision and the insert that claims it.
    admin_bootstrapped: Mutex<bool>,
}

impl AuthCore {
    pub async fn new(
        directory: Arc<dyn UserDirectory>,
        ledger: Arc<dyn RefreshLedger>,
        issuer: TokenIssuer,
        hasher: PasswordHasher,
    ) -> Result<Self, DirectoryError> {
        let admin = directory.find_by_name(BOOTSTRAP_ADMIN_NAME).await?;
        let bootstrapped = admin.is_some();
        debug!(bootstrapped, "auth core initialised");
        Ok(Self {
            directory,
            ledger,
            issuer,
            hasher,
            admin_bootstrapped: Mutex::new(bootstrapped),
        })
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub async fn admin_bootstrapped(&self) -> bool {
        *self.admin_bootstrapped.lock().await
    }

    pub async fn signup(&self, request: SignupRequest) -> ServiceResult<User> {
        if request.password != request.password_confirm {
            return Err(ServiceError::InvalidCredentials(
                "password and confirmation do not match".into(),
            ));
        }
        let password_hash = self.hash_password(&request.password)?;

        let mut bootstrapped = self.admin_bootstrapped.lock().await;
        // Another instance sharing the directory may have created the admin.
        if !*bootstrapped && self.admin_exists().await? {
            *bootstrapped = true;
        }
        if *bootstrapped {
            drop(bootstrapped);
            self.ensure_name_available(&request.name).await?;
            self.ensure_email_available(&request.email).await?;
            let user = self
                .insert_user(request.name, request.email, password_hash, Role::User)
                .await
                .map_err(signup_failure)?;
            info!(user_id = %user.id, "user signed up");
            return Ok(user);
        }

        if request.name != BOOTSTRAP_ADMIN_NAME {
            return Err(ServiceError::InvalidCredentials(
                "the first user must be named admin".into(),
            ));
        }
        self.ensure_email_available(&request.email).await?;
        let user = match self
            .insert_user(request.name, request.email, password_hash, Role::Admin)
            .await
        {
            Ok(user) => user,
            Err(DirectoryError::Conflict("username")) => {
                *bootstrapped = true;
                return Err(ServiceError::UserAlreadyExists(
                    "username already exists".into(),
                ));
            }
            Err(err) => return Err(signup_failure(err)),
        };
        *bootstrapped = true;
        info!(user_id = %user.id, "administrator account bootstrapped");
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<TokenPair> {
        let user = match self.directory.find_by_email(email).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!(email, "login for unknown email");
                return Err(ServiceError::UserNotFound(format!(
                    "user {email} does not exist"
                )));
            }
            Err(err) => return Err(lookup_failure("failed to get user", err)),
        };

        if !self.hasher.verify(password, &user.password_hash) {
            return Err(ServiceError::IncorrectPassword(format!(
                "incorrect password for user: {email}"
            )));
        }

        let pair = self.mint_pair(&user).await?;
        info!(user_id = %user.id, "login succeeded");
        Ok(pair)
    }

    /// Exchanges a refresh credential for a new pair. The presented
    /// credential is retired; only the returned one stays valid.
    pub async fn refresh(&self, refresh_token: &str) -> ServiceResult<TokenPair> {
        let user_id = match self.ledger.get(refresh_token).await {
            Ok(Some(user_id)) => user_id,
            Ok(None) => {
                return Err(ServiceError::InvalidRefreshToken(
                    "invalid or expired refresh token".into(),
                ))
            }
            Err(LedgerError::Timeout(elapsed)) => {
                return Err(ServiceError::Unavailable(format!(
                    "refresh ledger timed out after {elapsed:?}"
                )))
            }
            Err(err) => {
                warn!(error = ?err, "refresh token lookup failed");
                return Err(ServiceError::InvalidRefreshToken(
                    "invalid or expired refresh token".into(),
                ));
            }
        };

        let user = match self.directory.find_by_id(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                return Err(ServiceError::UserNotFound(format!(
                    "user not found: {user_id}"
                )))
            }
            Err(err) => return Err(lookup_failure("user not found", err)),
        };

        let claims = self.issuer.claims_for(&user)?;
        let access_token = self.issuer.issue_access(&claims)?;
        let new_refresh = self.issuer.generate_refresh_token()?;

        // Only the caller whose delete removed the mapping may rotate it. A
        // failed delete leaves the old credential to its own TTL.
        match self.ledger.delete(refresh_token).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(user_id = %user.id, "refresh token consumed concurrently");
                return Err(ServiceError::InvalidRefreshToken(
                    "invalid or expired refresh token".into(),
                ));
            }
            Err(err) => {
                warn!(user_id = %user.id, error = ?err, "failed to delete old refresh token");
            }
        }

        self.ledger
            .put(user.id, &new_refresh, self.issuer.refresh_ttl())
            .await
            .map_err(store_failure)?;

        debug!(user_id = %user.id, "refresh token rotated");
        Ok(self.issuer.pair(access_token, new_refresh))
    }

    pub async fn logout(&self, refresh_token: &str) -> ServiceResult<()> {
        if let Err(err) = self.ledger.delete(refresh_token).await {
            warn!(error = ?err, "failed to delete refresh token during logout");
        }
        Ok(())
    }

    pub async fn revoke_all(&self, user_id: Uuid) -> ServiceResult<()> {
        self.ledger.delete_all(user_id).await.map_err(|err| match err {
            LedgerError::Timeout(elapsed) => {
                ServiceError::Unavailable(format!("refresh ledger timed out after {elapsed:?}"))
            }
            other => ServiceError::DeleteFailed(format!("failed to revoke refresh tokens: {other}")),
        })
    }

    pub fn current_user(&self, claims: &UserClaims) -> CurrentUser {
        CurrentUser {
            id: claims.subject_id,
            name: claims.subject_name.clone(),
            role: claims.role.clone(),
        }
    }

    pub async fn update_user(&self, caller: &UserClaims, update: UpdateUser) -> ServiceResult<User> {
        let caller_role = caller
            .role()
            .map_err(|_| ServiceError::Unauthorized("unknown role".into()))?;
        authorize_update(caller_role, caller.subject_id, &update)?;

        let original = match self.directory.find_by_id(update.id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                return Err(ServiceError::UserNotFound(format!(
                    "user not found: {}",
                    update.id
                )))
            }
            Err(err) => return Err(lookup_failure("user not found", err)),
        };

        let mut updated = original.clone();
        if let Some(name) = update.name.filter(|name| *name != original.name) {
            self.ensure_name_available(&name).await?;
            updated.name = name;
        }
        if let Some(email) = update.email.filter(|email| *email != original.email) {
            self.ensure_email_available(&email).await?;
            updated.email = email;
        }
        if let Some(password) = update.password.filter(|password| !password.is_empty()) {
            updated.password_hash = self
                .hasher
                .ensure_hashed(&password)
                .map_err(|err| ServiceError::UpdateFailed(format!("failed to update user: {err}")))?;
        }
        if let Some(role) = update.role {
            updated.role = role;
        }

        let user = self.directory.update(updated).await.map_err(|err| match err {
            DirectoryError::Conflict(field) => {
                ServiceError::UserAlreadyExists(format!("{field} already exists"))
            }
            DirectoryError::Timeout(elapsed) => {
                ServiceError::Unavailable(format!("user directory timed out after {elapsed:?}"))
            }
            other => ServiceError::UpdateFailed(format!("failed to update user: {other}")),
        })?;
        info!(user_id = %user.id, caller_id = %caller.subject_id, "user updated");
        Ok(user)
    }

    pub async fn save_user(&self, new_user: NewUser) -> ServiceResult<User> {
        self.ensure_name_available(&new_user.name).await?;
        self.ensure_email_available(&new_user.email).await?;
        let password_hash = self.hash_password(&new_user.password)?;
        let user = self
            .insert_user(new_user.name, new_user.email, password_hash, new_user.role)
            .await
            .map_err(|err| match err {
                DirectoryError::Conflict(field) => {
                    ServiceError::UserAlreadyExists(format!("{field} already exists"))
                }
                DirectoryError::Timeout(elapsed) => {
                    ServiceError::Unavailable(format!("user directory timed out after {elapsed:?}"))
                }
                other => ServiceError::SaveFailed(format!("failed to save user: {other}")),
            })?;
        info!(user_id = %user.id, role = %user.role, "user saved");
        Ok(user)
    }

    /// Removes the record and every refresh credential issued to it.
    pub async fn delete_user(&self, id: Uuid) -> ServiceResult<()> {
        let removed = self.directory.delete(id).await.map_err(|err| match err {
            DirectoryError::Timeout(elapsed) => {
                ServiceError::Unavailable(format!("user directory timed out after {elapsed:?}"))
            }
            other => ServiceError::DeleteFailed(format!("failed to delete user: {other}")),
        })?;
        if !removed {
            return Err(ServiceError::UserNotFound(format!("user not found: {id}")));
        }
        if let Err(err) = self.revoke_all(id).await {
            warn!(user_id = %id, error = %err, "failed to revoke refresh tokens of deleted user");
        }
        info!(user_id = %id, "user deleted");
        Ok(())
    }

    async fn mint_pair(&self, user: &User) -> ServiceResult<TokenPair> {
        let claims = self.issuer.claims_for(user)?;
        let access_token = self.issuer.issue_access(&claims)?;
        let refresh_token = self.issuer.generate_refresh_token()?;
        self.ledger
            .put(user.id, &refresh_token, self.issuer.refresh_ttl())
            .await
            .map_err(store_failure)?;
        Ok(self.issuer.pair(access_token, refresh_token))
    }

    fn hash_password(&self, password: &str) -> ServiceResult<String> {
        self.hasher.ensure_hashed(password).map_err(|err| match err {
            PasswordError::Empty => ServiceError::InvalidCredentials(err.to_string()),
            PasswordError::Hash(_) => ServiceError::SaveFailed(err.to_string()),
        })
    }

    async fn admin_exists(&self) -> ServiceResult<bool> {
        self.directory
            .find_by_name(BOOTSTRAP_ADMIN_NAME)
            .await
            .map(|admin| admin.is_some())
            .map_err(|err| lookup_failure("failed to check username", err))
    }

    async fn ensure_name_available(&self, name: &str) -> ServiceResult<()> {
        match self.directory.find_by_name(name).await {
            Ok(None) => Ok(()),
            Ok(Some(_)) => Err(ServiceError::UserAlreadyExists(
                "username already exists".into(),
            )),
            Err(err) => Err(lookup_failure("failed to check username", err)),
        }
    }

    async fn ensure_email_available(&self, email: &str) -> ServiceResult<()> {
        match self.directory.find_by_email(email).await {
            Ok(None) => Ok(()),
            Ok(Some(_)) => Err(ServiceError::UserAlreadyExists("email already exists".into())),
            Err(err) => Err(lookup_failure("failed to check email", err)),
        }
    }

    async fn insert_user(
        &self,
        name: String,
        email: String,
        password_hash: String,
        role: Role,
    ) -> Result<User, DirectoryError> {
        self.directory
            .insert(User {
                id: Uuid::new_v4(),
                name,
                email,
                password_hash,
                role,
            })
            .await
    }
}

fn authorize_update(caller_role: Role, caller_id: Uuid, update: &UpdateUser) -> ServiceResult<()> {
    match caller_role {
        Role::Guest => Err(ServiceError::Unauthorized(
            "permission denied, you need at least the user role".into(),
        )),
        Role::User => {
            if caller_id != update.id {
                return Err(ServiceError::Unauthorized(
                    "you can only update your own information".into(),
                ));
            }
            if update.role.is_some_and(|role| role != Role::User) {
                return Err(ServiceError::Unauthorized(
                    "you do not have permission to change your role".into(),
                ));
            }
            Ok(())
        }
        Role::Admin => {
            if update.role.is_some_and(|role| role >= Role::Admin) {
                return Err(ServiceError::Unauthorized(
                    "admin cannot assign a role at or above admin".into(),
                ));
            }
            Ok(())
        }
        Role::Operator => {
            if update.role.is_some_and(|role| role > Role::Operator) {
                return Err(ServiceError::Unauthorized(
                    "operator cannot assign a role higher than operator".into(),
                ));
            }
            Ok(())
        }
    }
}

fn lookup_failure(context: &str, err: DirectoryError) -> ServiceError {
    match err {
        DirectoryError::Timeout(elapsed) => {
            ServiceError::Unavailable(format!("user directory timed out after {elapsed:?}"))
        }
        other => ServiceError::UserNotFound(format!("{context}: {other}")),
    }
}

fn signup_failure(err: DirectoryError) -> ServiceError {
    match err {
        DirectoryError::Conflict(field) => {
            ServiceError::UserAlreadyExists(format!("{field} already exists"))
        }
        DirectoryError::Timeout(elapsed) => {
            ServiceError::Unavailable(format!("user directory timed out after {elapsed:?}"))
        }
        other => ServiceError::SaveFailed(format!("failed to save user: {other}")),
    }
}

fn store_failure(err: LedgerError) -> ServiceError {
    match err {
        LedgerError::Timeout(elapsed) => {
            ServiceError::Unavailable(format!("refresh ledger timed out after {elapsed:?}"))
        }
        other => ServiceError::TokenGenerationFailed(format!("failed to save refresh token: {other}")),
    }
}
