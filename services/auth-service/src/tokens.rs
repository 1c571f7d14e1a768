use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common_auth::{JwtCodec, JwtConfig, UserClaims};
use rand_core::{OsRng, RngCore};
use serde::Serialize;

use crate::directory::User;
use crate::error::{ServiceError, ServiceResult};

const RANDOM_TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub issuer: String,
    pub audience: String,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
}

/// Access/refresh credentials handed to the caller. Never stored as a pair.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: &'static str,
}

/// Mints access tokens and opaque refresh credentials.
pub struct TokenIssuer {
    config: TokenConfig,
    access: Arc<JwtCodec<UserClaims>>,
    refresh_validation: JwtCodec<UserClaims>,
}

impl TokenIssuer {
    pub fn new(config: TokenConfig, access_secret: &str, refresh_secret: &str) -> Self {
        let access = JwtCodec::new(
            JwtConfig::new(access_secret)
                .with_issuer(config.issuer.clone())
                .with_audience(config.audience.clone()),
        );
        let refresh_validation = JwtCodec::new(
            JwtConfig::new(refresh_secret)
                .with_issuer(config.issuer.clone())
                .with_audience(config.audience.clone()),
        );
        Self {
            config,
            access: Arc::new(access),
            refresh_validation,
        }
    }

    /// Codec the role gate verifies bearer tokens with.
    pub fn access_codec(&self) -> Arc<JwtCodec<UserClaims>> {
        self.access.clone()
    }

    /// Keyed with the refresh secret. Refresh credentials are opaque, so this
    /// codec never mints; it only validates structured refresh claims.
    pub fn refresh_validation_codec(&self) -> &JwtCodec<UserClaims> {
        &self.refresh_validation
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(u64::try_from(self.config.refresh_ttl_seconds).unwrap_or(0))
    }

    pub fn claims_for(&self, user: &User) -> ServiceResult<UserClaims> {
        let nonce = random_hex()
            .map_err(|err| ServiceError::TokenGenerationFailed(format!("failed to generate nonce: {err}")))?;
        let now = Utc::now().timestamp();
        Ok(UserClaims {
            subject_id: user.id,
            subject_name: user.name.clone(),
            role: user.role.to_string(),
            nonce,
            audience: self.config.audience.clone(),
            issued_at: now,
            expires_at: now + self.config.access_ttl_seconds,
            issuer: self.config.issuer.clone(),
        })
    }

    pub fn issue_access(&self, claims: &UserClaims) -> ServiceResult<String> {
        self.access.issue(claims).map_err(|err| {
            ServiceError::TokenGenerationFailed(format!("failed to generate access token: {err}"))
        })
    }

    pub fn generate_refresh_token(&self) -> ServiceResult<String> {
        random_hex().map_err(|err| {
            ServiceError::TokenGenerationFailed(format!("failed to generate refresh token: {err}"))
        })
    }

    pub fn pair(&self, access_token: String, refresh_token: String) -> TokenPair {
        TokenPair {
            access_token,
            refresh_token,
            expires_in: self.config.access_ttl_seconds,
            token_type: "Bearer",
        }
    }
}

/// 32 bytes from the OS CSPRNG, hex encoded (64 characters).
fn random_hex() -> Result<String, rand_core::Error> {
    let mut bytes = [0u8; RANDOM_TOKEN_BYTES];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(hex::encode(bytes))
}
