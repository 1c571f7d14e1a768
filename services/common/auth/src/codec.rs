use std::marker::PhantomData;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;

use crate::claims::TokenClaims;
use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};

/// HS256 signer/verifier for a single claims shape.
pub struct JwtCodec<C> {
    config: JwtConfig,
    encoding: EncodingKey,
    decoding: DecodingKey,
    _claims: PhantomData<fn() -> C>,
}

impl<C: TokenClaims> JwtCodec<C> {
    pub fn new(config: JwtConfig) -> Self {
        let encoding = EncodingKey::from_secret(&config.secret);
        let decoding = DecodingKey::from_secret(&config.secret);
        Self {
            config,
            encoding,
            decoding,
            _claims: PhantomData,
        }
    }

    pub fn issue(&self, claims: &C) -> AuthResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|err| AuthError::TokenGeneration(err.to_string()))
    }

    pub fn verify(&self, token: &str) -> AuthResult<C> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verify against an explicit clock. A token is accepted up to and
    /// including its `expires_at` second.
    pub fn verify_at(&self, token: &str, now: i64) -> AuthResult<C> {
        let data = decode::<C>(token, &self.decoding, &self.validation())?;
        let claims = data.claims;
        if now > claims.expires_at() {
            return Err(AuthError::InvalidCredential("token has expired".into()));
        }
        debug!("verified token successfully");
        Ok(claims)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry goes through TokenClaims::expires_at instead.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        match &self.config.issuer {
            Some(issuer) => validation.set_issuer(&[issuer.as_str()]),
            None => validation.iss = None,
        }
        match &self.config.audience {
            Some(audience) => validation.set_audience(&[audience.as_str()]),
            None => validation.validate_aud = false,
        }
        validation
    }
}
