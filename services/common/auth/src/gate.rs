use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use crate::claims::UserClaims;
use crate::codec::JwtCodec;
use crate::error::{AuthError, AuthResult};
use crate::extractors::bearer_token;
use crate::roles::Role;
use crate::whitelist::RouteClassifier;

/// Admission decision for one request against one minimum role.
///
/// `Ok(None)` admits an anonymous caller (only possible when `minimum` is
/// `None`); `Ok(Some(claims))` admits a verified caller. Every rejection is
/// `MissingToken` or `Unauthorized`; verification details are only logged.
pub fn admit(
    headers: &HeaderMap,
    codec: &JwtCodec<UserClaims>,
    minimum: Option<Role>,
) -> AuthResult<Option<UserClaims>> {
    let Some(token) = bearer_token(headers) else {
        return match minimum {
            None => Ok(None),
            Some(_) => Err(AuthError::MissingToken),
        };
    };

    let claims = codec.verify(&token).map_err(|err| {
        debug!(error = %err, "bearer token rejected");
        AuthError::Unauthorized("invalid token".into())
    })?;

    let role = claims.role().map_err(|err| {
        debug!(error = %err, subject = %claims.subject_id, "token carries unknown role");
        AuthError::Unauthorized("unknown role".into())
    })?;

    if role.ordinal() < Role::minimum_ordinal(minimum) {
        let required = minimum.map(Role::as_str).unwrap_or("none");
        return Err(AuthError::Unauthorized(format!(
            "permission denied, you need at least the {required} role"
        )));
    }

    Ok(Some(claims))
}

/// Three-tier gate: public routes need nothing, user-tier routes need
/// `User`, everything else needs `Admin`.
#[derive(Clone)]
pub struct RoleGate {
    codec: Arc<JwtCodec<UserClaims>>,
    public: Arc<RouteClassifier>,
    user_tier: Arc<RouteClassifier>,
    admin_exempt: Arc<RouteClassifier>,
}

impl RoleGate {
    pub fn new(
        codec: Arc<JwtCodec<UserClaims>>,
        public: RouteClassifier,
        user_tier: RouteClassifier,
    ) -> Self {
        let admin_exempt = public.merge(&user_tier);
        Self {
            codec,
            public: Arc::new(public),
            user_tier: Arc::new(user_tier),
            admin_exempt: Arc::new(admin_exempt),
        }
    }

    pub fn public(&self) -> &RouteClassifier {
        &self.public
    }

    pub fn user_tier(&self) -> &RouteClassifier {
        &self.user_tier
    }

    /// Minimum role the gate enforces for `operation`.
    pub fn required_role(&self, operation: &str) -> Option<Role> {
        if self.public.is_whitelisted(operation) {
            None
        } else if self.admin_exempt.is_whitelisted(operation) {
            Some(Role::User)
        } else {
            Some(Role::Admin)
        }
    }

    /// Runs the user pass then the admin pass, each skipped for its
    /// whitelist, and returns the claims admitted by the last pass that ran.
    pub fn check(&self, operation: &str, headers: &HeaderMap) -> AuthResult<Option<UserClaims>> {
        let mut admitted = None;
        if !self.public.is_whitelisted(operation) {
            admitted = admit(headers, &self.codec, Some(Role::User))?;
        }
        if !self.admin_exempt.is_whitelisted(operation) {
            admitted = admit(headers, &self.codec, Some(Role::Admin))?;
        }
        Ok(admitted)
    }
}

/// Axum middleware for [`RoleGate`]. Admitted claims are stored in request
/// extensions for the `AuthContext` extractor.
pub async fn tiered_gate(
    State(gate): State<RoleGate>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let operation = request.uri().path().to_owned();
    match gate.check(&operation, request.headers()) {
        Ok(Some(claims)) => {
            request.extensions_mut().insert(claims);
        }
        Ok(None) => {}
        Err(err) => {
            debug!(operation = %operation, error = %err, "role gate rejected request");
            return Err(err);
        }
    }
    Ok(next.run(request).await)
}

/// Fixed minimum role for routes that register one explicitly.
#[derive(Clone)]
pub struct MinimumRole {
    codec: Arc<JwtCodec<UserClaims>>,
    minimum: Option<Role>,
}

impl MinimumRole {
    pub fn new(codec: Arc<JwtCodec<UserClaims>>, minimum: Option<Role>) -> Self {
        Self { codec, minimum }
    }
}

pub async fn require_role(
    State(gate): State<MinimumRole>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if let Some(claims) = admit(request.headers(), &gate.codec, gate.minimum)? {
        request.extensions_mut().insert(claims);
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use crate::whitelist::MatchMode;
    use axum::http::{header::AUTHORIZATION, HeaderValue};
    use chrono::Utc;
    use uuid::Uuid;

    const ALL_ROLES: [Role; 4] = [Role::Guest, Role::User, Role::Admin, Role::Operator];

    fn codec() -> JwtCodec<UserClaims> {
        JwtCodec::new(JwtConfig::new("gate-secret"))
    }

    fn token_for(codec: &JwtCodec<UserClaims>, role: &str, ttl: i64) -> String {
        let now = Utc::now().timestamp();
        codec
            .issue(&UserClaims {
                subject_id: Uuid::new_v4(),
                subject_name: "someone".into(),
                role: role.into(),
                nonce: "aa".repeat(32),
                audience: "aud".into(),
                issued_at: now,
                expires_at: now + ttl,
                issuer: "iss".into(),
            })
            .expect("sign")
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).expect("header"),
        );
        headers
    }

    #[test]
    fn admits_iff_role_meets_minimum() {
        let codec = codec();
        for role in ALL_ROLES {
            let headers = bearer(&token_for(&codec, role.as_str(), 600));
            assert!(admit(&headers, &codec, None).expect("no minimum").is_some());
            for minimum in ALL_ROLES {
                let outcome = admit(&headers, &codec, Some(minimum));
                assert_eq!(
                    outcome.is_ok(),
                    role >= minimum,
                    "role {role} against minimum {minimum}"
                );
                if let Err(err) = outcome {
                    assert!(matches!(err, AuthError::Unauthorized(ref msg) if msg.contains(minimum.as_str())));
                }
            }
        }
    }

    #[test]
    fn anonymous_only_without_minimum() {
        let codec = codec();
        let empty = HeaderMap::new();
        assert!(admit(&empty, &codec, None).expect("public").is_none());
        assert!(matches!(
            admit(&empty, &codec, Some(Role::Guest)),
            Err(AuthError::MissingToken)
        ));
    }

    #[test]
    fn failures_do_not_leak_details() {
        let codec = codec();
        let expired = bearer(&token_for(&codec, "admin", -60));
        let err = admit(&expired, &codec, Some(Role::User)).expect_err("expired");
        assert!(matches!(err, AuthError::Unauthorized(ref msg) if msg == "invalid token"));

        let forged = bearer(&token_for(&JwtCodec::new(JwtConfig::new("other")), "admin", 600));
        let err = admit(&forged, &codec, None).expect_err("forged");
        assert!(matches!(err, AuthError::Unauthorized(ref msg) if msg == "invalid token"));

        let odd_role = bearer(&token_for(&codec, "root", 600));
        let err = admit(&odd_role, &codec, Some(Role::Guest)).expect_err("unknown role");
        assert!(matches!(err, AuthError::Unauthorized(ref msg) if msg == "unknown role"));
    }

    #[test]
    fn tiered_check_applies_three_tiers() {
        let codec = Arc::new(codec());
        let gate = RoleGate::new(
            codec.clone(),
            RouteClassifier::new(MatchMode::Exact, ["/v1/auth/login"]),
            RouteClassifier::new(MatchMode::Exact, ["/v1/users/me"]),
        );

        assert_eq!(gate.required_role("/v1/auth/login"), None);
        assert_eq!(gate.required_role("/v1/users/me"), Some(Role::User));
        assert_eq!(gate.required_role("/v1/users/delete"), Some(Role::Admin));

        let none = HeaderMap::new();
        let user = bearer(&token_for(&codec, "user", 600));
        let admin = bearer(&token_for(&codec, "admin", 600));

        assert!(gate.check("/v1/auth/login", &none).expect("public").is_none());
        assert!(matches!(gate.check("/v1/users/me", &none), Err(AuthError::MissingToken)));
        assert!(gate.check("/v1/users/me", &user).expect("user tier").is_some());
        assert!(gate.check("/v1/users/delete", &user).is_err());
        let claims = gate
            .check("/v1/users/delete", &admin)
            .expect("admin tier")
            .expect("claims");
        assert_eq!(claims.role, "admin");
    }
}
