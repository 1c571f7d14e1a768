use std::sync::Arc;

use axum::extract::FromRef;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use common_auth::{tiered_gate, MatchMode, RoleGate, RouteClassifier};

use crate::config::AuthConfig;
use crate::service::AuthCore;
use crate::user_handlers::{
    current_user, delete_user, health, login_user, logout_user, refresh_token, save_user,
    signup_user, update_user,
};

#[derive(Clone)]
pub struct AppState {
    pub core: Arc<AuthCore>,
    pub gate: RoleGate,
}

impl AppState {
    pub fn new(core: Arc<AuthCore>, config: &AuthConfig) -> Self {
        let gate = RoleGate::new(
            core.issuer().access_codec(),
            RouteClassifier::new(MatchMode::Exact, config.public_routes.iter()),
            RouteClassifier::new(MatchMode::Exact, config.user_routes.iter()),
        );
        Self { core, gate }
    }
}

impl FromRef<AppState> for Arc<AuthCore> {
    fn from_ref(state: &AppState) -> Self {
        state.core.clone()
    }
}

impl FromRef<AppState> for RoleGate {
    fn from_ref(state: &AppState) -> Self {
        state.gate.clone()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/v1/auth/signup", post(signup_user))
        .route("/v1/auth/login", post(login_user))
        .route("/v1/auth/refresh", post(refresh_token))
        .route("/v1/auth/logout", post(logout_user))
        .route("/v1/users/me", get(current_user))
        .route("/v1/users/update", post(update_user))
        .route("/v1/users", post(save_user))
        .route("/v1/users/delete", post(delete_user))
        .layer(middleware::from_fn_with_state(state.gate.clone(), tiered_gate))
        .with_state(state)
}
