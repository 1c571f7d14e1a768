pub mod app;
pub mod config;
pub mod directory;
pub mod error;
pub mod ledger;
pub mod password;
pub mod service;
pub mod tokens;
pub mod user_handlers;

pub use app::{build_router, AppState};
pub use service::AuthCore;
