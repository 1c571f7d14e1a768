pub mod claims;
pub mod codec;
pub mod config;
pub mod error;
pub mod extractors;
pub mod gate;
pub mod roles;
pub mod whitelist;

pub use claims::{TokenClaims, UserClaims};
pub use codec::JwtCodec;
pub use config::JwtConfig;
pub use error::{AuthError, AuthResult};
pub use extractors::{bearer_token, AuthContext};
pub use gate::{admit, require_role, tiered_gate, MinimumRole, RoleGate};
pub use roles::{Role, UnknownRole, ROLE_ADMIN, ROLE_GUEST, ROLE_HIERARCHY, ROLE_OPERATOR, ROLE_USER};
pub use whitelist::{MatchMode, RouteClassifier};
