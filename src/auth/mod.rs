//! Authentication
//!
//! Token issuance and verification plus the request middleware that
//! guards the REST surface and socket upgrades.

pub mod middleware;
pub mod sessions;

pub use middleware::{
    auth_middleware, authenticate_token, extract_token, AuthUser, AuthenticatedUser, SocketAuth,
};
pub use sessions::{create_token, verify_token, Claims};
