pub mod gate;
pub mod identity;
pub mod token;

pub use gate::{Authenticated, Authenticator, bearer_token};
pub use identity::{
    ActiveSession, AuthenticatedIdentity, MaybeIdentity, require_permission, require_role,
};
pub use token::{AccessClaims, TokenVerifier};
