mod error;
mod extractor;

pub use error::AuthError;
pub use extractor::{BearerUser, JwtVerifier};

pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const BEARER_PREFIX: &str = "Bearer ";
