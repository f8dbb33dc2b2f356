/// Authentication primitives
///
/// Password hashing/verification, access-token issuance/validation,
/// and refresh-token generation/hashing.

mod claims;
mod jwt;
mod password;
mod refresh_token;

pub use claims::Claims;
pub use jwt::{TokenIssuer, TokenPair};
pub use password::{validate_password, CredentialVerifier, MAX_PASSWORD_LENGTH, MIN_PASSWORD_LENGTH};
pub use refresh_token::{generate_refresh_token, hash_refresh_token};
