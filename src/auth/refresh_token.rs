/// Refresh Token Generation and Hashing
///
/// Refresh tokens are:
/// - Cryptographically secure random 64-character strings (~380 bits of entropy)
/// - Hashed with SHA-256 before storage (never store plaintext)
/// - Single-use: the owning session is revoked when the token is rotated
///
/// Storage and revocation live behind `SessionStore`.

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};

const REFRESH_TOKEN_LENGTH: usize = 64;

/// Generate a new cryptographically secure refresh token
///
/// The token is returned in plaintext (this is what the client stores).
/// The server stores only the SHA-256 hash.
pub fn generate_refresh_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFRESH_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Hash a refresh token using SHA-256, hex encoded
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
