//! Password hashing with bcrypt.

use std::sync::LazyLock;

/// bcrypt work factor for new hashes.
pub const HASH_COST: u32 = 12;

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Hash a password with a fresh salt.
pub fn hash(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, HASH_COST)
}

/// Check a password against a stored hash.
/// A malformed hash never matches.
pub fn verify(password: &str, password_hash: &str) -> bool {
    bcrypt::verify(password, password_hash).unwrap_or(false)
}

/// Hash checked when a login names an unknown account, so that branch costs a full
/// verification too.
static DUMMY_HASH: LazyLock<String> =
    LazyLock::new(|| hash("storefront-unknown-account").unwrap_or_default());

/// Run a full-cost verification that never matches.
pub fn verify_dummy(password: &str) -> bool {
    let _ = verify(password, &DUMMY_HASH);
    false
}

/// Whether a password satisfies the length policy.
pub fn is_acceptable(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
}
