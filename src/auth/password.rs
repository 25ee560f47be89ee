/// Lowest work factor bcrypt accepts. Only useful where hashing speed
/// matters more than strength, such as tests.
pub const MIN_BCRYPT_COST: u32 = 4;

/// Hash a plaintext password with bcrypt at the given cost.
pub fn hash_password(plain: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(plain, cost)
}

/// Check a plaintext password against a stored hash. Malformed hashes never match.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    match bcrypt::verify(plain, hash) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::warn!("Password hash could not be checked: {}", e);
            false
        }
    }
}
