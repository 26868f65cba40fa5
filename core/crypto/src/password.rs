//! Password hashing using Argon2id.
//!
//! Credential records keep only the PHC string produced here. The PHC string
//! embeds algorithm, parameters and salt, so verification needs nothing else.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

use lockbox_common::{Error, Result};

/// Salt length in bytes.
const SALT_LENGTH: usize = 16;

/// Parameters for Argon2id hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParams {
    /// Memory cost in KiB.
    pub memory_cost: u32,
    /// Number of iterations.
    pub time_cost: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl HashParams {
    /// Parameters suitable for an interactive login path.
    pub fn interactive() -> Self {
        Self {
            memory_cost: 19456, // 19 MiB
            time_cost: 2,
            parallelism: 1,
        }
    }

    /// Smallest parameters Argon2 accepts. Only for tests.
    pub fn minimal() -> Self {
        Self {
            memory_cost: Params::MIN_M_COST,
            time_cost: 1,
            parallelism: 1,
        }
    }

    fn hasher(&self) -> Result<Argon2<'static>> {
        let params = Params::new(self.memory_cost, self.time_cost, self.parallelism, None)
            .map_err(|e| Error::Crypto(format!("Invalid hash parameters: {}", e)))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl Default for HashParams {
    fn default() -> Self {
        Self::interactive()
    }
}

/// Hash a password into a PHC string.
///
/// # Preconditions
/// - `password` must not be empty
///
/// # Postconditions
/// - Returns a PHC string with a fresh random salt
///
/// # Errors
/// - Empty password
/// - Invalid parameters or random source failure
pub fn hash_password(password: &str, params: &HashParams) -> Result<String> {
    if password.is_empty() {
        return Err(Error::InvalidInput("Password cannot be empty".to_string()));
    }

    let mut salt_bytes = [0u8; SALT_LENGTH];
    getrandom::getrandom(&mut salt_bytes)
        .map_err(|e| Error::Crypto(format!("Random source failed: {}", e)))?;
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| Error::Crypto(format!("Salt encoding failed: {}", e)))?;

    let phc = params
        .hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::Crypto(format!("Password hashing failed: {}", e)))?;
    Ok(phc.to_string())
}

/// Check a password against a stored PHC string.
///
/// Returns `Ok(false)` on mismatch. The comparison inside argon2 is constant
/// time.
///
/// # Errors
/// - The stored hash is not a valid PHC string
pub fn verify_password(password: &str, phc: &str) -> Result<bool> {
    let parsed = PasswordHash::new(phc)
        .map_err(|e| Error::Crypto(format!("Stored hash is malformed: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(Error::Crypto(format!("Password verification failed: {}", e))),
    }
}
