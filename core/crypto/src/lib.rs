//! Cryptographic primitives for Lockbox.
//!
//! This module provides:
//! - The server signing key with automatic zeroization
//! - Bearer token issuance and verification (HS256)
//! - Password hashing using Argon2id
//!
//! # Security Guarantees
//! - Key material is zeroized on drop and redacted from `Debug`
//! - No password, token or key is ever logged

pub mod keys;
pub mod password;
pub mod token;

pub use keys::SigningKey;
pub use password::{hash_password, verify_password, HashParams};
pub use token::TokenService;
