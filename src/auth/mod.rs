//! Authentication for Northstar
//!
//! Provides:
//! - JWT bearer token generation and validation
//! - Password hashing with Argon2

pub mod jwt;
pub mod password;

pub use jwt::{extract_token_from_header, Claims, JwtValidator, DEFAULT_EXPIRY_SECONDS};
pub use password::{hash_password, verify_password};
