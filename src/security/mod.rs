//! Server-side credential handling: password hashes and signed session tokens.

pub mod jwt;
pub mod password;

pub use jwt::{Claims, TokenIssuer, TokenKind};
pub use password::{hash_password, verify_password};
