//! Authentication primitives
//!
//! - Argon2 hashing for passwords and one-time codes
//! - Six-digit code generation
//! - HS256 session tokens and the `authToken` cookie

pub mod code;
pub mod cookie;
pub mod jwt;
pub mod password;

pub use code::{generate_code, generate_password};
pub use cookie::{clear_session_cookie, extract_session_cookie, session_cookie, SESSION_COOKIE};
pub use jwt::{extract_token_from_header, Claims, SessionIssuer, SubjectType, SESSION_TTL_SECONDS};
pub use password::{hash_password, verify_password};
