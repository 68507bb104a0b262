//! One-time verification codes

use rand::rngs::OsRng;
use rand::Rng;

/// Smallest code that can be issued
pub const CODE_MIN: u32 = 100_000;
/// Largest code that can be issued
pub const CODE_MAX: u32 = 999_999;

/// Draw a 6-digit code uniformly from the OS CSPRNG.
pub fn generate_code() -> String {
    OsRng.gen_range(CODE_MIN..=CODE_MAX).to_string()
}

/// Generate a random alphanumeric password for accounts created by an admin.
pub fn generate_password(len: usize) -> String {
    use rand::distributions::Alphanumeric;

    OsRng
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
