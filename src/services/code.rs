//! One-time confirmation codes.

use rand::Rng;

pub const CODE_MIN: u32 = 100_000;
pub const CODE_MAX: u32 = 999_999;

/// Generate a 6-digit confirmation code drawn uniformly from [100000, 999999].
pub fn generate_confirmation_code() -> String {
    let mut rng = rand::rng();
    let code: u32 = rng.random_range(CODE_MIN..=CODE_MAX);
    code.to_string()
}

pub fn confirmation_message(code: &str, workspace_type: &str) -> String {
    format!("Your {workspace_type} booking confirmation code is {code}. Enter it on the booking page to confirm your reservation.")
}
