//! Common utilities shared across the CLI

pub mod error;
pub mod logging;

pub use error::{Error, Result};

/// Replace all but the last four characters of a secret with `*`.
///
/// Used when echoing credentials back to the user.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), visible)
}
