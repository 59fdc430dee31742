//! Password hashing and password strength rules.

use argon2::{
    Argon2,
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use secrecy::{ExposeSecret, SecretString};

use crate::prelude::*;


pub(crate) const MIN_LENGTH: usize = 8;

/// A few passwords that are far too common to be accepted. Compared
/// case-insensitively.
const COMMON_PASSWORDS: &[&str] = &[
    "123456789", "12345678", "1234567890", "password", "password1", "password123",
    "qwertyuiop", "qwerty123", "iloveyou", "sunshine", "princess", "football",
    "baseball", "welcome1", "superman", "trustno1", "1q2w3e4r", "abc12345",
    "starwars", "passw0rd", "dragon12", "letmein1", "whatever", "11111111",
    "00000000", "monkey12", "computer", "internet", "asdfghjkl", "zaq12wsx",
];

/// Checks `password` against our password rules. Returns the message of the
/// first rule that is violated.
pub(crate) fn validate(password: &SecretString, username: &str) -> Result<(), &'static str> {
    let password = password.expose_secret();

    if password.chars().count() < MIN_LENGTH {
        return Err("This password is too short. It must contain at least 8 characters.");
    }

    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err("This password is entirely numeric.");
    }

    let lower = password.to_lowercase();
    let username = username.to_lowercase();
    if !username.is_empty() && (lower == username || lower.contains(&username)) {
        return Err("The password is too similar to the username.");
    }

    if COMMON_PASSWORDS.contains(&lower.as_str()) {
        return Err("This password is too common.");
    }

    Ok(())
}

/// Hashes the password with Argon2 and a random salt, returning a PHC string.
pub(crate) fn hash(password: &SecretString) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.expose_secret().as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("failed to hash password: {e}"))
}

/// Checks whether `password` matches the stored PHC string `hash`. Invalid
/// hashes never match.
pub(crate) fn verify(password: &SecretString, hash: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Stored password hash cannot be parsed: {e}");
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.expose_secret().as_bytes(), &parsed)
        .is_ok()
}
