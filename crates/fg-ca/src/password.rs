//! Keystore password generation.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

const PASSWORD_LENGTH: usize = 16;

/// Generates a fresh password for a guard keystore.
///
/// Uses a plain statistical generator, not a cryptographic one; the
/// password gates a file that never leaves the engine host.
#[must_use]
pub fn generate_keystore_password() -> String {
    let mut rng = SmallRng::from_entropy();
    (0..PASSWORD_LENGTH)
        .map(|_| rng.sample(rand::distributions::Alphanumeric) as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passwords_are_alphanumeric_and_sized() {
        let password = generate_keystore_password();
        assert_eq!(password.len(), PASSWORD_LENGTH);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn consecutive_passwords_differ() {
        assert_ne!(generate_keystore_password(), generate_keystore_password());
    }
}
