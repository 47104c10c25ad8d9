//! Username and secret acceptance rules

use crate::core::secret::ProtectedSecret;
use crate::errors::CredentialError;
use serde::{Deserialize, Serialize};

/// Validation policy applied before a credential is saved
///
/// The default accepts any username and any secret.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsSettings {
    /// Minimum username length in characters
    pub username_min_length: usize,
    /// Characters a username may not contain
    pub username_forbidden_chars: Vec<char>,
    /// Minimum secret length in characters
    pub secret_min_length: usize,
    /// Characters a secret may not contain
    pub secret_forbidden_chars: Vec<char>,
}

impl CredentialsSettings {
    /// Checks a username/secret pair against the policy
    ///
    /// # Returns
    /// * `Ok(())` - Both values are acceptable
    /// * `Err(CredentialError::InvalidCredentials)` - With the first rule violated
    pub fn check(&self, username: Option<&str>, secret: &ProtectedSecret) -> Result<(), CredentialError> {
        let username = username.unwrap_or_default();

        if username.chars().count() < self.username_min_length {
            return Err(invalid(format!(
                "username must be at least {} characters",
                self.username_min_length
            )));
        }
        if let Some(c) = username.chars().find(|c| self.username_forbidden_chars.contains(c)) {
            return Err(invalid(format!("username contains forbidden character '{}'", c)));
        }

        // The offending secret character is never echoed back.
        secret.expose_with(|plaintext| {
            if plaintext.chars().count() < self.secret_min_length {
                return Err(invalid(format!(
                    "password must be at least {} characters",
                    self.secret_min_length
                )));
            }
            if plaintext.chars().any(|c| self.secret_forbidden_chars.contains(&c)) {
                return Err(invalid("password contains a forbidden character".to_string()));
            }
            Ok(())
        })
    }
}

fn invalid(reason: String) -> CredentialError {
    CredentialError::InvalidCredentials { reason }
}
