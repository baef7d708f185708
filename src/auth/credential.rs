//! Admin credential shapes and verification

use crate::config::{CredentialConfig, CredentialMode};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// Credential submitted at login
#[derive(Clone, Deserialize)]
#[serde(untagged)]
pub enum Credential {
    UsernamePassword { username: String, password: String },
    Pin { pin: String },
}

impl Credential {
    pub fn pin(pin: impl Into<String>) -> Self {
        Self::Pin { pin: pin.into() }
    }

    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::UsernamePassword {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Pin { .. } => f.write_str("Credential::Pin([REDACTED])"),
            Credential::UsernamePassword { username, .. } => f
                .debug_struct("Credential::UsernamePassword")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
        }
    }
}

/// Checks submitted credentials against the configured one
///
/// Only SHA-256 digests are kept; comparison time does not depend on how
/// many leading bytes match.
#[derive(Clone)]
pub struct CredentialVerifier {
    mode: CredentialMode,
    username_digest: Option<[u8; 32]>,
    secret_digest: [u8; 32],
}

impl CredentialVerifier {
    pub fn from_config(config: &CredentialConfig) -> Self {
        Self {
            mode: config.mode,
            username_digest: config.username.as_deref().map(digest),
            secret_digest: digest(&config.secret),
        }
    }

    pub fn mode(&self) -> CredentialMode {
        self.mode
    }

    pub fn verify(&self, credential: &Credential) -> bool {
        match (self.mode, credential) {
            (CredentialMode::Pin, Credential::Pin { pin }) => {
                digests_match(&digest(pin), &self.secret_digest)
            }
            (CredentialMode::Password, Credential::UsernamePassword { username, password }) => {
                let Some(expected_user) = &self.username_digest else {
                    return false;
                };
                // Evaluate both so a wrong username costs as much as a wrong password
                let user_ok = digests_match(&digest(username), expected_user);
                let secret_ok = digests_match(&digest(password), &self.secret_digest);
                user_ok & secret_ok
            }
            _ => false,
        }
    }
}

impl fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialVerifier")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

pub(crate) fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

pub(crate) fn digests_match(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pin_verifier(pin: &str) -> CredentialVerifier {
        CredentialVerifier::from_config(&CredentialConfig {
            mode: CredentialMode::Pin,
            username: None,
            secret: pin.to_string(),
        })
    }

    #[test]
    fn test_pin_verification() {
        let verifier = pin_verifier("482913");
        assert!(verifier.verify(&Credential::pin("482913")));
        assert!(!verifier.verify(&Credential::pin("482914")));
        assert!(!verifier.verify(&Credential::pin("")));
    }

    #[test]
    fn test_password_verification_checks_both_fields() {
        let verifier = CredentialVerifier::from_config(&CredentialConfig {
            mode: CredentialMode::Password,
            username: Some("admin".to_string()),
            secret: "correct horse".to_string(),
        });
        assert!(verifier.verify(&Credential::password("admin", "correct horse")));
        assert!(!verifier.verify(&Credential::password("root", "correct horse")));
        assert!(!verifier.verify(&Credential::password("admin", "battery staple")));
    }

    #[test]
    fn test_mode_mismatch_is_rejected() {
        let verifier = pin_verifier("482913");
        assert!(!verifier.verify(&Credential::password("admin", "482913")));
    }

    #[test]
    fn test_credential_deserializes_both_shapes() {
        let pin: Credential = serde_json::from_str(r#"{"pin":"1234"}"#).unwrap();
        assert!(matches!(pin, Credential::Pin { .. }));

        let pw: Credential =
            serde_json::from_str(r#"{"username":"admin","password":"x"}"#).unwrap();
        assert!(matches!(pw, Credential::UsernamePassword { .. }));
        assert!(!format!("{pw:?}").contains("\"x\""));
    }
}
