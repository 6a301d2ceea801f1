//! Privilege check for mutating requests.
//!
//! Configured admin tokens are kept only as SHA-256 digests and compared in
//! constant time.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdminAuthError {
    #[error("missing admin token")]
    Missing,
    #[error("invalid admin token")]
    Invalid,
}

#[derive(Clone, Default)]
pub struct AdminAuthenticator {
    digests: Vec<Vec<u8>>,
}

impl AdminAuthenticator {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let digests = tokens
            .into_iter()
            .map(|token| token.as_ref().trim().to_string())
            .filter(|token| !token.is_empty())
            .map(|token| hash_token(&token))
            .collect();
        Self { digests }
    }

    pub fn is_configured(&self) -> bool {
        !self.digests.is_empty()
    }

    pub fn verify(&self, presented: Option<&str>) -> Result<(), AdminAuthError> {
        let presented = presented
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AdminAuthError::Missing)?;
        let hashed = hash_token(presented);

        // No early exit: every digest is compared.
        let matched = self
            .digests
            .iter()
            .fold(0u8, |acc, digest| acc | digest.ct_eq(&hashed).unwrap_u8());
        if matched == 1 {
            Ok(())
        } else {
            Err(AdminAuthError::Invalid)
        }
    }
}

fn hash_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_any_configured_token() {
        let auth = AdminAuthenticator::new(["alpha", "beta"]);
        assert!(auth.is_configured());
        assert_eq!(auth.verify(Some("beta")), Ok(()));
        assert_eq!(auth.verify(Some(" alpha ")), Ok(()));
    }

    #[test]
    fn rejects_missing_and_wrong_tokens() {
        let auth = AdminAuthenticator::new(["alpha"]);
        assert_eq!(auth.verify(None), Err(AdminAuthError::Missing));
        assert_eq!(auth.verify(Some("")), Err(AdminAuthError::Missing));
        assert_eq!(auth.verify(Some("gamma")), Err(AdminAuthError::Invalid));
    }

    #[test]
    fn no_configured_tokens_rejects_everything() {
        let auth = AdminAuthenticator::new(Vec::<String>::new());
        assert!(!auth.is_configured());
        assert_eq!(auth.verify(Some("anything")), Err(AdminAuthError::Invalid));
    }
}
