use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

const MIN_TOKEN_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum AdminAuthError {
    #[error("missing admin token")]
    Missing,
    #[error("invalid admin token")]
    Invalid,
}

#[derive(Debug, Error)]
pub enum AdminTokenError {
    #[error("admin token must be at least {MIN_TOKEN_LEN} characters")]
    TooShort,
}

/// Identity attached to authenticated admin requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminPrincipal {
    /// Short digest prefix of the token, safe to log.
    pub fingerprint: String,
}

/// Verifies the single configured admin token.
///
/// Only the SHA-256 digest of the token is retained.
#[derive(Clone)]
pub struct AdminAuth {
    digest: Vec<u8>,
    fingerprint: String,
}

impl std::fmt::Debug for AdminAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminAuth")
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

impl AdminAuth {
    pub fn new(token: &str) -> Result<Self, AdminTokenError> {
        let token = token.trim();
        if token.len() < MIN_TOKEN_LEN {
            return Err(AdminTokenError::TooShort);
        }
        let digest = Self::hash_token(token);
        let fingerprint = hex::encode(&digest[..4]);
        Ok(Self {
            digest,
            fingerprint,
        })
    }

    pub fn authenticate(&self, presented: Option<&str>) -> Result<AdminPrincipal, AdminAuthError> {
        let presented = presented
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AdminAuthError::Missing)?;

        let hashed_input = Self::hash_token(presented);
        if self.digest.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Err(AdminAuthError::Invalid);
        }

        Ok(AdminPrincipal {
            fingerprint: self.fingerprint.clone(),
        })
    }

    fn hash_token(token: &str) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hasher.finalize().to_vec()
    }
}
