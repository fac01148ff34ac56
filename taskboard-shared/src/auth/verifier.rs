/// Token verification seam
///
/// The request pipeline only knows this trait. Which identity provider sits
/// behind it is decided once, at startup, from configuration.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identity extracted from a successfully verified token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedToken {
    /// Stable subject identifier (the task owner id)
    pub subject: String,

    /// E-mail claim, when the provider includes one
    pub email: Option<String>,
}

/// Why a token was rejected
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// `exp` is in the past
    #[error("Token has expired")]
    Expired,

    /// Signature, issuer, audience, or claim checks failed
    #[error("Invalid token: {0}")]
    Invalid(String),

    /// Signing keys could not be obtained from the provider
    #[error("Signing keys unavailable: {0}")]
    KeyUnavailable(String),
}

/// Validates a bearer credential and yields its subject
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Provider name for logs
    fn provider(&self) -> &'static str;

    /// Verifies `token` (without the `Bearer ` prefix)
    async fn verify(&self, token: &str) -> Result<VerifiedToken, VerifyError>;
}

/// Subject identifiers must be non-empty and at most 128 characters
pub fn validate_subject(sub: &str) -> Result<(), VerifyError> {
    if sub.trim().is_empty() {
        return Err(VerifyError::Invalid("empty 'sub' claim".to_string()));
    }
    if sub.chars().count() > 128 {
        return Err(VerifyError::Invalid("'sub' claim longer than 128 characters".to_string()));
    }
    Ok(())
}
