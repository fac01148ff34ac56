/// HS256 shared-secret tokens
///
/// Used when the server runs with `AUTH_PROVIDER=hs256`: local development
/// without a Firebase project, and the integration test suite. Tokens carry
/// the same identity as a Firebase ID token (`sub`, optional `email`).
///
/// # Security
///
/// - **Algorithm**: HS256 (HMAC with SHA-256)
/// - **Validation**: signature, `exp`, `nbf`, and issuer
/// - **Secret**: at least 32 bytes; enforced by the server configuration
///
/// # Example
///
/// ```
/// use taskboard_shared::auth::jwt::{create_token, validate_token, Claims};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "your-secret-key-at-least-32-bytes";
/// let claims = Claims::new("user-abc-123", "taskboard").with_email("a@example.com");
/// let token = create_token(&claims, secret)?;
///
/// let validated = validate_token(&token, secret, "taskboard")?;
/// assert_eq!(validated.sub, "user-abc-123");
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::verifier::{validate_subject, TokenVerifier, VerifiedToken, VerifyError};

/// Default token lifetime
pub const DEFAULT_EXPIRATION_HOURS: i64 = 1;

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Signature, format, or claim validation failed
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Issuer did not match
    #[error("Invalid issuer: expected {expected}")]
    InvalidIssuer { expected: String },
}

impl From<JwtError> for VerifyError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => VerifyError::Expired,
            other => VerifyError::Invalid(other.to_string()),
        }
    }
}

/// JWT claims
///
/// Mirrors the subset of a Firebase ID token the API relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - user ID
    pub sub: String,

    /// Issuer
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// Optional e-mail claim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Claims {
    /// Claims valid for [`DEFAULT_EXPIRATION_HOURS`]
    pub fn new(user_id: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self::with_expiration(user_id, issuer, Duration::hours(DEFAULT_EXPIRATION_HOURS))
    }

    /// Claims with a custom lifetime (negative durations produce expired tokens)
    pub fn with_expiration(
        user_id: impl Into<String>,
        issuer: impl Into<String>,
        expires_in: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id.into(),
            iss: issuer.into(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
            email: None,
        }
    }

    /// Attaches an e-mail claim
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Checks if token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Signs claims with HS256
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Validates an HS256 token and returns its claims
///
/// Verifies signature, expiration, not-before, and issuer.
pub fn validate_token(token: &str, secret: &str, issuer: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[issuer]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = 0;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer {
            expected: issuer.to_string(),
        },
        _ => JwtError::ValidationError(e.to_string()),
    })?;

    Ok(token_data.claims)
}

/// [`TokenVerifier`] over HS256 shared-secret tokens
#[derive(Clone)]
pub struct HmacVerifier {
    secret: String,
    issuer: String,
}

impl std::fmt::Debug for HmacVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never print the secret
        f.debug_struct("HmacVerifier")
            .field("issuer", &self.issuer)
            .finish()
    }
}

impl HmacVerifier {
    pub fn new(secret: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: issuer.into(),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }
}

#[async_trait]
impl TokenVerifier for HmacVerifier {
    fn provider(&self) -> &'static str {
        "hs256"
    }

    async fn verify(&self, token: &str) -> Result<VerifiedToken, VerifyError> {
        let claims = validate_token(token, &self.secret, &self.issuer)?;
        validate_subject(&claims.sub)?;

        Ok(VerifiedToken {
            subject: claims.sub,
            email: claims.email,
        })
    }
}
