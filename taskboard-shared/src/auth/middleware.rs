/// Request authentication for Axum
///
/// Extracts the bearer credential from the `Authorization` header and turns
/// it into an [`AuthContext`] via a [`TokenVerifier`]. The API's middleware
/// inserts the context into request extensions; handlers read it with
/// `Extension<AuthContext>`.
///
/// # Example
///
/// ```
/// use axum::http::{header, HeaderMap, HeaderValue};
/// use taskboard_shared::auth::middleware::bearer_token;
///
/// let mut headers = HeaderMap::new();
/// headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
///
/// assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
/// ```

use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};

use super::verifier::{TokenVerifier, VerifyError};

/// Response message when no usable bearer credential was sent
pub const MISSING_TOKEN_MESSAGE: &str = "Unauthorized: Missing or invalid token.";

/// Response message when the credential failed verification
pub const INVALID_TOKEN_MESSAGE: &str = "Unauthorized: Invalid token.";

/// Authenticated caller, added to request extensions
///
/// ```
/// use axum::Extension;
/// use taskboard_shared::auth::middleware::AuthContext;
///
/// async fn handler(Extension(auth): Extension<AuthContext>) -> String {
///     format!("User: {}", auth.user_id)
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Verified subject identifier
    pub user_id: String,

    /// E-mail claim, if the token carried one
    pub email: Option<String>,
}

impl AuthContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
        }
    }
}

/// Error type for request authentication
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Header absent, not valid UTF-8, not `Bearer <token>`, or empty token
    #[error("missing or malformed Authorization header")]
    MissingCredentials,

    /// Verifier rejected the token
    #[error("token rejected: {0}")]
    InvalidToken(#[from] VerifyError),
}

impl AuthError {
    /// Text safe to return to the client
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => MISSING_TOKEN_MESSAGE,
            AuthError::InvalidToken(_) => INVALID_TOKEN_MESSAGE,
        }
    }
}

/// Returns the token from `Authorization: Bearer <token>`
///
/// The scheme is matched case-sensitively, as the clients send it.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or(AuthError::MissingCredentials)?;

    if token.is_empty() {
        return Err(AuthError::MissingCredentials);
    }

    Ok(token)
}

/// Verifies the request's bearer token
///
/// The verifier is only consulted when a well-formed header is present.
pub async fn authenticate(
    verifier: &dyn TokenVerifier,
    headers: &HeaderMap,
) -> Result<AuthContext, AuthError> {
    let token = bearer_token(headers)?;
    let verified = verifier.verify(token).await?;

    Ok(AuthContext {
        user_id: verified.subject,
        email: verified.email,
    })
}
