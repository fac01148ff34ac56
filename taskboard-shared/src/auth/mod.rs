/// Authentication and authorization
///
/// # Modules
///
/// - [`verifier`]: The `TokenVerifier` seam and its result/error types
/// - [`firebase`]: Firebase ID-token verification against Google's published keys
/// - [`jwt`]: HS256 shared-secret tokens for local development and tests
/// - [`middleware`]: Bearer header parsing and the per-request `AuthContext`
/// - [`authorization`]: The task ownership guard
///
/// # Example
///
/// ```
/// use taskboard_shared::auth::jwt::{create_token, Claims, HmacVerifier};
/// use taskboard_shared::auth::verifier::TokenVerifier;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "a-local-development-secret-of-32-bytes";
/// let token = create_token(&Claims::new("u1", "taskboard"), secret)?;
///
/// let verifier = HmacVerifier::new(secret, "taskboard");
/// let verified = verifier.verify(&token).await?;
/// assert_eq!(verified.subject, "u1");
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod firebase;
pub mod jwt;
pub mod middleware;
pub mod verifier;
