/// Bearer authentication for `/api/*`
///
/// Runs before any task handler. On success the caller's
/// [`AuthContext`](taskboard_shared::auth::middleware::AuthContext) is placed
/// in request extensions; on failure the request ends here with a 401 and
/// the handler (and therefore the store) is never reached.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use taskboard_shared::auth::middleware::{authenticate, AuthError};

use crate::{app::AppState, error::ApiError};

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth = authenticate(state.verifier.as_ref(), req.headers())
        .await
        .map_err(|err| {
            if let AuthError::InvalidToken(cause) = &err {
                tracing::warn!(
                    provider = state.verifier.provider(),
                    error = %cause,
                    "Token verification failed"
                );
            }
            ApiError::from(err)
        })?;

    tracing::debug!(user_id = %auth.user_id, "Authenticated request");
    req.extensions_mut().insert(auth);

    Ok(next.run(req).await)
}
