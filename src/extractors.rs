use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth::Subject;
use crate::error::AppError;
use crate::state::AppState;

/// The identity subject set by the gateway, if any.
/// Resolution to a user happens per operation, so anonymous requests still reach the API.
pub struct MaybeSubject(pub Option<Subject>);

impl FromRequestParts<AppState> for MaybeSubject {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let subject = parts
            .headers
            .get(state.config.auth.subject_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Subject(s.to_string()));

        Ok(MaybeSubject(subject))
    }
}
