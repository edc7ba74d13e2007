use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use std::str::FromStr;

pub mod chatrooms;
pub mod subscription;

const X_USER_ID: &str = "X-User-ID";

/// Authenticated user id, resolved upstream by the auth collaborator and
/// forwarded in the `X-User-ID` header.
#[derive(Debug)]
pub struct ExtractUser(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for ExtractUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, (StatusCode, &'static str)> {
        if let Some(user_id) = parts.headers.get(X_USER_ID) {
            let user_id = user_id
                .to_str()
                .map_err(|_| (StatusCode::UNAUTHORIZED, "invalid user id"))?;
            let user_id = i64::from_str(user_id)
                .map_err(|_| (StatusCode::UNAUTHORIZED, "invalid user id"))?;
            Ok(ExtractUser(user_id))
        } else {
            Err((StatusCode::UNAUTHORIZED, "`X-User-ID` header is missing"))
        }
    }
}
