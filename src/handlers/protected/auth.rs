use axum::Extension;
use serde::Serialize;
use uuid::Uuid;

use crate::middleware::{ApiResponse, ApiResult, AuthSource, CurrentUser};

#[derive(Debug, Serialize)]
pub struct WhoAmI {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub tenant: String,
    /// `session`, `token_cookie` or `bearer`
    pub auth: &'static str,
}

/// GET /api/auth/whoami - The authenticated caller
pub async fn whoami_get(Extension(user): Extension<CurrentUser>) -> ApiResult<WhoAmI> {
    let auth = match user.source {
        AuthSource::Session(_) => "session",
        AuthSource::TokenCookie => "token_cookie",
        AuthSource::Bearer => "bearer",
    };

    Ok(ApiResponse::success(WhoAmI {
        id: user.id,
        email: user.email,
        name: user.name,
        role: user.role.as_str().to_string(),
        tenant: user.tenant,
        auth,
    }))
}
