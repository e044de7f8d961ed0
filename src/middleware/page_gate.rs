use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::auth::cookies::has_session_cookie;

/// Page routes only check that a session or token cookie is present; the API
/// calls made by the page do the real validation.
pub async fn page_gate_middleware(request: Request, next: Next) -> Response {
    if has_session_cookie(request.headers()) {
        return next.run(request).await;
    }

    let next_path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/app");
    tracing::debug!("No session cookie for page {}; redirecting to login", next_path);

    let target = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("next", next_path)
        .finish();
    Redirect::to(&format!("/login?{}", target)).into_response()
}
