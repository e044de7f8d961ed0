use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Json},
};
use serde_json::{json, Value};

use crate::database::manager::DatabaseManager;

/// GET / - Service banner with the route map
pub async fn root_get() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "BizOps API",
            "version": version,
            "description": "Multi-tenant business management API",
            "endpoints": {
                "health": "/health (public)",
                "login": "/login, /auth/login, /auth/logout (public)",
                "app": "/app/* (session cookie)",
                "whoami": "/api/auth/whoami",
                "parties": "/api/clients, /api/vendors",
                "sales": "/api/projects, /api/tenders, /api/quotations",
                "finance": "/api/invoices/{client,vendor,legacy}, /api/payments",
                "purchasing": "/api/purchase-orders",
                "field_service": "/api/service-contracts, /api/service-jobs",
                "work": "/api/tasks, /api/activity, /api/notifications",
                "admin": "/api/users, /api/accounting/*",
            }
        }
    }))
}

/// GET /health - Liveness plus a main database ping
pub async fn health_get() -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}

const LOGIN_PAGE: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Sign in</title>
  <style>
    body { font-family: system-ui, sans-serif; display: grid; place-items: center; min-height: 100vh; margin: 0; background: #f4f5f7; }
    form { background: #fff; padding: 2rem; border-radius: 8px; box-shadow: 0 1px 4px rgba(0,0,0,.1); width: 20rem; }
    label { display: block; margin-top: 1rem; font-size: .9rem; }
    input { width: 100%; padding: .5rem; box-sizing: border-box; }
    button { margin-top: 1.5rem; width: 100%; padding: .6rem; }
    #error { color: #b00020; min-height: 1.2em; }
  </style>
</head>
<body>
  <form id="login">
    <h1>Sign in</h1>
    <label>Company <input name="tenant" autocomplete="organization" required></label>
    <label>Email <input name="email" type="email" autocomplete="username" required></label>
    <label>Password <input name="password" type="password" autocomplete="current-password" required></label>
    <button type="submit">Sign in</button>
    <p id="error"></p>
  </form>
  <script>
    const form = document.getElementById('login');
    form.addEventListener('submit', async (event) => {
      event.preventDefault();
      const body = Object.fromEntries(new FormData(form));
      const res = await fetch('/auth/login', {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify(body),
      });
      if (res.ok) {
        const next = new URLSearchParams(location.search).get('next');
        location.href = next && next.startsWith('/app') ? next : '/app';
      } else {
        const payload = await res.json().catch(() => ({}));
        document.getElementById('error').textContent = payload.error || 'Sign in failed';
      }
    });
  </script>
</body>
</html>
"#;

const APP_SHELL: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>BizOps</title>
</head>
<body>
  <div id="app" data-api="/api">Loading...</div>
  <script>
    fetch('/api/auth/whoami', { credentials: 'same-origin' })
      .then((res) => {
        if (res.status === 401) { location.href = '/login?next=' + encodeURIComponent(location.pathname); return null; }
        return res.json();
      })
      .then((payload) => {
        if (payload && payload.success) {
          document.getElementById('app').textContent = 'Signed in as ' + payload.data.name + ' (' + payload.data.role + ')';
        }
      });
  </script>
</body>
</html>
"#;

/// GET /login - Sign-in form
pub async fn login_page() -> Html<&'static str> {
    Html(LOGIN_PAGE)
}

/// GET /app, /app/* - Application shell; the bundle talks to /api
pub async fn app_shell() -> Html<&'static str> {
    Html(APP_SHELL)
}
