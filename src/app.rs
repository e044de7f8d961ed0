use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config;
use crate::handlers::{protected, public};
use crate::middleware::{
    authenticate_middleware, page_gate_middleware, validate_tenant_middleware, validate_user_middleware,
};

/// Full application router
pub fn app() -> Router {
    let mut router = Router::new()
        .merge(public_routes())
        .merge(page_routes())
        .merge(protected_routes())
        .layer(cors_layer(&config::config().security.cors_origins));

    if config::config().api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }
    router
}

fn public_routes() -> Router {
    Router::new()
        .route("/", get(public::root_get))
        .route("/health", get(public::health_get))
        .route("/login", get(public::login_page))
        .route("/auth/login", post(public::login_post))
        .route("/auth/logout", post(public::logout_post))
}

fn page_routes() -> Router {
    Router::new()
        .route("/app", get(public::app_shell))
        .route("/app/*path", get(public::app_shell))
        .layer(from_fn(page_gate_middleware))
}

fn protected_routes() -> Router {
    Router::new()
        .merge(auth_routes())
        .merge(party_routes())
        .merge(sales_routes())
        .merge(finance_routes())
        .merge(service_routes())
        .merge(workspace_routes())
        .merge(accounting_routes())
        // Layers run bottom-up: authenticate, then tenant, then user
        .layer(from_fn(validate_user_middleware))
        .layer(from_fn(validate_tenant_middleware))
        .layer(from_fn(authenticate_middleware))
}

fn auth_routes() -> Router {
    use protected::auth;

    Router::new().route("/api/auth/whoami", get(auth::whoami_get))
}

fn party_routes() -> Router {
    use protected::{clients, users, vendors};

    Router::new()
        .route("/api/users", get(users::list).post(users::create))
        .route(
            "/api/users/:id",
            get(users::get).put(users::update).delete(users::delete),
        )
        .route("/api/clients", get(clients::list).post(clients::create))
        .route(
            "/api/clients/:id",
            get(clients::get).put(clients::update).delete(clients::delete),
        )
        .route("/api/vendors", get(vendors::list).post(vendors::create))
        .route(
            "/api/vendors/:id",
            get(vendors::get).put(vendors::update).delete(vendors::delete),
        )
}

fn sales_routes() -> Router {
    use protected::{projects, quotations, tenders};

    Router::new()
        .route("/api/projects", get(projects::list).post(projects::create))
        .route(
            "/api/projects/:id",
            get(projects::get).put(projects::update).delete(projects::delete),
        )
        .route("/api/quotations", get(quotations::list).post(quotations::create))
        .route(
            "/api/quotations/:id",
            get(quotations::get).put(quotations::update).delete(quotations::delete),
        )
        .route("/api/quotations/:id/status", post(quotations::set_status))
        .route("/api/quotations/:id/convert", post(quotations::convert))
        .route("/api/tenders", get(tenders::list).post(tenders::create))
        .route(
            "/api/tenders/:id",
            get(tenders::get).put(tenders::update).delete(tenders::delete),
        )
}

fn finance_routes() -> Router {
    use protected::{invoices, payments, purchase_orders};

    Router::new()
        .route(
            "/api/invoices/client",
            get(invoices::client_list).post(invoices::client_create),
        )
        .route(
            "/api/invoices/client/:id",
            get(invoices::client_get)
                .put(invoices::client_update)
                .delete(invoices::client_delete),
        )
        .route(
            "/api/invoices/vendor",
            get(invoices::vendor_list).post(invoices::vendor_create),
        )
        .route(
            "/api/invoices/vendor/:id",
            get(invoices::vendor_get)
                .put(invoices::vendor_update)
                .delete(invoices::vendor_delete),
        )
        .route("/api/invoices/legacy", get(invoices::legacy_list))
        .route("/api/invoices/legacy/:id", get(invoices::legacy_get))
        .route("/api/payments", get(payments::list).post(payments::create))
        .route("/api/payments/:id", get(payments::get))
        .route(
            "/api/purchase-orders",
            get(purchase_orders::list).post(purchase_orders::create),
        )
        .route(
            "/api/purchase-orders/:id",
            get(purchase_orders::get)
                .put(purchase_orders::update)
                .delete(purchase_orders::delete),
        )
        .route("/api/purchase-orders/:id/approve", post(purchase_orders::approve))
}

fn service_routes() -> Router {
    use axum::routing::put;
    use protected::service_contracts;

    Router::new()
        .route(
            "/api/service-contracts",
            get(service_contracts::list).post(service_contracts::create),
        )
        .route(
            "/api/service-contracts/:id",
            get(service_contracts::get).delete(service_contracts::delete),
        )
        .route("/api/service-contracts/:id/jobs", get(service_contracts::jobs))
        .route("/api/service-jobs", get(service_contracts::job_list))
        .route("/api/service-jobs/:id", put(service_contracts::job_update))
}

fn workspace_routes() -> Router {
    use protected::{activity, notifications, tasks};

    Router::new()
        .route("/api/tasks", get(tasks::list).post(tasks::create))
        .route(
            "/api/tasks/:id",
            get(tasks::get).put(tasks::update).delete(tasks::delete),
        )
        .route("/api/activity", get(activity::list))
        .route("/api/notifications", get(notifications::list))
        .route("/api/notifications/read-all", post(notifications::mark_all_read))
        .route("/api/notifications/:id/read", post(notifications::mark_read))
}

fn accounting_routes() -> Router {
    use axum::routing::delete;
    use protected::accounting;

    Router::new()
        .route("/api/accounting/status", get(accounting::status))
        .route("/api/accounting/connect", get(accounting::connect))
        .route("/api/accounting/sync/contacts", post(accounting::sync_contacts))
        .route("/api/accounting/sync/invoices", post(accounting::sync_invoices))
        .route("/api/accounting/connection", delete(accounting::disconnect))
        .route("/accounting/callback", get(accounting::callback))
}

/// Listed origins get credentialed CORS; `*` opens the API to any origin
/// without cookies.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter(|o| !o.is_empty())
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn api_without_credentials_is_unauthorized() {
        let response = app()
            .oneshot(Request::get("/api/auth/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn pages_without_cookie_redirect_to_login() {
        let response = app()
            .oneshot(Request::get("/app/clients").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
        assert_eq!(location, "/login?next=%2Fapp%2Fclients");
    }

    #[tokio::test]
    async fn login_page_is_public() {
        let response = app()
            .oneshot(Request::get("/login").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn wildcard_origin_is_permissive() {
        // Building the layer must not panic for either shape
        let _ = cors_layer(&["*".to_string()]);
        let _ = cors_layer(&["http://localhost:5173".to_string(), "not a header\n".to_string()]);
    }
}
