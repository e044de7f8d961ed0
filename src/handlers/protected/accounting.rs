use axum::{
    extract::Query,
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    Extension,
};
use serde::{Deserialize, Serialize};

use crate::accounting::connection::{self, ConnectionStatus};
use crate::accounting::{sync, AccountingError, AccountingProvider, HttpAccountingClient, SyncSummary};
use crate::auth::cookies::{build_cookie, clear_cookie, read_cookie, set_cookies, OAUTH_STATE_COOKIE};
use crate::auth::roles::allow;
use crate::auth::{require_role, session};
use crate::config;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool};

const STATE_COOKIE_MAX_AGE: i64 = 600;

fn provider_name() -> &'static str {
    &config::config().accounting.provider
}

/// GET /api/accounting/status
pub async fn status(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
) -> ApiResult<ConnectionStatus> {
    require_role(&user, allow::ACCOUNTING_SYNC)?;
    let accounting = &config::config().accounting;
    let stored = connection::load(&pool, &accounting.provider).await?;
    Ok(ApiResponse::success(ConnectionStatus::new(
        &accounting.provider,
        accounting.is_configured(),
        stored.as_ref(),
    )))
}

/// GET /api/accounting/connect - Redirect to the platform's consent screen
pub async fn connect(Extension(user): Extension<CurrentUser>) -> Result<Response, ApiError> {
    require_role(&user, allow::ACCOUNTING_SYNC)?;
    let client = HttpAccountingClient::from_config()?;
    let state = session::new_session_token();
    let url = client.authorize_url(&state)?;

    let mut response = Redirect::to(&url).into_response();
    set_cookies(
        response.headers_mut(),
        [build_cookie(OAUTH_STATE_COOKIE, &state, STATE_COOKIE_MAX_AGE)],
    );
    Ok(response)
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// GET /accounting/callback - Finish the OAuth flow and store the tokens
pub async fn callback(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, ApiError> {
    require_role(&user, allow::ACCOUNTING_SYNC)?;

    if let Some(error) = query.error {
        tracing::warn!("Accounting authorization declined for {}: {}", user.tenant, error);
        return Err(ApiError::bad_request(format!("Authorization failed: {}", error)));
    }

    let expected = read_cookie(&headers, OAUTH_STATE_COOKIE);
    match (expected.as_deref(), query.state.as_deref()) {
        (Some(expected), Some(given)) if expected == given => {}
        _ => return Err(AccountingError::StateMismatch.into()),
    }
    let code = query
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing authorization code"))?;

    let client = HttpAccountingClient::from_config()?;
    let tokens = client.exchange_code(&code).await?;
    connection::save(&pool, provider_name(), &tokens, user.id).await?;

    tracing::info!("Tenant {} connected to {}", user.tenant, provider_name());

    let mut response = Redirect::to("/app").into_response();
    set_cookies(response.headers_mut(), [clear_cookie(OAUTH_STATE_COOKIE)]);
    Ok(response)
}

/// POST /api/accounting/sync/contacts
pub async fn sync_contacts(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
) -> ApiResult<SyncSummary> {
    require_role(&user, allow::ACCOUNTING_SYNC)?;
    let client = HttpAccountingClient::from_config()?;
    let active = connection::active(&pool, provider_name(), &client).await?;
    let summary = sync::sync_contacts(&pool, &client, &active, user.id).await?;
    tracing::info!(
        "Contact sync for {}: pushed {}, pulled {}, skipped {}",
        user.tenant,
        summary.pushed,
        summary.pulled,
        summary.skipped
    );
    Ok(ApiResponse::success(summary))
}

/// POST /api/accounting/sync/invoices
pub async fn sync_invoices(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
) -> ApiResult<SyncSummary> {
    require_role(&user, allow::ACCOUNTING_SYNC)?;
    let client = HttpAccountingClient::from_config()?;
    let active = connection::active(&pool, provider_name(), &client).await?;
    let summary = sync::sync_invoices(&pool, &client, &active, user.id).await?;
    tracing::info!(
        "Invoice sync for {}: pushed {}, pulled {}, skipped {}",
        user.tenant,
        summary.pushed,
        summary.pulled,
        summary.skipped
    );
    Ok(ApiResponse::success(summary))
}

#[derive(Debug, Serialize)]
pub struct Disconnected {
    pub provider: String,
    pub disconnected: bool,
}

/// DELETE /api/accounting/connection - Forget stored tokens
pub async fn disconnect(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
) -> ApiResult<Disconnected> {
    require_role(&user, allow::ACCOUNTING_SYNC)?;
    if !connection::delete(&pool, provider_name()).await? {
        return Err(AccountingError::NotConnected.into());
    }
    tracing::info!("Tenant {} disconnected from {}", user.tenant, provider_name());
    Ok(ApiResponse::success(Disconnected {
        provider: provider_name().to_string(),
        disconnected: true,
    }))
}
