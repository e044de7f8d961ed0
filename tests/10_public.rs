mod common;

use anyhow::Result;
use reqwest::StatusCode;

#[tokio::test]
async fn root_lists_endpoints() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::get(server.url("/")).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["name"], "BizOps API");
    assert!(body["data"]["endpoints"]["health"].is_string());

    Ok(())
}

#[tokio::test]
async fn health_reports_database_state() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::get(server.url("/health")).await?;
    let status = res.status();
    assert!(
        status == StatusCode::OK || status == StatusCode::SERVICE_UNAVAILABLE,
        "unexpected health status {}",
        status
    );

    let body = res.json::<serde_json::Value>().await?;
    let expected = if status == StatusCode::OK { "ok" } else { "degraded" };
    assert_eq!(body["data"]["status"], expected, "body: {}", body);

    Ok(())
}

#[tokio::test]
async fn login_page_serves_html() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::get(server.url("/login")).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let content_type = res
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/html"), "content-type: {}", content_type);
    assert!(res.text().await?.contains("/auth/login"));

    Ok(())
}

#[tokio::test]
async fn unknown_route_is_not_found() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::get(server.url("/definitely-not-a-route")).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    Ok(())
}
