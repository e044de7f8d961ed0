mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn whoami_requires_credentials() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::get(server.url("/api/auth/whoami")).await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["success"], false);
    assert!(body.get("error").is_some(), "Response should have 'error' field: {}", body);

    Ok(())
}

#[tokio::test]
async fn malformed_bearer_is_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(server.url("/api/clients"))
        .header("Authorization", "Bearer not.a.jwt")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(server.url("/api/clients"))
        .header("Authorization", "Basic dXNlcjpwYXNz")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn garbage_token_cookie_is_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(server.url("/api/notifications"))
        .header("Cookie", "bizops_token=garbage")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn login_with_blank_fields_is_a_validation_error() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/auth/login"))
        .json(&json!({ "tenant": "", "email": "", "password": "" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["success"], false);
    for field in ["tenant", "email", "password"] {
        assert!(
            body["field_errors"].get(field).is_some(),
            "missing field error for {}: {}",
            field,
            body
        );
    }

    Ok(())
}

#[tokio::test]
async fn logout_without_session_clears_cookies() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client.post(server.url("/auth/logout")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let cookies: Vec<String> = res
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect();
    assert!(cookies.iter().any(|c| c.starts_with("bizops_session=;") && c.contains("Max-Age=0")));
    assert!(cookies.iter().any(|c| c.starts_with("bizops_token=;") && c.contains("Max-Age=0")));

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["data"]["logged_out"], true);

    Ok(())
}
