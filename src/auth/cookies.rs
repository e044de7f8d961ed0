//! Cookie names and the `Cookie` / `Set-Cookie` header plumbing for sessions.

use axum::http::{header, HeaderMap, HeaderValue};

use crate::config;

/// Primary server-side session cookie
pub const SESSION_COOKIE: &str = "bizops_session";
/// JWT fallback cookie
pub const TOKEN_COOKIE: &str = "bizops_token";
/// OAuth state for the accounting connect flow
pub const OAUTH_STATE_COOKIE: &str = "bizops_oauth_state";

/// Value of the named cookie across every `Cookie` header
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// True when either session cookie is present
pub fn has_session_cookie(headers: &HeaderMap) -> bool {
    read_cookie(headers, SESSION_COOKIE).is_some() || read_cookie(headers, TOKEN_COOKIE).is_some()
}

/// HttpOnly, SameSite=Lax cookie that lives `max_age_secs`
pub fn build_cookie(name: &str, value: &str, max_age_secs: i64) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        name, value, max_age_secs
    );
    if config::config().security.secure_cookies {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Expire a cookie immediately
pub fn clear_cookie(name: &str) -> String {
    build_cookie(name, "", 0)
}

/// Append `Set-Cookie` headers; values that are not valid header text are skipped
pub fn set_cookies(headers: &mut HeaderMap, cookies: impl IntoIterator<Item = String>) {
    for cookie in cookies {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!("Refusing to set malformed cookie: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(cookies: &[&str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for c in cookies {
            headers.append(header::COOKIE, HeaderValue::from_str(c).unwrap());
        }
        headers
    }

    #[test]
    fn reads_cookie_among_others() {
        let h = headers(&["theme=dark; bizops_session=abc123; lang=en"]);
        assert_eq!(read_cookie(&h, SESSION_COOKIE).as_deref(), Some("abc123"));
        assert_eq!(read_cookie(&h, TOKEN_COOKIE), None);
    }

    #[test]
    fn reads_cookie_from_second_header() {
        let h = headers(&["theme=dark", "bizops_token=eyJ.x.y"]);
        assert_eq!(read_cookie(&h, TOKEN_COOKIE).as_deref(), Some("eyJ.x.y"));
        assert!(has_session_cookie(&h));
    }

    #[test]
    fn empty_cookie_counts_as_absent() {
        let h = headers(&["bizops_session=; bizops_token="]);
        assert!(!has_session_cookie(&h));
    }

    #[test]
    fn prefix_named_cookies_do_not_match() {
        let h = headers(&["bizops_session_old=zzz"]);
        assert_eq!(read_cookie(&h, SESSION_COOKIE), None);
    }

    #[test]
    fn builds_and_clears_cookies() {
        let cookie = build_cookie(SESSION_COOKIE, "tok", 3600);
        assert!(cookie.starts_with("bizops_session=tok; Path=/; HttpOnly; SameSite=Lax; Max-Age=3600"));
        assert!(clear_cookie(TOKEN_COOKIE).contains("Max-Age=0"));
    }
}
