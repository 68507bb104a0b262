//! The `authToken` session cookie
//!
//! The frontend is served from another site, so the cookie has to be
//! `SameSite=None`, which browsers only accept together with `Secure`.

use super::jwt::SESSION_TTL_SECONDS;

/// Cookie carrying the session token
pub const SESSION_COOKIE: &str = "authToken";

/// Set-Cookie value for a freshly issued session token
pub fn session_cookie(token: &str) -> String {
    format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; Secure; SameSite=None",
        SESSION_COOKIE, token, SESSION_TTL_SECONDS
    )
}

/// Set-Cookie value that removes the session cookie
pub fn clear_session_cookie() -> String {
    format!(
        "{}=; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Secure; SameSite=None",
        SESSION_COOKIE
    )
}

/// Find the session token in a `Cookie` request header
pub fn extract_session_cookie(cookie_header: Option<&str>) -> Option<&str> {
    cookie_header?
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("tok");
        assert!(cookie.starts_with("authToken=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=None"));
        assert!(cookie.contains("Max-Age=86400"));
    }

    #[test]
    fn test_clear_cookie_expires_immediately() {
        let cookie = clear_session_cookie();
        assert!(cookie.starts_with("authToken=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[test]
    fn test_extract_session_cookie() {
        assert_eq!(
            extract_session_cookie(Some("theme=dark; authToken=abc.def.ghi; lang=tl")),
            Some("abc.def.ghi")
        );
        assert_eq!(extract_session_cookie(Some("authToken=")), None);
        assert_eq!(extract_session_cookie(Some("theme=dark")), None);
        assert_eq!(extract_session_cookie(None), None);
    }
}
