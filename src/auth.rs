//! Admin panel authentication.
//!
//! A single shared password, stored as a hex SHA-256 digest. A successful login sets the
//! `admin_session` cookie to `{issued_at}.{hmac}` where the HMAC covers `issued_at` and is
//! keyed by the session secret. The cookie expires after the configured TTL.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use time::Duration;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::payment::signature;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "admin_session";

/// Tolerated clock skew for cookies issued slightly in the future.
const MAX_SKEW_SECS: i64 = 60;

pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

pub fn password_matches(password: &str, expected_hash: &str) -> bool {
    let computed = hash_password(password);
    let expected = expected_hash.trim().to_ascii_lowercase();
    computed.len() == expected.len() && bool::from(computed.as_bytes().ct_eq(expected.as_bytes()))
}

pub fn issue_session(secret: &str, issued_at: i64) -> Result<String> {
    let mac = signature::sign(secret, issued_at.to_string().as_bytes())
        .map_err(|e| AppError::Config(e.to_string()))?;
    Ok(format!("{}.{}", issued_at, mac))
}

pub fn session_is_valid(secret: &str, value: &str, now: i64, ttl_secs: i64) -> bool {
    let Some((issued, mac)) = value.split_once('.') else { return false };
    let Ok(issued_at) = issued.parse::<i64>() else { return false };
    if !signature::verify(secret, issued.as_bytes(), mac) {
        return false;
    }
    let Some(age) = now.checked_sub(issued_at) else { return false };
    age >= -MAX_SKEW_SECS && age < ttl_secs
}

pub fn session_cookie(value: String, ttl_secs: i64) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(Duration::seconds(ttl_secs))
        .build()
}

/// Checks the password and returns the session cookie to set.
pub fn login(config: &AppConfig, password: &str, now: i64) -> Result<Cookie<'static>> {
    if !password_matches(password, &config.admin_password_hash) {
        warn!("Admin login rejected");
        return Err(AppError::Unauthorized("Invalid password".to_string()));
    }
    let value = issue_session(&config.session_secret, now)?;
    info!("Admin logged in");
    Ok(session_cookie(value, config.admin_session_ttl_secs))
}

pub fn logout(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

/// Middleware for `/admin/*`: rejects requests without a valid session cookie.
pub async fn require_admin(State(state): State<AppState>, jar: CookieJar, request: Request, next: Next) -> Result<Response> {
    let now = chrono::Utc::now().timestamp();
    let valid = jar.get(SESSION_COOKIE).is_some_and(|c| {
        session_is_valid(&state.config.session_secret, c.value(), now, state.config.admin_session_ttl_secs)
    });
    if !valid {
        debug!(path = %request.uri().path(), "Admin session missing or expired");
        return Err(AppError::Unauthorized("Admin login required".to_string()));
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "session-secret";

    #[test]
    fn test_password_hash() {
        // sha256("admin")
        let hash = "8c6976e5b5410415bde908bd4dee15dfb167a9c873fc4bb8a81f6f2ab448a918";
        assert_eq!(hash_password("admin"), hash);
        assert!(password_matches("admin", &hash.to_uppercase()));
        assert!(!password_matches("Admin", hash));
        assert!(!password_matches("admin", "short"));
    }

    #[test]
    fn test_session_round_trip() {
        let value = issue_session(SECRET, 1_700_000_000).unwrap();
        assert!(session_is_valid(SECRET, &value, 1_700_000_100, 3600));
        assert!(!session_is_valid("other-secret", &value, 1_700_000_100, 3600));
    }

    #[test]
    fn test_session_expiry_and_tampering() {
        let value = issue_session(SECRET, 1_700_000_000).unwrap();
        assert!(!session_is_valid(SECRET, &value, 1_700_003_600, 3600));
        let forged = value.replacen("1700000000", "1700009999", 1);
        assert!(!session_is_valid(SECRET, &forged, 1_700_010_000, 3600));
        assert!(!session_is_valid(SECRET, "garbage", 1_700_000_000, 3600));
    }

    #[test]
    fn test_extreme_issue_times_rejected() {
        let now = 1_700_000_000;
        assert!(!session_is_valid(SECRET, &format!("{}.00", i64::MIN), now, 3600));
        assert!(!session_is_valid(SECRET, &format!("{}.00", i64::MAX), now, 3600));
        // correctly signed but absurd timestamps
        assert!(!session_is_valid(SECRET, &issue_session(SECRET, i64::MIN).unwrap(), now, 3600));
        assert!(!session_is_valid(SECRET, &issue_session(SECRET, i64::MAX).unwrap(), now, 3600));
        assert!(!session_is_valid(SECRET, &issue_session(SECRET, now).unwrap(), i64::MIN, 3600));
    }

    #[test]
    fn test_small_clock_skew_tolerated() {
        let value = issue_session(SECRET, 1_700_000_030).unwrap();
        assert!(session_is_valid(SECRET, &value, 1_700_000_000, 3600));
        let value = issue_session(SECRET, 1_700_000_100).unwrap();
        assert!(!session_is_valid(SECRET, &value, 1_700_000_000, 3600));
    }

    #[test]
    fn test_cookie_attributes() {
        let cookie = session_cookie("1.abc".into(), 86_400);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(86_400)));
    }
}
