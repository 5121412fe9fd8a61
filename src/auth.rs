//! 세션 티켓 (HMAC-SHA1)
//!
//! 티켓 형식: `user_id:expiry:signature`
//! signature = base64(HMAC-SHA1(secret, "user_id:expiry"))
//! 메인 웹 앱이 같은 시크릿으로 발급하고, 로비 서버는 검증만 한다.

use crate::error::LobbyError;
use crate::state::AppState;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha1 = Hmac<Sha1>;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn sign(payload: &str, secret: &str) -> Result<HmacSha1, LobbyError> {
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
        .map_err(|e| LobbyError::Internal(e.to_string()))?;
    mac.update(payload.as_bytes());
    Ok(mac)
}

/// 티켓 발급
pub fn issue_ticket(secret: &str, user_id: &str, ttl_secs: u64) -> Result<String, LobbyError> {
    if user_id.is_empty() || user_id.contains(':') {
        return Err(LobbyError::Invalid("Invalid user id".to_string()));
    }
    let payload = format!("{}:{}", user_id, now_secs() + ttl_secs);
    let signature = BASE64.encode(sign(&payload, secret)?.finalize().into_bytes());
    Ok(format!("{}:{}", payload, signature))
}

/// 티켓 검증. 성공하면 user_id 를 돌려준다.
/// 남은 유효 시간이 `max_ttl_secs` 를 넘는 티켓은 거부한다.
pub fn verify_ticket(
    secret: &str,
    ticket: &str,
    max_ttl_secs: u64,
) -> Result<String, LobbyError> {
    let mut parts = ticket.rsplitn(3, ':');
    let (Some(signature), Some(expiry), Some(user_id)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(LobbyError::Unauthorized);
    };

    let expiry_time: u64 = expiry.parse().map_err(|_| LobbyError::Unauthorized)?;
    let now = now_secs();
    if expiry_time <= now || user_id.is_empty() {
        return Err(LobbyError::Unauthorized);
    }
    if expiry_time > now.saturating_add(max_ttl_secs) {
        return Err(LobbyError::Unauthorized);
    }

    let signature = BASE64
        .decode(signature)
        .map_err(|_| LobbyError::Unauthorized)?;
    sign(&format!("{}:{}", user_id, expiry), secret)?
        .verify_slice(&signature)
        .map_err(|_| LobbyError::Unauthorized)?;

    Ok(user_id.to_string())
}

/// `Authorization: Bearer <ticket>` 에서 꺼낸 인증된 유저
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = LobbyError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let ticket = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(LobbyError::Unauthorized)?;

        let auth = &state.config.auth;
        verify_ticket(&auth.secret, ticket.trim(), auth.ticket_ttl).map(AuthUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";
    const MAX_TTL: u64 = 3600;

    #[test]
    fn test_issue_and_verify() {
        let ticket = issue_ticket(SECRET, "alice", 60).unwrap();
        assert_eq!(verify_ticket(SECRET, &ticket, MAX_TTL).unwrap(), "alice");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let ticket = issue_ticket(SECRET, "alice", 60).unwrap();
        assert!(matches!(
            verify_ticket("other-secret", &ticket, MAX_TTL),
            Err(LobbyError::Unauthorized)
        ));
    }

    #[test]
    fn test_tampered_user_rejected() {
        let ticket = issue_ticket(SECRET, "alice", 60).unwrap();
        let forged = ticket.replacen("alice", "mallory", 1);
        assert!(verify_ticket(SECRET, &forged, MAX_TTL).is_err());
    }

    #[test]
    fn test_expired_ticket_rejected() {
        let ticket = issue_ticket(SECRET, "alice", 0).unwrap();
        assert!(verify_ticket(SECRET, &ticket, MAX_TTL).is_err());
    }

    #[test]
    fn test_malformed_ticket_rejected() {
        assert!(verify_ticket(SECRET, "garbage", MAX_TTL).is_err());
        assert!(verify_ticket(SECRET, "alice:notanumber:sig", MAX_TTL).is_err());
        assert!(issue_ticket(SECRET, "a:b", 60).is_err());
    }

    #[test]
    fn test_ticket_outliving_max_ttl_rejected() {
        let ticket = issue_ticket(SECRET, "alice", MAX_TTL * 24).unwrap();
        assert!(matches!(
            verify_ticket(SECRET, &ticket, MAX_TTL),
            Err(LobbyError::Unauthorized)
        ));
        assert_eq!(verify_ticket(SECRET, &ticket, MAX_TTL * 24).unwrap(), "alice");
    }
}
