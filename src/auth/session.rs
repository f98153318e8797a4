//! Token issuance and verification
//!
//! Uses HMAC-signed bearer tokens. No server-side session storage;
//! only revoked token ids are tracked (see `revocation`).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::data::EntityId;

/// Token kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived token accepted by all authenticated endpoints
    Access,
    /// Long-lived token accepted only by the refresh endpoint
    Refresh,
}

/// Signed token claims
///
/// Carried in the token payload. `token_id` is what the revocation
/// store tracks on logout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Unique id of this token (ULID)
    pub token_id: String,
    /// Id of the authenticated user
    pub user_id: String,
    pub kind: TokenKind,
    /// Whether the token came directly from a password login
    /// (refresh-issued access tokens are not fresh)
    pub fresh: bool,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Claims {
    /// Build claims for a new token expiring `ttl_seconds` from now
    pub fn new(user_id: &str, kind: TokenKind, fresh: bool, ttl_seconds: i64) -> Self {
        let now = Utc::now();
        Self {
            token_id: EntityId::new().0,
            user_id: user_id.to_string(),
            kind,
            fresh,
            issued_at: now,
            expires_at: now + Duration::seconds(ttl_seconds),
        }
    }

    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// Create a signed bearer token
///
/// Token format: base64(payload).base64(hmac_sha256(payload))
///
/// # Arguments
/// * `claims` - Claims to encode
/// * `secret` - HMAC secret key
///
/// # Returns
/// Signed token string
pub fn issue_token(claims: &Claims, secret: &str) -> Result<String, crate::error::AppError> {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    // 1. Serialize claims to JSON
    let payload =
        serde_json::to_string(claims).map_err(|e| crate::error::AppError::Internal(e.into()))?;

    // 2. Base64 encode the payload
    let payload_b64 = general_purpose::URL_SAFE_NO_PAD.encode(payload.as_bytes());

    // 3. Create HMAC-SHA256 signature
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
    mac.update(payload_b64.as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(signature);

    // 4. Return "{payload}.{signature}"
    Ok(format!("{}.{}", payload_b64, signature_b64))
}

/// Verify and decode a bearer token
///
/// # Errors
/// Returns `Unauthorized` if the signature is invalid, the token is
/// malformed, or the token is expired
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, crate::error::AppError> {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    // 1. Split token into payload and signature
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 2 {
        return Err(crate::error::AppError::Unauthorized);
    }

    let payload_b64 = parts[0];
    let signature_b64 = parts[1];

    // 2. Verify HMAC signature
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
    mac.update(payload_b64.as_bytes());

    let expected_signature = general_purpose::URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| crate::error::AppError::Unauthorized)?;

    mac.verify_slice(&expected_signature)
        .map_err(|_| crate::error::AppError::Unauthorized)?;

    // 3. Decode and deserialize payload
    let payload_bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| crate::error::AppError::Unauthorized)?;

    let payload_str =
        String::from_utf8(payload_bytes).map_err(|_| crate::error::AppError::Unauthorized)?;

    let claims: Claims =
        serde_json::from_str(&payload_str).map_err(|_| crate::error::AppError::Unauthorized)?;

    // 4. Check if the token is expired
    if claims.is_expired() {
        return Err(crate::error::AppError::Unauthorized);
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-32-bytes-long!!!";

    #[test]
    fn round_trip_preserves_claims() {
        let claims = Claims::new("user-1", TokenKind::Access, true, 300);
        let token = issue_token(&claims, SECRET).unwrap();
        let decoded = verify_token(&token, SECRET).unwrap();

        assert_eq!(decoded.token_id, claims.token_id);
        assert_eq!(decoded.user_id, "user-1");
        assert_eq!(decoded.kind, TokenKind::Access);
        assert!(decoded.fresh);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let claims = Claims::new("user-1", TokenKind::Access, true, 300);
        let token = issue_token(&claims, SECRET).unwrap();

        let mut tampered = token.clone();
        tampered.insert(3, 'x');
        assert!(verify_token(&tampered, SECRET).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let claims = Claims::new("user-1", TokenKind::Access, true, 300);
        let token = issue_token(&claims, SECRET).unwrap();
        assert!(verify_token(&token, "another-secret-32-bytes-long!!!!").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = Claims::new("user-1", TokenKind::Access, true, -10);
        let token = issue_token(&claims, SECRET).unwrap();
        assert!(verify_token(&token, SECRET).is_err());
    }
}
