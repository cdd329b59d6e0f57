// Token claim structures.

use serde::{Deserialize, Serialize};

/// Claims carried by a signed access token.
///
/// `jti`, when present, is the id of the refresh-token row this access token
/// was minted against, letting the session-manager correlate the two without
/// the access token itself being individually revocable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessTokenClaims {
    /// User id (subject).
    pub sub: String,

    /// User email address.
    pub email: String,

    /// Token kind discriminator. Always `"access"` for this struct; kept as
    /// an explicit field (rather than relying on struct shape) so `require_type`
    /// can reject a token of the wrong kind even if the other claims happen
    /// to line up.
    #[serde(rename = "type")]
    pub token_type: String,

    /// Id of the originating refresh-token row, when this access token was
    /// minted against one.
    pub jti: Option<String>,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: u64,

    /// Expiry timestamp (Unix epoch seconds).
    pub exp: u64,
}

impl AccessTokenClaims {
    pub fn new(
        user_id: String,
        email: String,
        session_id: Option<String>,
        issued_at: u64,
        expires_at: u64,
    ) -> Self {
        Self {
            sub: user_id,
            email,
            token_type: "access".to_string(),
            jti: session_id,
            iat: issued_at,
            exp: expires_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        self.exp < now
    }
}

/// Claims for the legacy signed-refresh-token shape.
///
/// Refresh tokens in this system are opaque secrets, not signed envelopes —
/// see `services::jwt`. This struct is kept only so the backward-compatibility
/// test suite can assert that the old signed shape still decodes; it must
/// never be produced or accepted on a real authentication path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LegacySignedRefreshClaims {
    pub sub: String,
    pub jti: String,
    pub iat: u64,
    pub exp: u64,
    #[serde(default)]
    pub remember_me: bool,
}

impl LegacySignedRefreshClaims {
    pub fn is_expired(&self) -> bool {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        self.exp < now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn access_token_claims_round_trip() {
        let claims = AccessTokenClaims::new(
            "user-123".to_string(),
            "user@example.com".to_string(),
            Some(Uuid::new_v4().to_string()),
            1_640_995_200,
            1_640_998_800,
        );

        let json = serde_json::to_string(&claims).expect("should serialize");
        let deserialized: AccessTokenClaims =
            serde_json::from_str(&json).expect("should deserialize");

        assert_eq!(claims, deserialized);
        assert_eq!(deserialized.token_type, "access");
    }

    #[test]
    fn access_token_claims_field_shape() {
        let claims = AccessTokenClaims::new(
            "user-123".to_string(),
            "user@example.com".to_string(),
            None,
            0,
            0,
        );

        let value = serde_json::to_value(&claims).expect("should serialize");
        let obj = value.as_object().expect("should be object");

        assert_eq!(obj.len(), 6);
        assert!(obj.contains_key("sub"));
        assert!(obj.contains_key("email"));
        assert!(obj.contains_key("type"));
        assert!(obj.contains_key("jti"));
        assert!(obj.contains_key("iat"));
        assert!(obj.contains_key("exp"));
    }

    #[test]
    fn access_token_expiry_check() {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs();

        let expired = AccessTokenClaims::new(
            "user-expired".to_string(),
            "expired@example.com".to_string(),
            None,
            now - 3600,
            now - 1,
        );
        assert!(expired.is_expired());

        let valid = AccessTokenClaims::new(
            "user-valid".to_string(),
            "valid@example.com".to_string(),
            None,
            now,
            now + 3600,
        );
        assert!(!valid.is_expired());
    }

    #[test]
    fn legacy_signed_refresh_claims_still_decode() {
        let jti = Uuid::new_v4().to_string();
        let claims = LegacySignedRefreshClaims {
            sub: "user-456".to_string(),
            jti: jti.clone(),
            iat: 1_640_995_200,
            exp: 1_641_600_000,
            remember_me: true,
        };

        let json = serde_json::to_string(&claims).expect("should serialize");
        let deserialized: LegacySignedRefreshClaims =
            serde_json::from_str(&json).expect("should deserialize");

        assert_eq!(claims, deserialized);
        assert!(!deserialized.is_expired());
    }
}
