// Signed access-token service.
//
// Access tokens are short-lived signed envelopes (HMAC-SHA256). Refresh
// tokens are opaque secrets managed entirely by `models::refresh_token` and
// never pass through this service — see `LegacySignedRefreshClaims` in
// `models::auth` for the retired signed-refresh shape, kept only for
// backward-compatibility tests.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

use crate::models::auth::AccessTokenClaims;

#[derive(Error, Debug)]
pub enum JwtError {
    #[error("JWT encoding error: {0}")]
    EncodingError(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token is not of the expected type")]
    WrongType,

    #[error("Required claim missing or malformed")]
    MissingClaim,

    #[error("Key generation error: {0}")]
    KeyGenerationError(String),
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::TokenExpired,
            ErrorKind::InvalidToken | ErrorKind::InvalidSignature => JwtError::InvalidToken,
            _ => JwtError::EncodingError(err.to_string()),
        }
    }
}

/// Access-token signing configuration.
///
/// The algorithm is pinned to HS256 — never read from the token header — so
/// a forged token cannot downgrade verification to `alg: none`. `previous_decoding_key`
/// lets a secret rotation keep decoding tokens signed under the outgoing key
/// while `encoding_key` only ever issues under the current one.
#[derive(Clone)]
pub struct JwtConfig {
    pub access_token_expiry: u64,
    pub refresh_token_expiry: u64,
    pub algorithm: Algorithm,
    pub encoding_key: EncodingKey,
    pub decoding_key: DecodingKey,
    pub previous_decoding_key: Option<DecodingKey>,
    pub key_version: u32,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_token_expiry", &self.access_token_expiry)
            .field("refresh_token_expiry", &self.refresh_token_expiry)
            .field("algorithm", &self.algorithm)
            .field("encoding_key", &"<redacted>")
            .field("decoding_key", &"<redacted>")
            .field(
                "previous_decoding_key",
                &self.previous_decoding_key.as_ref().map(|_| "<redacted>"),
            )
            .field("key_version", &self.key_version)
            .finish()
    }
}

impl JwtConfig {
    fn build_from_params(
        access_secret: String,
        previous_access_secret: Option<String>,
        access_expiry: u64,
        refresh_expiry: u64,
        key_version: u32,
    ) -> Self {
        let encoding_key = EncodingKey::from_secret(access_secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(access_secret.as_bytes());
        let previous_decoding_key = previous_access_secret
            .map(|secret| DecodingKey::from_secret(secret.as_bytes()));

        JwtConfig {
            access_token_expiry: access_expiry,
            refresh_token_expiry: refresh_expiry,
            algorithm: Algorithm::HS256,
            encoding_key,
            decoding_key,
            previous_decoding_key,
            key_version,
        }
    }

    /// Build from the centralized application configuration.
    pub fn from_env() -> Result<Self, JwtError> {
        let crate::app_config::JwtConfig {
            access_secret,
            previous_access_secret,
            access_expiry,
            refresh_expiry,
            audience: _,
            issuer: _,
            key_version,
        } = &crate::CONFIG.jwt;

        Ok(Self::build_from_params(
            access_secret.clone(),
            previous_access_secret.clone(),
            *access_expiry,
            *refresh_expiry,
            *key_version,
        ))
    }

    #[cfg(test)]
    pub fn for_test() -> Self {
        Self::build_from_params(
            "test-access-secret-hs256".to_string(),
            None,
            1800,   // 30 minutes
            2592000, // 30 days
            1,
        )
    }
}

/// Mints and verifies signed access tokens. Stateless — holds no database or
/// Redis handle, since access-token validity is entirely self-contained in
/// the signature and `exp` claim (no server-side revocation list at this layer).
pub struct JwtService {
    config: JwtConfig,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Result<Self, JwtError> {
        Ok(Self::new(JwtConfig::from_env()?))
    }

    /// Mint an access token for `user_id`/`email`, optionally binding it to a
    /// session (refresh-token row) id via `jti`.
    pub fn make_access(
        &self,
        user_id: &str,
        email: &str,
        session_id: Option<&str>,
    ) -> Result<String, JwtError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| JwtError::KeyGenerationError(e.to_string()))?
            .as_secs();

        let claims = AccessTokenClaims::new(
            user_id.to_string(),
            email.to_string(),
            session_id.map(str::to_string),
            now,
            now + self.config.access_token_expiry,
        );

        let mut header = Header::new(self.config.algorithm);
        header.kid = Some(self.config.key_version.to_string());

        encode(&header, &claims, &self.config.encoding_key).map_err(Into::into)
    }

    /// Decode and signature-verify a token without checking expiry — callers
    /// that need expiry enforcement call `is_expired` explicitly, per the
    /// "decode succeeds, is_expired reports true" contract for expired tokens.
    pub fn decode(&self, token: &str) -> Result<AccessTokenClaims, JwtError> {
        let mut validation = Validation::new(self.config.algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.required_spec_claims.clear();

        match decode::<AccessTokenClaims>(token, &self.config.decoding_key, &validation) {
            Ok(data) => Ok(data.claims),
            Err(primary_err) => {
                if let Some(previous) = &self.config.previous_decoding_key {
                    if let Ok(data) =
                        decode::<AccessTokenClaims>(token, previous, &validation)
                    {
                        return Ok(data.claims);
                    }
                }
                Err(primary_err.into())
            },
        }
    }

    /// Decode and assert the claim's `type` matches `expected_type`.
    pub fn require_type(
        &self,
        token: &str,
        expected_type: &str,
    ) -> Result<AccessTokenClaims, JwtError> {
        let claims = self.decode(token)?;
        if claims.token_type != expected_type {
            return Err(JwtError::WrongType);
        }
        Ok(claims)
    }

    pub fn user_id_of(&self, token: &str) -> Result<Uuid, JwtError> {
        let claims = self.decode(token)?;
        Uuid::parse_str(&claims.sub).map_err(|_| JwtError::MissingClaim)
    }

    pub fn session_id_of(&self, token: &str) -> Result<Uuid, JwtError> {
        let claims = self.decode(token)?;
        let jti = claims.jti.ok_or(JwtError::MissingClaim)?;
        Uuid::parse_str(&jti).map_err(|_| JwtError::MissingClaim)
    }

    pub fn expiration_of(&self, token: &str) -> Option<DateTime<Utc>> {
        let claims = self.decode(token).ok()?;
        DateTime::from_timestamp(claims.exp as i64, 0)
    }

    /// Swallows all decode failures (malformed, wrong signature, ...) and
    /// treats them as expired, per the service contract.
    pub fn is_expired(&self, token: &str) -> bool {
        match self.decode(token) {
            Ok(claims) => claims.is_expired(),
            Err(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_access_round_trips() {
        let service = JwtService::new(JwtConfig::for_test());

        let token = service
            .make_access("test-user-id", "test@example.com", None)
            .unwrap();
        assert!(!token.is_empty());

        let claims = service.decode(&token).unwrap();
        assert_eq!(claims.sub, "test-user-id");
        assert_eq!(claims.email, "test@example.com");
        assert_eq!(claims.token_type, "access");
        assert!(claims.jti.is_none());
    }

    #[test]
    fn make_access_carries_session_id() {
        let service = JwtService::new(JwtConfig::for_test());
        let session_id = Uuid::new_v4().to_string();

        let token = service
            .make_access("test-user-id", "test@example.com", Some(&session_id))
            .unwrap();

        assert_eq!(service.session_id_of(&token).unwrap().to_string(), session_id);
    }

    #[test]
    fn require_type_rejects_mismatched_type() {
        let service = JwtService::new(JwtConfig::for_test());
        let token = service
            .make_access("test-user-id", "test@example.com", None)
            .unwrap();

        assert!(service.require_type(&token, "access").is_ok());
        assert!(matches!(
            service.require_type(&token, "refresh"),
            Err(JwtError::WrongType)
        ));
    }

    #[test]
    fn user_id_of_parses_subject() {
        let service = JwtService::new(JwtConfig::for_test());
        let user_id = Uuid::new_v4();
        let token = service
            .make_access(&user_id.to_string(), "test@example.com", None)
            .unwrap();

        assert_eq!(service.user_id_of(&token).unwrap(), user_id);
    }

    #[test]
    fn is_expired_true_for_expired_token() {
        let mut config = JwtConfig::for_test();
        config.access_token_expiry = 0;
        let service = JwtService::new(config);

        let token = service
            .make_access("test-user-id", "test@example.com", None)
            .unwrap();

        std::thread::sleep(std::time::Duration::from_secs(1));
        assert!(service.is_expired(&token));
        // decode still succeeds even though the token has expired.
        assert!(service.decode(&token).is_ok());
    }

    #[test]
    fn is_expired_true_for_malformed_token() {
        let service = JwtService::new(JwtConfig::for_test());
        assert!(service.is_expired("not-a-real-token"));
    }

    #[test]
    fn decode_falls_back_to_previous_key_after_rotation() {
        let mut old_config = JwtConfig::for_test();
        old_config.key_version = 1;
        let old_service = JwtService::new(old_config);

        let token = old_service
            .make_access("test-user-id", "test@example.com", None)
            .unwrap();

        let mut rotated_config = JwtConfig::build_from_params(
            "new-access-secret-hs256".to_string(),
            Some("test-access-secret-hs256".to_string()),
            1800,
            2592000,
            2,
        );
        rotated_config.key_version = 2;
        let rotated_service = JwtService::new(rotated_config);

        let claims = rotated_service.decode(&token).unwrap();
        assert_eq!(claims.sub, "test-user-id");
    }

    #[test]
    fn decode_rejects_token_signed_under_unknown_key() {
        let attacker_config = JwtConfig::build_from_params(
            "attacker-secret-hs256".to_string(),
            None,
            1800,
            2592000,
            1,
        );
        let attacker_service = JwtService::new(attacker_config);
        let forged = attacker_service
            .make_access("test-user-id", "test@example.com", None)
            .unwrap();

        let victim_service = JwtService::new(JwtConfig::for_test());
        assert!(victim_service.decode(&forged).is_err());
    }
}
