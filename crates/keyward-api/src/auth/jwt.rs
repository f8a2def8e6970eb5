//! JWT token issuance and validation
//!
//! Implements bearer tokens signed with HMAC-SHA256. The signing secret is
//! handed to [`TokenIssuer`] at construction and never read from the
//! environment afterwards.
//!
//! Tokens carry no `exp` claim unless an expiration is configured, so by
//! default an issued token stays valid for as long as the signing secret does.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use keyward_core::AuthConfig;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Token issuer
    pub iss: String,
    /// Subject - identity ID
    pub sub: String,
    /// JWT ID - unique token identifier
    pub jti: String,
    /// Issued at timestamp (Unix epoch)
    pub iat: u64,
    /// Expiration timestamp (Unix epoch), only when configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

/// JWT token generation and validation errors
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode JWT: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("System time error: {0}")]
    SystemTimeError(#[from] std::time::SystemTimeError),
}

/// JWT Configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret key for HMAC signing (should be at least 256 bits)
    pub secret: String,
    /// Token issuer identifier
    pub issuer: String,
    /// Access token lifetime in seconds; `None` disables expiry
    pub access_expiration_secs: Option<u64>,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("access_expiration_secs", &self.access_expiration_secs)
            .finish()
    }
}

impl JwtConfig {
    /// Configuration with the default issuer and no expiry
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: AuthConfig::default().token_issuer,
            access_expiration_secs: None,
        }
    }

    /// Build from the application's auth settings
    ///
    /// Returns `None` when no signing secret is configured.
    pub fn from_auth_config(auth: &AuthConfig) -> Option<Self> {
        let secret = auth.token_secret.as_deref().filter(|s| !s.is_empty())?;
        Some(Self {
            secret: secret.to_string(),
            issuer: auth.token_issuer.clone(),
            access_expiration_secs: auth.token_expiration_secs,
        })
    }
}

/// Issues and validates bearer tokens for a single signing secret
#[derive(Clone)]
pub struct TokenIssuer {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Issue a signed token for an identity
    ///
    /// # Example
    ///
    /// ```no_run
    /// use keyward_api::auth::jwt::{JwtConfig, TokenIssuer};
    /// use uuid::Uuid;
    ///
    /// let issuer = TokenIssuer::new(JwtConfig::new("a-long-random-signing-secret"));
    /// let id = Uuid::new_v4();
    /// let token = issuer.issue(id).expect("Failed to issue token");
    /// assert_eq!(issuer.validate(&token).unwrap(), id);
    /// ```
    pub fn issue(&self, subject_id: Uuid) -> Result<String, JwtError> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();

        let claims = Claims {
            iss: self.config.issuer.clone(),
            sub: subject_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: self.config.access_expiration_secs.map(|secs| now + secs),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Validate a token and return the embedded subject id
    ///
    /// Signature mismatch, malformed input, wrong issuer, or a subject that
    /// is not a UUID all fail with `JwtError::InvalidToken`.
    pub fn validate(&self, token: &str) -> Result<Uuid, JwtError> {
        let claims = self.decode_claims(token)?;
        Uuid::parse_str(&claims.sub).map_err(|_| JwtError::InvalidToken)
    }

    /// Validate a token and return all of its claims
    pub fn decode_claims(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        if self.config.access_expiration_secs.is_some() {
            validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        } else {
            validation.set_required_spec_claims(&["iss", "sub"]);
            validation.validate_exp = false;
        }

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
                _ => JwtError::InvalidToken,
            },
        )?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SECRET: &str = "test-signing-secret-with-enough-entropy";

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(JwtConfig::new(SECRET))
    }

    #[test]
    fn test_issue_and_validate_token() {
        let issuer = issuer();
        let id = Uuid::new_v4();

        let token = issuer.issue(id).expect("Failed to issue token");
        assert_eq!(issuer.validate(&token).expect("Failed to validate token"), id);

        let claims = issuer.decode_claims(&token).unwrap();
        assert_eq!(claims.sub, id.to_string());
        assert_eq!(claims.iss, "keyward");
        assert!(claims.exp.is_none());
    }

    #[test]
    fn test_tokens_are_unique() {
        let issuer = issuer();
        let id = Uuid::new_v4();
        assert_ne!(issuer.issue(id).unwrap(), issuer.issue(id).unwrap());
    }

    #[test]
    fn test_invalid_token() {
        let result = issuer().validate("invalid.token.here");
        assert!(matches!(result, Err(JwtError::InvalidToken)));

        assert!(matches!(issuer().validate(""), Err(JwtError::InvalidToken)));
    }

    #[test]
    fn test_wrong_secret() {
        let token = TokenIssuer::new(JwtConfig::new("secret1"))
            .issue(Uuid::new_v4())
            .unwrap();

        let result = TokenIssuer::new(JwtConfig::new("secret2")).validate(&token);
        assert!(matches!(result, Err(JwtError::InvalidToken)));
    }

    #[test]
    fn test_wrong_issuer() {
        let other = TokenIssuer::new(JwtConfig {
            issuer: "someone-else".to_string(),
            ..JwtConfig::new(SECRET)
        });
        let token = other.issue(Uuid::new_v4()).unwrap();

        assert!(matches!(issuer().validate(&token), Err(JwtError::InvalidToken)));
    }

    #[test]
    fn test_non_uuid_subject_rejected() {
        let claims = Claims {
            iss: "keyward".to_string(),
            sub: "not-a-uuid".to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: 0,
            exp: None,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(matches!(issuer().validate(&token), Err(JwtError::InvalidToken)));
    }

    #[test]
    fn test_tampering_any_byte_invalidates() {
        let issuer = issuer();
        let token = issuer.issue(Uuid::new_v4()).unwrap();

        for index in 0..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[index] = if bytes[index] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();

            assert!(
                matches!(issuer.validate(&tampered), Err(JwtError::InvalidToken)),
                "tampered byte {index} was accepted"
            );
        }
    }

    #[test]
    fn test_expiring_token() {
        let issuer = TokenIssuer::new(JwtConfig {
            access_expiration_secs: Some(3600),
            ..JwtConfig::new(SECRET)
        });
        let id = Uuid::new_v4();

        let token = issuer.issue(id).unwrap();
        let claims = issuer.decode_claims(&token).unwrap();
        assert_eq!(claims.exp, Some(claims.iat + 3600));
        assert_eq!(issuer.validate(&token).unwrap(), id);
    }

    #[test]
    fn test_expired_token() {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();

        // Create a token that expired 1 hour ago
        let claims = Claims {
            iss: "keyward".to_string(),
            sub: Uuid::new_v4().to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now - 7200,
            exp: Some(now - 3600),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let issuer = TokenIssuer::new(JwtConfig {
            access_expiration_secs: Some(60),
            ..JwtConfig::new(SECRET)
        });
        assert!(matches!(issuer.validate(&token), Err(JwtError::ExpiredToken)));
    }

    #[test]
    fn test_expiring_issuer_requires_exp() {
        let token = issuer().issue(Uuid::new_v4()).unwrap();

        let expiring = TokenIssuer::new(JwtConfig {
            access_expiration_secs: Some(60),
            ..JwtConfig::new(SECRET)
        });
        assert!(matches!(expiring.validate(&token), Err(JwtError::InvalidToken)));
    }

    #[test]
    fn test_from_auth_config() {
        let mut auth = AuthConfig::default();
        assert!(JwtConfig::from_auth_config(&auth).is_none());

        auth.token_secret = Some(SECRET.to_string());
        auth.token_expiration_secs = Some(900);
        let config = JwtConfig::from_auth_config(&auth).unwrap();
        assert_eq!(config.secret, SECRET);
        assert_eq!(config.issuer, "keyward");
        assert_eq!(config.access_expiration_secs, Some(900));
        assert!(!format!("{config:?}").contains(SECRET));
    }

    proptest! {
        #[test]
        fn prop_token_round_trip(raw in any::<u128>()) {
            let issuer = issuer();
            let id = Uuid::from_u128(raw);
            let token = issuer.issue(id).unwrap();
            prop_assert_eq!(issuer.validate(&token).unwrap(), id);
        }
    }
}
