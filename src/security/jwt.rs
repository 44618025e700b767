use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::auth_api::AuthError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub leeway_seconds: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            issuer: "boardserver".into(),
            audience: "boardserver-api".into(),
            leeway_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
    pub jti: String,
    /// Server-side session backing this token.
    pub sid: String,
}

impl Claims {
    pub fn new(config: &JwtConfig, user_id: Uuid, session_id: Uuid, expiry: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id.to_string(),
            iss: config.issuer.clone(),
            aud: config.audience.clone(),
            exp: expiry.timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            sid: session_id.to_string(),
        }
    }

    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|e| anyhow!("Invalid user ID in claims: {e}"))
    }

    pub fn session_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sid).map_err(|e| anyhow!("Invalid session ID in claims: {e}"))
    }
}

pub struct JwtManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl JwtManager {
    pub fn new(config: JwtConfig, secret: &str) -> Result<Self> {
        if secret.len() < 32 {
            return Err(anyhow!("JWT secret must be at least 32 characters"));
        }

        Ok(Self {
            config,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    pub fn issue(&self, user_id: Uuid, session_id: Uuid, expiry: DateTime<Utc>) -> Result<String> {
        let claims = Claims::new(&self.config, user_id, session_id, expiry);
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow!("Failed to encode access token: {e}"))
    }

    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);
        validation.leeway = self.config.leeway_seconds;
        validation.validate_nbf = true;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const SECRET: &str = "test-secret-key-that-is-long-enough-32";

    fn manager() -> JwtManager {
        JwtManager::new(JwtConfig::default(), SECRET).expect("manager")
    }

    #[test]
    fn test_issue_and_validate() {
        let jwt = manager();
        let user = Uuid::new_v4();
        let session = Uuid::new_v4();
        let token = jwt
            .issue(user, session, Utc::now() + Duration::minutes(5))
            .unwrap();

        let claims = jwt.validate(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), user);
        assert_eq!(claims.session_id().unwrap(), session);
        assert_eq!(claims.iss, "boardserver");
    }

    #[test]
    fn test_expired_token() {
        let jwt = manager();
        let token = jwt
            .issue(Uuid::new_v4(), Uuid::new_v4(), Utc::now() - Duration::hours(1))
            .unwrap();
        assert_eq!(jwt.validate(&token), Err(AuthError::ExpiredToken));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = manager()
            .issue(Uuid::new_v4(), Uuid::new_v4(), Utc::now() + Duration::minutes(5))
            .unwrap();
        let other = JwtManager::new(JwtConfig::default(), "another-secret-that-is-also-long-enough").unwrap();
        assert_eq!(other.validate(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let token = manager()
            .issue(Uuid::new_v4(), Uuid::new_v4(), Utc::now() + Duration::minutes(5))
            .unwrap();
        let config = JwtConfig {
            issuer: "someone-else".into(),
            ..JwtConfig::default()
        };
        let other = JwtManager::new(config, SECRET).unwrap();
        assert_eq!(other.validate(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_garbage_and_short_secret() {
        assert_eq!(manager().validate("not.a.jwt"), Err(AuthError::InvalidToken));
        assert!(JwtManager::new(JwtConfig::default(), "short").is_err());
    }
}
