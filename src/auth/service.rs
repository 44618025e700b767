use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AuthSettings;
use crate::core::shared::models::{NewAccount, RecoveryToken, Role};
use crate::security::auth_api::{AuthError, AuthenticatedUser};
use crate::security::jwt::{JwtConfig, JwtManager};
use crate::security::password::PasswordManager;
use crate::store::{Store, StoreError};

const RECOVERY_TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountDto {
    pub id: Uuid,
    pub email: String,
}

/// A freshly opened session and the bearer token that carries it.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub account: AccountDto,
    pub session_id: Uuid,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn hash_recovery_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    jwt: Arc<JwtManager>,
    passwords: PasswordManager,
    session_ttl: Duration,
    recovery_ttl: Duration,
    public_base_url: String,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("session_ttl", &self.session_ttl)
            .field("recovery_ttl", &self.recovery_ttl)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    pub fn new(
        store: Arc<dyn Store>,
        passwords: PasswordManager,
        settings: &AuthSettings,
    ) -> anyhow::Result<Self> {
        let jwt_config = JwtConfig {
            issuer: settings.issuer.clone(),
            ..JwtConfig::default()
        };

        Ok(Self {
            store,
            jwt: Arc::new(JwtManager::new(jwt_config, &settings.jwt_secret)?),
            passwords,
            session_ttl: Duration::minutes(settings.session_ttl_minutes),
            recovery_ttl: Duration::minutes(settings.recovery_ttl_minutes),
            public_base_url: settings.public_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Resolves a bearer token to the caller. The token must verify and its
    /// session must still be live; the role is read from the user row.
    pub async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let claims = self.jwt.validate(token)?;
        let user_id = claims.user_id().map_err(|_| AuthError::InvalidToken)?;
        let session_id = claims.session_id().map_err(|_| AuthError::InvalidToken)?;

        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        if session.user_id != user_id {
            return Err(AuthError::InvalidToken);
        }
        if !session.is_active(Utc::now()) {
            return Err(AuthError::SessionExpired);
        }

        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(AuthenticatedUser::new(user.id, user.role).with_session(session.id))
    }

    pub async fn register(&self, registration: Registration) -> Result<AccountDto, AuthError> {
        let email = normalize_email(&registration.email);
        let password_hash = self.hash_password(registration.password).await?;

        let account = NewAccount {
            email: email.clone(),
            password_hash,
            first_name: registration.first_name,
            last_name: registration.last_name,
            role: Role::TeamMember,
        };

        match self.store.create_account(account).await {
            Ok(user) => {
                info!(user_id = %user.id, "Registered new account");
                Ok(AccountDto { id: user.id, email })
            }
            Err(StoreError::UniqueViolation(constraint)) => {
                warn!(%constraint, "Registration rejected for existing email");
                Err(AuthError::RegistrationFailed)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedSession, AuthError> {
        let email = normalize_email(email);
        let Some(credentials) = self.store.find_credentials_by_email(&email).await? else {
            return Err(AuthError::InvalidCredentials);
        };

        if !self
            .verify_password(password.to_string(), credentials.password_hash)
            .await?
        {
            return Err(AuthError::InvalidCredentials);
        }

        self.open_session(credentials.user_id, credentials.email)
            .await
    }

    pub async fn logout(&self, user: &AuthenticatedUser) -> Result<(), AuthError> {
        if let Some(session_id) = user.session_id {
            self.store.revoke_session(session_id).await?;
        }
        Ok(())
    }

    /// Issues a single-use recovery code when the email is known. Callers
    /// answer identically either way.
    pub async fn request_recovery(&self, email: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);
        let Some(credentials) = self.store.find_credentials_by_email(&email).await? else {
            info!("Password recovery requested for unknown email");
            return Ok(());
        };

        let mut raw = [0u8; RECOVERY_TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut raw);
        let code = hex::encode(raw);

        self.store
            .create_recovery_token(RecoveryToken {
                token_hash: hash_recovery_token(&code),
                user_id: credentials.user_id,
                expires_at: Utc::now() + self.recovery_ttl,
                used_at: None,
            })
            .await?;

        info!(user_id = %credentials.user_id, "Password recovery code issued");
        // The link carries a live credential; keep it out of default log output.
        debug!(
            user_id = %credentials.user_id,
            link = %format!("{}/update-password?code={}", self.public_base_url, code),
            "Password recovery link"
        );
        Ok(())
    }

    /// Exchanges a recovery code for a session.
    pub async fn exchange_recovery_code(&self, code: &str) -> Result<IssuedSession, AuthError> {
        let user_id = self
            .store
            .consume_recovery_token(&hash_recovery_token(code.trim()), Utc::now())
            .await?
            .ok_or(AuthError::InvalidRecoveryCode)?;

        let credentials = self
            .store
            .find_credentials_by_user(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        self.open_session(user_id, credentials.email).await
    }

    /// Replaces the password and revokes every other session of the user.
    pub async fn update_password(
        &self,
        user: &AuthenticatedUser,
        password: String,
    ) -> Result<(), AuthError> {
        let password_hash = self.hash_password(password).await?;
        self.store
            .update_password_hash(user.user_id, &password_hash)
            .await?;

        let revoked = self
            .store
            .revoke_user_sessions(user.user_id, user.session_id)
            .await?;
        info!(user_id = %user.user_id, revoked, "Password updated");
        Ok(())
    }

    async fn open_session(&self, user_id: Uuid, email: String) -> Result<IssuedSession, AuthError> {
        let expires_at = Utc::now() + self.session_ttl;
        let session = self.store.create_session(user_id, expires_at).await?;
        let access_token = self
            .jwt
            .issue(user_id, session.id, session.expires_at)
            .map_err(|e| AuthError::InternalError(e.to_string()))?;

        Ok(IssuedSession {
            account: AccountDto { id: user_id, email },
            session_id: session.id,
            access_token,
            expires_at: session.expires_at,
        })
    }

    async fn hash_password(&self, password: String) -> Result<String, AuthError> {
        let passwords = self.passwords.clone();
        tokio::task::spawn_blocking(move || passwords.hash(&password))
            .await
            .map_err(|e| AuthError::InternalError(e.to_string()))?
            .map_err(|e| AuthError::InternalError(e.to_string()))
    }

    async fn verify_password(&self, password: String, hash: String) -> Result<bool, AuthError> {
        let passwords = self.passwords.clone();
        tokio::task::spawn_blocking(move || passwords.verify(&password, &hash))
            .await
            .map_err(|e| AuthError::InternalError(e.to_string()))?
            .map_err(|e| AuthError::InternalError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::security::password::Argon2Config;
    use crate::store::MemoryStore;

    fn service() -> AuthService {
        let store = Arc::new(MemoryStore::new());
        let passwords = PasswordManager::new(Argon2Config::low_cost()).unwrap();
        AuthService::new(store, passwords, &AppConfig::in_memory().auth).unwrap()
    }

    fn registration(email: &str) -> Registration {
        Registration {
            email: email.into(),
            password: "correct-horse".into(),
            first_name: Some("Ada".into()),
            last_name: None,
        }
    }

    #[tokio::test]
    async fn test_register_then_login_and_authenticate() {
        let auth = service();
        let account = auth.register(registration(" Ada@Example.com ")).await.unwrap();
        assert_eq!(account.email, "ada@example.com");

        let session = auth.login("ADA@example.com", "correct-horse").await.unwrap();
        let user = auth.authenticate(&session.access_token).await.unwrap();
        assert_eq!(user.user_id, account.id);
        assert_eq!(user.role, Role::TeamMember);
        assert_eq!(user.session_id, Some(session.session_id));
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_generic_failure() {
        let auth = service();
        auth.register(registration("dup@example.com")).await.unwrap();
        assert_eq!(
            auth.register(registration("dup@example.com")).await,
            Err(AuthError::RegistrationFailed)
        );
    }

    #[tokio::test]
    async fn test_bad_password_and_unknown_email_look_the_same() {
        let auth = service();
        auth.register(registration("a@example.com")).await.unwrap();
        assert_eq!(
            auth.login("a@example.com", "wrong-password").await.unwrap_err(),
            AuthError::InvalidCredentials
        );
        assert_eq!(
            auth.login("nobody@example.com", "whatever1").await.unwrap_err(),
            AuthError::InvalidCredentials
        );
    }

    #[derive(Clone, Default)]
    struct LogCapture(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_recovery_code_stays_out_of_info_logs() {
        let auth = service();
        let account = auth.register(registration("rita@example.com")).await.unwrap();

        let capture = LogCapture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let guard = tracing::subscriber::set_default(subscriber);
        auth.request_recovery("rita@example.com").await.unwrap();
        drop(guard);

        let logged = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("Password recovery code issued"));
        assert!(logged.contains(&account.id.to_string()));
        assert!(!logged.contains("code="));
        assert!(!logged.contains("update-password"));
    }

    #[tokio::test]
    async fn test_logout_revokes_session() {
        let auth = service();
        auth.register(registration("out@example.com")).await.unwrap();
        let session = auth.login("out@example.com", "correct-horse").await.unwrap();
        let user = auth.authenticate(&session.access_token).await.unwrap();

        auth.logout(&user).await.unwrap();
        assert_eq!(
            auth.authenticate(&session.access_token).await.unwrap_err(),
            AuthError::SessionExpired
        );
    }

    #[test]
    fn test_recovery_token_hash_is_hex_sha256() {
        let hash = hash_recovery_token("abc");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
