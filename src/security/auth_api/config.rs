use crate::core::urls::ApiUrls;

/// Where the auth middleware looks for credentials, and which routes skip it.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub bearer_prefix: String,
    pub session_cookie_name: String,
    /// Adds `Secure` to the session cookie; set when served over https.
    pub secure_cookie: bool,
    pub public_paths: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        let public_paths = [
            ApiUrls::HEALTH,
            ApiUrls::API_HEALTH,
            ApiUrls::AUTH_LOGIN,
            ApiUrls::AUTH_REGISTER,
            ApiUrls::AUTH_PASSWORD_RECOVERY,
            ApiUrls::AUTH_CALLBACK,
        ];
        Self {
            bearer_prefix: "Bearer ".to_string(),
            session_cookie_name: "session_id".to_string(),
            secure_cookie: false,
            public_paths: public_paths.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl AuthConfig {
    /// Cookie security follows the scheme of the public base URL.
    pub fn for_base_url(base_url: &str) -> Self {
        Self {
            secure_cookie: base_url.starts_with("https://"),
            ..Self::default()
        }
    }

    /// Exact match only; `/api/health` does not make `/api/healthcheck` public.
    pub fn is_public_path(&self, path: &str) -> bool {
        let path = path.trim_end_matches('/');
        self.public_paths.iter().any(|p| p == path)
    }
}
