use anyhow::Result;
use std::sync::Arc;

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::milestones::MilestoneService;
use crate::project::{MemberService, ProjectService};
use crate::security::auth_api::AuthConfig;
use crate::security::password::{Argon2Config, PasswordManager};
use crate::store::{MemoryStore, Store};
use crate::tasks::TaskEngine;

/// Shared handles for every request. Built once in `main` and passed to the
/// router as `Arc<AppState>`.
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub auth: AuthService,
    pub auth_config: AuthConfig,
    pub projects: ProjectService,
    pub members: MemberService,
    pub milestones: MilestoneService,
    pub task_engine: TaskEngine,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("storage", &self.config.storage)
            .field("auth_config", &self.auth_config)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>) -> Result<Self> {
        Self::with_argon2(config, store, Argon2Config::default())
    }

    pub fn with_argon2(
        config: AppConfig,
        store: Arc<dyn Store>,
        argon2: Argon2Config,
    ) -> Result<Self> {
        let passwords = PasswordManager::new(argon2)?;
        let auth = AuthService::new(store.clone(), passwords, &config.auth)?;

        Ok(Self {
            auth,
            auth_config: AuthConfig::for_base_url(&config.auth.public_base_url),
            projects: ProjectService::new(store.clone()),
            members: MemberService::new(store.clone()),
            milestones: MilestoneService::new(store.clone()),
            task_engine: TaskEngine::new(store.clone()),
            config: Arc::new(config),
            store,
        })
    }

    /// State over a fresh [`MemoryStore`] with cheap password hashing.
    pub fn in_memory() -> Result<(Self, Arc<MemoryStore>)> {
        let store = Arc::new(MemoryStore::new());
        let state = Self::with_argon2(
            AppConfig::in_memory(),
            store.clone(),
            Argon2Config::low_cost(),
        )?;
        Ok((state, store))
    }
}
