#[derive(Debug)]
pub struct ApiUrls;

impl ApiUrls {
    // Health
    pub const HEALTH: &'static str = "/health";
    pub const API_HEALTH: &'static str = "/api/health";

    // Auth - JSON APIs
    pub const AUTH_LOGIN: &'static str = "/api/auth/login";
    pub const AUTH_REGISTER: &'static str = "/api/auth/register";
    pub const AUTH_LOGOUT: &'static str = "/api/auth/logout";
    pub const AUTH_PASSWORD_RECOVERY: &'static str = "/api/auth/password-recovery";
    pub const AUTH_UPDATE_PASSWORD: &'static str = "/api/auth/update-password";
    pub const AUTH_CALLBACK: &'static str = "/api/auth/callback";

    // Users - JSON APIs
    pub const USERS: &'static str = "/api/users";
    pub const USER_ROLE: &'static str = "/api/users/{id}/role";

    // Projects - JSON APIs
    pub const PROJECTS: &'static str = "/api/projects";
    pub const PROJECT_BY_ID: &'static str = "/api/projects/{id}";
    pub const PROJECT_MEMBERS: &'static str = "/api/projects/{id}/members";
    pub const PROJECT_MEMBER: &'static str = "/api/projects/{id}/members/{user_id}";
    pub const PROJECT_MILESTONES: &'static str = "/api/projects/{id}/milestones";
    pub const PROJECT_TASKS: &'static str = "/api/projects/{id}/tasks";

    // Milestones - JSON APIs
    pub const MILESTONE_BY_ID: &'static str = "/api/milestones/{id}";

    // Tasks - JSON APIs
    pub const TASK_BY_ID: &'static str = "/api/tasks/{id}";
    pub const TASK_HISTORY: &'static str = "/api/tasks/{id}/history";

    /// Client-facing location of a project page, used for `Location` headers.
    pub fn project_location(id: impl std::fmt::Display) -> String {
        format!("/projects/{id}")
    }
}
