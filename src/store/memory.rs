use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{next_display_order, Store, StoreError};
use crate::core::shared::models::{
    Credentials, MemberProfile, Milestone, MilestoneChanges, NewAccount, NewHistoryEntry,
    NewMilestone, NewProject, NewTask, Project, ProjectMember, RecoveryToken, Role, Session, Task,
    TaskCard, TaskChanges, TaskFilter, TaskHistoryEntry, TaskStatus, User,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    credentials: HashMap<Uuid, Credentials>,
    sessions: HashMap<Uuid, Session>,
    recovery_tokens: HashMap<String, RecoveryToken>,
    projects: HashMap<Uuid, Project>,
    members: BTreeMap<(Uuid, Uuid), ProjectMember>,
    milestones: HashMap<Uuid, Milestone>,
    tasks: HashMap<Uuid, Task>,
    history: Vec<TaskHistoryEntry>,
    next_history_id: i64,
}

impl Tables {
    fn cascade_task_delete(&mut self, task_id: Uuid) {
        let children: Vec<Uuid> = self
            .tasks
            .values()
            .filter(|t| t.parent_task_id == Some(task_id))
            .map(|t| t.id)
            .collect();
        for child in children {
            self.cascade_task_delete(child);
        }
        self.tasks.remove(&task_id);
        self.history.retain(|h| h.task_id != task_id);
    }
}

/// Process-local store with the same constraint behaviour as the Postgres
/// schema: unique keys, foreign keys and cascades.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_member_inserts: AtomicBool,
    fail_history_inserts: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a profile without credentials and returns its id.
    pub async fn seed_user(&self, first_name: &str, last_name: &str, role: Role) -> Uuid {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            first_name: Some(first_name.to_string()),
            last_name: Some(last_name.to_string()),
            avatar_url: None,
            role,
            created_at: now,
            updated_at: now,
        };
        let id = user.id;
        self.tables.write().await.users.insert(id, user);
        id
    }

    /// Makes every following `add_member` fail.
    pub fn fail_member_inserts(&self, fail: bool) {
        self.fail_member_inserts.store(fail, Ordering::SeqCst);
    }

    /// Makes every following `insert_history` fail.
    pub fn fail_history_inserts(&self, fail: bool) {
        self.fail_history_inserts.store(fail, Ordering::SeqCst);
    }

    pub async fn project_count(&self) -> usize {
        self.tables.read().await.projects.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables.users.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn update_user_role(&self, id: Uuid, role: Role) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        let user = tables.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.role = role;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn create_account(&self, account: NewAccount) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        if tables
            .credentials
            .values()
            .any(|c| c.email.eq_ignore_ascii_case(&account.email))
        {
            return Err(StoreError::UniqueViolation(
                "auth_credentials_email_key".into(),
            ));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            first_name: account.first_name,
            last_name: account.last_name,
            avatar_url: None,
            role: account.role,
            created_at: now,
            updated_at: now,
        };
        tables.credentials.insert(
            user.id,
            Credentials {
                user_id: user.id,
                email: account.email,
                password_hash: account.password_hash,
            },
        );
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_credentials_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Credentials>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .credentials
            .values()
            .find(|c| c.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_credentials_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<Credentials>, StoreError> {
        Ok(self.tables.read().await.credentials.get(&user_id).cloned())
    }

    async fn update_password_hash(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let credentials = tables
            .credentials
            .get_mut(&user_id)
            .ok_or(StoreError::NotFound)?;
        credentials.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn create_session(
        &self,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<Session, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::ForeignKeyViolation(
                "auth_sessions_user_id_fkey".into(),
            ));
        }
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            created_at: Utc::now(),
            expires_at,
            revoked_at: None,
        };
        tables.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        Ok(self.tables.read().await.sessions.get(&id).cloned())
    }

    async fn revoke_session(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(session) = tables.sessions.get_mut(&id) {
            session.revoked_at.get_or_insert_with(Utc::now);
        }
        Ok(())
    }

    async fn revoke_user_sessions(
        &self,
        user_id: Uuid,
        keep: Option<Uuid>,
    ) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut tables = self.tables.write().await;
        let mut revoked = 0;
        for session in tables.sessions.values_mut() {
            if session.user_id == user_id
                && session.revoked_at.is_none()
                && Some(session.id) != keep
            {
                session.revoked_at = Some(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn create_recovery_token(&self, token: RecoveryToken) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.recovery_tokens.contains_key(&token.token_hash) {
            return Err(StoreError::UniqueViolation(
                "password_recovery_tokens_pkey".into(),
            ));
        }
        tables.recovery_tokens.insert(token.token_hash.clone(), token);
        Ok(())
    }

    async fn consume_recovery_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>, StoreError> {
        let mut tables = self.tables.write().await;
        match tables.recovery_tokens.get_mut(token_hash) {
            Some(token) if token.used_at.is_none() && token.expires_at > now => {
                token.used_at = Some(now);
                Ok(Some(token.user_id))
            }
            _ => Ok(None),
        }
    }

    async fn insert_project(&self, project: NewProject) -> Result<Project, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&project.owner_id) {
            return Err(StoreError::ForeignKeyViolation(
                "projects_owner_id_fkey".into(),
            ));
        }
        let now = Utc::now();
        let created = Project {
            id: Uuid::new_v4(),
            name: project.name,
            owner_id: project.owner_id,
            created_at: now,
            updated_at: now,
        };
        tables.projects.insert(created.id, created.clone());
        Ok(created)
    }

    async fn delete_project(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.projects.remove(&id).is_none() {
            return Err(StoreError::NotFound);
        }
        tables.members.retain(|(project_id, _), _| *project_id != id);
        let task_ids: Vec<Uuid> = tables
            .tasks
            .values()
            .filter(|t| t.project_id == id)
            .map(|t| t.id)
            .collect();
        for task_id in task_ids {
            tables.cascade_task_delete(task_id);
        }
        tables.milestones.retain(|_, m| m.project_id != id);
        Ok(())
    }

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>, StoreError> {
        Ok(self.tables.read().await.projects.get(&id).cloned())
    }

    async fn list_projects_for_member(&self, user_id: Uuid) -> Result<Vec<Project>, StoreError> {
        let tables = self.tables.read().await;
        let mut projects: Vec<Project> = tables
            .members
            .keys()
            .filter(|(_, member)| *member == user_id)
            .filter_map(|(project_id, _)| tables.projects.get(project_id).cloned())
            .collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    async fn add_member(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<ProjectMember, StoreError> {
        if self.fail_member_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Database("member insert failed".into()));
        }

        let mut tables = self.tables.write().await;
        if !tables.projects.contains_key(&project_id) {
            return Err(StoreError::ForeignKeyViolation(
                "project_members_project_id_fkey".into(),
            ));
        }
        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::ForeignKeyViolation(
                "project_members_user_id_fkey".into(),
            ));
        }
        if tables.members.contains_key(&(project_id, user_id)) {
            return Err(StoreError::UniqueViolation("project_members_pkey".into()));
        }

        let member = ProjectMember {
            project_id,
            user_id,
            created_at: Utc::now(),
        };
        tables.members.insert((project_id, user_id), member.clone());
        Ok(member)
    }

    async fn remove_member(&self, project_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables.members.remove(&(project_id, user_id)).is_some())
    }

    async fn is_member(&self, project_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.members.contains_key(&(project_id, user_id)))
    }

    async fn list_members(&self, project_id: Uuid) -> Result<Vec<MemberProfile>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<(&ProjectMember, &User)> = tables
            .members
            .values()
            .filter(|m| m.project_id == project_id)
            .filter_map(|m| tables.users.get(&m.user_id).map(|u| (m, u)))
            .collect();
        rows.sort_by_key(|(m, _)| m.created_at);

        Ok(rows
            .into_iter()
            .map(|(_, user)| MemberProfile {
                user_id: user.id,
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone(),
                avatar_url: user.avatar_url.clone(),
                role: user.role,
            })
            .collect())
    }

    async fn list_milestones(&self, project_id: Uuid) -> Result<Vec<Milestone>, StoreError> {
        let tables = self.tables.read().await;
        let mut milestones: Vec<Milestone> = tables
            .milestones
            .values()
            .filter(|m| m.project_id == project_id)
            .cloned()
            .collect();
        // None sorts after every date.
        milestones.sort_by(|a, b| {
            (a.due_date.is_none(), a.due_date, a.created_at)
                .cmp(&(b.due_date.is_none(), b.due_date, b.created_at))
        });
        Ok(milestones)
    }

    async fn insert_milestone(&self, milestone: NewMilestone) -> Result<Milestone, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.projects.contains_key(&milestone.project_id) {
            return Err(StoreError::ForeignKeyViolation(
                "milestones_project_id_fkey".into(),
            ));
        }
        if tables
            .milestones
            .values()
            .any(|m| m.project_id == milestone.project_id && m.name == milestone.name)
        {
            return Err(StoreError::UniqueViolation(
                "milestones_project_id_name_key".into(),
            ));
        }

        let now = Utc::now();
        let created = Milestone {
            id: Uuid::new_v4(),
            project_id: milestone.project_id,
            name: milestone.name,
            description: milestone.description,
            due_date: milestone.due_date,
            created_at: now,
            updated_at: now,
        };
        tables.milestones.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_milestone(&self, id: Uuid) -> Result<Option<Milestone>, StoreError> {
        Ok(self.tables.read().await.milestones.get(&id).cloned())
    }

    async fn update_milestone(
        &self,
        id: Uuid,
        changes: &MilestoneChanges,
    ) -> Result<Milestone, StoreError> {
        let mut tables = self.tables.write().await;
        let current = tables.milestones.get(&id).ok_or(StoreError::NotFound)?;
        let updated = changes.apply_to(current, Utc::now());

        if tables.milestones.values().any(|m| {
            m.id != id && m.project_id == updated.project_id && m.name == updated.name
        }) {
            return Err(StoreError::UniqueViolation(
                "milestones_project_id_name_key".into(),
            ));
        }

        tables.milestones.insert(id, updated.clone());
        Ok(updated)
    }

    async fn delete_milestone(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.milestones.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        if tables.tasks.values().any(|t| t.milestone_id == Some(id)) {
            return Err(StoreError::ForeignKeyViolation(
                "tasks_milestone_id_fkey".into(),
            ));
        }
        tables.milestones.remove(&id);
        Ok(())
    }

    async fn count_tasks_for_milestone(&self, id: Uuid) -> Result<i64, StoreError> {
        let tables = self.tables.read().await;
        let count = tables
            .tasks
            .values()
            .filter(|t| t.milestone_id == Some(id))
            .count();
        Ok(count as i64)
    }

    async fn list_task_cards(
        &self,
        project_id: Uuid,
        filter: TaskFilter,
    ) -> Result<Vec<TaskCard>, StoreError> {
        let tables = self.tables.read().await;
        let mut tasks: Vec<&Task> = tables
            .tasks
            .values()
            .filter(|t| t.project_id == project_id && filter.matches(t))
            .collect();
        tasks.sort_by_key(|t| (t.display_order, t.created_at));

        Ok(tasks
            .into_iter()
            .map(|task| TaskCard {
                id: task.id,
                title: task.title.clone(),
                description: task.description.clone(),
                status: task.status,
                assignee_id: task.assignee_id,
                parent_task_id: task.parent_task_id,
                display_order: task.display_order,
                assignee_name: task
                    .assignee_id
                    .and_then(|id| tables.users.get(&id))
                    .and_then(User::display_name),
                milestone_name: task
                    .milestone_id
                    .and_then(|id| tables.milestones.get(&id))
                    .map(|m| m.name.clone()),
            })
            .collect())
    }

    async fn insert_task(&self, task: NewTask) -> Result<Task, StoreError> {
        // The write lock is held across the max lookup and the insert.
        let mut tables = self.tables.write().await;
        if !tables.projects.contains_key(&task.project_id) {
            return Err(StoreError::ForeignKeyViolation("tasks_project_id_fkey".into()));
        }
        if task
            .assignee_id
            .is_some_and(|id| !tables.users.contains_key(&id))
        {
            return Err(StoreError::ForeignKeyViolation("tasks_assignee_id_fkey".into()));
        }
        if task
            .milestone_id
            .is_some_and(|id| !tables.milestones.contains_key(&id))
        {
            return Err(StoreError::ForeignKeyViolation("tasks_milestone_id_fkey".into()));
        }
        if task
            .parent_task_id
            .is_some_and(|id| !tables.tasks.contains_key(&id))
        {
            return Err(StoreError::ForeignKeyViolation(
                "tasks_parent_task_id_fkey".into(),
            ));
        }

        let current_max = tables
            .tasks
            .values()
            .filter(|t| t.project_id == task.project_id && t.status == TaskStatus::ToDo)
            .map(|t| t.display_order)
            .max();

        let now = Utc::now();
        let created = Task {
            id: Uuid::new_v4(),
            project_id: task.project_id,
            milestone_id: task.milestone_id,
            assignee_id: task.assignee_id,
            parent_task_id: task.parent_task_id,
            title: task.title,
            description: task.description,
            status: TaskStatus::ToDo,
            display_order: next_display_order(current_max),
            due_date: task.due_date,
            created_at: now,
            updated_at: now,
        };
        tables.tasks.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(self.tables.read().await.tasks.get(&id).cloned())
    }

    async fn count_open_subtasks(&self, parent_id: Uuid) -> Result<i64, StoreError> {
        let tables = self.tables.read().await;
        let count = tables
            .tasks
            .values()
            .filter(|t| t.parent_task_id == Some(parent_id) && !t.status.is_done())
            .count();
        Ok(count as i64)
    }

    async fn update_task(&self, id: Uuid, changes: &TaskChanges) -> Result<Task, StoreError> {
        let mut tables = self.tables.write().await;
        let current = tables.tasks.get(&id).ok_or(StoreError::NotFound)?;

        if let Some(Some(assignee)) = changes.assignee_id {
            if !tables.users.contains_key(&assignee) {
                return Err(StoreError::ForeignKeyViolation("tasks_assignee_id_fkey".into()));
            }
        }
        if let Some(Some(milestone)) = changes.milestone_id {
            if !tables.milestones.contains_key(&milestone) {
                return Err(StoreError::ForeignKeyViolation(
                    "tasks_milestone_id_fkey".into(),
                ));
            }
        }

        let updated = changes.apply_to(current, Utc::now());
        tables.tasks.insert(id, updated.clone());
        Ok(updated)
    }

    async fn insert_history(&self, entries: Vec<NewHistoryEntry>) -> Result<(), StoreError> {
        if self.fail_history_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Database("history insert failed".into()));
        }

        let now = Utc::now();
        let mut tables = self.tables.write().await;
        if entries.iter().any(|e| !tables.tasks.contains_key(&e.task_id)) {
            return Err(StoreError::ForeignKeyViolation(
                "task_history_task_id_fkey".into(),
            ));
        }
        for entry in entries {
            tables.next_history_id += 1;
            let id = tables.next_history_id;
            tables.history.push(TaskHistoryEntry {
                id,
                task_id: entry.task_id,
                user_id: Some(entry.user_id),
                changed_field: entry.changed_field,
                old_value: entry.old_value,
                new_value: entry.new_value,
                changed_at: now,
            });
        }
        Ok(())
    }

    async fn list_history(&self, task_id: Uuid) -> Result<Vec<TaskHistoryEntry>, StoreError> {
        let tables = self.tables.read().await;
        let mut entries: Vec<TaskHistoryEntry> = tables
            .history
            .iter()
            .filter(|h| h.task_id == task_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.changed_at.cmp(&a.changed_at).then(b.id.cmp(&a.id)));
        Ok(entries)
    }
}
