use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::Text;
use uuid::Uuid;

use super::{next_display_order, Store, StoreError};
use crate::core::shared::models::{
    display_name, Credentials, MemberProfile, Milestone, MilestoneChanges, NewAccount,
    NewHistoryEntry, NewMilestone, NewProject, NewTask, Project, ProjectMember, RecoveryToken,
    Role, Session, Task, TaskCard, TaskChanges, TaskFilter, TaskHistoryEntry, TaskStatus, User,
};
use crate::core::shared::schema::{
    auth_credentials, auth_sessions, milestones, password_recovery_tokens, project_members,
    projects, task_history, tasks, users,
};
use crate::core::shared::utils::DbPool;

impl From<DieselError> for StoreError {
    fn from(error: DieselError) -> Self {
        match error {
            DieselError::NotFound => Self::NotFound,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                Self::UniqueViolation(info.constraint_name().unwrap_or("unknown").to_string())
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                Self::ForeignKeyViolation(info.constraint_name().unwrap_or("unknown").to_string())
            }
            other => Self::Database(other.to_string()),
        }
    }
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct UserRow {
    id: Uuid,
    first_name: Option<String>,
    last_name: Option<String>,
    avatar_url: Option<String>,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role: Role = row
            .role
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("users.role: {e}")))?;
        Ok(Self {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            avatar_url: row.avatar_url,
            role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = auth_credentials)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct CredentialsRow {
    user_id: Uuid,
    email: String,
    password_hash: String,
}

impl From<CredentialsRow> for Credentials {
    fn from(row: CredentialsRow) -> Self {
        Self {
            user_id: row.user_id,
            email: row.email,
            password_hash: row.password_hash,
        }
    }
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = auth_sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct SessionRow {
    id: Uuid,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            created_at: row.created_at,
            expires_at: row.expires_at,
            revoked_at: row.revoked_at,
        }
    }
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = projects)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct ProjectRow {
    id: Uuid,
    name: String,
    owner_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            owner_id: row.owner_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = project_members)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct MemberRow {
    project_id: Uuid,
    user_id: Uuid,
    created_at: DateTime<Utc>,
}

impl From<MemberRow> for ProjectMember {
    fn from(row: MemberRow) -> Self {
        Self {
            project_id: row.project_id,
            user_id: row.user_id,
            created_at: row.created_at,
        }
    }
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = milestones)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct MilestoneRow {
    id: Uuid,
    project_id: Uuid,
    name: String,
    description: Option<String>,
    due_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<MilestoneRow> for Milestone {
    fn from(row: MilestoneRow) -> Self {
        Self {
            id: row.id,
            project_id: row.project_id,
            name: row.name,
            description: row.description,
            due_date: row.due_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(AsChangeset)]
#[diesel(table_name = milestones)]
struct MilestoneChangeset {
    name: Option<String>,
    description: Option<Option<String>>,
    due_date: Option<Option<DateTime<Utc>>>,
    updated_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct TaskRow {
    id: Uuid,
    project_id: Uuid,
    milestone_id: Option<Uuid>,
    assignee_id: Option<Uuid>,
    parent_task_id: Option<Uuid>,
    title: String,
    description: Option<String>,
    status: String,
    display_order: i32,
    due_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_status(raw: &str) -> Result<TaskStatus, StoreError> {
    raw.parse()
        .map_err(|e| StoreError::Corrupt(format!("tasks.status: {e}")))
}

impl TryFrom<TaskRow> for Task {
    type Error = StoreError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            project_id: row.project_id,
            milestone_id: row.milestone_id,
            assignee_id: row.assignee_id,
            parent_task_id: row.parent_task_id,
            title: row.title,
            description: row.description,
            status: parse_status(&row.status)?,
            display_order: row.display_order,
            due_date: row.due_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(AsChangeset)]
#[diesel(table_name = tasks)]
struct TaskChangeset {
    title: Option<String>,
    description: Option<Option<String>>,
    status: Option<String>,
    assignee_id: Option<Option<Uuid>>,
    milestone_id: Option<Option<Uuid>>,
    due_date: Option<Option<DateTime<Utc>>>,
    display_order: Option<i32>,
    updated_at: DateTime<Utc>,
}

impl From<&TaskChanges> for TaskChangeset {
    fn from(changes: &TaskChanges) -> Self {
        Self {
            title: changes.title.clone(),
            description: changes.description.clone(),
            status: changes.status.map(|s| s.as_str().to_string()),
            assignee_id: changes.assignee_id,
            milestone_id: changes.milestone_id,
            due_date: changes.due_date,
            display_order: changes.display_order,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = task_history)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct HistoryRow {
    id: i64,
    task_id: Uuid,
    user_id: Option<Uuid>,
    changed_field: String,
    old_value: Option<String>,
    new_value: Option<String>,
    changed_at: DateTime<Utc>,
}

impl From<HistoryRow> for TaskHistoryEntry {
    fn from(row: HistoryRow) -> Self {
        Self {
            id: row.id,
            task_id: row.task_id,
            user_id: row.user_id,
            changed_field: row.changed_field,
            old_value: row.old_value,
            new_value: row.new_value,
            changed_at: row.changed_at,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = task_history)]
struct NewHistoryRow {
    task_id: Uuid,
    user_id: Option<Uuid>,
    changed_field: String,
    old_value: Option<String>,
    new_value: Option<String>,
    changed_at: DateTime<Utc>,
}

/// Diesel-backed store. Every call checks a connection out of the r2d2 pool
/// on the blocking thread pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut PgConnection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Database(format!("blocking task failed: {e}")))?
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.run(|conn| {
            diesel::sql_query("SELECT 1").execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        self.run(move |conn| {
            users::table
                .find(id)
                .select(UserRow::as_select())
                .first(conn)
                .optional()?
                .map(User::try_from)
                .transpose()
        })
        .await
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.run(|conn| {
            users::table
                .order(users::created_at.asc())
                .select(UserRow::as_select())
                .load(conn)?
                .into_iter()
                .map(User::try_from)
                .collect()
        })
        .await
    }

    async fn update_user_role(&self, id: Uuid, role: Role) -> Result<User, StoreError> {
        self.run(move |conn| {
            let row = diesel::update(users::table.find(id))
                .set((
                    users::role.eq(role.as_str()),
                    users::updated_at.eq(Utc::now()),
                ))
                .returning(UserRow::as_returning())
                .get_result(conn)?;
            User::try_from(row)
        })
        .await
    }

    async fn create_account(&self, account: NewAccount) -> Result<User, StoreError> {
        self.run(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                let now = Utc::now();
                let row = UserRow {
                    id: Uuid::new_v4(),
                    first_name: account.first_name,
                    last_name: account.last_name,
                    avatar_url: None,
                    role: account.role.as_str().to_string(),
                    created_at: now,
                    updated_at: now,
                };
                let row = diesel::insert_into(users::table)
                    .values(&row)
                    .returning(UserRow::as_returning())
                    .get_result(conn)?;

                diesel::insert_into(auth_credentials::table)
                    .values((
                        auth_credentials::user_id.eq(row.id),
                        auth_credentials::email.eq(&account.email),
                        auth_credentials::password_hash.eq(&account.password_hash),
                        auth_credentials::created_at.eq(now),
                        auth_credentials::updated_at.eq(now),
                    ))
                    .execute(conn)?;

                User::try_from(row)
            })
        })
        .await
    }

    async fn find_credentials_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Credentials>, StoreError> {
        let email = email.to_lowercase();
        self.run(move |conn| {
            Ok(auth_credentials::table
                .filter(auth_credentials::email.eq(email))
                .select(CredentialsRow::as_select())
                .first(conn)
                .optional()?
                .map(Credentials::from))
        })
        .await
    }

    async fn find_credentials_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<Credentials>, StoreError> {
        self.run(move |conn| {
            Ok(auth_credentials::table
                .find(user_id)
                .select(CredentialsRow::as_select())
                .first(conn)
                .optional()?
                .map(Credentials::from))
        })
        .await
    }

    async fn update_password_hash(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        let password_hash = password_hash.to_string();
        self.run(move |conn| {
            let updated = diesel::update(auth_credentials::table.find(user_id))
                .set((
                    auth_credentials::password_hash.eq(password_hash),
                    auth_credentials::updated_at.eq(Utc::now()),
                ))
                .execute(conn)?;
            if updated == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
        .await
    }

    async fn create_session(
        &self,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<Session, StoreError> {
        self.run(move |conn| {
            let row = SessionRow {
                id: Uuid::new_v4(),
                user_id,
                created_at: Utc::now(),
                expires_at,
                revoked_at: None,
            };
            Ok(diesel::insert_into(auth_sessions::table)
                .values(&row)
                .returning(SessionRow::as_returning())
                .get_result(conn)?
                .into())
        })
        .await
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        self.run(move |conn| {
            Ok(auth_sessions::table
                .find(id)
                .select(SessionRow::as_select())
                .first(conn)
                .optional()?
                .map(Session::from))
        })
        .await
    }

    async fn revoke_session(&self, id: Uuid) -> Result<(), StoreError> {
        self.run(move |conn| {
            diesel::update(
                auth_sessions::table
                    .find(id)
                    .filter(auth_sessions::revoked_at.is_null()),
            )
            .set(auth_sessions::revoked_at.eq(Some(Utc::now())))
            .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn revoke_user_sessions(
        &self,
        user_id: Uuid,
        keep: Option<Uuid>,
    ) -> Result<u64, StoreError> {
        self.run(move |conn| {
            // Session ids are v4, never nil.
            let keep = keep.unwrap_or_else(Uuid::nil);
            let revoked = diesel::update(
                auth_sessions::table
                    .filter(auth_sessions::user_id.eq(user_id))
                    .filter(auth_sessions::revoked_at.is_null())
                    .filter(auth_sessions::id.ne(keep)),
            )
            .set(auth_sessions::revoked_at.eq(Some(Utc::now())))
            .execute(conn)?;
            Ok(revoked as u64)
        })
        .await
    }

    async fn create_recovery_token(&self, token: RecoveryToken) -> Result<(), StoreError> {
        self.run(move |conn| {
            diesel::insert_into(password_recovery_tokens::table)
                .values((
                    password_recovery_tokens::token_hash.eq(token.token_hash),
                    password_recovery_tokens::user_id.eq(token.user_id),
                    password_recovery_tokens::created_at.eq(Utc::now()),
                    password_recovery_tokens::expires_at.eq(token.expires_at),
                    password_recovery_tokens::used_at.eq(token.used_at),
                ))
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn consume_recovery_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>, StoreError> {
        let token_hash = token_hash.to_string();
        self.run(move |conn| {
            Ok(diesel::update(
                password_recovery_tokens::table
                    .find(token_hash)
                    .filter(password_recovery_tokens::used_at.is_null())
                    .filter(password_recovery_tokens::expires_at.gt(now)),
            )
            .set(password_recovery_tokens::used_at.eq(Some(now)))
            .returning(password_recovery_tokens::user_id)
            .get_result::<Uuid>(conn)
            .optional()?)
        })
        .await
    }

    async fn insert_project(&self, project: NewProject) -> Result<Project, StoreError> {
        self.run(move |conn| insert_project_row(conn, project).map(Project::from))
            .await
    }

    async fn delete_project(&self, id: Uuid) -> Result<(), StoreError> {
        self.run(move |conn| {
            let deleted = diesel::delete(projects::table.find(id)).execute(conn)?;
            if deleted == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
        .await
    }

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>, StoreError> {
        self.run(move |conn| {
            Ok(projects::table
                .find(id)
                .select(ProjectRow::as_select())
                .first(conn)
                .optional()?
                .map(Project::from))
        })
        .await
    }

    async fn list_projects_for_member(&self, user_id: Uuid) -> Result<Vec<Project>, StoreError> {
        self.run(move |conn| {
            Ok(projects::table
                .inner_join(project_members::table)
                .filter(project_members::user_id.eq(user_id))
                .order(projects::created_at.desc())
                .select(ProjectRow::as_select())
                .load(conn)?
                .into_iter()
                .map(Project::from)
                .collect())
        })
        .await
    }

    async fn create_project_with_owner(&self, project: NewProject) -> Result<Project, StoreError> {
        self.run(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                let owner_id = project.owner_id;
                let row = insert_project_row(conn, project)?;
                insert_member_row(conn, row.id, owner_id)
                    .map_err(|e| StoreError::MemberBootstrap(Box::new(e)))?;
                Ok(Project::from(row))
            })
        })
        .await
    }

    async fn add_member(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<ProjectMember, StoreError> {
        self.run(move |conn| insert_member_row(conn, project_id, user_id).map(ProjectMember::from))
            .await
    }

    async fn remove_member(&self, project_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        self.run(move |conn| {
            let deleted =
                diesel::delete(project_members::table.find((project_id, user_id))).execute(conn)?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn is_member(&self, project_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        self.run(move |conn| {
            Ok(diesel::select(diesel::dsl::exists(
                project_members::table.find((project_id, user_id)),
            ))
            .get_result::<bool>(conn)?)
        })
        .await
    }

    async fn list_members(&self, project_id: Uuid) -> Result<Vec<MemberProfile>, StoreError> {
        self.run(move |conn| {
            project_members::table
                .inner_join(users::table)
                .filter(project_members::project_id.eq(project_id))
                .order(project_members::created_at.asc())
                .select(UserRow::as_select())
                .load(conn)?
                .into_iter()
                .map(|row| {
                    let user = User::try_from(row)?;
                    Ok(MemberProfile {
                        user_id: user.id,
                        first_name: user.first_name,
                        last_name: user.last_name,
                        avatar_url: user.avatar_url,
                        role: user.role,
                    })
                })
                .collect()
        })
        .await
    }

    async fn list_milestones(&self, project_id: Uuid) -> Result<Vec<Milestone>, StoreError> {
        self.run(move |conn| {
            // Postgres sorts NULL last on ascending order.
            Ok(milestones::table
                .filter(milestones::project_id.eq(project_id))
                .order((milestones::due_date.asc(), milestones::created_at.asc()))
                .select(MilestoneRow::as_select())
                .load(conn)?
                .into_iter()
                .map(Milestone::from)
                .collect())
        })
        .await
    }

    async fn insert_milestone(&self, milestone: NewMilestone) -> Result<Milestone, StoreError> {
        self.run(move |conn| {
            let now = Utc::now();
            let row = MilestoneRow {
                id: Uuid::new_v4(),
                project_id: milestone.project_id,
                name: milestone.name,
                description: milestone.description,
                due_date: milestone.due_date,
                created_at: now,
                updated_at: now,
            };
            Ok(diesel::insert_into(milestones::table)
                .values(&row)
                .returning(MilestoneRow::as_returning())
                .get_result(conn)?
                .into())
        })
        .await
    }

    async fn get_milestone(&self, id: Uuid) -> Result<Option<Milestone>, StoreError> {
        self.run(move |conn| {
            Ok(milestones::table
                .find(id)
                .select(MilestoneRow::as_select())
                .first(conn)
                .optional()?
                .map(Milestone::from))
        })
        .await
    }

    async fn update_milestone(
        &self,
        id: Uuid,
        changes: &MilestoneChanges,
    ) -> Result<Milestone, StoreError> {
        let changeset = MilestoneChangeset {
            name: changes.name.clone(),
            description: changes.description.clone(),
            due_date: changes.due_date,
            updated_at: Utc::now(),
        };
        self.run(move |conn| {
            Ok(diesel::update(milestones::table.find(id))
                .set(&changeset)
                .returning(MilestoneRow::as_returning())
                .get_result(conn)?
                .into())
        })
        .await
    }

    async fn delete_milestone(&self, id: Uuid) -> Result<(), StoreError> {
        self.run(move |conn| {
            let deleted = diesel::delete(milestones::table.find(id)).execute(conn)?;
            if deleted == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
        .await
    }

    async fn count_tasks_for_milestone(&self, id: Uuid) -> Result<i64, StoreError> {
        self.run(move |conn| {
            Ok(tasks::table
                .filter(tasks::milestone_id.eq(id))
                .count()
                .get_result(conn)?)
        })
        .await
    }

    async fn list_task_cards(
        &self,
        project_id: Uuid,
        filter: TaskFilter,
    ) -> Result<Vec<TaskCard>, StoreError> {
        self.run(move |conn| {
            let mut query = tasks::table
                .left_join(users::table)
                .left_join(milestones::table)
                .select((
                    TaskRow::as_select(),
                    users::first_name.nullable(),
                    users::last_name.nullable(),
                    milestones::name.nullable(),
                ))
                .filter(tasks::project_id.eq(project_id))
                .order((tasks::display_order.asc(), tasks::created_at.asc()))
                .into_boxed();
            if let Some(assignee_id) = filter.assignee_id {
                query = query.filter(tasks::assignee_id.eq(assignee_id));
            }
            if let Some(milestone_id) = filter.milestone_id {
                query = query.filter(tasks::milestone_id.eq(milestone_id));
            }

            let rows: Vec<(TaskRow, Option<String>, Option<String>, Option<String>)> =
                query.load(conn)?;

            rows.into_iter()
                .map(|(task, first, last, milestone_name)| {
                    Ok(TaskCard {
                        status: parse_status(&task.status)?,
                        assignee_name: display_name(first.as_deref(), last.as_deref()),
                        id: task.id,
                        title: task.title,
                        description: task.description,
                        assignee_id: task.assignee_id,
                        parent_task_id: task.parent_task_id,
                        display_order: task.display_order,
                        milestone_name,
                    })
                })
                .collect()
        })
        .await
    }

    async fn insert_task(&self, task: NewTask) -> Result<Task, StoreError> {
        self.run(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                // Serializes inserts per project so the max lookup and insert
                // observe each other.
                diesel::sql_query("SELECT pg_advisory_xact_lock(hashtext($1))")
                    .bind::<Text, _>(task.project_id.to_string())
                    .execute(conn)?;

                let current_max: Option<i32> = tasks::table
                    .filter(tasks::project_id.eq(task.project_id))
                    .filter(tasks::status.eq(TaskStatus::ToDo.as_str()))
                    .select(diesel::dsl::max(tasks::display_order))
                    .first(conn)?;

                let now = Utc::now();
                let row = TaskRow {
                    id: Uuid::new_v4(),
                    project_id: task.project_id,
                    milestone_id: task.milestone_id,
                    assignee_id: task.assignee_id,
                    parent_task_id: task.parent_task_id,
                    title: task.title,
                    description: task.description,
                    status: TaskStatus::ToDo.as_str().to_string(),
                    display_order: next_display_order(current_max),
                    due_date: task.due_date,
                    created_at: now,
                    updated_at: now,
                };
                let row = diesel::insert_into(tasks::table)
                    .values(&row)
                    .returning(TaskRow::as_returning())
                    .get_result(conn)?;
                Task::try_from(row)
            })
        })
        .await
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        self.run(move |conn| {
            tasks::table
                .find(id)
                .select(TaskRow::as_select())
                .first(conn)
                .optional()?
                .map(Task::try_from)
                .transpose()
        })
        .await
    }

    async fn count_open_subtasks(&self, parent_id: Uuid) -> Result<i64, StoreError> {
        self.run(move |conn| {
            Ok(tasks::table
                .filter(tasks::parent_task_id.eq(parent_id))
                .filter(tasks::status.ne(TaskStatus::Done.as_str()))
                .count()
                .get_result(conn)?)
        })
        .await
    }

    async fn update_task(&self, id: Uuid, changes: &TaskChanges) -> Result<Task, StoreError> {
        let changeset = TaskChangeset::from(changes);
        self.run(move |conn| {
            let row = diesel::update(tasks::table.find(id))
                .set(&changeset)
                .returning(TaskRow::as_returning())
                .get_result(conn)?;
            Task::try_from(row)
        })
        .await
    }

    async fn insert_history(&self, entries: Vec<NewHistoryEntry>) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        let now = Utc::now();
        let rows: Vec<NewHistoryRow> = entries
            .into_iter()
            .map(|e| NewHistoryRow {
                task_id: e.task_id,
                user_id: Some(e.user_id),
                changed_field: e.changed_field,
                old_value: e.old_value,
                new_value: e.new_value,
                changed_at: now,
            })
            .collect();
        self.run(move |conn| {
            diesel::insert_into(task_history::table)
                .values(&rows)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn list_history(&self, task_id: Uuid) -> Result<Vec<TaskHistoryEntry>, StoreError> {
        self.run(move |conn| {
            Ok(task_history::table
                .filter(task_history::task_id.eq(task_id))
                .order((task_history::changed_at.desc(), task_history::id.desc()))
                .select(HistoryRow::as_select())
                .load(conn)?
                .into_iter()
                .map(TaskHistoryEntry::from)
                .collect())
        })
        .await
    }
}

fn insert_project_row(conn: &mut PgConnection, project: NewProject) -> Result<ProjectRow, StoreError> {
    let now = Utc::now();
    let row = ProjectRow {
        id: Uuid::new_v4(),
        name: project.name,
        owner_id: project.owner_id,
        created_at: now,
        updated_at: now,
    };
    Ok(diesel::insert_into(projects::table)
        .values(&row)
        .returning(ProjectRow::as_returning())
        .get_result(conn)?)
}

fn insert_member_row(
    conn: &mut PgConnection,
    project_id: Uuid,
    user_id: Uuid,
) -> Result<MemberRow, StoreError> {
    let row = MemberRow {
        project_id,
        user_id,
        created_at: Utc::now(),
    };
    Ok(diesel::insert_into(project_members::table)
        .values(&row)
        .returning(MemberRow::as_returning())
        .get_result(conn)?)
}
