use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use boardserver::auth::service::hash_recovery_token;
use boardserver::core::shared::models::{RecoveryToken, Role};
use boardserver::store::{MemoryStore, Store};
use boardserver::{build_router, AppState};

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

struct Account {
    id: Uuid,
    token: String,
}

impl TestApp {
    fn new() -> Self {
        let (state, store) = AppState::in_memory().unwrap();
        Self {
            router: build_router(Arc::new(state)),
            store,
        }
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        Reply {
            status,
            headers,
            body,
        }
    }

    async fn get(&self, uri: &str, account: &Account) -> Reply {
        self.send(Method::GET, uri, Some(&account.token), None).await
    }

    async fn post(&self, uri: &str, account: &Account, body: Value) -> Reply {
        self.send(Method::POST, uri, Some(&account.token), Some(body))
            .await
    }

    async fn patch(&self, uri: &str, account: &Account, body: Value) -> Reply {
        self.send(Method::PATCH, uri, Some(&account.token), Some(body))
            .await
    }

    async fn delete(&self, uri: &str, account: &Account) -> Reply {
        self.send(Method::DELETE, uri, Some(&account.token), None).await
    }

    async fn login(&self, email: &str, password: &str) -> Reply {
        self.send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": email, "password": password})),
        )
        .await
    }

    /// Registers, assigns `role` directly in the store, and logs in.
    async fn account(&self, name: &str, role: Role) -> Account {
        let email = format!("{name}@example.com");
        let registered = self
            .send(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({
                    "email": email,
                    "password": "correct horse",
                    "first_name": name,
                    "last_name": "Tester",
                })),
            )
            .await;
        assert_eq!(registered.status, StatusCode::CREATED, "{}", registered.body);
        let id: Uuid = registered.body["user"]["id"].as_str().unwrap().parse().unwrap();

        if role != Role::TeamMember {
            self.store.update_user_role(id, role).await.unwrap();
        }

        let login = self.login(&email, "correct horse").await;
        assert_eq!(login.status, StatusCode::OK, "{}", login.body);
        Account {
            id,
            token: login.body["access_token"].as_str().unwrap().to_string(),
        }
    }

    async fn project(&self, owner: &Account, name: &str) -> Uuid {
        let reply = self.post("/api/projects", owner, json!({"name": name})).await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
        reply.body["id"].as_str().unwrap().parse().unwrap()
    }

    async fn task(&self, project: Uuid, account: &Account, body: Value) -> Value {
        let reply = self
            .post(&format!("/api/projects/{project}/tasks"), account, body)
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
        reply.body
    }
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new();
    let reply = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = app.send(Method::GET, "/api/health", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["status"], "healthy");
}

#[tokio::test]
async fn missing_credentials_are_rejected() {
    let app = TestApp::new();
    let reply = app.send(Method::GET, "/api/projects", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body["error"], "unauthorized");
    assert!(reply.body["message"].is_string());
    assert!(reply.headers.contains_key("x-request-id"));

    let reply = app
        .send(Method::GET, "/api/projects", Some("not-a-jwt"), None)
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_login_logout_flow() {
    let app = TestApp::new();
    let user = app.account("ada", Role::TeamMember).await;

    let duplicate = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"email": "  ADA@example.com ", "password": "another one"})),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);

    let wrong = app.login("ada@example.com", "wrong password").await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.body["message"], "Invalid email or password");

    let login = app.login("ada@example.com", "correct horse").await;
    let cookie = login.headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with("session_id="));
    assert!(cookie.contains("HttpOnly"));

    assert_eq!(app.get("/api/projects", &user).await.status, StatusCode::OK);
    let logout = app
        .send(Method::POST, "/api/auth/logout", Some(&user.token), None)
        .await;
    assert_eq!(logout.status, StatusCode::OK);
    assert_eq!(
        app.get("/api/projects", &user).await.status,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn register_validates_input() {
    let app = TestApp::new();
    let reply = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"email": "not-an-email", "password": "short"})),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"], "validation_error");
    let fields: Vec<_> = reply.body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(fields, ["email", "password"]);
}

#[tokio::test]
async fn recovery_code_logs_in_once() {
    let app = TestApp::new();
    let user = app.account("rita", Role::TeamMember).await;

    let unknown = app
        .send(
            Method::POST,
            "/api/auth/password-recovery",
            None,
            Some(json!({"email": "nobody@example.com"})),
        )
        .await;
    let known = app
        .send(
            Method::POST,
            "/api/auth/password-recovery",
            None,
            Some(json!({"email": "rita@example.com"})),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::OK);
    assert_eq!(unknown.body, known.body);

    app.store
        .create_recovery_token(RecoveryToken {
            token_hash: hash_recovery_token("known-code"),
            user_id: user.id,
            expires_at: Utc::now() + Duration::minutes(5),
            used_at: None,
        })
        .await
        .unwrap();

    let body = json!({"code": "known-code"});
    let first = app
        .send(Method::POST, "/api/auth/callback", None, Some(body.clone()))
        .await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["user"]["id"], user.id.to_string());

    let second = app
        .send(Method::POST, "/api/auth/callback", None, Some(body))
        .await;
    assert_eq!(second.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn password_update_revokes_other_sessions() {
    let app = TestApp::new();
    let current = app.account("paul", Role::TeamMember).await;
    let other = Account {
        id: current.id,
        token: app.login("paul@example.com", "correct horse").await.body["access_token"]
            .as_str()
            .unwrap()
            .to_string(),
    };

    let reply = app
        .post(
            "/api/auth/update-password",
            &current,
            json!({"password": "a brand new secret"}),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);

    assert_eq!(app.get("/api/projects", &current).await.status, StatusCode::OK);
    assert_eq!(
        app.get("/api/projects", &other).await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.login("paul@example.com", "a brand new secret").await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn project_name_is_normalized() {
    let app = TestApp::new();
    let pm = app.account("pam", Role::ProjectManager).await;

    let reply = app
        .post("/api/projects", &pm, json!({"name": "  Road   map \t 2025  "}))
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["name"], "Road map 2025");
    assert_eq!(reply.body["owner_id"], pm.id.to_string());
    let id = reply.body["id"].as_str().unwrap();
    assert_eq!(
        reply.headers.get(header::LOCATION).unwrap(),
        &format!("/projects/{id}")
    );

    for bad in ["  ab ", ""] {
        let reply = app.post("/api/projects", &pm, json!({"name": bad})).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    }
    let reply = app
        .post("/api/projects", &pm, json!({"name": "x".repeat(121)}))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn project_creation_requires_manager_role() {
    let app = TestApp::new();
    let member = app.account("tim", Role::TeamMember).await;
    let reply = app.post("/api/projects", &member, json!({"name": "Nope"})).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let admin = app.account("ann", Role::Administrator).await;
    app.project(&admin, "Admin project").await;
}

#[tokio::test]
async fn owner_becomes_member_and_failed_bootstrap_leaves_nothing() {
    let app = TestApp::new();
    let pm = app.account("pam", Role::ProjectManager).await;
    let project = app.project(&pm, "Bootstrap").await;

    let members = app
        .get(&format!("/api/projects/{project}/members"), &pm)
        .await;
    assert_eq!(members.status, StatusCode::OK);
    assert_eq!(members.body[0]["user_id"], pm.id.to_string());

    app.store.fail_member_inserts(true);
    let reply = app.post("/api/projects", &pm, json!({"name": "Doomed"})).await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.body["message"], "An internal error occurred");
    assert!(reply.body["request_id"].is_string());
    assert_eq!(app.store.project_count().await, 1);
}

#[tokio::test]
async fn non_members_are_denied_project_resources() {
    let app = TestApp::new();
    let pm = app.account("pam", Role::ProjectManager).await;
    let outsider = app.account("oscar", Role::TeamMember).await;
    let project = app.project(&pm, "Private").await;
    let task = app.task(project, &pm, json!({"title": "Secret"})).await;
    let task_id = task["id"].as_str().unwrap();

    let scoped = [
        format!("/api/projects/{project}"),
        format!("/api/projects/{project}/members"),
        format!("/api/projects/{project}/milestones"),
        format!("/api/projects/{project}/tasks"),
        format!("/api/tasks/{task_id}"),
        format!("/api/tasks/{task_id}/history"),
    ];
    for uri in &scoped {
        assert_eq!(app.get(uri, &outsider).await.status, StatusCode::FORBIDDEN, "{uri}");
        assert_eq!(app.get(uri, &pm).await.status, StatusCode::OK, "{uri}");
    }

    let listed = app.get("/api/projects", &outsider).await;
    assert_eq!(listed.body, json!([]));

    // Membership is checked before existence.
    let missing = Uuid::new_v4();
    assert_eq!(
        app.get(&format!("/api/projects/{missing}"), &outsider).await.status,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        app.get(&format!("/api/tasks/{missing}"), &outsider).await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.get("/api/projects/not-a-uuid", &pm).await.body["message"],
        "Invalid project ID"
    );
}

#[tokio::test]
async fn membership_management() {
    let app = TestApp::new();
    let pm = app.account("pam", Role::ProjectManager).await;
    let dev = app.account("dev", Role::TeamMember).await;
    let project = app.project(&pm, "Team").await;
    let members = format!("/api/projects/{project}/members");

    let added = app.post(&members, &pm, json!({"user_id": dev.id})).await;
    assert_eq!(added.status, StatusCode::CREATED);
    assert_eq!(added.body["user_id"], dev.id.to_string());

    let duplicate = app.post(&members, &pm, json!({"user_id": dev.id})).await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
    assert_eq!(
        duplicate.body["message"],
        "User is already a member of this project"
    );

    let unknown = app
        .post(&members, &pm, json!({"user_id": Uuid::new_v4()}))
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    // A team member cannot manage membership, even with a bad body.
    let denied = app.post(&members, &dev, json!({})).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let owner = app.delete(&format!("{members}/{}", pm.id), &pm).await;
    assert_eq!(owner.status, StatusCode::CONFLICT);

    let removed = app.delete(&format!("{members}/{}", dev.id), &pm).await;
    assert_eq!(removed.status, StatusCode::NO_CONTENT);
    let again = app.delete(&format!("{members}/{}", dev.id), &pm).await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
    assert_eq!(again.body["message"], "Membership not found");

    let bad = app.delete(&format!("{members}/zzz"), &pm).await;
    assert_eq!(bad.body["message"], "Invalid project or user ID");
}

#[tokio::test]
async fn milestone_lifecycle() {
    let app = TestApp::new();
    let pm = app.account("pam", Role::ProjectManager).await;
    let project = app.project(&pm, "Milestones").await;
    let milestones = format!("/api/projects/{project}/milestones");

    let beta = app
        .post(&milestones, &pm, json!({"name": "Beta", "due_date": "2025-06-01"}))
        .await;
    assert_eq!(beta.status, StatusCode::CREATED);
    assert_eq!(beta.body["due_date"], "2025-06-01T00:00:00Z");
    let beta_id = beta.body["id"].as_str().unwrap().to_string();

    let duplicate = app.post(&milestones, &pm, json!({"name": "Beta"})).await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
    assert_eq!(
        duplicate.body["message"],
        "Milestone with this name already exists in the project"
    );

    let alpha = app
        .post(&milestones, &pm, json!({"name": "Alpha", "due_date": "2025-01-01"}))
        .await;
    app.post(&milestones, &pm, json!({"name": "Someday"})).await;
    let listed = app.get(&milestones, &pm).await;
    let names: Vec<_> = listed.body.as_array().unwrap().iter().map(|m| m["name"].clone()).collect();
    assert_eq!(names, [json!("Alpha"), json!("Beta"), json!("Someday")]);

    let uri = format!("/api/milestones/{beta_id}");
    let empty = app.patch(&uri, &pm, json!({})).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
    let cleared = app.patch(&uri, &pm, json!({"due_date": null})).await;
    assert_eq!(cleared.status, StatusCode::OK);
    assert_eq!(cleared.body["due_date"], Value::Null);

    app.task(project, &pm, json!({"title": "one", "milestone_id": beta_id}))
        .await;
    let guarded = app.delete(&uri, &pm).await;
    assert_eq!(guarded.status, StatusCode::CONFLICT);
    assert_eq!(
        guarded.body["message"],
        "Cannot delete milestone with 1 assigned task(s). Please reassign or delete the tasks first."
    );

    let alpha_uri = format!("/api/milestones/{}", alpha.body["id"].as_str().unwrap());
    assert_eq!(app.delete(&alpha_uri, &pm).await.status, StatusCode::NO_CONTENT);
    assert_eq!(app.get(&alpha_uri, &pm).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn team_member_cannot_write_milestones() {
    let app = TestApp::new();
    let pm = app.account("pam", Role::ProjectManager).await;
    let dev = app.account("dev", Role::TeamMember).await;
    let project = app.project(&pm, "Roles").await;
    app.post(
        &format!("/api/projects/{project}/members"),
        &pm,
        json!({"user_id": dev.id}),
    )
    .await;

    let reply = app
        .post(
            &format!("/api/projects/{project}/milestones"),
            &dev,
            json!({"name": "Mine"}),
        )
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(
        app.get(&format!("/api/projects/{project}/milestones"), &dev)
            .await
            .status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn created_task_lands_at_end_of_to_do() {
    let app = TestApp::new();
    let pm = app.account("pam", Role::ProjectManager).await;
    let project = app.project(&pm, "Board").await;

    let first = app.task(project, &pm, json!({"title": "first"})).await;
    assert_eq!(first["status"], "To Do");
    assert_eq!(first["display_order"], 1);

    let second = app.task(project, &pm, json!({"title": "second"})).await;
    assert_eq!(second["display_order"], 2);

    let fetched = app
        .get(&format!("/api/tasks/{}", second["id"].as_str().unwrap()), &pm)
        .await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body["status"], "To Do");
    assert_eq!(fetched.body["display_order"], 2);

    let board = app
        .get(&format!("/api/projects/{project}/tasks"), &pm)
        .await;
    let column = board.body["To Do"].as_array().unwrap();
    assert_eq!(column.len(), 2);
    assert_eq!(column[0]["title"], "first");
    assert_eq!(column[0]["assignee_name"], Value::Null);
    assert_eq!(board.body["Done"], json!([]));
}

#[tokio::test]
async fn next_display_order_follows_column_max_not_count() {
    let app = TestApp::new();
    let pm = app.account("pam", Role::ProjectManager).await;
    let project = app.project(&pm, "Gaps").await;

    let first = app.task(project, &pm, json!({"title": "first"})).await;
    let second = app.task(project, &pm, json!({"title": "second"})).await;

    let moved = app
        .patch(
            &format!("/api/tasks/{}", second["id"].as_str().unwrap()),
            &pm,
            json!({"status": "In Progress"}),
        )
        .await;
    assert_eq!(moved.status, StatusCode::OK);
    let bumped = app
        .patch(
            &format!("/api/tasks/{}", first["id"].as_str().unwrap()),
            &pm,
            json!({"display_order": 10}),
        )
        .await;
    assert_eq!(bumped.body["display_order"], 10);

    // One card left in To Do, ordered at 10.
    let third = app.task(project, &pm, json!({"title": "third"})).await;
    assert_eq!(third["display_order"], 11);

    let board = app
        .get(&format!("/api/projects/{project}/tasks"), &pm)
        .await;
    let titles: Vec<_> = board.body["To Do"]
        .as_array()
        .unwrap()
        .iter()
        .map(|card| card["title"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(titles, ["first", "third"]);
    assert_eq!(board.body["In Progress"][0]["title"], "second");
}

#[tokio::test]
async fn board_filters_and_names() {
    let app = TestApp::new();
    let pm = app.account("pam", Role::ProjectManager).await;
    let project = app.project(&pm, "Filters").await;
    let milestone = app
        .post(
            &format!("/api/projects/{project}/milestones"),
            &pm,
            json!({"name": "M1"}),
        )
        .await;
    let milestone_id = milestone.body["id"].as_str().unwrap();

    app.task(
        project,
        &pm,
        json!({"title": "mine", "assignee_id": pm.id, "milestone_id": milestone_id}),
    )
    .await;
    app.task(project, &pm, json!({"title": "loose"})).await;

    let board = app
        .get(
            &format!("/api/projects/{project}/tasks?assignee_id={}", pm.id),
            &pm,
        )
        .await;
    let column = board.body["To Do"].as_array().unwrap();
    assert_eq!(column.len(), 1);
    assert_eq!(column[0]["assignee_name"], "pam Tester");
    assert_eq!(column[0]["milestone_name"], "M1");

    let bad = app
        .get(&format!("/api/projects/{project}/tasks?milestone_id=oops"), &pm)
        .await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad.body["message"], "Invalid query parameters");
}

#[tokio::test]
async fn parent_cannot_finish_before_subtasks() {
    let app = TestApp::new();
    let pm = app.account("pam", Role::ProjectManager).await;
    let project = app.project(&pm, "Parents").await;
    let parent = app.task(project, &pm, json!({"title": "parent"})).await;
    let parent_id = parent["id"].as_str().unwrap();
    let child = app
        .task(project, &pm, json!({"title": "child", "parent_task_id": parent_id}))
        .await;

    let parent_uri = format!("/api/tasks/{parent_id}");
    let blocked = app.patch(&parent_uri, &pm, json!({"status": "Done"})).await;
    assert_eq!(blocked.status, StatusCode::CONFLICT);
    assert_eq!(
        blocked.body["message"],
        "Cannot mark parent task as Done while subtasks are incomplete"
    );

    let child_uri = format!("/api/tasks/{}", child["id"].as_str().unwrap());
    assert_eq!(
        app.patch(&child_uri, &pm, json!({"status": "Done"})).await.status,
        StatusCode::OK
    );
    let done = app.patch(&parent_uri, &pm, json!({"status": "Done"})).await;
    assert_eq!(done.status, StatusCode::OK);
    assert_eq!(done.body["status"], "Done");
}

#[tokio::test]
async fn task_updates_write_history() {
    let app = TestApp::new();
    let pm = app.account("pam", Role::ProjectManager).await;
    let project = app.project(&pm, "History").await;
    let task = app.task(project, &pm, json!({"title": "A"})).await;
    let uri = format!("/api/tasks/{}", task["id"].as_str().unwrap());
    let history_uri = format!("{uri}/history");

    let renamed = app.patch(&uri, &pm, json!({"title": "B"})).await;
    assert_eq!(renamed.status, StatusCode::OK);
    let history = app.get(&history_uri, &pm).await.body;
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["changed_field"], "title");
    assert_eq!(history[0]["old_value"], "A");
    assert_eq!(history[0]["new_value"], "B");
    assert_eq!(history[0]["user_id"], pm.id.to_string());

    let unchanged = app
        .patch(&uri, &pm, json!({"title": "B", "status": "To Do"}))
        .await;
    assert_eq!(unchanged.status, StatusCode::OK);
    assert_eq!(app.get(&history_uri, &pm).await.body.as_array().unwrap().len(), 1);

    let cleared = app.patch(&uri, &pm, json!({"description": null})).await;
    assert_eq!(cleared.status, StatusCode::OK);
    assert_eq!(app.get(&history_uri, &pm).await.body.as_array().unwrap().len(), 1);

    let null_title = app.patch(&uri, &pm, json!({"title": null})).await;
    assert_eq!(null_title.status, StatusCode::BAD_REQUEST);
    assert_eq!(null_title.body["details"][0]["field"], "title");
    assert_eq!(app.get(&uri, &pm).await.body["title"], "B");
}

#[tokio::test]
async fn task_references_must_stay_in_project() {
    let app = TestApp::new();
    let pm = app.account("pam", Role::ProjectManager).await;
    let home = app.project(&pm, "Home").await;
    let away = app.project(&pm, "Away").await;
    let foreign = app
        .post(
            &format!("/api/projects/{away}/milestones"),
            &pm,
            json!({"name": "Foreign"}),
        )
        .await;
    let foreign_id = foreign.body["id"].as_str().unwrap();

    let reply = app
        .post(
            &format!("/api/projects/{home}/tasks"),
            &pm,
            json!({"title": "T", "milestone_id": foreign_id}),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let task = app.task(home, &pm, json!({"title": "T"})).await;
    let reply = app
        .patch(
            &format!("/api/tasks/{}", task["id"].as_str().unwrap()),
            &pm,
            json!({"milestone_id": foreign_id}),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = app
        .post(
            &format!("/api/projects/{home}/tasks"),
            &pm,
            json!({"title": ""}),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["details"][0]["field"], "title");
}

#[tokio::test]
async fn administrators_manage_roles() {
    let app = TestApp::new();
    let admin = app.account("ann", Role::Administrator).await;
    let dev = app.account("dev", Role::TeamMember).await;
    let uri = format!("/api/users/{}/role", dev.id);

    let denied = app.patch(&uri, &dev, json!({"role": "administrator"})).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let invalid = app.patch(&uri, &admin, json!({"role": "overlord"})).await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);

    let missing = app
        .patch(
            &format!("/api/users/{}/role", Uuid::new_v4()),
            &admin,
            json!({"role": "project_manager"}),
        )
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let promoted = app
        .patch(&uri, &admin, json!({"role": "project_manager"}))
        .await;
    assert_eq!(promoted.status, StatusCode::OK);
    assert_eq!(promoted.body["role"], "project_manager");

    // The new role applies to the existing session.
    app.project(&dev, "Promoted").await;

    let users = app.get("/api/users", &dev).await;
    assert_eq!(users.body.as_array().unwrap().len(), 2);
}
