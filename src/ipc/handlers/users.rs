use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{ProfilePatch, Role, RoleProfile, PRECEDENCE};
use crate::reconcile;
use crate::store::{ProfileStore, SqliteProfileStore};
use chrono::Utc;
use serde_json::json;

fn parse_role(req: &Request) -> Result<Role, serde_json::Value> {
    let raw = req
        .params
        .get("role")
        .and_then(|v| v.as_str())
        .ok_or_else(|| err(&req.id, "bad_params", "missing role", None))?;
    Role::parse(raw)
        .ok_or_else(|| err(&req.id, "bad_params", format!("unknown role: {}", raw), None))
}

fn parse_uid<'a>(req: &'a Request) -> Result<&'a str, serde_json::Value> {
    req.params
        .get("uid")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", "missing uid", None))
}

/// Cross-role user directory for the admin dashboard. Partition order first
/// (admins, then teachers, then students), name order within a partition.
fn handle_directory(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "users": [] }));
    };
    let store = SqliteProfileStore::new(conn);

    let mut users: Vec<serde_json::Value> = Vec::new();
    for role in PRECEDENCE {
        match store.list(role) {
            Ok(profiles) => users.extend(profiles.iter().map(RoleProfile::to_json)),
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }
    ok(&req.id, json!({ "users": users }))
}

fn handle_set_active(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let role = match parse_role(req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let uid = match parse_uid(req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let Some(active) = req.params.get("active").and_then(|v| v.as_bool()) else {
        return err(&req.id, "bad_params", "missing active", None);
    };

    let store = SqliteProfileStore::new(conn);
    let now = Utc::now().to_rfc3339();
    match store.set_active(role, uid, active, &now) {
        Ok(true) => ok(&req.id, json!({ "uid": uid, "active": active })),
        Ok(false) => err(&req.id, "not_found", "user not found", None),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let role = match parse_role(req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let uid = match parse_uid(req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let Some(patch_raw) = req.params.get("patch") else {
        return err(&req.id, "bad_params", "missing patch", None);
    };
    let patch: ProfilePatch = match serde_json::from_value(patch_raw.clone()) {
        Ok(p) => p,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };
    if patch.is_empty() {
        return err(&req.id, "bad_params", "patch must set at least one field", None);
    }

    let invalid = patch.fields_invalid_for(role);
    if !invalid.is_empty() {
        return err(
            &req.id,
            "bad_params",
            format!("fields not valid for role {}", role.as_str()),
            Some(json!({ "fields": invalid })),
        );
    }

    let store = SqliteProfileStore::new(conn);
    let now = Utc::now().to_rfc3339();
    match store.update_fields(role, uid, &patch, &now) {
        Ok(true) => match store.fetch(role, uid) {
            Ok(Some(profile)) => ok(&req.id, profile.to_json()),
            Ok(None) => err(&req.id, "not_found", "user not found", None),
            Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Ok(false) => err(&req.id, "not_found", "user not found", None),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let role = match parse_role(req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let uid = match parse_uid(req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    // Deleting an already-absent record lands in the same end state, so it
    // answers ok rather than not_found. No cross-partition cascade here:
    // course and enrollment cleanup belongs to the course data owner.
    let store = SqliteProfileStore::new(conn);
    match store.delete(role, uid) {
        Ok(deleted) => ok(&req.id, json!({ "uid": uid, "deleted": deleted })),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

/// Admin-driven provisioning, e.g. registering teachers ahead of their first
/// sign-in. Refuses a uid that already owns a record in any partition.
fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let role = match parse_role(req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let uid = match parse_uid(req) {
        Ok(u) => u.to_string(),
        Err(resp) => return resp,
    };
    let Some(email) = req.params.get("email").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing email", None);
    };
    let full_name = req
        .params
        .get("fullName")
        .and_then(|v| v.as_str())
        .unwrap_or(crate::model::NEW_USER_PLACEHOLDER)
        .to_string();

    let store = SqliteProfileStore::new(conn);
    match reconcile::get_owning_profile(&store, &uid) {
        Ok(Some(existing)) => {
            return err(
                &req.id,
                "already_exists",
                format!("uid already owned by {} partition", existing.role().as_str()),
                None,
            )
        }
        Ok(None) => {}
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let now = Utc::now().to_rfc3339();
    let profile = blank_profile(role, &uid, email, &full_name, &now);
    match store.create(&profile) {
        Ok(()) => ok(&req.id, profile.to_json()),
        Err(e) => err(&req.id, "db_insert_failed", e.to_string(), None),
    }
}

fn blank_profile(role: Role, uid: &str, email: &str, full_name: &str, now: &str) -> RoleProfile {
    use crate::model::{AdminProfile, AdminRole, StudentProfile, TeacherProfile};
    match role {
        Role::Admin => RoleProfile::Admin(AdminProfile {
            id: uid.to_string(),
            full_name: full_name.to_string(),
            email: email.to_string(),
            photo_url: None,
            is_active: true,
            role: AdminRole::Admin,
            permissions: crate::model::default_admin_permissions(),
            created_at: now.to_string(),
            updated_at: now.to_string(),
            last_login: None,
        }),
        Role::Teacher => RoleProfile::Teacher(TeacherProfile {
            id: uid.to_string(),
            full_name: full_name.to_string(),
            email: email.to_string(),
            photo_url: None,
            is_active: true,
            subject_specialization: None,
            created_at: now.to_string(),
            updated_at: now.to_string(),
            last_login: None,
        }),
        Role::Student => RoleProfile::Student(StudentProfile {
            id: uid.to_string(),
            full_name: full_name.to_string(),
            email: email.to_string(),
            photo_url: None,
            is_active: true,
            enrolled_courses: Vec::new(),
            linked_teachers: Vec::new(),
            created_at: now.to_string(),
            updated_at: now.to_string(),
            last_login: None,
        }),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "users.directory" => Some(handle_directory(state, req)),
        "users.create" => Some(handle_create(state, req)),
        "users.setActive" => Some(handle_set_active(state, req)),
        "users.update" => Some(handle_update(state, req)),
        "users.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
