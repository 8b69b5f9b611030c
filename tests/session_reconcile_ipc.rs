mod test_support;

use serde_json::json;
use test_support::{request_ok, spawn_sidecar, temp_dir};

#[test]
fn first_sign_in_provisions_a_student_and_second_reuses_it() {
    let workspace = temp_dir("classhub-reconcile");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "session.signIn",
        json!({ "uid": "u1", "email": "student@example.com" }),
    );
    assert_eq!(first.get("role").and_then(|v| v.as_str()), Some("student"));
    assert_eq!(first.get("created").and_then(|v| v.as_bool()), Some(true));
    let profile = first.get("profile").expect("profile");
    assert_eq!(profile.get("isActive").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(
        profile
            .get("enrolledCourses")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(0)
    );
    assert_eq!(
        profile.get("fullName").and_then(|v| v.as_str()),
        Some("New User")
    );

    let second = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "session.signIn",
        json!({ "uid": "u1", "email": "student@example.com" }),
    );
    assert_eq!(second.get("role").and_then(|v| v.as_str()), Some("student"));
    assert_eq!(second.get("created").and_then(|v| v.as_bool()), Some(false));
    assert!(second
        .get("profile")
        .and_then(|p| p.get("lastLogin"))
        .and_then(|v| v.as_str())
        .is_some());

    let lookup = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "session.profile",
        json!({ "uid": "u1" }),
    );
    assert_eq!(lookup.get("role").and_then(|v| v.as_str()), Some("student"));
    assert_eq!(
        lookup
            .get("profile")
            .and_then(|p| p.get("id"))
            .and_then(|v| v.as_str()),
        Some("u1")
    );

    let missing = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "session.profile",
        json!({ "uid": "nobody" }),
    );
    assert!(missing.get("profile").expect("profile key").is_null());

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn bootstrap_admin_email_provisions_an_admin_with_full_permissions() {
    let workspace = temp_dir("classhub-bootstrap-admin");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({
            "path": workspace.to_string_lossy(),
            "bootstrapAdminEmail": "principal@school.example"
        }),
    );

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "session.signIn",
        json!({
            "uid": "u2",
            "email": "principal@school.example",
            "displayName": "Pat Principal"
        }),
    );
    assert_eq!(result.get("role").and_then(|v| v.as_str()), Some("admin"));
    assert_eq!(result.get("created").and_then(|v| v.as_bool()), Some(true));

    let profile = result.get("profile").expect("profile");
    assert_eq!(
        profile.get("role").and_then(|v| v.as_str()),
        Some("admin"),
        "admin sub-role defaults to plain admin"
    );
    assert_eq!(
        profile.get("fullName").and_then(|v| v.as_str()),
        Some("Pat Principal")
    );
    let mut permissions: Vec<String> = profile
        .get("permissions")
        .and_then(|v| v.as_array())
        .expect("permissions")
        .iter()
        .filter_map(|v| v.as_str().map(|s| s.to_string()))
        .collect();
    permissions.sort();
    assert_eq!(permissions, ["delete", "manage_users", "read", "write"]);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn bootstrap_admin_can_come_from_the_environment() {
    let workspace = temp_dir("classhub-bootstrap-env");
    let (mut child, mut stdin, mut reader) = test_support::spawn_sidecar_with_env(&[(
        "CLASSHUBD_BOOTSTRAP_ADMIN",
        "ops@district.example",
    )]);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let result = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "session.signIn",
        json!({ "uid": "ops-1", "email": "ops@district.example" }),
    );
    assert_eq!(result.get("role").and_then(|v| v.as_str()), Some("admin"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn sign_in_without_a_workspace_is_refused() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let resp = test_support::request(
        &mut stdin,
        &mut reader,
        "1",
        "session.signIn",
        json!({ "uid": "u1", "email": "student@example.com" }),
    );
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(test_support::error_code(&resp), "no_workspace");

    drop(stdin);
    let _ = child.wait();
}
