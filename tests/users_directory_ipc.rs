mod test_support;

use serde_json::json;
use test_support::{error_code, request, request_ok, spawn_sidecar, temp_dir};

#[test]
fn directory_lists_all_partitions_in_precedence_order() {
    let workspace = temp_dir("classhub-directory");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({
            "path": workspace.to_string_lossy(),
            "bootstrapAdminEmail": "root@school.example"
        }),
    );

    // One admin and one student arrive through sign-in, the teacher through
    // admin provisioning.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "session.signIn",
        json!({ "uid": "a1", "email": "root@school.example", "displayName": "Root" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "session.signIn",
        json!({ "uid": "s1", "email": "kid@example.com", "displayName": "Kid A" }),
    );
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "users.create",
        json!({
            "uid": "t1",
            "role": "teacher",
            "email": "frizzle@school.example",
            "fullName": "Ms. Frizzle"
        }),
    );
    assert_eq!(
        created.get("role").and_then(|v| v.as_str()),
        Some("teacher")
    );

    let directory = request_ok(&mut stdin, &mut reader, "5", "users.directory", json!({}));
    let users = directory
        .get("users")
        .and_then(|v| v.as_array())
        .expect("users");
    let roles: Vec<&str> = users
        .iter()
        .filter_map(|u| u.get("role").and_then(|v| v.as_str()))
        .collect();
    assert_eq!(roles, ["admin", "teacher", "student"]);

    // Provisioning refuses a uid that already owns a record anywhere.
    let dup = request(
        &mut stdin,
        &mut reader,
        "6",
        "users.create",
        json!({
            "uid": "s1",
            "role": "teacher",
            "email": "kid@example.com"
        }),
    );
    assert_eq!(dup.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(error_code(&dup), "already_exists");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
