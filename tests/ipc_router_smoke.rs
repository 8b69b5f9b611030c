mod test_support;

use serde_json::json;
use test_support::{request, spawn_sidecar, temp_dir};

fn assert_routed(value: &serde_json::Value, method: &str) {
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        assert_ne!(
            test_support::error_code(value),
            "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("classhub-router-smoke");
    let out_dir = temp_dir("classhub-router-smoke-out");
    let bundle_out = out_dir.join("smoke.chbackup.zip");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let methods: Vec<(&str, serde_json::Value)> = vec![
        ("health", json!({})),
        (
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        ),
        (
            "session.signIn",
            json!({ "uid": "smoke-1", "email": "smoke@example.com" }),
        ),
        ("session.profile", json!({ "uid": "smoke-1" })),
        ("users.directory", json!({})),
        (
            "users.create",
            json!({ "uid": "smoke-t1", "role": "teacher", "email": "t@example.com" }),
        ),
        (
            "users.setActive",
            json!({ "uid": "smoke-1", "role": "student", "active": false }),
        ),
        (
            "users.update",
            json!({ "uid": "smoke-1", "role": "student", "patch": { "fullName": "Smoke Kid" } }),
        ),
        (
            "users.delete",
            json!({ "uid": "smoke-1", "role": "student" }),
        ),
        (
            "flags.set",
            json!({ "key": "trialActive", "value": "true" }),
        ),
        (
            "entitlements.featureAllowed",
            json!({ "featureId": "payments" }),
        ),
        (
            "entitlements.sectionAllowed",
            json!({ "featureId": "payments", "sectionId": "summary" }),
        ),
        ("entitlements.snapshot", json!({})),
        (
            "backup.exportWorkspaceBundle",
            json!({
                "workspacePath": workspace.to_string_lossy(),
                "outPath": bundle_out.to_string_lossy()
            }),
        ),
        (
            "backup.importWorkspaceBundle",
            json!({
                "workspacePath": workspace.to_string_lossy(),
                "inPath": bundle_out.to_string_lossy()
            }),
        ),
    ];

    for (i, (method, params)) in methods.into_iter().enumerate() {
        let id = (i + 1).to_string();
        let resp = request(&mut stdin, &mut reader, &id, method, params);
        assert_routed(&resp, method);
    }

    let unknown = request(&mut stdin, &mut reader, "99", "nope.nothing", json!({}));
    assert_eq!(test_support::error_code(&unknown), "not_implemented");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
    let _ = std::fs::remove_dir_all(out_dir);
}
