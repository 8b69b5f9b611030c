use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::Principal;
use crate::reconcile;
use crate::store::SqliteProfileStore;
use serde_json::json;

/// Sign-in boundary: the shell authenticates against the identity provider
/// and hands the resulting principal here to be mapped onto a role profile.
/// A failed reconciliation must block entry to role dashboards, so total
/// failures surface as errors instead of a guessed role.
fn handle_sign_in(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let principal: Principal = match serde_json::from_value(req.params.clone()) {
        Ok(p) => p,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };
    if principal.uid.trim().is_empty() {
        return err(&req.id, "bad_params", "uid must not be empty", None);
    }

    let store = SqliteProfileStore::new(conn);
    match reconcile::reconcile(&store, &state.reconcile, &principal) {
        Ok(outcome) => {
            let mut result = outcome.profile.to_json();
            result["created"] = json!(outcome.created);
            ok(&req.id, result)
        }
        Err(e) => err(&req.id, "reconcile_failed", e.to_string(), None),
    }
}

fn handle_profile(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let uid = match req.params.get("uid").and_then(|v| v.as_str()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing uid", None),
    };

    let store = SqliteProfileStore::new(conn);
    match reconcile::get_owning_profile(&store, uid) {
        Ok(Some(profile)) => ok(&req.id, profile.to_json()),
        Ok(None) => ok(&req.id, json!({ "role": null, "profile": null })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "session.signIn" => Some(handle_sign_in(state, req)),
        "session.profile" => Some(handle_profile(state, req)),
        _ => None,
    }
}
