mod backup;
mod db;
mod entitlements;
mod ipc;
mod model;
mod reconcile;
mod store;

use std::io::{self, BufRead, Write};

use reconcile::ReconcileConfig;
use tracing_subscriber::EnvFilter;

fn main() {
    // stdout carries the IPC stream, so diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let mut config = ReconcileConfig::default();
    if let Ok(email) = std::env::var("CLASSHUBD_BOOTSTRAP_ADMIN") {
        if !email.trim().is_empty() {
            config.bootstrap_admin_email = email;
        }
    }

    let mut state = ipc::AppState {
        workspace: None,
        db: None,
        reconcile: config,
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id; ignore.
                let _ = writeln!(
                    stdout,
                    "{{\"ok\":false,\"error\":{{\"code\":\"bad_json\",\"message\":\"{}\"}}}}",
                    e
                );
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
