mod backup;
mod catalog;
mod cli;
mod credentials;
mod editor;
mod error;
mod gradebook;
mod ipc;
mod lookup;
mod model;
mod report;
mod store;

use clap::Parser;
use std::io::{self, BufRead, Write};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn init_logging(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() {
    let _ = dotenvy::dotenv();
    let args = cli::Args::parse();
    init_logging(&args.log_level);
    tracing::info!("gradetrackd v{}", env!("CARGO_PKG_VERSION"));

    // Credentials are required before anything else is served.
    let blob = std::env::var(credentials::CREDENTIALS_ENV).ok();
    let source = match credentials::CredentialSource::resolve(
        blob.as_deref(),
        args.credentials_file.as_deref(),
    ) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "startup halted");
            std::process::exit(1);
        }
    };
    let service_account = match source.load() {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(source = %source.describe(), error = %e, "startup halted");
            std::process::exit(1);
        }
    };
    tracing::info!(
        project = %service_account.project_id,
        source = %source.describe(),
        "credentials loaded"
    );

    let mut state = ipc::AppState {
        credentials: service_account,
        catalog: catalog::QuarterCatalog::load(&args.catalog),
        catalog_path: args.catalog.clone(),
        workspace: None,
        gradebook: None,
    };

    if let Some(ws) = args.workspace.as_deref() {
        if let Err(e) = ipc::open_workspace(&mut state, ws) {
            tracing::error!(workspace = %ws.display(), error = %e, "startup halted");
            std::process::exit(1);
        }
    }

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
                // Can't reply without id.
                tracing::warn!(error = %e, "unparseable request");
                let body = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", body);
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
    tracing::info!("stdin closed, exiting");
}
