//! Command-line and environment configuration.

use clap::Parser;
use std::path::PathBuf;

/// gradetrackd - quarterly evaluation tracker sidecar
///
/// Reads one JSON request per line on stdin and writes one JSON response per
/// line on stdout. Logs go to stderr.
///
/// The base64 service-account blob is only read from the
/// FIREBASE_CREDENTIALS_BASE64 environment variable (or `.env`), never from
/// the command line.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Workspace directory to open at startup
    ///
    /// Can also be chosen later with the `workspace.select` request.
    #[arg(long, value_name = "DIR", env = "GRADETRACK_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Quarter catalog file (`{"codigos_trimestres": [...]}`)
    #[arg(
        long,
        value_name = "FILE",
        default_value = "turmas.json",
        env = "GRADETRACK_CATALOG"
    )]
    pub catalog: PathBuf,

    /// Service-account JSON file, used when FIREBASE_CREDENTIALS_BASE64 is unset
    #[arg(long, value_name = "FILE", env = "GRADETRACK_CREDENTIALS_FILE")]
    pub credentials_file: Option<PathBuf>,

    /// Log filter, e.g. `info` or `gradetrackd=debug`
    #[arg(long, default_value = "info", env = "GRADETRACK_LOG")]
    pub log_level: String,
}
