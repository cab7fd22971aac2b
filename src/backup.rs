use anyhow::{anyhow, Context};
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const DB_FILE: &str = "gradebook.sqlite3";
const DB_ENTRY: &str = "db/gradebook.sqlite3";
const STAGING_FILE: &str = "gradebook.sqlite3.importing";
const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";
pub const BUNDLE_FORMAT: &str = "gradetrack-workspace-v1";
pub const RAW_SQLITE_FORMAT: &str = "sqlite3";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub project_id: String,
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub fn export_workspace_bundle(
    workspace_path: &Path,
    out_path: &Path,
    project_id: &str,
) -> anyhow::Result<ExportSummary> {
    let db_path = workspace_path.join(DB_FILE);
    if !db_path.is_file() {
        return Err(anyhow!(
            "workspace database not found: {}",
            db_path.to_string_lossy()
        ));
    }
    let db_bytes = std::fs::read(&db_path)
        .with_context(|| format!("failed to read database {}", db_path.to_string_lossy()))?;
    let checksum = sha256_hex(&db_bytes);

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = json!({
        "format": BUNDLE_FORMAT,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": chrono::Utc::now().to_rfc3339(),
        "projectId": project_id,
        "dbSha256": checksum,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(DB_ENTRY, opts)
        .context("failed to start database entry")?;
    zip.write_all(&db_bytes)
        .context("failed to write database entry")?;

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT.to_string(),
        entry_count: 2,
        sha256: checksum,
    })
}

/// Restores a bundle (or a bare SQLite file) as the workspace database.
///
/// The incoming database is staged next to the live one and checked before
/// it replaces anything: it must be a workspace store (`documents` and
/// `store_meta` tables) and, when `expected_project_id` is given, bound to
/// that project. For bundles the checksum and the manifest's project must
/// match as well. On any failure the live database is left untouched.
pub fn import_workspace_bundle(
    in_path: &Path,
    workspace_path: &Path,
    expected_project_id: Option<&str>,
) -> anyhow::Result<ImportSummary> {
    std::fs::create_dir_all(workspace_path).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace_path.to_string_lossy()
        )
    })?;
    let dst = workspace_path.join(DB_FILE);
    let tmp_dst = workspace_path.join(STAGING_FILE);
    if tmp_dst.exists() {
        let _ = std::fs::remove_file(&tmp_dst);
    }

    let signature = read_signature(in_path)?;
    let format = if signature.starts_with(SQLITE_HEADER) {
        RAW_SQLITE_FORMAT
    } else if signature.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
        BUNDLE_FORMAT
    } else {
        return Err(anyhow!(
            "{} is neither a workspace bundle nor a sqlite database",
            in_path.to_string_lossy()
        ));
    };

    let staged = if format == RAW_SQLITE_FORMAT {
        std::fs::copy(in_path, &tmp_dst)
            .map(|_| ())
            .with_context(|| format!("failed to stage sqlite file {}", in_path.to_string_lossy()))
    } else {
        stage_bundle(in_path, &tmp_dst, expected_project_id)
    };
    let project_id =
        match staged.and_then(|()| verify_staged_database(&tmp_dst, expected_project_id)) {
            Ok(v) => v,
            Err(e) => {
                let _ = std::fs::remove_file(&tmp_dst);
                return Err(e);
            }
        };

    if dst.exists() {
        std::fs::remove_file(&dst).with_context(|| {
            format!(
                "failed to remove existing database {}",
                dst.to_string_lossy()
            )
        })?;
    }
    std::fs::rename(&tmp_dst, &dst).with_context(|| {
        format!(
            "failed to move imported database to {}",
            dst.to_string_lossy()
        )
    })?;

    Ok(ImportSummary {
        bundle_format_detected: format.to_string(),
        project_id,
    })
}

/// Extracts the database entry of a bundle into `tmp_dst` once the manifest
/// format, project and checksum all agree.
fn stage_bundle(
    in_path: &Path,
    tmp_dst: &Path,
    expected_project_id: Option<&str>,
) -> anyhow::Result<()> {
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }
    let expected_sha = manifest
        .get("dbSha256")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("manifest.json missing dbSha256"))?
        .to_string();
    let manifest_project = manifest.get("projectId").and_then(|v| v.as_str());
    if let Some(expected) = expected_project_id {
        match manifest_project {
            None => return Err(anyhow!("manifest.json missing projectId")),
            Some(found) if found != expected => {
                return Err(anyhow!(
                    "bundle belongs to project {}, workspace expects {}",
                    found,
                    expected
                ))
            }
            Some(_) => {}
        }
    }

    let mut db_bytes = Vec::new();
    archive
        .by_name(DB_ENTRY)
        .context("bundle missing db/gradebook.sqlite3")?
        .read_to_end(&mut db_bytes)
        .context("failed to extract database entry")?;
    let actual_sha = sha256_hex(&db_bytes);
    if actual_sha != expected_sha {
        return Err(anyhow!(
            "database checksum mismatch: manifest {}, bundle {}",
            expected_sha,
            actual_sha
        ));
    }

    let mut db_out = File::create(tmp_dst).with_context(|| {
        format!(
            "failed to create temp database {}",
            tmp_dst.to_string_lossy()
        )
    })?;
    db_out
        .write_all(&db_bytes)
        .context("failed to write extracted database")?;
    db_out
        .flush()
        .context("failed to flush extracted database")?;
    Ok(())
}

/// Opens the staged copy read-only and returns the project it is bound to.
fn verify_staged_database(
    path: &Path,
    expected_project_id: Option<&str>,
) -> anyhow::Result<String> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("failed to open imported database {}", path.to_string_lossy()))?;
    let tables: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master
             WHERE type = 'table' AND name IN ('documents', 'store_meta')",
            [],
            |r| r.get(0),
        )
        .context("imported file is not a readable sqlite database")?;
    if tables != 2 {
        return Err(anyhow!("imported database is not a gradebook workspace"));
    }
    let found: Option<String> = conn
        .query_row(
            "SELECT value FROM store_meta WHERE key = 'project_id'",
            [],
            |r| r.get(0),
        )
        .optional()
        .context("failed to read imported project binding")?;
    let Some(found) = found else {
        return Err(anyhow!("imported database is not bound to a project"));
    };
    if let Some(expected) = expected_project_id {
        if found != expected {
            return Err(anyhow!(
                "imported database belongs to project {}, workspace expects {}",
                found,
                expected
            ));
        }
    }
    Ok(found)
}

fn read_signature(path: &Path) -> anyhow::Result<Vec<u8>> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.to_string_lossy()))?;
    let mut sig = [0u8; 16];
    let mut read = 0;
    while read < sig.len() {
        let n = f
            .read(&mut sig[read..])
            .context("failed to read file signature")?;
        if n == 0 {
            break;
        }
        read += n;
    }
    Ok(sig[..read].to_vec())
}
