use crate::model::QuarterCode;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    codigos_trimestres: Vec<String>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("quarter catalog not found at {0}")]
    NotFound(String),
    #[error("failed to read quarter catalog {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("quarter catalog {path} is not valid JSON: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

/// Valid quarter codes in file order. Read-only once loaded.
#[derive(Debug, Clone, Default)]
pub struct QuarterCatalog {
    codes: Vec<QuarterCode>,
    load_error: Option<String>,
}

impl QuarterCatalog {
    pub fn from_codes<I, S>(codes: I) -> QuarterCatalog
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let codes = codes
            .into_iter()
            .filter_map(|c| QuarterCode::parse(c.as_ref()))
            .filter(|c| seen.insert(c.clone()))
            .collect();
        QuarterCatalog {
            codes,
            load_error: None,
        }
    }

    pub fn read(path: &Path) -> Result<QuarterCatalog, CatalogError> {
        let display = path.to_string_lossy().to_string();
        let text = match std::fs::read_to_string(path) {
            Ok(v) => v,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CatalogError::NotFound(display))
            }
            Err(source) => {
                return Err(CatalogError::Io {
                    path: display,
                    source,
                })
            }
        };
        let file: CatalogFile = serde_json::from_str(&text).map_err(|source| CatalogError::Json {
            path: display,
            source,
        })?;
        Ok(QuarterCatalog::from_codes(file.codigos_trimestres))
    }

    /// Like `read`, but a missing or malformed file yields an empty catalog
    /// that remembers why.
    pub fn load(path: &Path) -> QuarterCatalog {
        match QuarterCatalog::read(path) {
            Ok(catalog) => {
                if catalog.is_empty() {
                    tracing::warn!(path = %path.display(), "quarter catalog has no codes");
                } else {
                    tracing::info!(path = %path.display(), count = catalog.codes.len(), "quarter catalog loaded");
                }
                catalog
            }
            Err(e) => {
                tracing::warn!(error = %e, "quarter catalog unavailable");
                QuarterCatalog {
                    codes: Vec::new(),
                    load_error: Some(e.to_string()),
                }
            }
        }
    }

    pub fn codes(&self) -> &[QuarterCode] {
        &self.codes
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn contains(&self, code: &QuarterCode) -> bool {
        self.codes.contains(code)
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }
}
