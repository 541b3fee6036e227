use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Failed to read tenant directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One selectable tenant database
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub company_code: String,
    pub db_name: String,
    pub description: String,
}

/// Companies and the tenant databases each may select, read from a
/// `company_code,database,"description"` listing.
#[derive(Debug, Clone, Default)]
pub struct TenantDirectory {
    entries: Vec<DirectoryEntry>,
    /// Set when no listing exists; the default entry is then offered to every company.
    fallback: bool,
}

impl TenantDirectory {
    /// Load the listing at `path`. A missing file yields a single entry for
    /// `default_selector`.
    pub fn load(path: impl AsRef<Path>, default_selector: &str) -> Result<Self, DirectoryError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Self::parse(&content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("No tenant directory at {}, using default", path.display());
                Ok(Self::fallback(default_selector))
            }
            Err(source) => Err(DirectoryError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn parse(content: &str) -> Self {
        let entries = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(parse_line)
            .collect();
        Self {
            entries,
            fallback: false,
        }
    }

    pub fn fallback(default_selector: &str) -> Self {
        Self {
            entries: vec![DirectoryEntry {
                company_code: "default".to_string(),
                db_name: default_selector.to_string(),
                description: "Default Database".to_string(),
            }],
            fallback: true,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    /// Databases for `company_code`, or all of them when `None`.
    pub fn databases_for(&self, company_code: Option<&str>) -> Vec<&DirectoryEntry> {
        self.entries
            .iter()
            .filter(|e| self.fallback || company_code.map_or(true, |code| e.company_code == code))
            .collect()
    }

    pub fn contains(&self, company_code: &str, db_name: &str) -> bool {
        self.databases_for(Some(company_code))
            .iter()
            .any(|e| e.db_name == db_name)
    }

    /// Description of `db_name` for the company, falling back to the name itself.
    pub fn description_for(&self, company_code: &str, db_name: &str) -> String {
        self.databases_for(Some(company_code))
            .into_iter()
            .find(|e| e.db_name == db_name)
            .map(|e| e.description.clone())
            .unwrap_or_else(|| db_name.to_string())
    }
}

fn parse_line(line: &str) -> Option<DirectoryEntry> {
    let mut parts = line.splitn(3, ',');
    let company_code = parts.next()?.trim();
    let db_name = parts.next()?.trim();
    if db_name.is_empty() {
        return None;
    }
    let description = parts
        .next()
        .map(|d| d.trim().trim_matches('"').to_string())
        .unwrap_or_else(|| db_name.to_string());

    Some(DirectoryEntry {
        company_code: company_code.to_string(),
        db_name: db_name.to_string(),
        description,
    })
}
