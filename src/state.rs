//! Apply journal - record of the last converge run

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::ExecuteSummary;

const JOURNAL_FILE: &str = "last-apply.json";

/// Record of a completed apply run
#[derive(Debug, Serialize, Deserialize)]
pub struct ApplyRecord {
    pub timestamp: DateTime<Utc>,
    pub created: usize,
    pub modified: usize,
    pub removed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub no_change: usize,
    /// Per-resource outcome, id -> short result description
    pub results: Vec<ResourceRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: String,
    pub outcome: String,
}

impl ApplyRecord {
    pub fn new(summary: &ExecuteSummary, results: Vec<ResourceRecord>) -> Self {
        Self {
            timestamp: Utc::now(),
            created: summary.created,
            modified: summary.modified,
            removed: summary.removed,
            skipped: summary.skipped,
            failed: summary.failed,
            no_change: summary.no_change,
            results,
        }
    }

    /// Save the record under the given state directory
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Could not create state dir: {}", dir.display()))?;
        let path = dir.join(JOURNAL_FILE);
        let content = serde_json::to_string_pretty(self).context("Failed to serialize journal")?;
        fs::write(&path, content)
            .with_context(|| format!("Could not write journal: {}", path.display()))?;
        Ok(path)
    }

    /// Load the record from the given state directory, if present
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(JOURNAL_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read journal: {}", path.display()))?;
        let record = serde_json::from_str(&content)
            .with_context(|| format!("Invalid journal format: {}", path.display()))?;
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_journal_round_trip() {
        let dir = tempfile::tempdir().unwrap();

        let summary = ExecuteSummary {
            created: 2,
            modified: 1,
            ..Default::default()
        };
        let record = ApplyRecord::new(
            &summary,
            vec![ResourceRecord {
                id: "nginx".to_string(),
                outcome: "created".to_string(),
            }],
        );

        record.save(dir.path()).unwrap();

        let loaded = ApplyRecord::load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.created, 2);
        assert_eq!(loaded.modified, 1);
        assert_eq!(loaded.results.len(), 1);
        assert_eq!(loaded.results[0].id, "nginx");
    }

    #[test]
    fn test_missing_journal_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ApplyRecord::load(dir.path()).unwrap().is_none());
    }
}
