use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::schema::ProvisConfig;

/// Candidate config locations, in resolution order
pub fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("provis.toml")];
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config").join("provis").join("config.toml"));
    }
    paths.push(PathBuf::from("/etc/provis/config.toml"));
    paths
}

/// Resolve the config file path, if any exists
pub fn resolve_path(explicit: Option<&PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.clone());
    }
    candidate_paths().into_iter().find(|p| p.exists())
}

/// Load and validate the configuration
///
/// A missing config file is not an error: the defaults describe the stock
/// deployment, so a bare `provis apply` provisions it.
pub fn load(explicit: Option<&PathBuf>) -> Result<ProvisConfig> {
    let config = match resolve_path(explicit) {
        Some(path) => {
            log::debug!("Loading config from {}", path.display());
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Could not read config file: {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Invalid TOML in {}", path.display()))?
        }
        None => {
            log::debug!("No config file found, using defaults");
            ProvisConfig::default()
        }
    };

    config.validate()?;
    Ok(config)
}

/// Directory for the apply journal
pub fn state_dir() -> Result<PathBuf> {
    if crate::runner::is_root() {
        return Ok(PathBuf::from("/var/lib/provis"));
    }
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".local").join("state").join("provis"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        let explicit = PathBuf::from("/nonexistent/custom.toml");
        let resolved = resolve_path(Some(&explicit));
        assert_eq!(resolved, Some(explicit));
    }

    #[test]
    fn test_candidates_end_at_etc() {
        let candidates = candidate_paths();
        assert_eq!(candidates.first(), Some(&PathBuf::from("provis.toml")));
        assert_eq!(
            candidates.last(),
            Some(&PathBuf::from("/etc/provis/config.toml"))
        );
    }
}
