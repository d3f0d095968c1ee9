use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::sudo::SudoConfig;

// ============================================================================
// Main Config Schema
// ============================================================================

/// The unified provis configuration structure
///
/// Every field defaults to the values baked into the original host setup, so
/// an empty config file provisions the stock deployment: nginx and supervisor
/// installed, the site proxying `/api/` and `/images/` to the backend on
/// 127.0.0.1:8000, and the backend running under supervisor.
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisConfig {
    /// Reverse-proxy site definition
    pub site: SiteConfig,

    /// Supervised programs
    pub programs: Vec<ProgramConfig>,

    /// System packages to install
    pub packages: PackagesConfig,

    /// Services to restart after configuration changes
    pub restart: RestartConfig,

    /// Privilege classifier configuration
    pub sudo: SudoConfig,
}

impl Default for ProvisConfig {
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            programs: vec![ProgramConfig::default()],
            packages: PackagesConfig::default(),
            restart: RestartConfig::default(),
            sudo: SudoConfig::default(),
        }
    }
}

impl ProvisConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.site.validate().context("Invalid [site] section")?;

        for program in &self.programs {
            program
                .validate()
                .with_context(|| format!("Invalid program '{}'", program.name))?;
        }

        let mut seen = std::collections::HashSet::new();
        for program in &self.programs {
            if !seen.insert(&program.name) {
                anyhow::bail!("Duplicate program name: {}", program.name);
            }
        }

        Ok(())
    }

    /// Find a program by name
    pub fn find_program(&self, name: &str) -> Option<&ProgramConfig> {
        self.programs.iter().find(|p| p.name == name)
    }
}

// ============================================================================
// Site - reverse-proxy server block
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Site name; also names the emitted config file
    pub name: String,

    /// Listen port
    pub listen: u16,

    /// Value for the server_name directive
    pub server_name: String,

    /// Default upstream address for proxied locations
    pub upstream: String,

    /// Proxied location prefixes
    pub locations: Vec<LocationConfig>,

    /// client_max_body_size directive (the backend accepts image uploads)
    pub client_max_body_size: String,

    /// Proxy timeouts, in seconds
    pub proxy_connect_timeout: u32,
    pub proxy_send_timeout: u32,
    pub proxy_read_timeout: u32,

    /// Directory the site file is written to
    pub available_dir: String,

    /// Directory the enabling symlink is created in
    pub enabled_dir: String,

    /// Remove the distribution's default site symlink
    pub disable_default_site: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: "newjilo".to_string(),
            listen: 80,
            server_name: "_".to_string(),
            upstream: "127.0.0.1:8000".to_string(),
            locations: vec![
                LocationConfig::new("/api/"),
                LocationConfig::new("/images/"),
            ],
            client_max_body_size: "20M".to_string(),
            proxy_connect_timeout: 300,
            proxy_send_timeout: 300,
            proxy_read_timeout: 300,
            available_dir: "/etc/nginx/sites-available".to_string(),
            enabled_dir: "/etc/nginx/sites-enabled".to_string(),
            disable_default_site: true,
        }
    }
}

impl SiteConfig {
    /// Validate the site config
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            anyhow::bail!("Site name cannot be empty");
        }
        if self.listen == 0 {
            anyhow::bail!("Site listen port cannot be 0");
        }
        if self.upstream.is_empty() {
            anyhow::bail!("Site upstream cannot be empty");
        }
        for location in &self.locations {
            location.validate()?;
        }
        Ok(())
    }

    /// Path of the emitted site file
    pub fn available_path(&self) -> PathBuf {
        expand(&self.available_dir).join(format!("{}.conf", self.name))
    }

    /// Path of the enabling symlink
    pub fn enabled_path(&self) -> PathBuf {
        expand(&self.enabled_dir).join(format!("{}.conf", self.name))
    }

    /// Path of the distribution's default site symlink
    pub fn default_site_path(&self) -> PathBuf {
        expand(&self.enabled_dir).join("default")
    }
}

/// A proxied location prefix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    /// URL path prefix, e.g. "/api/"
    pub path: String,

    /// Per-location upstream override
    #[serde(default)]
    pub upstream: Option<String>,
}

impl LocationConfig {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            upstream: None,
        }
    }

    /// Validate the location
    pub fn validate(&self) -> Result<()> {
        if !self.path.starts_with('/') {
            anyhow::bail!("Location path must start with '/': {}", self.path);
        }
        Ok(())
    }
}

// ============================================================================
// Programs - supervised processes
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramConfig {
    /// Program name for the [program:...] section
    pub name: String,

    /// Command line supervisor launches
    pub command: String,

    /// Working directory
    pub directory: String,

    /// Unix user to run as
    pub user: Option<String>,

    /// Start on supervisor startup
    pub autostart: bool,

    /// Restart on exit
    pub autorestart: bool,

    /// Log paths; empty means derive from the program name
    pub stdout_logfile: String,
    pub stderr_logfile: String,

    /// Extra environment entries, emitted sorted by key
    pub environment: BTreeMap<String, String>,

    /// Signal the whole process group on stop
    pub stopasgroup: bool,
    pub killasgroup: bool,

    /// Directory the program file is written to
    pub conf_dir: String,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            name: "newjilo".to_string(),
            command: "/srv/newjilo/venv/bin/uvicorn main:app --host 0.0.0.0 --port 8000"
                .to_string(),
            directory: "/srv/newjilo".to_string(),
            user: Some("www-data".to_string()),
            autostart: true,
            autorestart: true,
            stdout_logfile: String::new(),
            stderr_logfile: String::new(),
            environment: BTreeMap::new(),
            stopasgroup: true,
            killasgroup: true,
            conf_dir: "/etc/supervisor/conf.d".to_string(),
        }
    }
}

impl ProgramConfig {
    /// Validate the program config
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            anyhow::bail!("Program name cannot be empty");
        }
        if self.command.is_empty() {
            anyhow::bail!("Program command cannot be empty");
        }
        Ok(())
    }

    /// Path of the emitted program file
    pub fn conf_path(&self) -> PathBuf {
        expand(&self.conf_dir).join(format!("{}.conf", self.name))
    }

    /// Effective stdout log path
    pub fn stdout_log(&self) -> String {
        if self.stdout_logfile.is_empty() {
            format!("/var/log/{}/out.log", self.name)
        } else {
            self.stdout_logfile.clone()
        }
    }

    /// Effective stderr log path
    pub fn stderr_log(&self) -> String {
        if self.stderr_logfile.is_empty() {
            format!("/var/log/{}/err.log", self.name)
        } else {
            self.stderr_logfile.clone()
        }
    }
}

// ============================================================================
// Packages and restarts
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackagesConfig {
    /// apt packages to install
    pub apt: Vec<String>,
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            apt: vec!["nginx".to_string(), "supervisor".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartConfig {
    /// systemd services restarted after configuration changes
    pub services: Vec<String>,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            services: vec!["nginx".to_string()],
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::tilde(path);
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_matches_stock_deployment() {
        let config: ProvisConfig = toml::from_str("").expect("Failed to parse empty config");

        assert_eq!(config.packages.apt, vec!["nginx", "supervisor"]);
        assert_eq!(config.site.listen, 80);
        assert_eq!(config.site.upstream, "127.0.0.1:8000");
        let paths: Vec<_> = config.site.locations.iter().map(|l| l.path.as_str()).collect();
        assert_eq!(paths, vec!["/api/", "/images/"]);
        assert_eq!(config.site.proxy_read_timeout, 300);
        assert_eq!(config.site.client_max_body_size, "20M");

        assert_eq!(config.programs.len(), 1);
        let program = &config.programs[0];
        assert_eq!(program.name, "newjilo");
        assert!(program.command.contains("--port 8000"));
        assert!(program.autorestart);
        assert_eq!(program.stdout_log(), "/var/log/newjilo/out.log");

        assert_eq!(config.restart.services, vec!["nginx"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_example_config() {
        let toml = r#"
[site]
name = "api"
listen = 8080
server_name = "api.example.com"
upstream = "127.0.0.1:9000"
client_max_body_size = "50M"

[[site.locations]]
path = "/api/"

[[site.locations]]
path = "/media/"
upstream = "127.0.0.1:9001"

[[programs]]
name = "api"
command = "/srv/api/venv/bin/uvicorn app:app --port 9000"
directory = "/srv/api"
user = "api"

[packages]
apt = ["nginx", "supervisor", "certbot"]

[restart]
services = ["nginx"]
"#;

        let config: ProvisConfig = toml::from_str(toml).expect("Failed to parse config");

        assert_eq!(config.site.name, "api");
        assert_eq!(config.site.listen, 8080);
        assert_eq!(config.site.locations.len(), 2);
        assert_eq!(
            config.site.locations[1].upstream.as_deref(),
            Some("127.0.0.1:9001")
        );

        assert_eq!(config.programs.len(), 1);
        assert_eq!(config.programs[0].user.as_deref(), Some("api"));
        // Unset log paths derive from the name
        assert_eq!(config.programs[0].stderr_log(), "/var/log/api/err.log");

        assert_eq!(config.packages.apt.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_site_validation() {
        let mut site = SiteConfig::default();
        assert!(site.validate().is_ok());

        site.listen = 0;
        assert!(site.validate().is_err());

        site.listen = 80;
        site.locations.push(LocationConfig::new("api/"));
        assert!(site.validate().is_err());
    }

    #[test]
    fn test_duplicate_program_names_rejected() {
        let config = ProvisConfig {
            programs: vec![ProgramConfig::default(), ProgramConfig::default()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_site_paths() {
        let site = SiteConfig::default();
        assert_eq!(
            site.available_path(),
            PathBuf::from("/etc/nginx/sites-available/newjilo.conf")
        );
        assert_eq!(
            site.enabled_path(),
            PathBuf::from("/etc/nginx/sites-enabled/newjilo.conf")
        );
        assert_eq!(
            site.default_site_path(),
            PathBuf::from("/etc/nginx/sites-enabled/default")
        );
    }
}
