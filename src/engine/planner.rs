//! Execution planner - builds the resource plan from the configuration

use crate::render;
use crate::resource::{
    AptPackage, ConfigFile, Resource, SudoRequirement, SupervisorProgram, Symlink,
};
use crate::schema::ProvisConfig;

/// Action run after resources converge, in plan order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostAction {
    /// Validate the proxy config (`nginx -t`) before any restart
    ValidateProxy,
    /// Restart a systemd service
    RestartService(String),
    /// Make supervisord pick up config changes (`reread` + `update`)
    SupervisorReload,
    /// Restart a supervised program
    RestartProgram(String),
}

impl PostAction {
    pub fn describe(&self) -> String {
        match self {
            Self::ValidateProxy => "Validate proxy configuration".to_string(),
            Self::RestartService(service) => format!("Restart {}", service),
            Self::SupervisorReload => "Reload supervisor configuration".to_string(),
            Self::RestartProgram(name) => format!("Restart program {}", name),
        }
    }
}

/// An execution plan with resources grouped by privilege level
pub struct ExecutionPlan {
    /// Resources that don't need elevated privileges
    pub unprivileged: Vec<Box<dyn Resource>>,
    /// Resources that need elevated privileges
    pub privileged: Vec<Box<dyn Resource>>,
    /// Actions run after resources converge, only when something changed
    pub post_actions: Vec<PostAction>,
}

impl ExecutionPlan {
    pub fn new() -> Self {
        Self {
            unprivileged: Vec::new(),
            privileged: Vec::new(),
            post_actions: Vec::new(),
        }
    }

    /// Add a resource, bucketing by its declared sudo requirement
    pub fn add_resource(&mut self, resource: Box<dyn Resource>) {
        if matches!(resource.sudo_requirement(), SudoRequirement::Required { .. }) {
            self.privileged.push(resource);
        } else {
            self.unprivileged.push(resource);
        }
    }

    /// Add a post action, keeping the list free of duplicates
    pub fn add_post_action(&mut self, action: PostAction) {
        if !self.post_actions.contains(&action) {
            self.post_actions.push(action);
        }
    }

    /// Filter the plan to resources matching a target pattern
    ///
    /// Target format: "type" or "type.name". Post actions are kept; the
    /// executor only runs them when a resource actually changed.
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        let Some(target) = target else {
            return self;
        };
        let (resource_type, name) = parse_target(target);
        let predicate = |r: &Box<dyn Resource>| {
            matches_filter(r.as_ref(), resource_type.as_deref(), name.as_deref())
        };

        Self {
            unprivileged: self.unprivileged.into_iter().filter(predicate).collect(),
            privileged: self.privileged.into_iter().filter(predicate).collect(),
            post_actions: self.post_actions,
        }
    }

    /// Total number of resources in the plan
    pub fn total_resources(&self) -> usize {
        self.unprivileged.len() + self.privileged.len()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.unprivileged.is_empty() && self.privileged.is_empty()
    }

    /// Iterate all resources, unprivileged first
    pub fn resources(&self) -> impl Iterator<Item = &dyn Resource> {
        self.unprivileged
            .iter()
            .chain(self.privileged.iter())
            .map(|r| r.as_ref())
    }
}

impl Default for ExecutionPlan {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the execution plan for a configuration
///
/// Order inside each bucket follows the converge sequence: packages first,
/// then config files and links, then supervised programs.
pub fn build_plan(config: &ProvisConfig) -> ExecutionPlan {
    let mut plan = ExecutionPlan::new();

    for package in &config.packages.apt {
        plan.add_resource(Box::new(AptPackage::new(package)));
    }

    // Reverse-proxy site: file, enabling link, default-site removal
    let site = &config.site;
    let available = site.available_path();
    let site_file = ConfigFile::new(available.clone(), render::nginx::server_block(site));
    let site_id = site_file.id();
    plan.add_resource(Box::new(
        site_file.with_sudo(config.sudo.requires_sudo("config_file", &site_id)),
    ));

    let enabled = site.enabled_path();
    let link = Symlink::new(enabled, available);
    let link_id = link.id();
    plan.add_resource(Box::new(
        link.with_sudo(config.sudo.requires_sudo("symlink", &link_id)),
    ));

    if site.disable_default_site {
        let default_link = Symlink::absent(site.default_site_path());
        let default_id = default_link.id();
        plan.add_resource(Box::new(
            default_link.with_sudo(config.sudo.requires_sudo("symlink", &default_id)),
        ));
    }

    // Supervised programs: config file plus runtime state
    for program in &config.programs {
        let conf = ConfigFile::new(
            program.conf_path(),
            render::supervisor::program_block(program),
        );
        let conf_id = conf.id();
        plan.add_resource(Box::new(
            conf.with_sudo(config.sudo.requires_sudo("config_file", &conf_id)),
        ));
        plan.add_resource(Box::new(SupervisorProgram::new(&program.name)));
    }

    // Post actions mirror the converge order: validate, reload the proxy,
    // then cycle the supervised programs
    plan.add_post_action(PostAction::ValidateProxy);
    for service in &config.restart.services {
        plan.add_post_action(PostAction::RestartService(service.clone()));
    }
    if !config.programs.is_empty() {
        plan.add_post_action(PostAction::SupervisorReload);
    }
    for program in &config.programs {
        plan.add_post_action(PostAction::RestartProgram(program.name.clone()));
    }

    plan
}

/// Parse a target string like "type.name" into (type, name)
fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    let parts: Vec<&str> = target.split('.').collect();
    match parts.len() {
        1 => (Some(parts[0].to_string()), None),
        2 => (Some(parts[0].to_string()), Some(parts[1].to_string())),
        _ => (None, Some(target.to_string())),
    }
}

/// Check if a resource matches the filter criteria
fn matches_filter(
    resource: &dyn Resource,
    resource_type: Option<&str>,
    name: Option<&str>,
) -> bool {
    if let Some(rt) = resource_type {
        // Allow common aliases
        let matches_type = match rt {
            "packages" | "apt" => resource.resource_type() == "apt_package",
            "files" => resource.resource_type() == "config_file",
            "links" => resource.resource_type() == "symlink",
            "programs" => resource.resource_type() == "supervisor_program",
            _ => resource.resource_type() == rt,
        };
        if !matches_type {
            return false;
        }
    }

    if let Some(n) = name
        && !resource.id().contains(n)
    {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target() {
        assert_eq!(parse_target("packages"), (Some("packages".to_string()), None));
        assert_eq!(
            parse_target("packages.nginx"),
            (Some("packages".to_string()), Some("nginx".to_string()))
        );
        assert_eq!(parse_target("a.b.c"), (None, Some("a.b.c".to_string())));
    }

    #[test]
    fn test_stock_plan_shape() {
        let config = ProvisConfig::default();
        let plan = build_plan(&config);

        // 2 packages + site file + enable link + default removal
        // + program file + program runtime
        assert_eq!(plan.total_resources(), 7);
        // Everything in the stock deployment touches system state
        assert!(plan.unprivileged.is_empty());
        assert_eq!(plan.privileged.len(), 7);

        assert_eq!(plan.post_actions[0], PostAction::ValidateProxy);
        assert!(plan
            .post_actions
            .contains(&PostAction::RestartService("nginx".to_string())));
        assert!(plan.post_actions.contains(&PostAction::SupervisorReload));
        assert!(plan
            .post_actions
            .contains(&PostAction::RestartProgram("newjilo".to_string())));
    }

    #[test]
    fn test_filter_by_type() {
        let config = ProvisConfig::default();
        let plan = build_plan(&config).filter_by_target(Some("packages"));

        assert_eq!(plan.total_resources(), 2);
        for resource in plan.resources() {
            assert_eq!(resource.resource_type(), "apt_package");
        }
    }

    #[test]
    fn test_filter_by_type_and_name() {
        let config = ProvisConfig::default();
        let plan = build_plan(&config).filter_by_target(Some("packages.nginx"));

        assert_eq!(plan.total_resources(), 1);
    }

    #[test]
    fn test_filter_keeps_post_actions() {
        let config = ProvisConfig::default();
        let plan = build_plan(&config).filter_by_target(Some("files"));

        assert!(!plan.post_actions.is_empty());
    }

    #[test]
    fn test_no_default_site_removal_when_disabled() {
        let mut config = ProvisConfig::default();
        config.site.disable_default_site = false;
        let plan = build_plan(&config);

        assert_eq!(plan.total_resources(), 6);
    }
}
