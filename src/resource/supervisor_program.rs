//! Supervised program resource - runtime state via supervisorctl
//!
//! The program's config file is a separate [`ConfigFile`](super::ConfigFile)
//! resource; this one converges the runtime state to RUNNING.

use anyhow::{Context, Result};

use super::{ApplyContext, ApplyResult, Resource, ResourceState, SudoRequirement};
use crate::runner;

#[derive(Debug, Clone)]
pub struct SupervisorProgram {
    pub name: String,
}

impl SupervisorProgram {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    /// Query supervisord for the program state word
    fn status(&self) -> Result<Option<String>> {
        let output = runner::run_output("supervisorctl", &["status", &self.name])
            .context("Failed to run supervisorctl")?;

        // supervisorctl exits nonzero for stopped programs too, so parse
        // stdout regardless of the exit status
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_status_line(&stdout, &self.name))
    }
}

/// Parse a `supervisorctl status` line like
/// `newjilo  RUNNING  pid 1234, uptime 0:05:00` into the state word
fn parse_status_line(output: &str, name: &str) -> Option<String> {
    for line in output.lines() {
        let mut fields = line.split_whitespace();
        let Some(program) = fields.next() else {
            continue;
        };
        // Group entries show as "group:name"
        if program != name && program.rsplit(':').next() != Some(name) {
            continue;
        }
        if let Some(state) = fields.next() {
            return Some(state.to_string());
        }
    }
    None
}

impl Resource for SupervisorProgram {
    fn id(&self) -> String {
        self.name.clone()
    }

    fn description(&self) -> String {
        format!("Run {} under supervisor", self.name)
    }

    fn resource_type(&self) -> &'static str {
        "supervisor_program"
    }

    fn sudo_requirement(&self) -> SudoRequirement {
        SudoRequirement::Required {
            reason: format!("Managing {} requires root", self.name),
        }
    }

    fn current_state(&self) -> Result<ResourceState> {
        if !runner::command_exists("supervisorctl") {
            return Ok(ResourceState::Unknown);
        }

        match self.status()? {
            Some(state) if state == "ERROR" => Ok(ResourceState::Absent),
            Some(state) => Ok(ResourceState::Present {
                details: Some(state),
            }),
            None => Ok(ResourceState::Absent),
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present {
            details: Some("RUNNING".to_string()),
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if ctx.dry_run {
            return Ok(ApplyResult::Skipped {
                reason: "Dry run".to_string(),
            });
        }

        if self.current_state()? == self.desired_state() {
            return Ok(ApplyResult::NoChange);
        }

        let sudo = ctx.require_sudo()?;

        // Pick up a config file written earlier in this run
        sudo.run_capture("supervisorctl", &["reread"])?;
        sudo.run_capture("supervisorctl", &["update"])?;

        if self.current_state()? == self.desired_state() {
            // `update` already started it
            return Ok(ApplyResult::Modified);
        }

        if !sudo.run_status("supervisorctl", &["restart", &self.name])? {
            sudo.run_capture("supervisorctl", &["start", &self.name])?;
        }

        Ok(ApplyResult::Modified)
    }

    /// Restarts are sequenced; parallel supervisorctl calls race on the socket
    fn can_parallelize(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_running_line() {
        let output = "newjilo                          RUNNING   pid 1234, uptime 0:05:00\n";
        assert_eq!(
            parse_status_line(output, "newjilo"),
            Some("RUNNING".to_string())
        );
    }

    #[test]
    fn test_parse_stopped_line() {
        let output = "newjilo                          STOPPED   Not started\n";
        assert_eq!(
            parse_status_line(output, "newjilo"),
            Some("STOPPED".to_string())
        );
    }

    #[test]
    fn test_parse_group_entry() {
        let output = "backend:newjilo                  RUNNING   pid 99, uptime 1:00:00\n";
        assert_eq!(
            parse_status_line(output, "newjilo"),
            Some("RUNNING".to_string())
        );
    }

    #[test]
    fn test_parse_ignores_other_programs() {
        let output = "other                            RUNNING   pid 7, uptime 0:01:00\n";
        assert_eq!(parse_status_line(output, "newjilo"), None);
    }

    #[test]
    fn test_parse_empty_output() {
        assert_eq!(parse_status_line("", "newjilo"), None);
    }
}
