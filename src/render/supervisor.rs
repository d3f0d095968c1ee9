//! supervisor program block emitter

use std::fmt::Write as _;

use crate::schema::ProgramConfig;

/// Render the [program:...] block for a supervised process
pub fn program_block(program: &ProgramConfig) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "[program:{}]", program.name);
    let _ = writeln!(out, "command={}", program.command);
    if !program.directory.is_empty() {
        let _ = writeln!(out, "directory={}", program.directory);
    }
    if let Some(user) = &program.user {
        let _ = writeln!(out, "user={}", user);
    }
    let _ = writeln!(out, "autostart={}", program.autostart);
    let _ = writeln!(out, "autorestart={}", program.autorestart);
    let _ = writeln!(out, "stdout_logfile={}", program.stdout_log());
    let _ = writeln!(out, "stderr_logfile={}", program.stderr_log());
    if program.stopasgroup {
        let _ = writeln!(out, "stopasgroup=true");
    }
    if program.killasgroup {
        let _ = writeln!(out, "killasgroup=true");
    }
    if !program.environment.is_empty() {
        // BTreeMap keeps the rendering order stable
        let pairs: Vec<String> = program
            .environment
            .iter()
            .map(|(key, value)| format!("{}=\"{}\"", key, value))
            .collect();
        let _ = writeln!(out, "environment={}", pairs.join(","));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_program_block() {
        let rendered = program_block(&ProgramConfig::default());

        assert!(rendered.starts_with("[program:newjilo]\n"));
        assert!(rendered.contains(
            "command=/srv/newjilo/venv/bin/uvicorn main:app --host 0.0.0.0 --port 8000"
        ));
        assert!(rendered.contains("directory=/srv/newjilo"));
        assert!(rendered.contains("user=www-data"));
        assert!(rendered.contains("autostart=true"));
        assert!(rendered.contains("autorestart=true"));
        assert!(rendered.contains("stdout_logfile=/var/log/newjilo/out.log"));
        assert!(rendered.contains("stderr_logfile=/var/log/newjilo/err.log"));
    }

    #[test]
    fn test_environment_sorted_by_key() {
        let mut program = ProgramConfig::default();
        program
            .environment
            .insert("SUPABASE_URL".to_string(), "https://x.supabase.co".to_string());
        program
            .environment
            .insert("ENV".to_string(), "production".to_string());

        let rendered = program_block(&program);
        assert!(rendered.contains(
            "environment=ENV=\"production\",SUPABASE_URL=\"https://x.supabase.co\""
        ));
    }

    #[test]
    fn test_no_environment_line_when_empty() {
        let rendered = program_block(&ProgramConfig::default());
        assert!(!rendered.contains("environment="));
    }

    #[test]
    fn test_optional_fields_omitted() {
        let program = ProgramConfig {
            user: None,
            directory: String::new(),
            stopasgroup: false,
            killasgroup: false,
            ..Default::default()
        };

        let rendered = program_block(&program);
        assert!(!rendered.contains("user="));
        assert!(!rendered.contains("directory="));
        assert!(!rendered.contains("stopasgroup"));
        assert!(!rendered.contains("killasgroup"));
    }
}
