//! Rendering of generated artifacts: the wrapper script and the service unit.
//!
//! Values are quoted for their target syntax here, so the templates stay free
//! of escaping logic.

use std::path::Path;

use anyhow::Result;
use minijinja::{Environment, context};

const WRAPPER_TEMPLATE: &str = include_str!("templates/wrapper.sh");
const SERVICE_TEMPLATE: &str = include_str!("templates/service.unit");

/// Inputs for the wrapper script.
#[derive(Debug, Clone)]
pub struct WrapperInputs<'a> {
    pub install_root: &'a Path,
    pub env_dir: &'a Path,
    pub entry_point: &'a str,
}

/// Inputs for the systemd unit.
#[derive(Debug, Clone)]
pub struct ServiceInputs<'a> {
    pub description: &'a str,
    pub user: &'a str,
    pub group: &'a str,
    pub install_root: &'a Path,
    pub wrapper: &'a Path,
    pub start_command: &'a str,
    pub stop_command: &'a str,
}

/// Template engine wrapper around minijinja.
struct ArtifactEngine {
    env: Environment<'static>,
}

impl ArtifactEngine {
    fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        env.add_template("wrapper", WRAPPER_TEMPLATE)?;
        env.add_template("service", SERVICE_TEMPLATE)?;
        Ok(Self { env })
    }

    fn render_wrapper(&self, input: &WrapperInputs<'_>) -> Result<String> {
        let activate = input.env_dir.join("bin").join("activate");
        let template = self.env.get_template("wrapper")?;
        let rendered = template.render(context! {
            install_root => shell_quote(&input.install_root.display().to_string()),
            activate => shell_quote(&activate.display().to_string()),
            entry_point => shell_quote(input.entry_point),
        })?;
        Ok(rendered)
    }

    fn render_service(&self, input: &ServiceInputs<'_>) -> Result<String> {
        let root = input.install_root.display().to_string();
        let template = self.env.get_template("service")?;
        let rendered = template.render(context! {
            description => input.description,
            user => input.user,
            group => input.group,
            install_root => root.as_str(),
            environment => systemd_quote(&format!("IRONCLAW_ROOT={root}")),
            wrapper => systemd_quote(&input.wrapper.display().to_string()),
            start_command => input.start_command,
            stop_command => input.stop_command,
        })?;
        Ok(rendered)
    }
}

pub fn render_wrapper(input: &WrapperInputs<'_>) -> Result<String> {
    ArtifactEngine::new()?.render_wrapper(input)
}

pub fn render_service_unit(input: &ServiceInputs<'_>) -> Result<String> {
    ArtifactEngine::new()?.render_service(input)
}

/// Quote for POSIX shells. Plain words pass through untouched.
pub fn shell_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || "/._-+:=@%,".contains(ch));
    if plain {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Quote a single word for a systemd unit `Exec*=`/`Environment=` line.
pub fn systemd_quote(value: &str) -> String {
    if !value.is_empty() && !value.contains(|ch: char| ch.is_whitespace() || ch == '"' || ch == '\\')
    {
        return value.to_string();
    }
    let escaped = value.replace('\\', r"\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn wrapper_activates_env_and_forwards_args() {
        let root = PathBuf::from("/home/ada/.iron_claw");
        let env_dir = root.join("venv");
        let script = render_wrapper(&WrapperInputs {
            install_root: &root,
            env_dir: &env_dir,
            entry_point: "main.py",
        })
        .expect("render");

        assert!(script.starts_with("#!/usr/bin/env bash\n"));
        assert!(script.contains("export IRONCLAW_ROOT=/home/ada/.iron_claw\n"));
        assert!(script.contains("cd /home/ada/.iron_claw\n"));
        assert!(script.contains("source /home/ada/.iron_claw/venv/bin/activate\n"));
        assert!(script.ends_with("exec python main.py \"$@\"\n"));
    }

    #[test]
    fn wrapper_quotes_paths_with_spaces() {
        let root = PathBuf::from("/srv/iron claw");
        let env_dir = root.join("venv");
        let script = render_wrapper(&WrapperInputs {
            install_root: &root,
            env_dir: &env_dir,
            entry_point: "main.py",
        })
        .expect("render");
        assert!(script.contains("cd '/srv/iron claw'\n"));
    }

    #[test]
    fn service_unit_wires_start_stop_and_restart_policy() {
        let root = PathBuf::from("/home/ada/.iron_claw");
        let wrapper = root.join("ironclaw");
        let unit = render_service_unit(&ServiceInputs {
            description: "IronClaw AI agent",
            user: "ada",
            group: "staff",
            install_root: &root,
            wrapper: &wrapper,
            start_command: "start",
            stop_command: "stop",
        })
        .expect("render");

        assert!(unit.contains("User=ada\n"));
        assert!(unit.contains("Group=staff\n"));
        assert!(unit.contains("ExecStart=/home/ada/.iron_claw/ironclaw start\n"));
        assert!(unit.contains("ExecStop=/home/ada/.iron_claw/ironclaw stop\n"));
        assert!(unit.contains("Restart=on-failure\n"));
        assert!(unit.contains("Environment=IRONCLAW_ROOT=/home/ada/.iron_claw\n"));
        assert!(unit.contains("WantedBy=multi-user.target\n"));
    }

    #[test]
    fn quoting_helpers() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(systemd_quote("/opt/a b/run"), "\"/opt/a b/run\"");
        assert_eq!(systemd_quote("/opt/run"), "/opt/run");
    }
}
