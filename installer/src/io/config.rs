//! Installer configuration (optional TOML file).
//!
//! Every field has a default, so the installer runs with zero flags and no
//! file. CLI flags override individual fields after loading.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::version::parse_version;

pub const DEFAULT_REPO_URL: &str = "https://github.com/ironclaw-ai/ironclaw.git";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InstallerConfig {
    pub repository: RepositoryConfig,
    pub layout: LayoutConfig,
    pub command: CommandConfig,
    pub service: ServiceConfig,
    pub runtime: RuntimeConfig,
    pub setup: SetupConfig,
    pub probe: ProbeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RepositoryConfig {
    pub url: String,
    /// Branch to clone; `None` follows the remote's default branch.
    pub branch: Option<String>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REPO_URL.to_string(),
            branch: None,
        }
    }
}

/// Locations inside the install root. Relative paths resolve against the root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LayoutConfig {
    /// Defaults to `$HOME/.iron_claw`. A leading `~` expands to `$HOME`.
    pub install_root: Option<PathBuf>,
    pub env_dir: PathBuf,
    pub manifest: PathBuf,
    pub entry_point: String,
    pub wrapper: PathBuf,
    pub config_artifact: PathBuf,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            install_root: None,
            env_dir: PathBuf::from("venv"),
            manifest: PathBuf::from("requirements.txt"),
            entry_point: "main.py".to_string(),
            wrapper: PathBuf::from("ironclaw"),
            config_artifact: PathBuf::from("data/config.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CommandConfig {
    /// Name of the global command (the link's file name).
    pub name: String,
    /// Directory on the search path that receives the link.
    pub link_dir: PathBuf,
    pub publish: bool,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            name: "ironclaw".to_string(),
            link_dir: PathBuf::from("/usr/local/bin"),
            publish: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServiceConfig {
    pub enabled: bool,
    pub name: String,
    pub unit_dir: PathBuf,
    pub description: String,
    pub start_command: String,
    pub stop_command: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            name: "ironclaw".to_string(),
            unit_dir: PathBuf::from("/etc/systemd/system"),
            description: "IronClaw AI agent".to_string(),
            start_command: "start".to_string(),
            stop_command: "stop".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RuntimeConfig {
    pub interpreter: String,
    pub min_version: String,
    /// Rebuild the environment from scratch each run so stale packages never linger.
    pub clear_environment: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            min_version: "3.10".to_string(),
            clear_environment: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SetupConfig {
    /// Wrapper subcommand that runs the application's interactive setup.
    pub subcommand: String,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            subcommand: "setup".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProbeConfig {
    /// Upper bound for each probe check (version queries, throwaway venv).
    pub check_timeout_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            check_timeout_secs: 120,
        }
    }
}

impl InstallerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.repository.url.trim().is_empty() {
            return Err(anyhow!("repository.url must not be empty"));
        }
        if self
            .repository
            .branch
            .as_deref()
            .is_some_and(|branch| branch.trim().is_empty())
        {
            return Err(anyhow!("repository.branch must not be empty when set"));
        }
        for (field, value) in [
            ("layout.env_dir", &self.layout.env_dir),
            ("layout.manifest", &self.layout.manifest),
            ("layout.wrapper", &self.layout.wrapper),
            ("layout.config_artifact", &self.layout.config_artifact),
        ] {
            if value.as_os_str().is_empty() {
                return Err(anyhow!("{field} must not be empty"));
            }
        }
        if self.layout.entry_point.trim().is_empty() {
            return Err(anyhow!("layout.entry_point must not be empty"));
        }
        validate_name("command.name", &self.command.name)?;
        validate_name("service.name", &self.service.name)?;
        if self.service.start_command.trim().is_empty()
            || self.service.stop_command.trim().is_empty()
        {
            return Err(anyhow!(
                "service.start_command and service.stop_command must not be empty"
            ));
        }
        if self.runtime.interpreter.trim().is_empty() {
            return Err(anyhow!("runtime.interpreter must not be empty"));
        }
        parse_version(&self.runtime.min_version)
            .with_context(|| format!("runtime.min_version '{}'", self.runtime.min_version))?;
        if self.setup.subcommand.trim().is_empty() {
            return Err(anyhow!("setup.subcommand must not be empty"));
        }
        if self.probe.check_timeout_secs == 0 {
            return Err(anyhow!("probe.check_timeout_secs must be > 0"));
        }
        Ok(())
    }
}

fn validate_name(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("{field} must not be empty"));
    }
    if value.contains('/') || value.contains(char::is_whitespace) {
        return Err(anyhow!(
            "{field} '{value}' must not contain '/' or whitespace"
        ));
    }
    Ok(())
}

/// Load and validate config from a TOML file. A missing file is an error.
pub fn load_config(path: &Path) -> Result<InstallerConfig> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: InstallerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = load_config(&temp.path().join("missing.toml")).expect_err("missing");
        assert!(err.to_string().contains("missing.toml"), "{err:#}");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("installer.toml");
        fs::write(
            &path,
            "[repository]\nurl = \"https://example.test/app.git\"\nbranch = \"stable\"\n\n[service]\nenabled = false\n",
        )
        .expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.repository.url, "https://example.test/app.git");
        assert_eq!(cfg.repository.branch.as_deref(), Some("stable"));
        assert!(!cfg.service.enabled);
        assert_eq!(cfg.service.name, "ironclaw");
        assert_eq!(cfg.layout.config_artifact, PathBuf::from("data/config.json"));
    }

    #[test]
    fn rejects_command_name_with_slash() {
        let mut cfg = InstallerConfig::default();
        cfg.command.name = "bin/ironclaw".to_string();
        let err = cfg.validate().expect_err("invalid");
        assert!(err.to_string().contains("command.name"));
    }

    #[test]
    fn rejects_unparsable_min_version() {
        let mut cfg = InstallerConfig::default();
        cfg.runtime.min_version = "latest".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_probe_timeout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("installer.toml");
        fs::write(&path, "[probe]\ncheck_timeout_secs = 0\n").expect("write");
        let err = load_config(&path).expect_err("invalid");
        assert!(format!("{err:#}").contains("check_timeout_secs"));
    }
}
