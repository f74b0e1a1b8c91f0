//! Process configuration, resolved once at startup

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{DeployError, Result};

pub const DEFAULT_PORT: u16 = 3011;
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
pub const DEFAULT_SERVICE_NAME: &str = "deploy_hook";
pub const DEFAULT_DEPLOY_ROOT: &str = ".";
pub const DEFAULT_LOG_DIR: &str = "./logs";
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 900;
const DEFAULT_COMMAND: &str = "make";

/// The three things this service knows how to deploy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Backend,
    Frontend,
    Webhooks,
}

impl TargetKind {
    pub const ALL: [TargetKind; 3] = [TargetKind::Backend, TargetKind::Frontend, TargetKind::Webhooks];

    pub fn name(self) -> &'static str {
        match self {
            TargetKind::Backend => "backend",
            TargetKind::Frontend => "frontend",
            TargetKind::Webhooks => "webhooks",
        }
    }

    /// Configuration key holding the branch that triggers this target
    pub fn branch_key(self) -> &'static str {
        match self {
            TargetKind::Backend => "BACKEND_BRANCH",
            TargetKind::Frontend => "FRONTEND_BRANCH",
            TargetKind::Webhooks => "WEBHOOKS_BRANCH",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fixed command bound to a branch configuration key
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentTarget {
    pub kind: TargetKind,
    pub branch_key: String,
    pub command: String,
    pub args: Vec<String>,
}

impl DeploymentTarget {
    /// `make deploy-<name>` keyed on `<NAME>_BRANCH`
    pub fn defaults(kind: TargetKind) -> Self {
        Self {
            kind,
            branch_key: kind.branch_key().to_string(),
            command: DEFAULT_COMMAND.to_string(),
            args: vec![format!("deploy-{}", kind.name())],
        }
    }

    /// Printable command line, for logs only.
    pub fn command_line(&self) -> String {
        let mut line = self.command.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Optional TOML file pointed to by `DEPLOY_CONFIG`
#[derive(Debug, Default, Deserialize)]
pub struct FileOverrides {
    pub deploy_root: Option<PathBuf>,
    pub command_timeout_secs: Option<u64>,
    #[serde(default)]
    pub target: Vec<TargetOverride>,
}

#[derive(Debug, Deserialize)]
pub struct TargetOverride {
    pub name: String,
    pub command: Option<String>,
    pub args: Option<Vec<String>>,
}

/// Load and parse the override file
pub fn load_overrides(path: &Path) -> Result<FileOverrides> {
    let content = fs::read_to_string(path).map_err(|e| {
        DeployError::ConfigError(format!("Failed to read config file '{}': {}", path.display(), e))
    })?;
    let overrides = toml::from_str(&content)?;
    Ok(overrides)
}

/// Everything the request path needs, read-only for the process lifetime
#[derive(Clone)]
pub struct DeployConfig {
    pub service_name: String,
    pub bind_host: String,
    pub port: u16,
    pub deploy_root: PathBuf,
    pub command_timeout: Duration,
    pub log_dir: PathBuf,
    secret: Vec<u8>,
    branches: HashMap<String, String>,
    backend: DeploymentTarget,
    frontend: DeploymentTarget,
    webhooks: DeploymentTarget,
}

impl DeployConfig {
    /// Build from the process environment, applying `DEPLOY_CONFIG` if set.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::from_lookup(|key| std::env::var(key).ok())?;
        if let Ok(path) = std::env::var("DEPLOY_CONFIG") {
            let overrides = load_overrides(Path::new(&path))?;
            config.apply_overrides(overrides)?;
        }
        Ok(config)
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let secret = get("GITHUB_SECRET")
            .ok_or_else(|| DeployError::ConfigError("GITHUB_SECRET is not set".to_string()))?
            .into_bytes();

        // NODE_PORT is what older .env files for this service use
        let port_var = ["PORT", "NODE_PORT"]
            .into_iter()
            .find_map(|key| get(key).map(|raw| (key, raw)));
        let port = match port_var {
            Some((key, raw)) => raw.trim().parse::<u16>().map_err(|e| {
                DeployError::ConfigError(format!("{} '{}' is not a valid port: {}", key, raw, e))
            })?,
            None => DEFAULT_PORT,
        };

        let command_timeout_secs = match get("COMMAND_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
                DeployError::ConfigError(format!(
                    "COMMAND_TIMEOUT_SECS '{}' is not a number: {}",
                    raw, e
                ))
            })?,
            None => DEFAULT_COMMAND_TIMEOUT_SECS,
        };

        let branches = TargetKind::ALL
            .iter()
            .filter_map(|kind| {
                get(kind.branch_key()).map(|branch| (kind.branch_key().to_string(), branch))
            })
            .collect();

        Ok(Self {
            service_name: get("SERVICE_NAME").unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),
            bind_host: get("BIND_HOST").unwrap_or_else(|| DEFAULT_BIND_HOST.to_string()),
            port,
            deploy_root: get("DEPLOY_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DEPLOY_ROOT)),
            command_timeout: Duration::from_secs(command_timeout_secs),
            log_dir: get("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
            secret,
            branches,
            backend: DeploymentTarget::defaults(TargetKind::Backend),
            frontend: DeploymentTarget::defaults(TargetKind::Frontend),
            webhooks: DeploymentTarget::defaults(TargetKind::Webhooks),
        })
    }

    pub fn apply_overrides(&mut self, overrides: FileOverrides) -> Result<()> {
        if let Some(root) = overrides.deploy_root {
            self.deploy_root = root;
        }
        if let Some(secs) = overrides.command_timeout_secs {
            self.command_timeout = Duration::from_secs(secs);
        }
        for entry in overrides.target {
            let kind = TargetKind::from_name(&entry.name).ok_or_else(|| {
                DeployError::ConfigError(format!("Unknown deployment target '{}'", entry.name))
            })?;
            let target = self.target_mut(kind);
            if let Some(command) = entry.command {
                target.command = command;
            }
            if let Some(args) = entry.args {
                target.args = args;
            }
        }
        Ok(())
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    pub fn target(&self, kind: TargetKind) -> &DeploymentTarget {
        match kind {
            TargetKind::Backend => &self.backend,
            TargetKind::Frontend => &self.frontend,
            TargetKind::Webhooks => &self.webhooks,
        }
    }

    pub fn target_mut(&mut self, kind: TargetKind) -> &mut DeploymentTarget {
        match kind {
            TargetKind::Backend => &mut self.backend,
            TargetKind::Frontend => &mut self.frontend,
            TargetKind::Webhooks => &mut self.webhooks,
        }
    }

    /// Branch configured for a target, looked up by its key.
    /// `None` means the target can never match.
    pub fn branch_for(&self, target: &DeploymentTarget) -> Option<&str> {
        self.branches.get(&target.branch_key).map(String::as_str)
    }

    pub fn set_branch(&mut self, key: impl Into<String>, branch: impl Into<String>) {
        self.branches.insert(key.into(), branch.into());
    }
}

impl fmt::Debug for DeployConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeployConfig")
            .field("service_name", &self.service_name)
            .field("bind_host", &self.bind_host)
            .field("port", &self.port)
            .field("deploy_root", &self.deploy_root)
            .field("command_timeout", &self.command_timeout)
            .field("log_dir", &self.log_dir)
            .field("secret", &"<redacted>")
            .field("branches", &self.branches)
            .field("backend", &self.backend)
            .field("frontend", &self.frontend)
            .field("webhooks", &self.webhooks)
            .finish()
    }
}
