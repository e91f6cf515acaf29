//! Environment-driven configuration

use crate::error::{Error, Result};
use crate::types::{CommandPolicy, McpClientOptions};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";
pub const ENV_MODEL: &str = "OPENAI_MODEL";
pub const ENV_WORKSPACE: &str = "WORKSPACE";
pub const ENV_REQUEST_TIMEOUT: &str = "AGENTGATE_REQUEST_TIMEOUT_SECS";
pub const ENV_HISTORY_LIMIT: &str = "AGENTGATE_HISTORY_LIMIT";

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HISTORY_LIMIT: usize = 20;
pub const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 120;

/// Directory (under the home directory) holding personal skills
const PERSONAL_SKILLS_DIR: &str = ".agentgate/skills";

/// Language-model endpoint settings
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// HTTP timeout for one completion call
    pub timeout: Duration,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_MODEL_TIMEOUT_SECS),
        }
    }
}

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub model: ModelConfig,
    /// Root for relative tool paths and project skills
    pub workspace: PathBuf,
    /// Deadline for one tool-server request
    pub request_timeout: Duration,
    /// Messages kept per user session
    pub history_limit: usize,
    /// Extra roots the file tools may touch besides the workspace
    pub extra_roots: Vec<PathBuf>,
    pub command_policy: CommandPolicy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            workspace: PathBuf::from("."),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            history_limit: DEFAULT_HISTORY_LIMIT,
            extra_roots: Vec::new(),
            command_policy: CommandPolicy::default(),
        }
    }
}

impl GatewayConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let request_timeout = match get(ENV_REQUEST_TIMEOUT) {
            Some(raw) => Duration::from_secs(parse_number::<u64>(ENV_REQUEST_TIMEOUT, &raw)?),
            None => defaults.request_timeout,
        };

        let history_limit = match get(ENV_HISTORY_LIMIT) {
            Some(raw) => parse_number::<usize>(ENV_HISTORY_LIMIT, &raw)?,
            None => defaults.history_limit,
        };

        if history_limit == 0 {
            return Err(Error::Config(format!("{} must be at least 1", ENV_HISTORY_LIMIT)));
        }

        Ok(Self {
            model: ModelConfig {
                api_key: get(ENV_API_KEY),
                base_url: get(ENV_BASE_URL).unwrap_or(defaults.model.base_url),
                model: get(ENV_MODEL).unwrap_or(defaults.model.model),
                timeout: defaults.model.timeout,
            },
            workspace: get(ENV_WORKSPACE)
                .map(PathBuf::from)
                .unwrap_or(defaults.workspace),
            request_timeout,
            history_limit,
            ..defaults
        })
    }

    /// Options applied to every tool-server connection
    pub fn mcp_options(&self) -> McpClientOptions {
        McpClientOptions {
            request_timeout: self.request_timeout,
            ..Default::default()
        }
    }

    /// `~/.agentgate/skills`, when a home directory is known
    pub fn personal_skills_dir(&self) -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(PERSONAL_SKILLS_DIR))
    }

    /// `<workspace>/skills`
    pub fn project_skills_dir(&self) -> PathBuf {
        self.workspace.join("skills")
    }

    /// Skill roots in priority order (later roots override earlier ones)
    pub fn skill_roots(&self) -> Vec<PathBuf> {
        self.personal_skills_dir()
            .into_iter()
            .chain(std::iter::once(self.project_skills_dir()))
            .collect()
    }
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} must be a non-negative integer, got '{}'", key, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.model.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.model.model, DEFAULT_MODEL);
        assert!(config.model.api_key.is_none());
        assert_eq!(config.workspace, PathBuf::from("."));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.history_limit, 20);
        assert_eq!(config.mcp_options().request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_overrides() {
        let config = GatewayConfig::from_lookup(lookup(&[
            (ENV_API_KEY, "sk-test"),
            (ENV_BASE_URL, "http://localhost:8080/v1"),
            (ENV_MODEL, "local-model"),
            (ENV_WORKSPACE, "/srv/agent"),
            (ENV_REQUEST_TIMEOUT, "5"),
            (ENV_HISTORY_LIMIT, "8"),
        ]))
        .unwrap();

        assert_eq!(config.model.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.model.base_url, "http://localhost:8080/v1");
        assert_eq!(config.model.model, "local-model");
        assert_eq!(config.project_skills_dir(), PathBuf::from("/srv/agent/skills"));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.history_limit, 8);
    }

    #[test]
    fn test_empty_values_are_unset() {
        let config = GatewayConfig::from_lookup(lookup(&[(ENV_API_KEY, "  "), (ENV_MODEL, "")])).unwrap();
        assert!(config.model.api_key.is_none());
        assert_eq!(config.model.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_invalid_numbers() {
        let result = GatewayConfig::from_lookup(lookup(&[(ENV_REQUEST_TIMEOUT, "soon")]));
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains(ENV_REQUEST_TIMEOUT)));

        let result = GatewayConfig::from_lookup(lookup(&[(ENV_HISTORY_LIMIT, "0")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_skill_roots_end_with_project() {
        let config = GatewayConfig::default();
        let roots = config.skill_roots();
        assert_eq!(roots.last(), Some(&PathBuf::from("./skills")));
    }
}
