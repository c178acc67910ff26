//! Decision engine configuration (TOML) with environment overrides.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::compact::CompactLimits;

pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";
pub const ENV_TIMEOUT: &str = "OPENAI_TIMEOUT";
pub const ENV_MAX_TOKENS: &str = "LLM_MAX_TOKENS";
pub const ENV_TEMPERATURE: &str = "LLM_TEMPERATURE";
pub const ENV_MODEL: &str = "LLM_MODEL";

/// Upper bound for `llm.timeout_secs` (one day).
pub const MAX_TIMEOUT_SECS: f64 = 86_400.0;

/// Engine configuration.
///
/// Every field has a default, so an empty or missing file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Candidates kept after scoring.
    pub surface_limit: usize,

    /// Candidates kept in the compact state handed to the arbiter.
    pub compact_max_candidates: usize,

    /// Character cap for candidate text and description.
    pub clip_len: usize,

    /// History entries read per invocation.
    pub history_limit: usize,

    /// History entries rendered into the arbiter prompt.
    pub prompt_history_limit: usize,

    /// Arbiter prompt size above which droppable sections are removed.
    pub prompt_budget_bytes: usize,

    /// Consult the arbiter when no rule fires.
    pub use_llm: bool,

    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the bearer token.
    pub api_key_env: String,
    pub timeout_secs: f64,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8001".to_string(),
            model: "local-model".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 60.0,
            max_tokens: 200,
            temperature: 0.0,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            surface_limit: 120,
            compact_max_candidates: 24,
            clip_len: 90,
            history_limit: 10,
            prompt_history_limit: 8,
            prompt_budget_bytes: 24_000,
            use_llm: true,
            llm: LlmConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.surface_limit == 0 {
            return Err(anyhow!("surface_limit must be > 0"));
        }
        if self.compact_max_candidates == 0 {
            return Err(anyhow!("compact_max_candidates must be > 0"));
        }
        if self.clip_len == 0 {
            return Err(anyhow!("clip_len must be > 0"));
        }
        if self.prompt_budget_bytes == 0 {
            return Err(anyhow!("prompt_budget_bytes must be > 0"));
        }
        if self.llm.base_url.trim().is_empty() {
            return Err(anyhow!("llm.base_url must be non-empty"));
        }
        if self.llm.model.trim().is_empty() {
            return Err(anyhow!("llm.model must be non-empty"));
        }
        if !(self.llm.timeout_secs.is_finite() && self.llm.timeout_secs > 0.0) {
            return Err(anyhow!("llm.timeout_secs must be > 0"));
        }
        if self.llm.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(anyhow!(
                "llm.timeout_secs must be <= {MAX_TIMEOUT_SECS}, got {}",
                self.llm.timeout_secs
            ));
        }
        if self.llm.max_tokens == 0 {
            return Err(anyhow!("llm.max_tokens must be > 0"));
        }
        if !self.llm.temperature.is_finite() || self.llm.temperature < 0.0 {
            return Err(anyhow!("llm.temperature must be >= 0"));
        }
        Ok(())
    }

    pub fn compact_limits(&self) -> CompactLimits {
        CompactLimits {
            max_candidates: self.compact_max_candidates,
            clip_len: self.clip_len,
        }
    }

    /// Apply `OPENAI_*`/`LLM_*` overrides from `lookup` (normally the process environment).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(base_url) = value(ENV_BASE_URL) {
            self.llm.base_url = base_url.trim().to_string();
        }
        if let Some(model) = value(ENV_MODEL) {
            self.llm.model = model.trim().to_string();
        }
        if let Some(raw) = value(ENV_TIMEOUT) {
            self.llm.timeout_secs = parse_env(ENV_TIMEOUT, &raw)?;
        }
        if let Some(raw) = value(ENV_MAX_TOKENS) {
            self.llm.max_tokens = parse_env(ENV_MAX_TOKENS, &raw)?;
        }
        if let Some(raw) = value(ENV_TEMPERATURE) {
            self.llm.temperature = parse_env(ENV_TEMPERATURE, &raw)?;
        }
        Ok(())
    }
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("parse {name}={raw:?}"))
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `EngineConfig::default()`.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        let cfg = EngineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: EngineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write `contents` to `path` (temp file + rename).
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, contents).with_context(|| format!("write temp {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
