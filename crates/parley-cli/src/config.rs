use anyhow::{Context, Result};
use parley_core::{
    DEFAULT_MAX_RETRIES, Dispatcher, ProviderDescriptor, ProviderKind, ProviderRegistry,
    ProviderSettings, build_provider,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParleyConfig {
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Provider switches allowed per request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Overall bound on one request across every provider tried
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            request_timeout_secs: None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub kind: ProviderKind,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Per-request HTTP timeout
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("priority", &self.priority)
            .field("enabled", &self.enabled)
            .field("api_key", &mask_secret(&self.api_key))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_true() -> bool {
    true
}

impl ProviderConfig {
    /// Enabled, and holding a key when the backend needs one. A `${VAR}`
    /// left unexpanded counts as no key.
    pub fn is_available(&self) -> bool {
        if !self.enabled {
            return false;
        }
        if !self.kind.requires_api_key() {
            return true;
        }
        let key = self.api_key.trim();
        !key.is_empty() && !key.contains("${")
    }

    pub fn settings(&self) -> ProviderSettings {
        let mut settings = ProviderSettings::for_kind(self.kind);
        settings.api_key = self.api_key.trim().to_string();
        if let Some(model) = &self.model {
            settings.model = model.clone();
        }
        if let Some(base_url) = &self.base_url {
            settings.base_url = base_url.clone();
        }
        if let Some(max_tokens) = self.max_tokens {
            settings.max_tokens = max_tokens;
        }
        if let Some(secs) = self.timeout_secs {
            settings.timeout = Duration::from_secs(secs);
        }
        settings.temperature = self.temperature;
        settings
    }

    pub fn descriptor(&self) -> ProviderDescriptor {
        ProviderDescriptor {
            id: self.id.clone(),
            priority: self.priority,
            available: self.is_available(),
            kind: self.kind,
            model: self
                .model
                .clone()
                .unwrap_or_else(|| self.kind.default_model().to_string()),
        }
    }
}

/// Mask a secret string for safe display in Debug output / logs.
/// Shows first 3 and last 4 chars for keys longer than 7 chars, otherwise "***".
fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "(empty)".to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() > 7 {
        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", prefix, suffix)
    } else {
        "***".to_string()
    }
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".parley")
}

impl ParleyConfig {
    pub fn load(custom_path: &Option<PathBuf>) -> Result<Self> {
        let path = custom_path
            .clone()
            .unwrap_or_else(|| config_dir().join("config.toml"));

        check_permissions(&path)?;

        let content = std::fs::read_to_string(&path).with_context(|| {
            format!(
                "Failed to read config at {}. Run `parley init` first.",
                path.display()
            )
        })?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config at {}", path.display()))
    }

    /// Parse config text and expand allow-listed `${VAR}` references
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content)?;

        for provider in &mut config.providers {
            if !provider.api_key.is_empty() && !provider.api_key.contains("${") {
                warn!(
                    "API key for provider '{}' is hardcoded in config file. For security, use environment variables: api_key = \"${{{}_API_KEY}}\"",
                    provider.id,
                    provider.kind.to_string().to_uppercase()
                );
            }
            provider.api_key = expand_env_vars(&provider.api_key);
            if let Some(base_url) = &provider.base_url {
                provider.base_url = Some(expand_env_vars(base_url));
            }
        }

        Ok(config)
    }

    /// Build clients for every configured provider and freeze them into a registry
    pub fn build_registry(&self) -> Result<ProviderRegistry> {
        let mut builder = ProviderRegistry::builder();
        for provider in &self.providers {
            let descriptor = provider.descriptor();
            if !descriptor.available {
                debug!(
                    "Provider '{}' is disabled or has no API key; registering as unavailable",
                    provider.id
                );
            }
            let client = build_provider(provider.kind, &provider.settings())
                .with_context(|| format!("Failed to build provider '{}'", provider.id))?;
            builder = builder.register(descriptor, client)?;
        }
        Ok(builder.build())
    }

    pub fn dispatcher(&self) -> Result<Dispatcher> {
        let registry = Arc::new(self.build_registry()?);
        let mut dispatcher = Dispatcher::new(registry).with_max_retries(self.dispatch.max_retries);
        if let Some(secs) = self.dispatch.request_timeout_secs {
            dispatcher = dispatcher.with_deadline(Duration::from_secs(secs));
        }
        Ok(dispatcher)
    }

    /// TOML rendering with API keys replaced by "(set)"
    pub fn redacted_toml(&self) -> Result<String> {
        let mut shown = self.clone();
        for provider in &mut shown.providers {
            if !provider.api_key.is_empty() {
                provider.api_key = "(set)".to_string();
            }
        }
        Ok(toml::to_string_pretty(&shown)?)
    }
}

/// Refuse group/other-readable config files; they may hold API keys (Unix only)
fn check_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = std::fs::metadata(path) {
            let mode = metadata.permissions().mode();
            if mode & 0o077 != 0 {
                return Err(anyhow::anyhow!(
                    "Config file {:?} has overly permissive permissions ({:o}). \
                     It may contain secrets. Fix with: chmod 600 {:?}",
                    path,
                    mode & 0o777,
                    path
                ));
            }
        }
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// Allowlist of environment variable names that may be expanded in config files.
/// This prevents an attacker who can modify the config from reading arbitrary env vars.
const ALLOWED_ENV_VARS: &[&str] = &[
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
    "GOOGLE_API_KEY",
    "GEMINI_API_KEY",
    "GROQ_API_KEY",
    "OLLAMA_HOST",
    "HOME",
    "USER",
];

fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let mut pos = 0;
    while pos < result.len() {
        let Some(start) = result[pos..].find("${") else {
            break;
        };
        let abs_start = pos + start;
        let Some(end) = result[abs_start..].find('}') else {
            break;
        };
        let var_name = result[abs_start + 2..abs_start + end].to_string();

        if !ALLOWED_ENV_VARS.contains(&var_name.as_str()) {
            warn!(
                "Skipping expansion of unrecognized env var '{}' in config (not in allowlist)",
                var_name
            );
            // Leave the ${VAR} unexpanded so it's obvious
            pos = abs_start + end + 1;
            continue;
        }

        let value = std::env::var(&var_name).unwrap_or_default();
        result = format!(
            "{}{}{}",
            &result[..abs_start],
            value,
            &result[abs_start + end + 1..]
        );
        pos = abs_start + value.len();
    }
    result
}
