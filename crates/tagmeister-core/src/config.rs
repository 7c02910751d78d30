use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{CaptionError, CloudCredential, LocalServer, PromptStyle, ProviderConfig, Result};

pub mod env {
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
    pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
    pub const LMSTUDIO_BASE_URL: &str = "LMSTUDIO_BASE_URL";
    pub const OLLAMA_HOST: &str = "OLLAMA_HOST";
    pub const MODEL: &str = "TAGMEISTER_MODEL";
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagmeisterConfig {
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub anthropic: AnthropicConfig,
    #[serde(default)]
    pub lmstudio: LmStudioConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub model: String,
    pub prompt_style: PromptStyle,
    pub prefix: String,
    pub suffix: String,
    pub max_tokens: u32,
    pub stream: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            prompt_style: PromptStyle::NaturalLanguage,
            prefix: String::new(),
            suffix: String::new(),
            max_tokens: 300,
            stream: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnthropicConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub version: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.anthropic.com/v1".to_string(),
            version: "2023-06-01".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LmStudioConfig {
    pub base_url: String,
}

impl Default for LmStudioConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1234/v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
        }
    }
}

impl TagmeisterConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            CaptionError::Configuration(format!("Invalid config {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Overlay values found through `lookup` (normally `std::env::var`).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = lookup(env::OPENAI_API_KEY) {
            self.openai.api_key = Some(key);
        }
        if let Some(key) = lookup(env::ANTHROPIC_API_KEY) {
            self.anthropic.api_key = Some(key);
        }
        if let Some(url) = lookup(env::LMSTUDIO_BASE_URL) {
            self.lmstudio.base_url = url;
        }
        if let Some(url) = lookup(env::OLLAMA_HOST) {
            self.ollama.base_url = url;
        }
        if let Some(model) = lookup(env::MODEL) {
            self.defaults.model = model;
        }
    }

    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            openai: CloudCredential::new(self.openai.api_key.clone(), &self.openai.base_url),
            anthropic: CloudCredential::new(
                self.anthropic.api_key.clone(),
                &self.anthropic.base_url,
            ),
            anthropic_version: self.anthropic.version.clone(),
            lmstudio: LocalServer::new(&self.lmstudio.base_url),
            ollama: LocalServer::new(&self.ollama.base_url),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"defaults": {{"model": "claude-3-5-haiku-latest", "prefix": "photo,"}}, "ollama": {{"base_url": "http://gpu-box:11434"}}}}"#
        )
        .unwrap();

        let config = TagmeisterConfig::from_file(file.path()).unwrap();
        assert_eq!(config.defaults.model, "claude-3-5-haiku-latest");
        assert_eq!(config.defaults.max_tokens, 300);
        assert!(config.defaults.stream);
        assert_eq!(config.ollama.base_url, "http://gpu-box:11434");
        assert_eq!(config.lmstudio.base_url, "http://localhost:1234/v1");
    }

    #[test]
    fn malformed_file_is_a_configuration_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = TagmeisterConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, CaptionError::Configuration(_)));
    }

    #[test]
    fn env_overrides_and_ignores_blanks() {
        let vars: HashMap<&str, &str> = [
            (env::OPENAI_API_KEY, "sk-test"),
            (env::ANTHROPIC_API_KEY, "   "),
            (env::OLLAMA_HOST, "http://10.0.0.2:11434"),
        ]
        .into_iter()
        .collect();

        let mut config = TagmeisterConfig::default();
        config.apply_env(|k| vars.get(k).map(|v| v.to_string()));

        let providers = config.provider_config();
        assert_eq!(providers.openai.api_key.as_deref(), Some("sk-test"));
        assert!(!providers.anthropic.is_configured());
        assert_eq!(providers.ollama.base_url, "http://10.0.0.2:11434");
        assert!(!providers.ollama.available);
    }
}
