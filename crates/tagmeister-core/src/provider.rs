use std::fmt;

use serde::{Deserialize, Serialize};

pub const LMSTUDIO_PREFIX: &str = "lmstudio:";
pub const OLLAMA_PREFIX: &str = "ollama:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    LmStudio,
    Ollama,
}

impl ProviderKind {
    pub fn all() -> &'static [ProviderKind] {
        &[
            ProviderKind::OpenAi,
            ProviderKind::Anthropic,
            ProviderKind::LmStudio,
            ProviderKind::Ollama,
        ]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Anthropic => "Anthropic",
            ProviderKind::LmStudio => "LM Studio",
            ProviderKind::Ollama => "Ollama",
        }
    }

    /// Local servers need a base URL and a successful probe instead of an API key.
    pub fn is_local(&self) -> bool {
        matches!(self, ProviderKind::LmStudio | ProviderKind::Ollama)
    }

    /// Cloud output is reshaped sentence-by-sentence; local output only loses a trailing period.
    pub fn normalizes_sentences(&self) -> bool {
        !self.is_local()
    }

    /// Prefix the model list uses to route a discovered local model back to its server.
    pub fn model_prefix(&self) -> &'static str {
        match self {
            ProviderKind::LmStudio => LMSTUDIO_PREFIX,
            ProviderKind::Ollama => OLLAMA_PREFIX,
            _ => "",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A model identifier resolved to its backend and the id that goes on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRoute {
    pub kind: ProviderKind,
    pub model: String,
}

impl ModelRoute {
    pub fn resolve(model_id: &str) -> Self {
        let model_id = model_id.trim();

        if model_id.starts_with("claude") {
            return Self {
                kind: ProviderKind::Anthropic,
                model: model_id.to_string(),
            };
        }

        if let Some(rest) = model_id.strip_prefix(LMSTUDIO_PREFIX) {
            return Self {
                kind: ProviderKind::LmStudio,
                model: rest.to_string(),
            };
        }

        if let Some(rest) = model_id.strip_prefix(OLLAMA_PREFIX) {
            let model = rest.strip_suffix(":latest").unwrap_or(rest);
            return Self {
                kind: ProviderKind::Ollama,
                model: model.to_string(),
            };
        }

        Self {
            kind: ProviderKind::OpenAi,
            model: model_id.to_string(),
        }
    }
}

/// Model discovered on a local server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalModel {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloudCredential {
    pub api_key: Option<String>,
    pub base_url: String,
}

impl CloudCredential {
    pub fn new(api_key: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalServer {
    pub base_url: String,
    pub available: bool,
    pub models: Vec<LocalModel>,
}

impl LocalServer {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            available: false,
            models: Vec::new(),
        }
    }

    pub fn has_endpoint(&self) -> bool {
        !self.base_url.trim().is_empty()
    }

    pub fn mark_available(&mut self, models: Vec<LocalModel>) {
        self.available = true;
        self.models = models;
    }

    pub fn mark_unavailable(&mut self) {
        self.available = false;
        self.models.clear();
    }
}

/// Connection data for every backend, long-lived for the process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderConfig {
    pub openai: CloudCredential,
    pub anthropic: CloudCredential,
    pub anthropic_version: String,
    pub lmstudio: LocalServer,
    pub ollama: LocalServer,
}

impl ProviderConfig {
    pub fn local(&self, kind: ProviderKind) -> Option<&LocalServer> {
        match kind {
            ProviderKind::LmStudio => Some(&self.lmstudio),
            ProviderKind::Ollama => Some(&self.ollama),
            _ => None,
        }
    }

    pub fn local_mut(&mut self, kind: ProviderKind) -> Option<&mut LocalServer> {
        match kind {
            ProviderKind::LmStudio => Some(&mut self.lmstudio),
            ProviderKind::Ollama => Some(&mut self.ollama),
            _ => None,
        }
    }

    pub fn credential(&self, kind: ProviderKind) -> Option<&CloudCredential> {
        match kind {
            ProviderKind::OpenAi => Some(&self.openai),
            ProviderKind::Anthropic => Some(&self.anthropic),
            _ => None,
        }
    }
}
