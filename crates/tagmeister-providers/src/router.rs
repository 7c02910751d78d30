use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Client;
use tagmeister_core::{CaptionError, LocalModel, ModelRoute, ProviderConfig, ProviderKind, Result};
use tracing::{info, instrument, warn};

use crate::anthropic::AnthropicProvider;
use crate::encoder::{FsImageEncoder, ImageEncoder};
use crate::lmstudio::LmStudioProvider;
use crate::ollama::OllamaProvider;
use crate::openai::OpenAiProvider;
use crate::{CaptionProvider, ModelDiscovery};

/// Owns provider configuration and one backend per kind.
pub struct ProviderRouter {
    config: ProviderConfig,
    providers: HashMap<ProviderKind, Arc<dyn CaptionProvider>>,
    discovery: HashMap<ProviderKind, Arc<dyn ModelDiscovery>>,
}

impl ProviderRouter {
    pub fn new(config: ProviderConfig) -> Self {
        Self::with_encoder(config, Arc::new(FsImageEncoder::new()))
    }

    pub fn with_encoder(config: ProviderConfig, encoder: Arc<dyn ImageEncoder>) -> Self {
        let http = Client::new();

        let lmstudio = Arc::new(LmStudioProvider::new(&config.lmstudio, http.clone(), encoder.clone()));
        let ollama = Arc::new(OllamaProvider::new(&config.ollama, http.clone(), encoder.clone()));
        let openai = Arc::new(OpenAiProvider::new(&config.openai, http.clone(), encoder.clone()));
        let anthropic = Arc::new(AnthropicProvider::new(
            &config.anthropic,
            &config.anthropic_version,
            http,
            encoder,
        ));

        let mut providers: HashMap<ProviderKind, Arc<dyn CaptionProvider>> = HashMap::new();
        providers.insert(ProviderKind::OpenAi, openai);
        providers.insert(ProviderKind::Anthropic, anthropic);
        providers.insert(ProviderKind::LmStudio, lmstudio.clone());
        providers.insert(ProviderKind::Ollama, ollama.clone());

        let mut discovery: HashMap<ProviderKind, Arc<dyn ModelDiscovery>> = HashMap::new();
        discovery.insert(ProviderKind::LmStudio, lmstudio);
        discovery.insert(ProviderKind::Ollama, ollama);

        Self {
            config,
            providers,
            discovery,
        }
    }

    /// Replace the backend registered for `provider.kind()`.
    pub fn register(&mut self, provider: Arc<dyn CaptionProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn route(&self, model_id: &str) -> ModelRoute {
        ModelRoute::resolve(model_id)
    }

    pub fn provider(&self, kind: ProviderKind) -> Result<Arc<dyn CaptionProvider>> {
        self.providers
            .get(&kind)
            .cloned()
            .ok_or_else(|| CaptionError::Configuration(format!("No {} provider registered", kind)))
    }

    /// Checks done before any network call for `kind`.
    pub fn ensure_ready(&self, kind: ProviderKind) -> Result<()> {
        self.provider(kind)?.ensure_configured()?;

        if let Some(server) = self.config.local(kind) {
            if !server.has_endpoint() {
                return Err(CaptionError::Configuration(format!(
                    "{} server URL is not set",
                    kind
                )));
            }
            if !server.available {
                return Err(CaptionError::Configuration(format!(
                    "{} server at {} is not available. Check the connection first.",
                    kind, server.base_url
                )));
            }
        }
        Ok(())
    }

    /// Route `model_id` and hand back a ready backend.
    pub fn resolve(&self, model_id: &str) -> Result<(ModelRoute, Arc<dyn CaptionProvider>)> {
        let route = self.route(model_id);
        self.ensure_ready(route.kind)?;
        let provider = self.provider(route.kind)?;
        Ok((route, provider))
    }

    /// Probe a local server and record the outcome. Cloud kinds report whether a key is set.
    #[instrument(skip(self))]
    pub async fn check_connection(&mut self, kind: ProviderKind) -> bool {
        if let Some(credential) = self.config.credential(kind) {
            return credential.is_configured();
        }

        let Some(probe) = self.discovery.get(&kind).cloned() else {
            return false;
        };
        let outcome = probe.list_models().await;

        let Some(server) = self.config.local_mut(kind) else {
            return false;
        };
        match outcome {
            Ok(models) => {
                info!(server = %server.base_url, count = models.len(), "Local server reachable");
                server.mark_available(models);
                true
            }
            Err(e) => {
                warn!(server = %server.base_url, error = %e, "Local server unreachable");
                server.mark_unavailable();
                false
            }
        }
    }

    /// Probe every local server.
    pub async fn check_local_servers(&mut self) {
        for kind in ProviderKind::all().iter().copied().filter(ProviderKind::is_local) {
            self.check_connection(kind).await;
        }
    }

    /// Models discovered on local servers, as routable ids.
    pub fn local_model_ids(&self) -> Vec<(ProviderKind, LocalModel)> {
        ProviderKind::all()
            .iter()
            .filter_map(|kind| self.config.local(*kind).map(|s| (*kind, s)))
            .filter(|(_, server)| server.available)
            .flat_map(|(kind, server)| {
                server.models.iter().map(move |m| {
                    (
                        kind,
                        LocalModel {
                            id: format!("{}{}", kind.model_prefix(), m.id),
                            name: m.name.clone(),
                        },
                    )
                })
            })
            .collect()
    }
}
