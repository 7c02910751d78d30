mod anthropic;
mod encoder;
mod http;
mod lmstudio;
mod ollama;
mod openai;
mod openai_compat;
mod provider;
mod router;
pub mod stream;

#[cfg(test)]
mod test_support;

pub use anthropic::AnthropicProvider;
pub use encoder::{check_dimensions, EncodedImage, FsImageEncoder, ImageEncoder};
pub use http::{classify_status, server_message};
pub use lmstudio::{LmStudioProvider, PROBE_TIMEOUT};
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use provider::{
    generate_caption, CaptionProvider, CaptionRequest, CaptionStream, ModelDiscovery,
    DEFAULT_MAX_TOKENS,
};
pub use router::ProviderRouter;
pub use stream::{decode_body, FieldExtractor, Frame, Framing, StreamDecoder};
