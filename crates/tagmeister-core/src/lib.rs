pub mod config;
pub mod error;
pub mod library;
pub mod postprocess;
pub mod processing;
pub mod prompt;
pub mod provider;
pub mod selection;

pub use config::TagmeisterConfig;
pub use error::{CaptionError, Result};
pub use library::{media_type_for, sidecar_path, CaptionStore, ImageFile};
pub use postprocess::{compose, finalize_caption, normalize_punctuation, strip_trailing_comma};
pub use processing::ProcessingState;
pub use prompt::PromptStyle;
pub use provider::{
    CloudCredential, LocalModel, LocalServer, ModelRoute, ProviderConfig, ProviderKind,
};
pub use selection::{ClickModifiers, SelectionModel};
