//! Sequential captioning over a selected set of images
//!
//! One image at a time, in input order. A stop request is only honoured between
//! images; the first provider error ends the batch and narrows the selection to
//! the images that were never attempted.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tagmeister_core::{
    finalize_caption, CaptionError, CaptionStore, ModelRoute, ProcessingState, PromptStyle,
    Result, SelectionModel,
};
use tagmeister_providers::{
    generate_caption, CaptionProvider, CaptionRequest, ProviderRouter, DEFAULT_MAX_TOKENS,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, instrument, warn};

use crate::captions::CaptionSink;

/// Cooperative stop flag shared with whoever drives the UI.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    pub model_id: String,
    pub style: PromptStyle,
    pub prefix: String,
    pub suffix: String,
    pub max_tokens: u32,
    pub stream: bool,
}

impl BatchJob {
    pub fn new(model_id: impl Into<String>, style: PromptStyle) -> Self {
        Self {
            model_id: model_id.into(),
            style,
            prefix: String::new(),
            suffix: String::new(),
            max_tokens: DEFAULT_MAX_TOKENS,
            stream: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Completed,
    Interrupted,
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    Started { total: usize },
    ImageStarted { index: usize, path: PathBuf },
    Chunk { path: PathBuf, text: String },
    ImageCompleted { index: usize, path: PathBuf, caption: String },
    Interrupted { processed: usize, total: usize },
    Failed { path: PathBuf, message: String },
    Finished { outcome: BatchOutcome, processed: usize, total: usize },
}

#[derive(Debug)]
pub struct BatchReport {
    pub outcome: BatchOutcome,
    pub processed: usize,
    pub total: usize,
    /// The error that ended a failed batch
    pub error: Option<CaptionError>,
}

pub struct BatchController {
    router: ProviderRouter,
    sink: Arc<dyn CaptionSink>,
    stop: StopHandle,
    state: ProcessingState,
}

struct Emitter<'a>(Option<&'a UnboundedSender<BatchEvent>>);

impl Emitter<'_> {
    fn emit(&self, event: BatchEvent) {
        if let Some(tx) = self.0 {
            let _ = tx.send(event);
        }
    }
}

impl BatchController {
    pub fn new(router: ProviderRouter, sink: Arc<dyn CaptionSink>) -> Self {
        Self {
            router,
            sink,
            stop: StopHandle::default(),
            state: ProcessingState::new(),
        }
    }

    pub fn router(&self) -> &ProviderRouter {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut ProviderRouter {
        &mut self.router
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Request a stop at the next image boundary.
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn state(&self) -> ProcessingState {
        ProcessingState {
            interrupt_requested: self.state.interrupt_requested || self.stop.is_requested(),
            ..self.state
        }
    }

    /// Caption `paths` in order. Empty input and missing credentials are rejected
    /// before anything runs; provider failures come back as a `Failed` report.
    #[instrument(skip_all, fields(model = %job.model_id, total = paths.len()))]
    pub async fn run(
        &mut self,
        paths: &[PathBuf],
        job: &BatchJob,
        selection: &mut SelectionModel,
        captions: &mut CaptionStore,
        events: Option<&UnboundedSender<BatchEvent>>,
    ) -> Result<BatchReport> {
        if paths.is_empty() {
            return Err(CaptionError::NoSelection);
        }
        let (route, provider) = self.router.resolve(&job.model_id)?;

        let events = Emitter(events);
        self.state.start(paths.len());
        self.stop.reset();
        info!(provider = %route.kind, "Batch started");
        events.emit(BatchEvent::Started { total: paths.len() });

        let (outcome, error) = self
            .process(paths, job, &route, provider.as_ref(), selection, captions, &events)
            .await;

        let processed = self.state.processed_count;
        let total = self.state.total;
        self.state.finish();
        self.stop.reset();

        info!(processed, total, ?outcome, "Batch finished");
        events.emit(BatchEvent::Finished {
            outcome: outcome.clone(),
            processed,
            total,
        });

        Ok(BatchReport {
            outcome,
            processed,
            total,
            error,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn process(
        &mut self,
        paths: &[PathBuf],
        job: &BatchJob,
        route: &ModelRoute,
        provider: &dyn CaptionProvider,
        selection: &mut SelectionModel,
        captions: &mut CaptionStore,
        events: &Emitter<'_>,
    ) -> (BatchOutcome, Option<CaptionError>) {
        for (index, path) in paths.iter().enumerate() {
            if self.stop.is_requested() {
                self.state.interrupt_requested = true;
                info!(processed = self.state.processed_count, "Stop requested, ending batch");
                events.emit(BatchEvent::Interrupted {
                    processed: self.state.processed_count,
                    total: self.state.total,
                });
                return (BatchOutcome::Interrupted, None);
            }

            selection.focus(path);
            let previous = captions.remove(path);
            captions.set(path.clone(), "");
            events.emit(BatchEvent::ImageStarted {
                index,
                path: path.clone(),
            });

            let request = CaptionRequest::new(path.clone(), route.model.clone(), job.style)
                .with_max_tokens(job.max_tokens);

            match self.generate(provider, &request, job.stream, captions, events).await {
                Ok(raw) => {
                    let caption = finalize_caption(&raw, route.kind, &job.prefix, &job.suffix);
                    captions.set(path.clone(), caption.clone());
                    self.persist(path, &caption).await;
                    self.state.increment();
                    debug!(progress = %self.state.progress_label(), "Image captioned");
                    events.emit(BatchEvent::ImageCompleted {
                        index,
                        path: path.clone(),
                        caption,
                    });
                }
                Err(e) => {
                    match previous {
                        Some(text) => captions.set(path.clone(), text),
                        None => {
                            captions.remove(path);
                        }
                    }
                    let remaining = &paths[index + 1..];
                    selection.retain_only(remaining);

                    let message = e.user_message(route.kind);
                    error!(image = %path.display(), error = %e, "Caption generation failed");
                    events.emit(BatchEvent::Failed {
                        path: path.clone(),
                        message: message.clone(),
                    });
                    return (BatchOutcome::Failed { message }, Some(e));
                }
            }
        }
        (BatchOutcome::Completed, None)
    }

    async fn generate(
        &self,
        provider: &dyn CaptionProvider,
        request: &CaptionRequest,
        stream: bool,
        captions: &mut CaptionStore,
        events: &Emitter<'_>,
    ) -> Result<String> {
        if !stream {
            return generate_caption(provider, request, None::<fn(&str)>).await;
        }

        let path = request.image_path.as_path();
        let on_chunk = |chunk: &str| {
            captions.append_draft(path, chunk);
            events.emit(BatchEvent::Chunk {
                path: path.to_path_buf(),
                text: chunk.to_string(),
            });
        };
        generate_caption(provider, request, Some(on_chunk)).await
    }

    async fn persist(&self, path: &Path, caption: &str) {
        let mut one = HashMap::with_capacity(1);
        one.insert(path.to_path_buf(), caption.to_string());
        match self.sink.save_captions(&one).await {
            Ok(0) => warn!(image = %path.display(), "Caption not written, image missing"),
            Ok(_) => {}
            Err(e) => warn!(image = %path.display(), error = %e, "Failed to persist caption"),
        }
    }
}
