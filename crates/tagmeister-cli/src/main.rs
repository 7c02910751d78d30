use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tagmeister_core::{ImageFile, PromptStyle, ProviderKind, SelectionModel, TagmeisterConfig};
use tagmeister_providers::ProviderRouter;
use tagmeister_services::{
    load_captions, save_caption, scan_images, BatchController, BatchEvent, BatchJob, BatchOutcome,
    BatchReport, SidecarWriter,
};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Hosted models offered alongside whatever the local servers report
const CLOUD_MODELS: &[(&str, &str)] = &[
    ("gpt-4o-mini", "OpenAI: gpt-4o-mini"),
    ("gpt-4o", "OpenAI: gpt-4o"),
    ("claude-3-7-sonnet-20250219", "Anthropic: Claude 3.7 Sonnet"),
];

#[derive(Parser)]
#[command(name = "tagmeister")]
#[command(about = "Tagmeister - caption image datasets with multimodal LLMs", long_about = None)]
struct Cli {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List cloud models and models found on local servers
    Models,

    /// Show credentials and local server reachability
    Status,

    /// Generate captions for images in a directory
    Caption {
        /// Directory to scan
        dir: PathBuf,

        /// Image file names to caption (default: every image)
        images: Vec<String>,

        /// Model id (`gpt-4o-mini`, `claude-...`, `lmstudio:<id>`, `ollama:<id>`)
        #[arg(short, long)]
        model: Option<String>,

        /// Prompt style (natural, booru)
        #[arg(short, long)]
        style: Option<PromptStyle>,

        /// Text placed before every caption
        #[arg(long)]
        prefix: Option<String>,

        /// Text placed after every caption
        #[arg(long)]
        suffix: Option<String>,

        /// Max tokens to generate
        #[arg(long)]
        max_tokens: Option<u32>,

        /// Wait for the full response instead of streaming
        #[arg(long)]
        no_stream: bool,

        /// Skip the confirmation prompt for multiple images
        #[arg(short, long)]
        yes: bool,
    },

    /// Replace one image's caption
    Set {
        image: PathBuf,
        text: String,
    },

    /// List images with their current captions
    Show {
        dir: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(e) = dotenvy::dotenv() {
        debug!("No .env loaded: {}", e);
    }

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let code = match cli.command {
        Commands::Models => {
            cmd_models(&config).await?;
            ExitCode::SUCCESS
        }
        Commands::Status => {
            cmd_status(&config).await?;
            ExitCode::SUCCESS
        }
        Commands::Caption {
            dir,
            images,
            model,
            style,
            prefix,
            suffix,
            max_tokens,
            no_stream,
            yes,
        } => {
            let defaults = &config.defaults;
            let job = BatchJob {
                model_id: model.unwrap_or_else(|| defaults.model.clone()),
                style: style.unwrap_or(defaults.prompt_style),
                prefix: prefix.unwrap_or_else(|| defaults.prefix.clone()),
                suffix: suffix.unwrap_or_else(|| defaults.suffix.clone()),
                max_tokens: max_tokens.unwrap_or(defaults.max_tokens),
                stream: defaults.stream && !no_stream,
            };
            cmd_caption(&config, &dir, &images, job, yes).await?
        }
        Commands::Set { image, text } => {
            cmd_set(&image, &text).await?;
            ExitCode::SUCCESS
        }
        Commands::Show { dir, json } => {
            cmd_show(&dir, json).await?;
            ExitCode::SUCCESS
        }
    };

    Ok(code)
}

fn load_config(path: Option<&Path>) -> Result<TagmeisterConfig> {
    let mut config = match path {
        Some(path) => TagmeisterConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TagmeisterConfig::default(),
    };
    config.apply_env(|key| std::env::var(key).ok());
    Ok(config)
}

async fn cmd_models(config: &TagmeisterConfig) -> Result<()> {
    let mut router = ProviderRouter::new(config.provider_config());
    router.check_local_servers().await;

    println!();
    println!("Available Models:");
    println!("{:-<65}", "");
    println!("  {:<36} {}", "ID", "Name");
    println!("{:-<65}", "");
    for (id, name) in CLOUD_MODELS {
        println!("  {:<36} {}", id, name);
    }
    for (kind, model) in router.local_model_ids() {
        println!("  {:<36} {}: {}", model.id, kind, model.name);
    }
    println!();
    println!("  Use: tagmeister caption <DIR> --model <ID>");
    println!();

    Ok(())
}

async fn cmd_status(config: &TagmeisterConfig) -> Result<()> {
    let mut router = ProviderRouter::new(config.provider_config());

    println!("System Status:");
    println!("{:-<40}", "");
    for kind in ProviderKind::all().iter().copied() {
        let ok = router.check_connection(kind).await;
        let detail = match (kind.is_local(), ok) {
            (false, true) => "API key set".to_string(),
            (false, false) => "API key missing".to_string(),
            (true, true) => {
                let count = router
                    .config()
                    .local(kind)
                    .map(|s| s.models.len())
                    .unwrap_or_default();
                format!("connected ({} models available)", count)
            }
            (true, false) => "disconnected".to_string(),
        };
        println!("  {:<10} {}", kind.display_name(), detail);
    }

    Ok(())
}

async fn cmd_caption(
    config: &TagmeisterConfig,
    dir: &Path,
    names: &[String],
    job: BatchJob,
    yes: bool,
) -> Result<ExitCode> {
    let images = scan_images(dir).await?;
    if images.is_empty() {
        bail!("No images found in {}", dir.display());
    }

    let mut selection = SelectionModel::new();
    selection.load(images.iter().map(|i| i.path.clone()).collect());
    select_named(&mut selection, &images, names)?;
    let mut captions = load_captions(&images).await?;

    let mut router = ProviderRouter::new(config.provider_config());
    let route = router.route(&job.model_id);
    if route.kind.is_local() && !router.check_connection(route.kind).await {
        warn!(provider = %route.kind, "Local server did not answer the probe");
    }

    let targets = selection.selected_in_order();
    if targets.len() > 1 && !yes && !confirm(targets.len())? {
        println!("  Cancelled.");
        return Ok(ExitCode::SUCCESS);
    }

    let mut controller = BatchController::new(router, Arc::new(SidecarWriter));
    let stop = controller.stop_handle();
    tokio::spawn(async move {
        let mut presses = 0;
        while tokio::signal::ctrl_c().await.is_ok() {
            presses += 1;
            match interrupt_action(presses) {
                InterruptAction::Stop => {
                    eprintln!("\n  Stop requested, finishing the current image (Ctrl-C again to abort)...");
                    stop.stop();
                }
                InterruptAction::Abort => {
                    eprintln!("\n  Aborted.");
                    std::process::exit(130);
                }
            }
        }
    });

    let (tx, rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_events(rx));

    println!();
    println!("  Model: {}", job.model_id);
    println!("  Style: {}", job.style);
    println!();

    let result = controller
        .run(&targets, &job, &mut selection, &mut captions, Some(&tx))
        .await;
    drop(tx);
    let _ = printer.await;

    let report = result?;
    if let BatchOutcome::Failed { .. } = report.outcome {
        let remaining = selection.selected_in_order();
        if !remaining.is_empty() {
            println!("  Not attempted:");
            for path in &remaining {
                println!("    {}", ImageFile::new(path.clone()).display_name);
            }
        }
        eprintln!("  {}", outcome_line(&report));
        return Ok(ExitCode::FAILURE);
    }
    println!("  {}", outcome_line(&report));
    println!();

    Ok(ExitCode::SUCCESS)
}

#[derive(Debug, PartialEq, Eq)]
enum InterruptAction {
    Stop,
    Abort,
}

/// The first Ctrl-C stops at the next boundary, any later one exits.
fn interrupt_action(presses: u32) -> InterruptAction {
    if presses <= 1 {
        InterruptAction::Stop
    } else {
        InterruptAction::Abort
    }
}

fn outcome_line(report: &BatchReport) -> String {
    match &report.outcome {
        BatchOutcome::Completed => format!("Done: {}/{} captioned.", report.processed, report.total),
        BatchOutcome::Interrupted => {
            format!("Stopped: {}/{} captioned.", report.processed, report.total)
        }
        BatchOutcome::Failed { message } => message.clone(),
    }
}

fn select_named(selection: &mut SelectionModel, images: &[ImageFile], names: &[String]) -> Result<()> {
    if names.is_empty() {
        selection.select_all();
        return Ok(());
    }

    selection.clear();
    for name in names {
        let Some(image) = images.iter().find(|i| &i.display_name == name) else {
            bail!("No image named {}", name);
        };
        if !selection.is_selected(&image.path) {
            selection.toggle(&image.path);
        }
    }
    Ok(())
}

fn confirm(count: usize) -> Result<bool> {
    let mut stdout = io::stdout();
    print!("  Generate captions for {} images? (y/N): ", count);
    stdout.flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

async fn print_events(mut rx: mpsc::UnboundedReceiver<BatchEvent>) {
    let mut total = 0;
    let mut stdout = io::stdout();

    while let Some(event) = rx.recv().await {
        match event {
            BatchEvent::Started { total: n } => total = n,
            BatchEvent::ImageStarted { index, path } => {
                let name = ImageFile::new(path).display_name;
                println!("[{}/{}] {}", index + 1, total, name);
                print!("  ");
            }
            BatchEvent::Chunk { text, .. } => {
                print!("{}", text);
            }
            BatchEvent::ImageCompleted { caption, .. } => {
                println!();
                println!("  => {}", caption);
            }
            BatchEvent::Interrupted { processed, total } => {
                println!("  Interrupted after {}/{}", processed, total);
            }
            BatchEvent::Failed { .. } => println!(),
            BatchEvent::Finished { .. } => {}
        }
        let _ = stdout.flush();
    }
}

async fn cmd_set(image: &Path, text: &str) -> Result<()> {
    if !image.exists() {
        bail!("Image not found: {}", image.display());
    }
    let written = save_caption(&SidecarWriter, image, text.trim()).await?;
    println!("  Saved {} caption.", written);
    Ok(())
}

async fn cmd_show(dir: &Path, json: bool) -> Result<()> {
    let images = scan_images(dir).await?;
    let captions = load_captions(&images).await?;

    if json {
        let listing: Vec<serde_json::Value> = images
            .iter()
            .map(|i| {
                serde_json::json!({
                    "image": i.display_name,
                    "caption": captions.get(&i.path),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    println!();
    println!("{:-<65}", "");
    for image in &images {
        let caption = captions.get(&image.path).unwrap_or("-");
        println!("  {:<28} {}", image.display_name, caption);
    }
    println!("{:-<65}", "");
    println!("  {} images, {} captioned", images.len(), captions.len());
    println!();

    Ok(())
}
