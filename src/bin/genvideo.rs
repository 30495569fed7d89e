//! CLI for genvideo - text/image to video generation.

use clap::{Args, Parser, Subcommand};
use genvideo::video::save_video;
use genvideo::{
    encode_image, Config, GenVideoError, GenerationMode, GenerationRequest, ModelCatalog,
    ModelCategory, ModelSelector, Orientation, ProgressReporter, SavedVideo, VideoClient,
    VideoProviderExt,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "genvideo")]
#[command(about = "Generate videos from text and images via a streaming AI endpoint")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Hide the progress bar
    #[arg(short, long, global = true)]
    quiet: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Generation endpoint URL (overrides GENVIDEO_ENDPOINT)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Request timeout in seconds (overrides GENVIDEO_TIMEOUT_SECS)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Retries on network errors and timeouts
    #[arg(long, global = true, default_value_t = 0)]
    retries: u32,

    /// Path to a model.json catalog (overrides GENVIDEO_CATALOG)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a video from a text prompt
    T2v(T2vArgs),

    /// Generate a video from one image, or a first and last frame
    I2v(I2vArgs),

    /// List available models
    Models(ModelsArgs),
}

#[derive(Args)]
struct T2vArgs {
    /// Text prompt, or path to a .txt file holding it
    #[arg(short, long)]
    prompt: String,

    #[command(flatten)]
    common: GenerateArgs,
}

#[derive(Args)]
struct I2vArgs {
    /// Input image; give twice for first and last frame
    #[arg(short, long = "image", required = true, num_args = 1)]
    images: Vec<PathBuf>,

    /// Text prompt, or path to a .txt file holding it
    #[arg(short, long, default_value = "")]
    prompt: String,

    #[command(flatten)]
    common: GenerateArgs,
}

#[derive(Args)]
struct GenerateArgs {
    /// Model id (auto-selected when omitted)
    #[arg(short, long)]
    model: Option<String>,

    /// Output directory (overrides GENVIDEO_OUTPUT_DIR)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Portrait (9:16) instead of landscape
    #[arg(long)]
    portrait: bool,
}

#[derive(Args)]
struct ModelsArgs {
    /// Only list one category
    #[arg(long, value_enum)]
    filter: Option<ModelCategory>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report_error(&err, cli.json),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::T2v(args) => {
            generate(cli, GenerationMode::TextToVideo, &[], &args.prompt, &args.common).await
        }
        Commands::I2v(args) => {
            generate(
                cli,
                GenerationMode::ImageToVideo,
                &args.images,
                &args.prompt,
                &args.common,
            )
            .await
        }
        Commands::Models(args) => list_models(cli, args.filter),
    }
}

fn build_config(cli: &Cli, output: Option<&Path>) -> genvideo::Result<Config> {
    let mut builder = Config::builder();
    if let Some(endpoint) = &cli.endpoint {
        builder = builder.endpoint(endpoint);
    }
    if let Some(secs) = cli.timeout {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    if let Some(dir) = output {
        builder = builder.output_dir(dir);
    }
    if let Some(path) = &cli.catalog {
        builder = builder.catalog_path(path);
    }
    builder.build()
}

/// Returns the prompt text, reading it from disk when `arg` names an
/// existing `.txt` file.
fn load_prompt(arg: &str) -> genvideo::Result<String> {
    let path = Path::new(arg);
    let is_txt = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
    if !(is_txt && path.is_file()) {
        return Ok(arg.to_string());
    }

    let text = std::fs::read_to_string(path)?;
    let text = text.trim();
    if text.is_empty() {
        return Err(GenVideoError::InvalidPrompt(format!(
            "prompt file {} is empty",
            path.display()
        )));
    }
    tracing::info!(path = %path.display(), "loaded prompt from file");
    Ok(text.to_string())
}

async fn generate(
    cli: &Cli,
    mode: GenerationMode,
    images: &[PathBuf],
    prompt: &str,
    args: &GenerateArgs,
) -> anyhow::Result<()> {
    let config = build_config(cli, args.output.as_deref())?;
    let prompt = load_prompt(prompt)?;

    let encoded = images
        .iter()
        .map(|path| encode_image(path, config.image_limits()))
        .collect::<genvideo::Result<Vec<_>>>()?;

    let catalog = ModelCatalog::load_or_builtin(config.catalog_path())?;
    let orientation = if args.portrait {
        Orientation::Portrait
    } else {
        Orientation::Landscape
    };
    let model = ModelSelector::new(&catalog).select(
        mode,
        encoded.len(),
        args.model.as_deref(),
        orientation,
    )?;

    let request = match mode {
        GenerationMode::TextToVideo => GenerationRequest::text_to_video(prompt, model)?,
        GenerationMode::ImageToVideo => GenerationRequest::image_to_video(encoded, prompt, model)?,
    };

    let client = VideoClient::new(config.clone())?;
    let mut reporter = if cli.json || cli.quiet {
        ProgressReporter::hidden()
    } else {
        ProgressReporter::new()
    };

    // Dropping the generation future closes the connection; nothing has
    // been written yet.
    let video = tokio::select! {
        result = client.generate_with_retries(&request, &mut reporter, cli.retries) => result?,
        Ok(()) = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted, cancelling request");
            return Err(GenVideoError::Cancelled.into());
        }
    };
    reporter.finish();

    let saved = save_video(video, config.output_dir())?;
    print_saved(&saved, cli.json)
}

fn print_saved(saved: &SavedVideo, json_output: bool) -> anyhow::Result<()> {
    if json_output {
        let result = serde_json::json!({
            "type": "video",
            "success": true,
            "output": saved.path.display().to_string(),
            "size_bytes": saved.size,
            "model": saved.metadata.model,
            "response_format": saved.metadata.response_format,
            "source_url": saved.metadata.source_url,
            "duration_ms": saved.metadata.duration_ms,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Generated video: {} ({} bytes)",
            saved.path.display(),
            saved.size
        );
        if let Some(duration) = saved.metadata.duration_ms {
            println!("Generation time: {}ms", duration);
        }
    }
    Ok(())
}

fn list_models(cli: &Cli, filter: Option<ModelCategory>) -> anyhow::Result<()> {
    let path = cli
        .catalog
        .clone()
        .or_else(|| std::env::var_os(genvideo::config::ENV_CATALOG).map(PathBuf::from));
    let catalog = ModelCatalog::load_or_builtin(path.as_deref())?;
    let models = catalog.list(filter);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&models)?);
        return Ok(());
    }

    println!("Available models ({} total):\n", models.len());
    for model in models {
        let star = if model.recommended { "★" } else { " " };
        println!("  {star} {} [{}]", model.id, model.category);
        println!("      {}", model.name);
        if !model.features.is_empty() {
            println!("      {}", model.features.join(", "));
        }
    }
    Ok(())
}

fn report_error(err: &anyhow::Error, json_output: bool) -> ExitCode {
    let typed = err.downcast_ref::<GenVideoError>();
    let code = typed.map_or(1, GenVideoError::exit_code);
    let hint = typed.and_then(GenVideoError::hint);

    if json_output {
        let result = serde_json::json!({
            "success": false,
            "error": err.to_string(),
            "hint": hint,
            "exit_code": code,
        });
        println!("{result}");
    } else {
        eprintln!("Error: {err}");
        if let Some(hint) = hint {
            eprintln!("Hint: {hint}");
        }
    }
    ExitCode::from(code)
}
