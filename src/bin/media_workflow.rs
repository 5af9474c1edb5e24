// media_workflow - headless driver for the editing screens
// Loads one file into a screen, submits it to the processing service and saves the result

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use media_workflow::adjustment::{Parameter, STYLE_CATALOG};
use media_workflow::overlay::{detection_summary, RasterSurface};
use media_workflow::validation::{detect_mime, MimeClass};
use media_workflow::{
    Completion, EngineConfig, HttpProcessingClient, MediaFile, MediaSource, ProcessingResult, Screen, ScreenKind,
    SessionStatus, UrlRegistry,
};

#[derive(Parser)]
#[command(name = "media_workflow", version, about = "Media Workflow - submit media to the processing service")]
struct Args {
    /// JSON engine config (screens and service)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Processing service base URL (overrides the config file)
    #[arg(long)]
    service_url: Option<String>,

    /// Request timeout in seconds (none by default)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Directory results are written to
    #[arg(long, default_value = ".")]
    out: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Colour-adjust an image or video
    Adjust(AdjustArgs),
    /// Apply a painting style to an image
    Style {
        input: PathBuf,
        /// Style id (see `styles`)
        #[arg(long)]
        style: String,
    },
    /// Run object detection and render the overlay
    Detect {
        input: PathBuf,
        /// TTF/OTF font for box labels
        #[arg(long)]
        font: Option<PathBuf>,
    },
    /// List the style catalog
    Styles,
}

#[derive(ClapArgs)]
struct AdjustArgs {
    input: PathBuf,
    #[arg(long, default_value_t = 1.0)]
    saturation: f32,
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    hue: f32,
    #[arg(long, default_value_t = 1.0)]
    brightness: f32,
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    temperature: f32,
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    shadow: f32,
}

impl AdjustArgs {
    fn values(&self) -> [(Parameter, f32); 5] {
        [
            (Parameter::Saturation, self.saturation),
            (Parameter::Hue, self.hue),
            (Parameter::Brightness, self.brightness),
            (Parameter::Temperature, self.temperature),
            (Parameter::Shadow, self.shadow),
        ]
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let args = Args::parse();

    if let Command::Styles = args.command {
        for style in STYLE_CATALOG.iter() {
            println!("{:<14} {}", style.id, style.name);
        }
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(url) = &args.service_url {
        config.service.base_url = url.clone();
    }
    if args.timeout_secs.is_some() {
        config.service.timeout_secs = args.timeout_secs;
    }

    info!("🎬 Starting Media Workflow");
    info!("   Service: {}", config.service.base_url);

    let client = HttpProcessingClient::new(config.service.clone())
        .context("Failed to create processing client")?;
    let registry = UrlRegistry::new();

    tokio::fs::create_dir_all(&args.out)
        .await
        .with_context(|| format!("Failed to create {}", args.out.display()))?;

    match &args.command {
        Command::Adjust(adjust) => {
            let file = read_input(&adjust.input).await?;
            let kind = match detect_mime(None, &file.bytes).as_deref().and_then(MimeClass::from_mime) {
                Some(MimeClass::Video) => ScreenKind::VideoEditor,
                _ => ScreenKind::ImageEditor,
            };
            let mut screen = Screen::new(config.screen(kind).clone(), Arc::clone(&registry))?;
            screen.acquire(MediaSource::file(file)).context("Media rejected")?;
            for (parameter, value) in adjust.values() {
                let spec = parameter.spec();
                if !spec.contains(value) {
                    warn!("{} {} out of range, clamped to {}", parameter, value, spec.clamp(value));
                }
                screen.set_parameter(parameter, spec.clamp(value));
            }
            run(&mut screen, &client).await?;
            save(&screen, &args.out).await?;
        }
        Command::Style { input, style } => {
            let file = read_input(input).await?;
            let mut screen = Screen::new(config.screen(ScreenKind::StyleTransfer).clone(), Arc::clone(&registry))?;
            screen.acquire(MediaSource::file(file)).context("Media rejected")?;
            screen.select_style(style)?;
            run(&mut screen, &client).await?;
            save(&screen, &args.out).await?;
        }
        Command::Detect { input, font } => {
            let file = read_input(input).await?;
            let source_bytes = file.bytes.clone();
            let stem = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "media".to_string());

            let mut screen = Screen::new(config.screen(ScreenKind::ObjectDetection).clone(), Arc::clone(&registry))?;
            screen.acquire(MediaSource::file(file)).context("Media rejected")?;
            run(&mut screen, &client).await?;

            let detections = screen
                .result()
                .and_then(ProcessingResult::detections)
                .unwrap_or_default();
            for (label, bbox) in detection_summary(detections) {
                println!("{}\n  {}", label, bbox);
            }

            if screen.asset().and_then(|a| a.natural_size()).is_none() {
                warn!("Overlay skipped: source dimensions unknown");
                return Ok(());
            }
            let mut surface = RasterSurface::from_bytes(&source_bytes)?;
            if let Some(font) = font {
                let data = tokio::fs::read(font)
                    .await
                    .with_context(|| format!("Failed to read font {}", font.display()))?;
                surface = surface.with_font(data)?;
            }
            screen.render_overlay(&mut surface)?;
            let path = args.out.join(format!("detected_{}.png", stem));
            surface.save_png(&path)?;
            info!("💾 Overlay written to {}", path.display());
        }
        Command::Styles => {}
    }

    info!("{}", url_summary(&registry));
    Ok(())
}

async fn read_input(path: &Path) -> Result<MediaFile> {
    MediaFile::from_path(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

async fn run(screen: &mut Screen, client: &HttpProcessingClient) -> Result<()> {
    match screen.submit(client).await? {
        Some(Completion::Applied(SessionStatus::Succeeded)) => {
            let snap = screen.metrics().snapshot();
            info!("✅ Processed in {}ms", snap.avg_latency_ms);
            Ok(())
        }
        Some(_) => {
            let message = screen.error().unwrap_or("Processing failed").to_string();
            error!("{}", message);
            anyhow::bail!(message)
        }
        None => anyhow::bail!("Nothing was submitted"),
    }
}

async fn save(screen: &Screen, out: &Path) -> Result<()> {
    let path = screen
        .save_download(out)
        .await
        .context("Failed to save result")?;
    println!("{}", path.display());
    Ok(())
}

fn url_summary(registry: &UrlRegistry) -> String {
    format!(
        "Object URLs: {} created, {} released",
        registry.created_count(),
        registry.released_count()
    )
}
