use clap::{Parser, Subcommand};
use photo_enhance::config::{self, Config};
use photo_enhance::pipeline::load_rgb;
use photo_enhance::preview::{self, PANE_SIZE};
use photo_enhance::server;
use photo_enhance::services::ServiceSet;
use photo_enhance::session::{self, LogNotifier, Session};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Gap between the two panes of a preview image
const PREVIEW_GAP: u32 = 20;
/// 128 + SIGINT
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// What a Ctrl-C during an enhancement does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    /// Stop at the next stage boundary
    Cancel,
    /// Leave without waiting for the running model
    Exit,
}

#[derive(Debug, Default)]
struct Interrupts {
    seen: u32,
}

impl Interrupts {
    fn next(&mut self) -> Interrupt {
        self.seen += 1;
        if self.seen == 1 {
            Interrupt::Cancel
        } else {
            Interrupt::Exit
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "photo-enhance")]
#[command(about = "Enhance photos with super-resolution and face restoration")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Host address to bind to
    #[arg(long, env = "ENHANCE_HOST", default_value = "127.0.0.1", global = true)]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "ENHANCE_PORT", default_value = "9393", global = true)]
    pub port: u16,

    /// Directory holding the model files (default: ./weights, then the data directory)
    #[arg(long, env = "ENHANCE_MODELS_DIR", global = true)]
    pub models_dir: Option<PathBuf>,

    /// Maximum upload size in bytes (default: 50MB)
    #[arg(long, env = "ENHANCE_MAX_FILE_SIZE", default_value = "52428800", global = true)]
    pub max_file_size: usize,

    /// JPEG quality of saved and served images (1-100)
    #[arg(long, env = "ENHANCE_JPEG_QUALITY", default_value = "95", global = true)]
    pub jpeg_quality: u8,

    /// Super-resolution tile size, 0 disables tiling
    #[arg(long, env = "ENHANCE_TILE", default_value = "0", global = true)]
    pub tile: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Enhance a single image file
    Enhance {
        /// Image to enhance
        input: PathBuf,

        /// Where to save the result (default: <input>_enhanced.jpg)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write a before/after comparison image
        #[arg(long)]
        preview: Option<PathBuf>,
    },
    /// Run the HTTP server
    Serve,
    /// Print information about the model services as JSON
    Info,
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        Self {
            host: args.host.clone(),
            port: args.port,
            max_file_size: args.max_file_size,
            models_dir: config::resolve_models_dir(args.models_dir.as_deref()),
            jpeg_quality: args.jpeg_quality.clamp(1, 100),
            tile: args.tile,
            ..Config::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from(&args);
    tracing::debug!("Using models from {}", config.models_dir.display());

    match args.command {
        Command::Enhance {
            input,
            output,
            preview,
        } => enhance(config, &input, output, preview).await,
        Command::Serve => {
            tracing::info!("Starting photo-enhance v{}", env!("CARGO_PKG_VERSION"));
            tracing::info!("Binding to {}:{}", config.host, config.port);
            server::run(config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Info => {
            let services = ServiceSet::new(&config)?;
            println!("{}", serde_json::to_string_pretty(&services.info())?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn enhance(
    config: Config,
    input: &Path,
    output: Option<PathBuf>,
    preview_path: Option<PathBuf>,
) -> anyhow::Result<ExitCode> {
    // Fail on a bad input before spending time on the models
    let original = match load_rgb(input) {
        Ok(image) => image,
        Err(e) => {
            tracing::error!("{}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    let services = ServiceSet::new(&config)?;
    let mut session = Session::new(Arc::new(services.pipeline()), Arc::new(LogNotifier))
        .with_jpeg_quality(config.jpeg_quality);

    session.accept_upload(input, &original);
    let Some(mut job) = session.spawn_enhancement_of(original.clone()) else {
        return Ok(ExitCode::FAILURE);
    };

    let mut interrupts = Interrupts::default();
    loop {
        tokio::select! {
            percent = job.progress.recv() => match percent {
                Some(percent) => tracing::info!("Progress: {}%", percent),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => match interrupts.next() {
                Interrupt::Cancel => {
                    tracing::warn!("Interrupted, cancelling enhancement (press Ctrl-C again to quit)...");
                    job.cancel();
                }
                Interrupt::Exit => {
                    // Dropping the runtime would wait for the running model
                    tracing::warn!("Interrupted again, exiting");
                    std::process::exit(INTERRUPTED_EXIT_CODE);
                }
            }
        }
    }

    if session.finish(job).await.is_none() {
        return Ok(ExitCode::FAILURE);
    }

    let output = output.unwrap_or_else(|| default_output_path(input));
    if session.save_image(&output).is_none() {
        return Ok(ExitCode::FAILURE);
    }

    if let (Some(path), Some(enhanced)) = (preview_path, session.upgraded_image()) {
        let canvas = preview::side_by_side(&original, enhanced, PANE_SIZE.0, PANE_SIZE.1, PREVIEW_GAP);
        match session::write_image(&canvas, &path, config.jpeg_quality) {
            Ok(()) => tracing::info!("Preview written to {}", path.display()),
            Err(e) => {
                tracing::error!("{}", e);
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// `photo.png` -> `photo_enhanced.jpg` in the same directory
fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    input.with_file_name(format!("{}_enhanced.{}", stem, session::DEFAULT_SAVE_EXTENSION))
}
