use canvas_fit::config::{self, BackgroundMode, ComposeConfig};
use canvas_fit::imaging::{OutputFormat, RustBackend};
use canvas_fit::{compose, output};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "canvas-fit")]
#[command(about = "Fit images onto fixed-size canvases")]
#[command(long_about = "\
Fit images onto fixed-size canvases

Each source is fitted inside the container, keeping its aspect ratio, and
centered over a background: the source itself scaled to cover the canvas and
blurred, a solid color, or both.

  canvas-fit compose photo.jpg -o card.png
  canvas-fit compose photo.jpg -o - --format jpg --header > response
  canvas-fit compose photo.jpg -o card.png --color 1A2B3C --background color
  canvas-fit batch shots/ extra.png --out-dir cards/

Run 'canvas-fit gen-config' to generate a documented canvas-fit.toml.")]
#[command(version)]
struct Cli {
    /// Log pipeline stages and geometry to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Settings shared by every command that composes images.
///
/// Flags win over the config file, which wins over the stock defaults.
#[derive(clap::Args)]
struct ComposeFlags {
    /// Config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Container width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Container height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Foreground margin: fraction in (0, 1] or percentage in (1, 100]
    #[arg(long)]
    margin: Option<f64>,

    /// Background color as RRGGBB
    #[arg(long)]
    color: Option<String>,

    /// Blur passes over the image background (0 disables)
    #[arg(long)]
    blur: Option<i64>,

    /// What fills the canvas behind the foreground
    #[arg(long, value_enum)]
    background: Option<BackgroundMode>,

    /// Output format: png or jpg (anything else is png)
    #[arg(long)]
    format: Option<String>,
}

#[derive(clap::Args)]
struct ComposeArgs {
    /// Source image (PNG or JPEG)
    input: PathBuf,

    /// Output file, or '-' for stdout
    #[arg(short, long)]
    output: PathBuf,

    /// Prefix stdout output with a Content-Type header
    #[arg(long)]
    header: bool,

    /// Print the resulting layout as JSON (needs a file output)
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    flags: ComposeFlags,
}

impl ComposeArgs {
    fn to_stdout(&self) -> bool {
        self.output.as_os_str() == "-"
    }

    /// Reject combinations clap cannot see, because they depend on a value.
    fn validate(&self) -> Result<(), clap::Error> {
        if self.json && self.to_stdout() {
            return Err(Cli::command().error(
                ErrorKind::ArgumentConflict,
                "--json cannot be used with '-o -': stdout already carries the image",
            ));
        }
        Ok(())
    }
}

#[derive(clap::Args)]
struct BatchArgs {
    /// Source images or directories
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory the composed images are written to
    #[arg(long)]
    out_dir: PathBuf,

    #[command(flatten)]
    flags: ComposeFlags,
}

#[derive(Subcommand)]
enum Command {
    /// Compose a single image
    Compose(ComposeArgs),
    /// Compose many images in parallel
    Batch(BatchArgs),
    /// Print a stock canvas-fit.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Compose(args) => {
            args.validate().unwrap_or_else(|e| e.exit());
            let to_stdout = args.to_stdout();
            let mut config = resolve_config(&args.flags, (!to_stdout).then_some(&args.output))?;
            config.output.header |= args.header;
            let backend = RustBackend::with_filter(config.output.filter);

            if to_stdout {
                let bytes = std::fs::read(&args.input)?;
                let stdout = std::io::stdout();
                let mut out = stdout.lock();
                let layout = compose::compose_to_writer(&backend, &bytes, &config, &mut out)?;
                out.flush()?;
                tracing::info!(canvas = %layout.canvas, "written to stdout");
            } else {
                let layout = compose::compose_file(&backend, &args.input, &args.output, &config)?;
                if args.json {
                    println!("{}", output::format_layout_json(&layout)?);
                } else {
                    output::print_compose_result(&args.input, Some(&args.output), &layout);
                }
            }
        }
        Command::Batch(args) => {
            let config = resolve_config(&args.flags, None)?;
            init_thread_pool(&config.processing);
            let backend = RustBackend::with_filter(config.output.filter);

            std::fs::create_dir_all(&args.out_dir)?;
            let jobs = compose::collect_jobs(&args.inputs, &args.out_dir, config.output.format)?;
            let outcomes = compose::compose_batch(&backend, &jobs, &config);
            output::print_batch_outcomes(&outcomes);

            if outcomes.iter().any(|o| o.result.is_err()) {
                std::process::exit(1);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Install the stderr subscriber.
///
/// `-v` forces debug; otherwise `RUST_LOG` applies, defaulting to warnings.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load the config file and apply command-line overrides.
///
/// Without `--format`, an output file's extension picks the format.
fn resolve_config(
    flags: &ComposeFlags,
    output_path: Option<&PathBuf>,
) -> Result<ComposeConfig, config::ConfigError> {
    let mut config = config::load_config(flags.config.as_deref())?;

    if let Some(width) = flags.width {
        config.container.width = width;
    }
    if let Some(height) = flags.height {
        config.container.height = height;
    }
    if let Some(margin) = flags.margin {
        config.foreground.margin = margin;
    }
    if let Some(color) = &flags.color {
        config.container.color = Some(color.clone());
    }
    if let Some(blur) = flags.blur {
        config.background.blur_rounds = blur;
    }
    if let Some(mode) = flags.background {
        config.background.mode = mode;
    }
    let selector = flags.format.as_deref().or_else(|| {
        output_path
            .and_then(|p| p.extension())
            .and_then(|e| e.to_str())
    });
    if let Some(selector) = selector {
        config.output.format = OutputFormat::from_selector(selector);
    }

    config.validate()?;
    Ok(config)
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the config can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
