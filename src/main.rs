use clap::{Parser, Subcommand};
use std::path::PathBuf;
use thumbcache::imaging::{Anchor, Mode, OutputFormat, RatioRegion, RequestFields, Rgb};
use thumbcache::{TransformRequest, TransformService, batch, config, output, service::Source};
use tracing_subscriber::EnvFilter;

/// Shared flags for commands that render many images.
#[derive(clap::Args, Clone)]
struct CacheArgs {
    /// Disable the transform cache and render every job from scratch
    #[arg(long)]
    no_cache: bool,
}

/// Transform description shared by `render`.
#[derive(clap::Args, Clone)]
struct RequestArgs {
    /// Raw, Scale, Crop or SpecifiedCrop (or codes 0, 1, 3, 4)
    #[arg(long, default_value = "Raw")]
    mode: Mode,
    /// Target width (Scale, Crop, SpecifiedCrop)
    #[arg(long)]
    width: Option<u32>,
    /// Target height (Scale, Crop, SpecifiedCrop)
    #[arg(long)]
    height: Option<u32>,
    /// Raw: fit within a square of this size
    #[arg(long = "max")]
    max_dimension: Option<u32>,
    /// Raw: fit within this width (with --max-height)
    #[arg(long)]
    max_width: Option<u32>,
    /// Raw: fit within this height (with --max-width)
    #[arg(long)]
    max_height: Option<u32>,
    /// Crop: Center, Top, Bottom, Left or Right
    #[arg(long)]
    anchor: Option<Anchor>,
    /// Scale: letterbox colour as RRGGBB (default: transparent for PNG/GIF)
    #[arg(long)]
    background: Option<Rgb>,
    /// SpecifiedCrop: region left edge as a fraction of source width
    #[arg(long)]
    left: Option<f64>,
    /// SpecifiedCrop: region top edge as a fraction of source height
    #[arg(long)]
    top: Option<f64>,
    /// SpecifiedCrop: region width as a fraction of source width
    #[arg(long)]
    width_ratio: Option<f64>,
    /// SpecifiedCrop: region height as a fraction of source height
    #[arg(long)]
    height_ratio: Option<f64>,
}

impl RequestArgs {
    fn to_request(&self) -> thumbcache::Result<TransformRequest> {
        let region = match (self.left, self.top, self.width_ratio, self.height_ratio) {
            (Some(left), Some(top), Some(width), Some(height)) => Some(RatioRegion {
                left,
                top,
                width,
                height,
            }),
            _ => None,
        };
        TransformRequest::from_fields(
            self.mode,
            RequestFields {
                width: self.width,
                height: self.height,
                max_dimension: self.max_dimension,
                max_width: self.max_width,
                max_height: self.max_height,
                anchor: self.anchor,
                background: self.background,
                region,
            },
        )
    }
}

#[derive(Parser)]
#[command(name = "thumbcache")]
#[command(about = "Resized, cropped and letterboxed image derivatives")]
#[command(long_about = "\
Resized, cropped and letterboxed image derivatives

Sources are resolved against [source].root from the config file. A missing
source renders as a grey placeholder of the requested size (or fails, with
[source].missing = \"error\"). The source name 'Default' always renders the
placeholder.

Modes:
  Raw            source as-is, or scaled down to fit --max / --max-width x --max-height
  Scale          fit inside --width x --height, letterboxed with --background
  Crop           cover --width x --height, overflow cropped per --anchor
  SpecifiedCrop  resample the --left/--top/--width-ratio/--height-ratio region
                 into --width x --height (distortion allowed)

Run 'thumbcache gen-config' to generate a documented thumbcache.toml.")]
#[command(version)]
struct Cli {
    /// Config file (defaults apply when it does not exist)
    #[arg(long, default_value = config::CONFIG_FILENAME, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render one derivative to a file
    Render {
        /// Source identifier, relative to the source root
        source: String,
        #[command(flatten)]
        request: RequestArgs,
        /// Png, Jpeg, Gif or HighQualityJpeg
        #[arg(long, default_value = "Png")]
        format: OutputFormat,
        /// Output file
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Render every job in a JSON job file, in parallel
    Batch {
        /// Job file
        jobs: PathBuf,
        /// Directory job outputs are written under
        #[arg(long, default_value = "out")]
        out_dir: PathBuf,
        #[command(flatten)]
        cache: CacheArgs,
    },
    /// Scale an upload down for the web and store it as PNG
    SaveForWeb {
        /// Upload file name
        file: String,
        /// Directory the upload sits in, within the temp area
        #[arg(long, default_value = "")]
        from: String,
        /// Target directory within the store (default: [images].target_directory)
        #[arg(long)]
        to: Option<String>,
    },
    /// Print a stock thumbcache.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("thumbcache=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Render {
            source,
            request,
            format,
            output: out_path,
        } => {
            let config = config::load_config(&cli.config)?;
            let service = TransformService::from_config(&config).without_cache();
            let request = request.to_request()?;
            let rendered = service.render(Source::Path(&source), &request, format)?;
            std::fs::write(&out_path, &rendered.bytes)?;
            output::print_render_output(&source, &out_path, &request, &rendered);
        }
        Command::Batch {
            jobs,
            out_dir,
            cache,
        } => {
            let config = config::load_config(&cli.config)?;
            init_thread_pool(&config.processing);
            let mut service = TransformService::from_config(&config);
            if cache.no_cache {
                service = service.without_cache();
            }
            let jobs = batch::load_jobs(&jobs)?;
            let result = batch::run_batch(&service, &jobs, &out_dir)?;
            output::print_batch_output(&result);
            if result.failures() > 0 {
                std::process::exit(1);
            }
        }
        Command::SaveForWeb { file, from, to } => {
            let config = config::load_config(&cli.config)?;
            let service = TransformService::from_config(&config);
            let target = to.unwrap_or_else(|| config.images.target_directory.clone());
            let saved = service.save_for_web(&file, &from, &target)?;
            output::print_save_for_web_output(&file, &target, saved);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = processing.worker_threads();
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
