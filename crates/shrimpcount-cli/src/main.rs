//! shrimpcount CLI: count objects on keyed-backdrop frames and talk to the rig.

mod camera;
mod device;
mod relay;
mod sink;
mod source;
mod telemetry;

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use shrimpcount::{BackgroundKey, CountConfig, Counter};

use device::{Ack, Command, DeviceChannel, DeviceSettings};
use relay::{RelayConfig, StatusRelay};
use sink::OutputSink;
use telemetry::{Cadence, CountReporter, HttpReporter, TelemetryConfig};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "shrimpcount")]
#[command(about = "Count shrimp on a keyed backdrop and relay the results")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count objects in one image.
    Count(CliCountArgs),

    /// Count every frame of an image, a directory of frames or a camera.
    Watch(CliWatchArgs),

    /// Forward a JSON status file to the telemetry endpoint.
    Relay(CliRelayArgs),

    /// Send one command to the conveyor controller.
    Command(CliCommandArgs),

    /// Print the default counting configuration as JSON.
    DefaultConfig,
}

/// Counting configuration: optional file plus per-field overrides.
#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    /// JSON config file (missing fields take defaults).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Minimum counted area in px² (strictly greater counts).
    #[arg(long)]
    min_area: Option<f64>,

    /// Holes smaller than this area (px²) are filled.
    #[arg(long)]
    max_hole_area: Option<f64>,

    /// Seed threshold as a fraction of the deepest interior distance.
    #[arg(long)]
    seed_fraction: Option<f64>,

    /// Background key lower bound, "h,s,v".
    #[arg(long, value_parser = parse_hsv)]
    hsv_lower: Option<[u8; 3]>,

    /// Background key upper bound, "h,s,v".
    #[arg(long, value_parser = parse_hsv)]
    hsv_upper: Option<[u8; 3]>,
}

fn parse_hsv(s: &str) -> Result<[u8; 3], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(format!("expected h,s,v but got {s:?}"));
    }
    let mut out = [0u8; 3];
    for (dst, p) in out.iter_mut().zip(parts) {
        *dst = p
            .parse()
            .map_err(|e| format!("invalid component {p:?}: {e}"))?;
    }
    Ok(out)
}

impl ConfigArgs {
    fn to_config(&self) -> CliResult<CountConfig> {
        let mut config = match &self.config {
            Some(path) => CountConfig::from_json_file(path)?,
            None => CountConfig::default(),
        };
        if let Some(v) = self.min_area {
            config.extract.min_area = v;
        }
        if let Some(v) = self.max_hole_area {
            config.cleanup.max_hole_area = v;
        }
        if let Some(v) = self.seed_fraction {
            config.seeds.confidence_fraction = v;
        }
        let key = &mut config.background;
        if let Some(lower) = self.hsv_lower {
            *key = BackgroundKey::new(lower, key.upper);
        }
        if let Some(upper) = self.hsv_upper {
            *key = BackgroundKey::new(key.lower, upper);
        }
        Ok(config)
    }

    fn to_counter(&self) -> CliResult<Counter> {
        Ok(Counter::with_config(self.to_config()?)?)
    }
}

#[derive(Debug, Clone, Args)]
struct CliCountArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    /// Directory for annotated images and JSON results.
    #[arg(long)]
    out: PathBuf,

    /// Also write every intermediate mask.
    #[arg(long)]
    stages: bool,

    #[command(flatten)]
    config: ConfigArgs,
}

/// Telemetry endpoint flags shared by `watch` and `relay`.
#[derive(Debug, Clone, Args)]
struct TelemetryArgs {
    /// Telemetry server base URL; reporting is off without an access token.
    #[arg(long, default_value = "https://demo.thingsboard.io")]
    telemetry_url: String,

    /// Device access token.
    #[arg(long)]
    access_token: Option<String>,

    /// Request timeout in seconds.
    #[arg(long, default_value = "3.0")]
    telemetry_timeout: f64,
}

impl TelemetryArgs {
    fn to_config(&self) -> Option<TelemetryConfig> {
        let token = self.access_token.as_ref()?;
        Some(TelemetryConfig {
            base_url: self.telemetry_url.clone(),
            access_token: token.clone(),
            timeout_secs: self.telemetry_timeout,
        })
    }
}

#[derive(Debug, Clone, Args)]
struct CliWatchArgs {
    /// Image file or directory of frames.
    #[arg(long, required_unless_present = "camera", conflicts_with = "camera")]
    source: Option<PathBuf>,

    /// Capture from this camera index instead (needs the `camera` feature).
    #[arg(long)]
    camera: Option<i32>,

    /// Restart a directory sequence when it runs out.
    #[arg(long = "loop")]
    looping: bool,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<usize>,

    /// Directory for per-frame outputs (nothing written when omitted).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Also write every intermediate mask.
    #[arg(long)]
    stages: bool,

    /// Report every N-th frame.
    #[arg(long, default_value = "5", conflicts_with = "report_interval")]
    report_every: u64,

    /// Report at most once per this many seconds instead of by frame.
    #[arg(long)]
    report_interval: Option<f64>,

    #[command(flatten)]
    telemetry: TelemetryArgs,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Debug, Clone, Args)]
struct CliRelayArgs {
    /// JSON status file to forward.
    #[arg(long)]
    status_file: PathBuf,

    /// Seconds between reads of the status file.
    #[arg(long, default_value = "3")]
    poll_secs: f64,

    /// Seconds between environment reports.
    #[arg(long, default_value = "300")]
    environment_secs: f64,

    /// Stop after this many reads.
    #[arg(long)]
    max_steps: Option<usize>,

    #[command(flatten)]
    telemetry: TelemetryArgs,
}

#[derive(Debug, Clone, Args)]
struct CliCommandArgs {
    /// Command to send.
    #[arg(value_enum)]
    command: Command,

    /// Device node (defaults to the last one used).
    #[arg(long)]
    device: Option<PathBuf>,

    /// Baud rate (defaults to the last one used).
    #[arg(long)]
    baud: Option<u32>,

    /// Send the init frame before the command.
    #[arg(long)]
    init: bool,

    /// Acknowledgement timeout in seconds.
    #[arg(long, default_value = "10")]
    timeout: f64,

    /// Where the last used device and baud are kept.
    #[arg(long, default_value = "shrimpcount-device.json")]
    settings: PathBuf,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Count(args) => run_count(&args),
        Commands::Watch(args) => run_watch(&args),
        Commands::Relay(args) => run_relay(&args),
        Commands::Command(args) => run_command(&args),
        Commands::DefaultConfig => run_default_config(),
    }
}

/// Parse a seconds flag into a duration; negative, NaN and huge values are errors.
fn seconds(flag: &str, secs: f64) -> CliResult<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| -> CliError { format!("--{flag}: {secs} is not a usable duration ({e})").into() })
}

// ── default-config ─────────────────────────────────────────────────────

fn run_default_config() -> CliResult<()> {
    println!("{}", CountConfig::default().to_json_pretty()?);
    Ok(())
}

// ── count ──────────────────────────────────────────────────────────────

fn run_count(args: &CliCountArgs) -> CliResult<()> {
    tracing::info!("Loading image: {}", args.image.display());
    let counter = args.config.to_counter()?;

    let img = image::open(&args.image).map_err(|e| -> CliError {
        format!("Failed to open image {}: {}", args.image.display(), e).into()
    })?;
    let frame = img.to_rgb8();
    let (w, h) = frame.dimensions();
    tracing::info!("Image size: {}x{}", w, h);

    let sink = OutputSink::create(&args.out, args.stages)?;
    let name = frame_name(&args.image);
    let (result, stages) = counter.count_with_stages(&frame);
    sink.write(&name, &result, Some(&stages))?;

    tracing::info!("Results written to {}", sink.dir().display());
    println!("{}", result.object_count);
    Ok(())
}

fn frame_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frame".to_string())
}

// ── watch ──────────────────────────────────────────────────────────────

fn run_watch(args: &CliWatchArgs) -> CliResult<()> {
    let counter = args.config.to_counter()?;
    let source = match (&args.source, args.camera) {
        (_, Some(index)) => camera::open_camera(index)?,
        (Some(path), None) => source::open_source(path, args.looping)?,
        (None, None) => return Err("watch needs --source or --camera".into()),
    };
    tracing::info!("Watching {}", source.describe());

    let sink = match &args.out {
        Some(dir) => Some(OutputSink::create(dir, args.stages)?),
        None => None,
    };
    let cadence = match args.report_interval {
        Some(secs) => Cadence::Interval(seconds("report-interval", secs)?),
        None => Cadence::EveryNthFrame(args.report_every),
    };
    let mut reporter = match args.telemetry.to_config() {
        Some(cfg) => Some(CountReporter::new(HttpReporter::new(cfg)?, cadence)),
        None => {
            tracing::info!("No access token; telemetry disabled");
            None
        }
    };

    let limit = args.max_frames.unwrap_or(usize::MAX);
    let mut processed = 0usize;
    for item in source.take(limit) {
        let frame = match item {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("skipping frame: {}", e);
                continue;
            }
        };

        let (result, stages) = counter.count_with_stages(&frame.image);
        tracing::info!("{}: {} objects", frame.name, result.object_count);

        if let Some(sink) = &sink {
            let stages = sink.wants_stages().then_some(&stages);
            if let Err(e) = sink.write(&frame.name, &result, stages) {
                tracing::warn!("cannot write outputs for {}: {}", frame.name, e);
            }
        }
        if let Some(reporter) = reporter.as_mut() {
            reporter.observe(result.object_count);
        }
        processed += 1;
    }

    tracing::info!("Processed {} frames", processed);
    Ok(())
}

// ── relay ──────────────────────────────────────────────────────────────

fn run_relay(args: &CliRelayArgs) -> CliResult<()> {
    let cfg = args
        .telemetry
        .to_config()
        .ok_or_else(|| -> CliError { "relay needs --access-token".into() })?;
    let sink = HttpReporter::new(cfg)?;

    let mut config = RelayConfig::new(&args.status_file);
    config.poll_interval = seconds("poll-secs", args.poll_secs)?;
    config.environment_interval = seconds("environment-secs", args.environment_secs)?;

    tracing::info!(
        "Relaying {} every {:?}",
        args.status_file.display(),
        config.poll_interval
    );
    StatusRelay::new(config, sink).run(args.max_steps);
    Ok(())
}

// ── command ────────────────────────────────────────────────────────────

fn run_command(args: &CliCommandArgs) -> CliResult<()> {
    let mut settings = DeviceSettings::load(&args.settings)?;
    if let Some(device) = &args.device {
        settings.device = device.clone();
    }
    if let Some(baud) = args.baud {
        settings.baud = device::check_baud(baud)?;
    }

    let timeout = seconds("timeout", args.timeout)?;
    let mut channel = DeviceChannel::open(&settings.device, settings.baud, timeout)?;
    tracing::info!("Device {} @ {} baud", settings.device.display(), settings.baud);
    if args.init {
        channel.init(settings.baud)?;
    }
    settings.save(&args.settings)?;

    let outcome = channel.send(args.command)?;
    for line in &outcome.transcript {
        println!("< {}", line);
    }
    match outcome.ack {
        None | Some(Ack::Accepted(_)) => Ok(()),
        Some(Ack::Rejected(line)) => Err(format!("{:?} rejected: {}", args.command, line).into()),
        Some(Ack::TimedOut) => Err(format!("{:?}: no acknowledgement", args.command).into()),
    }
}
