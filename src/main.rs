use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use swip::config::toml_config::HrvConfig;
use swip::utils::error::ErrorSeverity;
use swip::utils::{integrity, logger, validation::Validate};
use swip::{
    compute_features, BatchOptions, BatchPipeline, Classifier, FeatureSample, LocalStorage, SwipConfig,
    SwipEngine, SwipError,
};

#[derive(Parser)]
#[command(name = "swip")]
#[command(about = "Stress state inference from heart rate variability")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify a single feature sample
    Predict {
        #[command(flatten)]
        model: ModelArgs,

        /// Feature value as NAME=VALUE, repeatable
        #[arg(short, long = "feature", value_parser = parse_feature)]
        features: Vec<(String, f64)>,

        /// Feature sample as a JSON object
        #[arg(long, conflicts_with = "features")]
        json: Option<String>,
    },
    /// Compute HRV features from RR intervals, optionally classifying them
    Hrv(HrvArgs),
    /// Classify every row of a CSV described by a TOML config
    Batch {
        #[arg(short, long, default_value = "swip.toml")]
        config: PathBuf,

        /// Load and validate everything without classifying
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the SHA-256 of a file
    Checksum { file: PathBuf },
}

#[derive(Args)]
struct ModelArgs {
    #[arg(long)]
    model: PathBuf,

    #[arg(long)]
    sidecar: PathBuf,

    /// Skip the sidecar checksum check
    #[arg(long)]
    no_verify: bool,
}

#[derive(Args)]
struct HrvArgs {
    /// File with RR intervals in milliseconds, one per line or comma separated
    #[arg(long)]
    rr_file: PathBuf,

    /// TOML config; its [hrv], [logging] and [model] sections apply
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    min_rr_ms: Option<f64>,

    #[arg(long)]
    max_rr_ms: Option<f64>,

    #[arg(long)]
    min_beats: Option<usize>,

    /// Only the most recent beats spanning this many seconds are used
    #[arg(long)]
    window_seconds: Option<f64>,

    #[arg(long)]
    model: Option<PathBuf>,

    #[arg(long, requires = "model")]
    sidecar: Option<PathBuf>,
}

fn parse_feature(raw: &str) -> Result<(String, f64), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid value for {}: {}", name, e))?;
    Ok((name.trim().to_string(), value))
}

fn parse_rr_intervals(content: &str) -> Result<Vec<f64>, SwipError> {
    content
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>().map_err(|_| SwipError::InvalidFeature {
                name: "RR".to_string(),
                reason: format!("'{}' is not an RR interval", s),
            })
        })
        .collect()
}

fn read_file(path: &Path) -> Result<Vec<u8>, SwipError> {
    std::fs::read(path)
        .map_err(|e| SwipError::IoError(std::io::Error::new(e.kind(), format!("{}: {}", path.display(), e))))
}

/// Config sections win over defaults; CLI flags win over both. The window
/// applies only when a config or `--window-seconds` asks for one.
fn resolve_hrv(config: Option<&SwipConfig>, args: &HrvArgs) -> (HrvConfig, bool) {
    let mut hrv = config.map(|c| c.hrv.clone()).unwrap_or_default();
    if let Some(v) = args.min_rr_ms {
        hrv.min_rr_ms = v;
    }
    if let Some(v) = args.max_rr_ms {
        hrv.max_rr_ms = v;
    }
    if let Some(v) = args.min_beats {
        hrv.min_beats = v;
    }
    if let Some(v) = args.window_seconds {
        hrv.window_seconds = v;
    }
    (hrv, config.is_some() || args.window_seconds.is_some())
}

fn exit_code(e: &SwipError) -> i32 {
    match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

fn report(e: &SwipError) -> ! {
    tracing::error!(
        "{} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(exit_code(e));
}

/// Loads and validates a config, then sets up logging from its `[logging]`
/// section. Falls back to the CLI logger so the failure still gets reported.
fn load_config(path: &Path, verbose: bool) -> Result<SwipConfig, SwipError> {
    let loaded = SwipConfig::from_file(path).and_then(|config| {
        config.validate()?;
        Ok(config)
    });

    match &loaded {
        Ok(config) => logger::init_logger(verbose, config.log_level(), config.log_json()),
        Err(_) => logger::init_cli_logger(verbose),
    }
    if loaded.is_ok() {
        tracing::info!("Configuration loaded from {}", path.display());
    }
    loaded
}

fn run_predict(model: ModelArgs, features: Vec<(String, f64)>, json: Option<String>) -> Result<(), SwipError> {
    let sample = match json {
        Some(raw) => serde_json::from_str::<FeatureSample>(&raw)?,
        None => {
            let mut sample = FeatureSample::new();
            for (name, value) in &features {
                sample.insert(name, *value);
            }
            sample
        }
    };

    let classifier = Classifier::load(&model.model, &model.sidecar, !model.no_verify)?;
    let prediction = classifier.predict(&sample)?;
    println!("{}", serde_json::to_string_pretty(&prediction)?);
    Ok(())
}

fn run_hrv(args: HrvArgs, verbose: bool) -> Result<(), SwipError> {
    let config = match &args.config {
        Some(path) => Some(load_config(path, verbose)?),
        None => {
            logger::init_cli_logger(verbose);
            None
        }
    };

    let (hrv, windowed) = resolve_hrv(config.as_ref(), &args);
    let content = String::from_utf8_lossy(&read_file(&args.rr_file)?).into_owned();
    let rr = parse_rr_intervals(&content)?;

    let features = if windowed {
        hrv.windowed_features(&rr)?
    } else {
        compute_features(&rr, &hrv.artifact_filter())?
    };
    println!("{}", serde_json::to_string_pretty(&FeatureSample::from(&features))?);

    let model = match (&args.model, &config) {
        (Some(model), _) => {
            let sidecar = args.sidecar.clone().unwrap_or_else(|| model.with_extension("meta.json"));
            Some((model.clone(), sidecar, true))
        }
        (None, Some(config)) => Some((
            PathBuf::from(&config.model.path),
            PathBuf::from(&config.model.sidecar),
            config.model.verify_checksum,
        )),
        (None, None) => None,
    };

    if let Some((model, sidecar, verify)) = model {
        let prediction = Classifier::load(&model, &sidecar, verify)?.predict_hrv(&features)?;
        println!("{}", serde_json::to_string_pretty(&prediction)?);
    }
    Ok(())
}

async fn run_batch(config_path: PathBuf, dry_run: bool, verbose: bool) -> Result<(), SwipError> {
    let config = load_config(&config_path, verbose)?;

    let classifier = Classifier::load(&config.model.path, &config.model.sidecar, config.model.verify_checksum)?;

    let input = config.input.as_ref().ok_or_else(|| SwipError::ConfigError {
        message: "batch mode needs an [input] section".to_string(),
    })?;
    let output_dir = config
        .output
        .as_ref()
        .map(|o| o.path.clone())
        .unwrap_or_else(|| "./output".to_string());

    if dry_run {
        println!("model:   {}", config.model.path);
        println!("inputs:  {}", classifier.metadata().input_names().join(", "));
        println!("samples: {}", input.path);
        println!("output:  {} ({})", output_dir, config.output_formats().join(", "));
        return Ok(());
    }

    let options = BatchOptions {
        input_path: input.path.clone(),
        id_column: input.id_column.clone(),
        output_dir,
        formats: config.output_formats(),
    };
    let pipeline = BatchPipeline::new(LocalStorage::new("."), Arc::new(classifier), options);
    let summary = SwipEngine::new(pipeline).run().await?;

    println!(
        "✅ {} predictions, {} failures, reports in {}",
        summary.predicted, summary.failed, summary.output_path
    );
    Ok(())
}

fn run_checksum(file: PathBuf) -> Result<(), SwipError> {
    let data = read_file(&file)?;
    println!("{}  {}", integrity::sha256_hex(&data), file.display());
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let verbose = cli.verbose;

    let outcome = match cli.command {
        Command::Predict {
            model,
            features,
            json,
        } => {
            logger::init_cli_logger(verbose);
            run_predict(model, features, json)
        }
        Command::Hrv(args) => run_hrv(args, verbose),
        Command::Batch { config, dry_run } => run_batch(config, dry_run, verbose).await,
        Command::Checksum { file } => {
            logger::init_cli_logger(verbose);
            run_checksum(file)
        }
    };

    if let Err(e) = outcome {
        report(&e);
    }
}
