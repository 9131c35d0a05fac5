use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use plan_analyze::{doctor as analysis_doctor, AnalysisRequest, AnalysisSettings, Analyzer, AnalyzerConfig};
use plan_proto::Category;
use plan_source::{build_source, doctor as source_doctor, InferParams, SourceConfig};
use plan_vision::prepare_image;

use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "planfuse", version, about = "Floor-plan detection normalization and fusion")]
struct Cli {
    #[arg(long, default_value = "planfuse.toml")]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Detect rooms, walls and openings in one floor-plan image.
    Analyze {
        image: PathBuf,
        /// Drawing scale in inches per foot; enables real-unit figures.
        #[arg(long)]
        scale: Option<f64>,
        /// Comma-separated request types (rooms, walls, doors, ...). Default: all.
        #[arg(long, value_delimiter = ',')]
        types: Vec<String>,
        #[arg(long)]
        confidence: Option<f64>,
        #[arg(long)]
        overlap: Option<f64>,
        /// Write the report here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        pretty: bool,
    },
    /// Validate the config and report missing models.
    Doctor,
    /// Print which model serves each category.
    Config,
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    source: SourceConfig,
    secondary: Option<SourceConfig>,
    #[serde(default)]
    analysis: AnalysisSettings,
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read config {}", path))?;
    toml::from_str(&s).context("parse config toml")
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Analyze { image, scale, types, confidence, overlap, out, pretty } => {
            let req = AnalyzeArgs { image, scale, types, params: InferParams { confidence, overlap }, out, pretty };
            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("start tokio runtime")?;
            let res = rt.block_on(analyze(&cfg, req));
            // don't wait on source calls abandoned at the deadline; the report is out
            rt.shutdown_background();
            res?
        }
        Command::Doctor => doctor(&cfg)?,
        Command::Config => {
            for line in config_report(&cfg) {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

struct AnalyzeArgs {
    image: PathBuf,
    scale: Option<f64>,
    types: Vec<String>,
    params: InferParams,
    out: Option<PathBuf>,
    pretty: bool,
}

async fn analyze(cfg: &Config, args: AnalyzeArgs) -> Result<()> {
    let primary = build_source(&cfg.source).context("build primary source")?;
    let secondary = match &cfg.secondary {
        Some(s) => Some(build_source(s).context("build secondary source")?),
        None => None,
    };
    let acfg = AnalyzerConfig::from_sources(&cfg.source, cfg.secondary.as_ref(), &cfg.analysis);
    let analyzer = Analyzer::new(acfg, primary, secondary);

    let data = tokio::fs::read(&args.image)
        .await
        .with_context(|| format!("read image {}", args.image.display()))?;

    let max_dimension = analyzer.config().max_dimension;
    let image = tokio::task::spawn_blocking(move || prepare_image(Bytes::from(data), max_dimension))
        .await
        .context("image preparation task")??;
    if image.resized() {
        info!(
            "analyze: resized {}x{} -> {}x{}",
            image.original_width, image.original_height, image.width, image.height
        );
    }

    let categories = Category::from_request_types(&args.types);
    if categories.is_empty() {
        warn!("analyze: none of the requested types {:?} is known", args.types);
    }

    let mut req = AnalysisRequest::new(image);
    req.scale = args.scale;
    req.params = args.params;
    req.categories = categories;

    let result = analyzer.analyze(req).await;
    for (category, msg) in result.errors() {
        warn!("analyze: {} unavailable: {}", category, msg);
    }

    let json = if args.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    match args.out {
        Some(path) => {
            tokio::fs::write(&path, json)
                .await
                .with_context(|| format!("write report {}", path.display()))?;
            info!("analyze: report written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    analysis_doctor::check_settings(&cfg.analysis)?;
    source_doctor::check_source("source", &cfg.source)?;
    let missing = source_doctor::unconfigured_models("source", &cfg.source);
    anyhow::ensure!(missing.len() < Category::ALL.len(), "source has no usable model for any category");

    if let Some(sec) = &cfg.secondary {
        source_doctor::check_source("secondary", sec)?;
        source_doctor::unconfigured_models("secondary", sec);
    }

    info!("doctor: OK");
    Ok(())
}

/// One line per category (primary model, key presence, secondary model), then the analysis settings.
fn config_report(cfg: &Config) -> Vec<String> {
    let mut lines = Vec::new();
    for c in Category::ALL {
        let primary = match cfg.source.model_ref(c) {
            Some(m) => format!("{} has_api_key={}", m.model_id, m.api_key.is_some()),
            None => "NOT CONFIGURED".to_string(),
        };
        let secondary = cfg
            .secondary
            .as_ref()
            .and_then(|sec| sec.model_ref(c))
            .map(|m| m.model_id)
            .unwrap_or_else(|| "none".to_string());
        lines.push(format!("{}: {} secondary={}", c, primary, secondary));
    }
    lines.push(format!(
        "analysis: iou_threshold={} reference_dpi={} max_dimension={} deadline_ms={:?}",
        cfg.analysis.iou_threshold, cfg.analysis.reference_dpi, cfg.analysis.max_dimension, cfg.analysis.deadline_ms
    ));
    lines
}
