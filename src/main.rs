use anyhow::{bail, Context};
use clap::{Args as ClapArgs, Parser, Subcommand};
use pricegate::pipeline;
use pricegate::prelude::*;
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Similarity-gated price estimation for handcrafted goods
#[derive(Parser, Debug)]
#[command(name = "pricegate")]
#[command(version, about = "Similarity-gated price estimation", long_about = None)]
struct Args {
    /// Log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a model and store the artifact pair
    Train {
        /// Training table (.csv, .tsv, .jsonl, .ndjson, .xlsx, .xls)
        #[arg(long)]
        data: PathBuf,

        /// Output artifact directory
        #[arg(long)]
        out: PathBuf,

        /// Pipeline configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Price query records with a stored artifact pair
    Predict(PredictArgs),
    /// Print the manifest of an artifact pair
    Inspect {
        #[arg(long)]
        artifacts: PathBuf,
    },
}

#[derive(ClapArgs, Debug)]
struct PredictArgs {
    #[arg(long)]
    artifacts: PathBuf,

    /// Query table, one record per row
    #[arg(long, conflicts_with = "record", required_unless_present = "record")]
    input: Option<PathBuf>,

    /// A single query record as a JSON object
    #[arg(long)]
    record: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Train { data, out, config } => train(data, out, config),
        Command::Predict(predict_args) => predict(predict_args),
        Command::Inspect { artifacts } => inspect(artifacts),
    }
}

fn train(data: PathBuf, out: PathBuf, config: Option<PathBuf>) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => PipelineConfig::from_file(&path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    info!("Starting pricegate v{}", env!("CARGO_PKG_VERSION"));
    let report = pipeline::train_from_path(&data, &out, &config)?;

    let summary = json!({
        "records": report.n_records,
        "pair_id": report.manifest.pair_id,
        "artifacts": out,
        "metrics": report.metrics,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn predict(args: PredictArgs) -> anyhow::Result<()> {
    let store = ArtifactStore::new(&args.artifacts);
    let loaded = store.load()?;
    let config = loaded.manifest.config.clone();
    let gate = loaded.gate();
    let predictor = loaded.into_predictor(gate)?;

    let queries = match (&args.input, &args.record) {
        (Some(path), _) => pipeline::load_queries(path, &config)?,
        (None, Some(raw)) => {
            let record: Record = serde_json::from_str(raw).context("parsing --record")?;
            vec![record]
        }
        (None, None) => bail!("either --input or --record is required"),
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for result in predictor.predict_batch(&queries) {
        let line = match result {
            Ok(prediction) => json!({
                "price": prediction.price,
                "decision": prediction.decision,
            }),
            Err(Error::InsufficientSimilarity(decision)) => json!({
                "error": "insufficient_similarity",
                "decision": decision,
            }),
            Err(e) => return Err(e.into()),
        };
        writeln!(out, "{line}")?;
    }
    Ok(())
}

fn inspect(artifacts: PathBuf) -> anyhow::Result<()> {
    let manifest = ArtifactStore::new(&artifacts).read_manifest()?;
    println!("{}", serde_json::to_string_pretty(&manifest)?);
    Ok(())
}
