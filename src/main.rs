use anyhow::Context;
use basketx_api::RestApi;
use basketx_core::{
    read_transactions_file, CoOccurrenceWeight, MinerConfig, MiningStrategy, ModelRegistry,
    ModelSnapshot, RuleMetric, TrainingConfig, TrainingPipeline,
};
use basketx_drift::{stage_snapshot, DriftConfig, DriftGate, SnapshotSlot, DEFAULT_SIGNAL_FILE};
use basketx_storage::ArtifactStore;
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Retail product recommender with drift-gated retraining
#[derive(Parser, Debug)]
#[command(name = "basketx")]
#[command(about = "Product recommendations from transaction history", long_about = None)]
struct Cli {
    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve recommendations over HTTP
    Serve(ServeArgs),
    /// Train both models from a transaction CSV and save them
    Train(TrainArgs),
    /// Compare two snapshots and write the retrain signal
    Drift(DriftArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Path to the data directory
    #[arg(short, long, default_value = "./data")]
    data_dir: PathBuf,

    /// HTTP API port
    #[arg(long, default_value_t = 6333)]
    http_port: u16,
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Transaction CSV
    #[arg(short, long)]
    input: PathBuf,

    /// Path to the data directory
    #[arg(short, long, default_value = "./data")]
    data_dir: PathBuf,

    /// apriori or fp-growth
    #[arg(long, default_value = "fp-growth")]
    strategy: MiningStrategy,

    #[arg(long, default_value_t = 0.01)]
    min_support: f64,

    /// support, confidence, lift, leverage or conviction
    #[arg(long, default_value = "lift")]
    metric: RuleMetric,

    #[arg(long, default_value_t = 1.0)]
    min_threshold: f64,

    /// Longest itemset to mine
    #[arg(long)]
    max_len: Option<usize>,

    /// What a co-occurrence cell counts: lines or quantity
    #[arg(long, default_value = "lines")]
    weight: CoOccurrenceWeight,
}

#[derive(Args, Debug)]
struct DriftArgs {
    /// Reference snapshot CSV
    #[arg(long)]
    reference: PathBuf,

    /// Current snapshot CSV
    #[arg(long)]
    current: PathBuf,

    /// Where the result token is written
    #[arg(long, default_value = DEFAULT_SIGNAL_FILE)]
    signal_file: PathBuf,

    /// Fresh extraction to stage before comparing
    #[arg(long)]
    stage: Option<PathBuf>,

    /// Columns left out of the comparison
    #[arg(long = "exclude", default_value = "Outcome")]
    excluded_columns: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Train(args) => train(args),
        Command::Drift(args) => drift(args),
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    info!("Starting basketx v{}", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {:?}", args.data_dir);
    info!("HTTP API port: {}", args.http_port);

    let store = Arc::new(ArtifactStore::new(&args.data_dir)?);
    let snapshot = if store.exists() {
        store.load().context("failed to load model artifacts")?
    } else {
        warn!("No trained models in {:?}, serving empty models until reload", args.data_dir);
        ModelSnapshot::default()
    };
    let registry = Arc::new(ModelRegistry::new(snapshot));

    let http_port = args.http_port;
    let http_handle = std::thread::spawn(move || {
        info!("Starting HTTP server on port {}", http_port);
        let sys = actix_web::rt::System::new();
        sys.block_on(async {
            if let Err(e) = RestApi::start(registry, Some(store), http_port).await {
                tracing::error!("HTTP server error: {}", e);
            }
        })
    });

    info!("HTTP API: http://localhost:{}/", args.http_port);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        _ = tokio::task::spawn_blocking(move || {
            http_handle.join().ok();
        }) => {
            info!("HTTP server stopped");
        }
    }

    info!("Shutting down...");
    Ok(())
}

fn train(args: TrainArgs) -> anyhow::Result<()> {
    let rows = read_transactions_file(&args.input)
        .with_context(|| format!("failed to read transactions from {:?}", args.input))?;
    info!("Read {} transaction rows from {:?}", rows.len(), args.input);

    let config = TrainingConfig::default().with_weight(args.weight).with_miner(
        MinerConfig::default()
            .with_strategy(args.strategy)
            .with_min_support(args.min_support)
            .with_metric(args.metric, args.min_threshold)
            .with_max_len(args.max_len),
    );
    let models = TrainingPipeline::new(config).train(&rows)?;

    let store = ArtifactStore::new(&args.data_dir)?;
    let manifest = store.save(&models)?;
    info!("Saved models to {:?}", store.dir());
    println!("{}", serde_json::to_string_pretty(&manifest)?);
    Ok(())
}

fn drift(args: DriftArgs) -> anyhow::Result<()> {
    if let Some(source) = &args.stage {
        let file = File::open(source)
            .with_context(|| format!("failed to open extraction {:?}", source))?;
        match stage_snapshot(file, &args.reference, &args.current)? {
            SnapshotSlot::Reference => info!("Staged {:?} as the reference snapshot", source),
            SnapshotSlot::Current => info!("Staged {:?} as the current snapshot", source),
        }
    }

    let gate = DriftGate::new(DriftConfig::default().with_excluded_columns(args.excluded_columns));
    let decision = gate
        .check_and_signal(&args.reference, &args.current, &args.signal_file)
        .with_context(|| format!("failed to write signal file {:?}", args.signal_file))?;

    println!("{}", decision.token());
    Ok(())
}
