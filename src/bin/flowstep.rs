//! flowstep CLI - run a record transform stage locally or as a JetStream worker

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use flowstep::{
    run_pool, InMemoryHost, JetStreamHost, MemoryRecord, NatsClient, RecordEnvelope, StageConfig,
    TransformRegistry, WorkerConfig,
};
use tracing_subscriber::EnvFilter;

/// Attribute holding the file name of a record read from disk
const FILENAME_ATTRIBUTE: &str = "filename";

#[derive(Parser)]
#[command(name = "flowstep")]
#[command(version, about = "Decode, transform and re-encode flow records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured stage over local files
    Apply {
        /// Path to the stage configuration file
        #[arg(short, long, default_value = "flowstep.yaml")]
        config: PathBuf,

        /// Directory for transformed records
        #[arg(short, long)]
        output: PathBuf,

        /// Directory for records that failed (original content)
        #[arg(short, long)]
        failed: Option<PathBuf>,

        /// Input files, one record each
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Validate a configuration file without processing anything
    Validate {
        /// Path to the stage configuration file
        #[arg(short, long, default_value = "flowstep.yaml")]
        config: PathBuf,
    },

    /// List the built-in transforms
    Transforms,

    /// Consume records from NATS JetStream until Ctrl-C
    Worker {
        /// Path to the stage configuration file
        #[arg(short, long, default_value = "flowstep.yaml")]
        config: PathBuf,
    },

    /// Publish files as records to the NATS ingest subject
    Publish {
        /// Path to the stage configuration file
        #[arg(short, long, default_value = "flowstep.yaml")]
        config: PathBuf,

        /// Input files, one record each
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Apply { config, output, failed, files } => {
            apply(config, output, failed, files)
        }
        Commands::Validate { config } => validate_config(config),
        Commands::Transforms => list_transforms(),
        Commands::Worker { config } => run_jetstream_worker(config),
        Commands::Publish { config, files } => publish(config, files),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn load_config(path: &Path) -> Result<StageConfig, String> {
    StageConfig::load_from_file(path).map_err(|e| e.to_string())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Write records to a directory, named after their source file
fn write_records(dir: &Path, records: &[MemoryRecord]) -> Result<(), String> {
    fs::create_dir_all(dir)
        .map_err(|e| format!("Failed to create directory {}: {}", dir.display(), e))?;

    for record in records {
        let name = record
            .attributes
            .get(FILENAME_ATTRIBUTE)
            .cloned()
            .unwrap_or_else(|| format!("{}.out", record.id));
        let path = dir.join(name);
        fs::write(&path, &record.content)
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
    }
    Ok(())
}

/// Run the configured stage over local files through the in-memory host
fn apply(
    config: PathBuf,
    output: PathBuf,
    failed: Option<PathBuf>,
    files: Vec<PathBuf>,
) -> Result<(), String> {
    let config = load_config(&config)?;
    let stage = config
        .build_stage(&TransformRegistry::with_builtins())
        .map_err(|e| e.to_string())?;

    let host = InMemoryHost::new();
    for path in &files {
        let content = fs::read(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        host.enqueue_record(
            MemoryRecord::new(content).with_attribute(FILENAME_ATTRIBUTE, file_name(path)),
        );
    }

    let shutdown = AtomicBool::new(false);
    let stats = run_pool(
        &stage,
        &host,
        &WorkerConfig::drain(config.worker.threads),
        &shutdown,
    );

    let succeeded = host.succeeded();
    write_records(&output, &succeeded)?;
    println!("  ✓ {} record(s) written to {}", succeeded.len(), output.display());

    let failures = host.failed();
    if let Some(dir) = failed {
        write_records(&dir, &failures)?;
        println!("  ✓ {} failed record(s) written to {}", failures.len(), dir.display());
    }

    if stats.failed > 0 {
        let names: Vec<String> = failures
            .iter()
            .filter_map(|r| r.attributes.get(FILENAME_ATTRIBUTE).cloned())
            .collect();
        return Err(format!("{} record(s) failed: {}", stats.failed, names.join(", ")));
    }

    println!("✅ {} record(s) processed", stats.processed);
    Ok(())
}

/// Load and build the stage without processing anything
fn validate_config(config: PathBuf) -> Result<(), String> {
    println!("🔍 Validating {}...", config.display());

    let stage_config = load_config(&config)?;
    let chain = stage_config
        .build_chain(&TransformRegistry::with_builtins())
        .map_err(|e| e.to_string())?;

    println!("  ✓ {} transform(s): {}", chain.len(), chain.step_names().join(", "));
    println!("  ✓ NATS stream '{}' on {}", stage_config.nats.stream_name, stage_config.nats.url);
    println!("✅ Configuration is valid!");

    Ok(())
}

fn list_transforms() -> Result<(), String> {
    for name in TransformRegistry::with_builtins().list_transforms() {
        println!("{}", name);
    }
    Ok(())
}

fn build_runtime() -> Result<tokio::runtime::Runtime, String> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start async runtime: {}", e))
}

/// Run the worker pool against JetStream until Ctrl-C
fn run_jetstream_worker(config: PathBuf) -> Result<(), String> {
    let config = load_config(&config)?;
    let stage = config
        .build_stage(&TransformRegistry::with_builtins())
        .map_err(|e| e.to_string())?;

    let runtime = build_runtime()?;
    let (client, consumer) = runtime.block_on(async {
        let client = NatsClient::connect(config.nats.clone()).await?;
        let consumer = client.pull_consumer().await?;
        Ok::<_, async_nats::Error>((client, consumer))
    })
    .map_err(|e| format!("Failed to connect to NATS: {}", e))?;

    let host = JetStreamHost::new(runtime.handle().clone(), &client, consumer);

    let shutdown = Arc::new(AtomicBool::new(false));
    let signal = shutdown.clone();
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested, finishing in-flight records");
            signal.store(true, Ordering::Relaxed);
        }
    });

    tracing::info!(
        "Worker ready - consuming from stream '{}' with consumer '{}' (connected: {})",
        config.nats.stream_name,
        config.nats.consumer,
        client.is_connected()
    );

    let stats = run_pool(&stage, &host, &config.worker.worker_config(), &shutdown);
    println!(
        "  ✓ {} processed, {} succeeded, {} failed",
        stats.processed, stats.succeeded, stats.failed
    );
    Ok(())
}

/// Publish files as record envelopes
fn publish(config: PathBuf, files: Vec<PathBuf>) -> Result<(), String> {
    let config = load_config(&config)?;
    let runtime = build_runtime()?;

    runtime.block_on(async {
        let client = NatsClient::connect(config.nats.clone())
            .await
            .map_err(|e| format!("Failed to connect to NATS: {}", e))?;

        for path in &files {
            let body = fs::read_to_string(path)
                .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
            let mut envelope = RecordEnvelope::new(body, Some(path.display().to_string()));
            envelope
                .attributes
                .insert(FILENAME_ATTRIBUTE.to_string(), file_name(path));

            client
                .publish_record(&envelope)
                .await
                .map_err(|e| format!("Failed to publish {}: {}", path.display(), e))?;
            println!("  ✓ {} → {}", path.display(), envelope.record_id);
        }

        Ok::<(), String>(())
    })?;

    println!("✅ Published {} record(s) to {}", files.len(), config.nats.ingest_subject());
    Ok(())
}
