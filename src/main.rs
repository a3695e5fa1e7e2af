use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use kam_action_center::config::Config;
use kam_action_center::notify::LogSink;
use kam_action_center::queue::DebriefQueue;
use kam_action_center::remote::{Disconnected, RemoteDataService};
use kam_action_center::signals::SignalAggregator;
use kam_action_center::storage::FileStore;
use kam_action_center::{db, report};

#[derive(Parser)]
#[command(name = "kam-action-center")]
#[command(about = "Action center signals and offline debrief queue for key account managers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import HCPs from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print the ranked action center signals
    Signals {
        #[arg(long, default_value_t = 5)]
        limit: usize,
        /// Print the signals as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown action center report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Work with the offline debrief queue
    Queue {
        #[command(subcommand)]
        command: QueueCommand,
    },
}

#[derive(Subcommand)]
enum QueueCommand {
    /// Queue a debrief, submitting it right away unless --offline is set
    Enqueue {
        #[arg(long)]
        meeting: String,
        /// Debrief payload as JSON
        #[arg(long)]
        data: String,
        #[arg(long)]
        offline: bool,
    },
    /// Submit every pending debrief
    Drain,
    /// Move failed debriefs back to pending and submit them
    Retry,
    /// Show queued debriefs
    List,
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    let database_url = config
        .require_database_url()
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&config).await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let pool = connect(&config).await?;
            let written = db::import_hcps_csv(&pool, &csv).await?;
            println!("Imported {written} HCPs from {}.", csv.display());
        }
        Commands::Signals { limit, json } => {
            let pool = connect(&config).await?;
            let aggregator = SignalAggregator::new(Arc::new(db::PgCrm::new(pool)), Arc::new(LogSink));
            let signals = aggregator.compute_signals().await;

            if json {
                let top: Vec<_> = signals.iter().take(limit).collect();
                println!("{}", serde_json::to_string_pretty(&top)?);
                return Ok(());
            }

            println!("Action center:");
            for signal in signals.iter().take(limit) {
                println!("- {}", report::signal_line(signal));
            }
        }
        Commands::Report { out } => {
            let pool = connect(&config).await?;
            let aggregator = SignalAggregator::new(Arc::new(db::PgCrm::new(pool)), Arc::new(LogSink));
            let today = chrono::Utc::now().date_naive();
            let signals = aggregator.compute_signals_as_of(today).await;
            let report = report::build_report(today, &signals);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Queue { command } => run_queue(&config, command).await?,
    }

    Ok(())
}

async fn run_queue(config: &Config, command: QueueCommand) -> anyhow::Result<()> {
    let store = Arc::new(FileStore::new(&config.queue_dir));

    let stays_offline = matches!(
        command,
        QueueCommand::List | QueueCommand::Enqueue { offline: true, .. }
    );
    let pool = if stays_offline {
        None
    } else {
        match connect(config).await {
            Ok(pool) => Some(pool),
            Err(err) => {
                log::warn!("working offline: {err:#}");
                None
            }
        }
    };
    let online = pool.is_some();
    let remote: Arc<dyn RemoteDataService> = match pool {
        Some(pool) => Arc::new(db::PgCrm::new(pool)),
        None => Arc::new(Disconnected),
    };

    let queue = DebriefQueue::open(store, remote, Arc::new(LogSink), config.queue.clone(), online);

    match command {
        QueueCommand::Enqueue { meeting, data, .. } => {
            let payload: serde_json::Value =
                serde_json::from_str(&data).context("--data must be valid JSON")?;
            let record = queue.enqueue(meeting, payload).await;
            println!("Queued {}.", record.id);
        }
        QueueCommand::Drain => {
            if !online {
                println!("Offline: nothing submitted.");
            }
            queue.drain().await;
        }
        QueueCommand::Retry => queue.retry_failed().await,
        QueueCommand::List => {
            print_queue(&queue);
            return Ok(());
        }
    }

    let cleared = queue.clear_submitted();
    if cleared > 0 {
        println!("Submitted {cleared} debriefs.");
    }
    print_queue(&queue);
    Ok(())
}

fn print_queue(queue: &DebriefQueue) {
    let records = queue.records();
    if records.is_empty() {
        println!("Queue is empty.");
        return;
    }
    println!("{} outstanding of {} queued:", queue.pending_count(), records.len());
    for record in &records {
        println!("- {}", report::queue_line(record));
    }
}
