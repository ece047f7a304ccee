use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use taskwarden::cli::{Cli, Commands, ConfigAction};
use taskwarden::config::{ProjectPaths, WardenConfig};
use taskwarden::crash::CrashPoller;
use taskwarden::error::{Result, WardenError};
use taskwarden::recovery::{partition, BatchEngine, BatchKind, TaskFix};
use taskwarden::tasks::TaskStore;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("taskwarden=debug")
    } else {
        EnvFilter::new("taskwarden=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let root = match cli.project {
        Some(root) => root,
        None => find_project_root()?,
    };
    let paths = ProjectPaths::new(root);

    match cli.command {
        Commands::Init => cmd_init(&paths).await,
        Commands::Batches => cmd_batches(&paths).await,
        Commands::Process {
            batch_type,
            task_ids,
            feedback,
        } => cmd_process(&paths, &batch_type, task_ids, feedback).await,
        Commands::Recover { task_id, restart } => cmd_recover(&paths, &task_id, restart).await,
        Commands::Watch => cmd_watch(&paths).await,
        Commands::Status => cmd_status(&paths).await,
        Commands::Config { action } => cmd_config(&paths, action).await,
    }
}

fn find_project_root() -> Result<PathBuf> {
    let current = std::env::current_dir()?;

    let mut path = current.as_path();
    loop {
        if path.join(".warden").is_dir() || path.join(".git").exists() {
            return Ok(path.to_path_buf());
        }
        path = path
            .parent()
            .ok_or_else(|| WardenError::ProjectRootNotFound(current.display().to_string()))?;
    }
}

fn ensure_initialized(paths: &ProjectPaths) -> Result<()> {
    if !paths.warden_dir.exists() {
        return Err(WardenError::NotInitialized);
    }
    Ok(())
}

async fn engine(paths: &ProjectPaths) -> Result<BatchEngine> {
    ensure_initialized(paths)?;
    let config = WardenConfig::load(&paths.warden_dir).await?;
    let store = TaskStore::new(paths.clone());
    store.init().await?;
    Ok(BatchEngine::new(store, config.recovery))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn cmd_init(paths: &ProjectPaths) -> Result<()> {
    if paths.warden_dir.exists() {
        println!("taskwarden is already initialized in this project.");
        return Ok(());
    }

    paths.ensure_dirs().await?;
    WardenConfig::default().save(&paths.warden_dir).await?;

    println!("Initialized taskwarden.");
    println!(
        "Configuration: {}",
        paths.warden_dir.join("config.toml").display()
    );
    println!("Tasks: {}", paths.tasks_dir.display());
    Ok(())
}

async fn cmd_batches(paths: &ProjectPaths) -> Result<()> {
    let engine = engine(paths).await?;
    print_json(&engine.list_review_batches().await?)
}

async fn cmd_process(
    paths: &ProjectPaths,
    batch_type: &str,
    task_ids: Vec<String>,
    feedback: Option<String>,
) -> Result<()> {
    let engine = engine(paths).await?;
    let kind: BatchKind = batch_type.parse()?;

    // No explicit ids means every task currently in that batch.
    let task_ids = if task_ids.is_empty() {
        let listing = engine.list_review_batches().await?;
        listing
            .batches
            .into_iter()
            .filter(|b| b.kind == kind)
            .flat_map(|b| b.tasks.into_iter().map(|t| t.task_id))
            .collect()
    } else {
        task_ids
    };

    let fixes: Vec<TaskFix> = task_ids
        .into_iter()
        .map(|task_id| TaskFix {
            task_id,
            feedback: feedback.clone(),
        })
        .collect();

    print_json(&engine.process_batch(kind, &fixes).await?)
}

async fn cmd_recover(paths: &ProjectPaths, task_id: &str, restart: bool) -> Result<()> {
    let engine = engine(paths).await?;
    print_json(&engine.recover_stuck_task(task_id, restart).await?)
}

async fn cmd_watch(paths: &ProjectPaths) -> Result<()> {
    ensure_initialized(paths)?;
    let config = WardenConfig::load(&paths.warden_dir).await?;
    if !config.crash.enabled {
        return Err(WardenError::Config(
            "crash polling is disabled in the configuration".to_string(),
        ));
    }

    let poller = CrashPoller::new(
        paths.crash_file(),
        Duration::from_secs(config.crash.poll_interval_secs),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move { poller.run(shutdown_rx).await });

    tokio::signal::ctrl_c().await?;
    let _ = shutdown_tx.send(true);
    let _ = handle.await;
    Ok(())
}

async fn cmd_status(paths: &ProjectPaths) -> Result<()> {
    let engine = engine(paths).await?;
    let tasks = engine.store().review_pending().await?;
    let batches = partition(&tasks);

    #[derive(serde::Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Status {
        total_tasks_in_human_review: usize,
        batches: Vec<taskwarden::recovery::ReviewBatch>,
    }

    print_json(&Status {
        total_tasks_in_human_review: tasks.len(),
        batches,
    })
}

async fn cmd_config(paths: &ProjectPaths, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            ensure_initialized(paths)?;
            let config = WardenConfig::load(&paths.warden_dir).await?;
            let content =
                toml::to_string_pretty(&config).map_err(|e| WardenError::Config(e.to_string()))?;
            print!("{}", content);
        }
        ConfigAction::Path => {
            println!("{}", paths.warden_dir.join("config.toml").display());
        }
    }
    Ok(())
}
