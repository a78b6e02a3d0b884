//! Submeter - credit-metered subtitle translation service
//!
//! Entry point for the HTTP API and the operator commands that manage
//! accounts, run one-off translations and settle pending refunds.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use submeter::api::{build_router, AppState};
use submeter::cli::{Args, Commands, CreditsAction};
use submeter::config::Config;
use submeter::ledger::{CreditLedger, MemoryLedger};
use submeter::workflow::{TranslateUpload, UploadedFile, Workflow};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Init-config must work without a valid config in place
    if let Commands::InitConfig { path, force } = &args.command {
        return init_config(path, *force);
    }

    let config = load_config(args.config.as_deref())?;

    // Setup logging to both console and file
    setup_logging(args.verbose, &config.logging.directory)?;

    let ledger: Arc<dyn CreditLedger> = Arc::new(MemoryLedger::from_config(&config.ledger).await?);

    match args.command {
        Commands::Serve { host, port } => {
            let mut config = config;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config, ledger).await?;
        }
        Commands::Translate {
            input,
            output,
            target_lang,
            source_lang,
            user,
        } => {
            info!("Translating subtitles: {}", input.display());

            let bytes = tokio::fs::read(&input)
                .await
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let file_name = input
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default();

            let workflow = Workflow::from_config(&config, ledger.clone());
            let outcome = workflow
                .translate_upload(TranslateUpload {
                    user_id: Some(user.clone()),
                    file: Some(UploadedFile {
                        name: file_name,
                        bytes,
                    }),
                    target_language: Some(target_lang),
                    source_language: source_lang,
                })
                .await?;

            let output = output.unwrap_or_else(|| {
                input
                    .parent()
                    .unwrap_or_else(|| Path::new("."))
                    .join(&outcome.translated_file_name)
            });
            tokio::fs::write(&output, &outcome.translated_content)
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;

            println!(
                "Translated {} entries in {}ms, charged {} credits",
                outcome.subtitle_count, outcome.processing_time_ms, outcome.credits_used
            );
            println!("Output: {}", output.display());
            println!("Remaining balance: {}", ledger.balance(&user).await?);
        }
        Commands::Credits { action } => run_credits(action, ledger.as_ref()).await?,
        Commands::Reconcile => {
            let workflow = Workflow::from_config(&config, ledger.clone());
            let report = workflow.reconcile_refunds().await?;
            println!("Settled {} refund(s), {} still pending", report.settled, report.failed);
        }
        Commands::InitConfig { path, force } => init_config(&path, force)?,
    }

    Ok(())
}

/// Load the configuration file (explicit path, else ./config.toml, else defaults)
fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            // Try to load config.toml from current directory first
            if Path::new("config.toml").exists() {
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };

    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists, use --force to overwrite", path.display());
    }

    Config::default().save_to_file(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

async fn serve(config: Config, ledger: Arc<dyn CreditLedger>) -> Result<()> {
    let workflow = Arc::new(Workflow::from_config(&config, ledger.clone()));

    if config.server.admin_token.is_none() {
        warn!("No admin token configured, admin API is disabled");
    }

    if config.billing.reconcile_interval_secs > 0 {
        let workflow = workflow.clone();
        let period = Duration::from_secs(config.billing.reconcile_interval_secs);
        tokio::spawn(async move {
            info!("Starting refund reconciliation every {}s", period.as_secs());
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately
            interval.tick().await;

            loop {
                interval.tick().await;
                if let Err(e) = workflow.reconcile_refunds().await {
                    error!("Refund reconciliation failed: {}", e);
                }
            }
        });
    }

    let state = AppState::new(workflow, ledger, config.server.admin_token.clone());
    let app = build_router(state, config.server.max_upload_bytes);

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!("Submeter listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn run_credits(action: CreditsAction, ledger: &dyn CreditLedger) -> Result<()> {
    match action {
        CreditsAction::Open { user, initial } => {
            let account = ledger.open_account(&user, initial).await?;
            println!("Opened account {} with {} credits", account.user_id, account.balance);
        }
        CreditsAction::Grant { user, amount, reason } => {
            let tx = ledger
                .credit(&user, amount, reason.as_deref().unwrap_or("Admin grant"))
                .await?;
            println!("Granted {} credits to {}, balance {}", tx.amount, user, tx.balance_after);
        }
        CreditsAction::Remove { user, amount, reason } => {
            let tx = ledger
                .remove(&user, amount, reason.as_deref().unwrap_or("Admin removal"))
                .await?;
            println!("Removed {} credits from {}, balance {}", tx.amount, user, tx.balance_after);
        }
        CreditsAction::Balance { user } => {
            println!("{}: {}", user, ledger.balance(&user).await?);
        }
        CreditsAction::History { user, limit } => {
            let transactions = ledger.transactions(&user, 0, limit).await?;
            if transactions.is_empty() {
                println!("No transactions for {}", user);
                return Ok(());
            }

            println!("{:<26} {:<8} {:>10} {:>10}  {}", "When", "Type", "Amount", "Balance", "Reason");
            println!("{}", "-".repeat(80));
            for tx in transactions {
                println!(
                    "{:<26} {:<8} {:>10} {:>10}  {}",
                    tx.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                    format!("{:?}", tx.transaction_type).to_lowercase(),
                    tx.amount,
                    tx.balance_after,
                    tx.reason.unwrap_or_default()
                );
            }
        }
    }

    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool, log_dir: &Path) -> Result<()> {
    let log_dir: PathBuf = if log_dir.is_absolute() {
        log_dir.to_path_buf()
    } else {
        std::env::current_dir()?.join(log_dir)
    };
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "submeter.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("submeter.log").display()
    );

    Ok(())
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}
