use anyhow::{Context, Result};
use clap::Parser;
use sir_scan::cli::{self, Cli, Commands};
use sir_scan::config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Derive {
            vault_id,
            deployer,
            bytecode_hash,
            proxy,
        } => {
            init_logging_simple();
            let config = cli::load_config(&cli)?;
            cli::run_derive(
                &config,
                vault_id,
                deployer.as_deref(),
                bytecode_hash.as_deref(),
                *proxy,
            )?;
        }
        Commands::DeriveRange { from, to } => {
            init_logging_simple();
            let config = cli::load_config(&cli)?;
            cli::run_derive_range(&config, *from, *to)?;
        }
        Commands::Vaults => {
            init_logging_simple();
            let config = cli::load_config(&cli)?;
            cli::run_vaults(&config)
                .await
                .with_context(|| format!("vault count query against {} failed", config.rpc.url))?;
        }
        Commands::Scan { owner, json, .. } => {
            let config = cli::load_config(&cli)?;
            let _guard = init_logging(&config.logging);
            cli::run_scan(&config, owner, *json)
                .await
                .with_context(|| format!("position scan for {} failed", owner))?;
        }
    }

    Ok(())
}

/// Console logging (text or JSON) plus an optional daily-rotated file.
///
/// The returned guard flushes the file writer on drop.
fn init_logging(logging: &LoggingConfig) -> Option<WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{Layer, Registry};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,sir_scan={}", logging.level)));

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    // Console layer
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);
    if logging.json {
        layers.push(console_layer.json().boxed());
    } else {
        layers.push(console_layer.boxed());
    }

    let mut guard = None;
    if let Some(log_dir) = &logging.dir {
        // The builder reports an unwritable directory instead of panicking.
        match tracing_appender::rolling::RollingFileAppender::builder()
            .rotation(tracing_appender::rolling::Rotation::DAILY)
            .filename_prefix("sir-scan")
            .filename_suffix("log")
            .build(log_dir)
        {
            Ok(file_appender) => {
                let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);
                guard = Some(file_guard);
                layers.push(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false) // No color codes in file
                        .with_target(true)
                        .boxed(),
                );
                eprintln!("Logging to: {}/sir-scan.*.log", log_dir);
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not write to log directory {} ({}), file logging disabled",
                    log_dir, e
                );
            }
        }
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .init();

    guard
}

fn init_logging_simple() {
    // Minimal logging for one-shot commands
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::WARN)
        .try_init();
}
