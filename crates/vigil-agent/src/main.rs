#![forbid(unsafe_code)]

use clap::Parser;
use std::env;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{error, info, Subscriber};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use vigil_agent::{AgentConfig, CycleOrchestrator, ServiceContext, StateStore, DEFAULT_CONFIG_PATH};
use vigil_core::{AuditError, ExitCode};
use vigil_store::{AlertSink, ObjectStore, RenterdBackend};

#[derive(Debug, Parser)]
#[command(name = "vigil", version, about = "Integrity auditing agent for a renterd object store")]
struct Cli {
    /// YAML configuration file. A missing file means defaults.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Wipe the remote dataset and the state file before the first cycle.
    #[arg(long)]
    clean_start: bool,
    /// Print the effective configuration as JSON and exit.
    #[arg(long)]
    print_config: bool,
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {},
                    _ = sigint.recv() => {},
                }
                return;
            }
            (Err(e), _) | (_, Err(e)) => {
                error!(error = %e, "failed to register signal handlers, falling back to ctrl-c");
            }
        }
    }
    let _ = tokio::signal::ctrl_c().await;
}

fn json_file_layer<S>(file: Option<std::fs::File>) -> Option<impl Layer<S>>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    file.map(|f| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(Mutex::new(f))
    })
}

fn init_tracing(log_file: Option<&Path>) -> Result<(), AuditError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file = log_file
        .map(|path| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    AuditError::local_io(format!(
                        "failed to open log file at '{}': {e}",
                        path.display()
                    ))
                })
        })
        .transpose()?;
    if env_bool("VIGIL_LOG_JSON", false) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .with(json_file_layer(file))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .with(json_file_layer(file))
            .init();
    }
    Ok(())
}

fn redacted(config: &AgentConfig) -> AgentConfig {
    let mut shown = config.clone();
    for secret in [&mut shown.bus_password, &mut shown.worker_password] {
        if !secret.is_empty() {
            *secret = "********".to_string();
        }
    }
    shown
}

fn exit(code: ExitCode) -> std::process::ExitCode {
    std::process::ExitCode::from(code as u8)
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version land here too
            return if e.use_stderr() {
                exit(ExitCode::Usage)
            } else {
                exit(ExitCode::Success)
            };
        }
    };

    let mut config = match AgentConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("vigil: {e}");
            return exit(ExitCode::Validation);
        }
    };
    if cli.clean_start {
        config.clean_start = true;
    }
    if cli.print_config {
        return match serde_json::to_string_pretty(&redacted(&config)) {
            Ok(json) => {
                println!("{json}");
                exit(ExitCode::Success)
            }
            Err(e) => {
                eprintln!("vigil: failed to encode config: {e}");
                exit(ExitCode::Internal)
            }
        };
    }
    if let Err(e) = init_tracing(config.log_file()) {
        eprintln!("vigil: {e}");
        return exit(ExitCode::Validation);
    }

    match run(config).await {
        Ok(()) => exit(ExitCode::Success),
        Err(code) => exit(code),
    }
}

async fn run(config: AgentConfig) -> Result<(), ExitCode> {
    let backend = RenterdBackend::new(config.endpoints()).map_err(|e| {
        error!(error = %e, "failed to build renterd client");
        ExitCode::Internal
    })?;
    let backend = Arc::new(backend);
    let store: Arc<dyn ObjectStore> = backend.clone();
    let alerts: Arc<dyn AlertSink> = backend;

    let state_store = StateStore::new(config.state_file.clone());
    let clean_start = config.clean_start;
    let ctx = ServiceContext::new(store, alerts, config);

    if let Err(e) = ctx
        .bounded(None, "checking store connectivity", ctx.store.ping())
        .await
    {
        error!(
            error = %e,
            backend = ctx.store.backend_tag(),
            bus = %ctx.config.bus_address,
            "store is unreachable"
        );
        return Err(ExitCode::DependencyFailure);
    }
    let mut orchestrator = CycleOrchestrator::new(ctx, state_store)
        .await
        .map_err(|e| {
            error!(error = %e, "failed to load state");
            ExitCode::Validation
        })?;
    if clean_start {
        orchestrator.clean_start().await.map_err(|e| {
            error!(error = %e, "clean start failed");
            ExitCode::DependencyFailure
        })?;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("shutdown signal received, finishing current cycle");
        let _ = shutdown_tx.send(true);
    });

    info!(
        backend = orchestrator.context().store.backend_tag(),
        bucket = %orchestrator.context().bucket(),
        namespace = %orchestrator.context().namespace(),
        results = orchestrator.state().results.len(),
        "vigil agent started"
    );
    orchestrator.run(shutdown_rx).await;
    Ok(())
}
