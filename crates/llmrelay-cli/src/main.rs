//! llmrelay CLI
//!
//! Routes generation requests across local and cloud LLM backends with
//! availability probing and automatic fallback.
//!
//! Usage:
//! ```bash
//! # Probe every backend once
//! llmrelay status
//!
//! # Generate, falling back through available backends
//! llmrelay generate --prompt "Summarise this log line"
//!
//! # Store a credential, then serve status and metrics
//! llmrelay credentials set openai.api_key sk-...
//! llmrelay --config llmrelay.yaml serve
//! ```

mod bootstrap;
mod config;

use bootstrap::{Runtime, build_runtime};
use clap::{Parser, Subcommand};
use config::RelayConfig;
use llmrelay_core::{
    Backend, CredentialStore, DEFAULT_MAX_TOKENS, GenerationRequest, mask_secret,
    parse_credential_key,
};
use llmrelay_observability::{StatusState, status_router};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "llmrelay")]
#[command(about = "llmrelay - LLM backend orchestration with fallback", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (YAML or TOML)
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "LLMRELAY_CONFIG",
        global = true
    )]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List every known backend
    Backends {
        /// Include setup instructions
        #[arg(long)]
        setup: bool,
    },
    /// Probe all backends once and show availability
    Status,
    /// Generate text, falling back through available backends
    Generate {
        #[arg(short, long)]
        prompt: String,

        /// System prompt
        #[arg(short, long)]
        system: Option<String>,

        #[arg(long, default_value = "0.7")]
        temperature: f64,

        #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
        max_tokens: u32,

        /// Backend to try first
        #[arg(short, long)]
        backend: Option<String>,
    },
    /// Send a minimal request to one backend
    Test {
        backend: String,
    },
    /// Show recorded usage per backend
    Usage,
    /// Clear usage stats for one backend, or all of them
    ResetUsage {
        backend: Option<String>,
    },
    /// List models installed in Ollama
    Models,
    /// Manage stored credentials (keys look like `openai.api_key`)
    Credentials {
        #[command(subcommand)]
        action: CredentialAction,
    },
    /// Watch backend availability until interrupted
    Monitor {
        /// Probe interval in seconds
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
    },
    /// Monitor availability and serve status and metrics over HTTP
    Serve,
}

#[derive(Subcommand)]
enum CredentialAction {
    Set { key: String, value: String },
    Get { key: String },
    Delete { key: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = if let Some(config_path) = &cli.config {
        RelayConfig::from_file(config_path)?
    } else {
        RelayConfig::default()
    };

    // Merge environment variables (they override config file)
    config.merge_env();
    config.validate()?;

    llmrelay_observability::logging::init(&config.logging.level, config.logging.json)
        .map_err(|err| anyhow::anyhow!("Failed to initialise logging: {}", err))?;

    match &cli.config {
        Some(path) => info!("Loaded configuration from: {}", path),
        None => info!("Using default configuration"),
    }

    let runtime = build_runtime(&config).await?;

    match cli.command {
        Commands::Backends { setup } => print_backends(setup),
        Commands::Status => {
            runtime.orchestrator.refresh_availability().await;
            print_status(&runtime);
        }
        Commands::Generate {
            prompt,
            system,
            temperature,
            max_tokens,
            backend,
        } => {
            if let Some(id) = backend {
                runtime.orchestrator.select_backend_by_id(&id)?;
            }
            runtime.orchestrator.refresh_availability().await;

            let mut request = GenerationRequest::new(prompt)
                .with_temperature(temperature)
                .with_max_tokens(max_tokens);
            if let Some(system) = system {
                request = request.with_system_prompt(system);
            }

            let routed = runtime.orchestrator.generate_with_fallback(&request).await?;
            println!("{}", routed.generation.text);
            eprintln!(
                "-- {} ({:.2}s, {} tokens)",
                routed.backend.display_name(),
                routed.response_time.as_secs_f64(),
                routed.generation.tokens_used.unwrap_or(0)
            );
        }
        Commands::Test { backend } => {
            let backend: Backend = backend.parse()?;
            let result = runtime.orchestrator.test_connection(backend).await;
            if !result.success {
                anyhow::bail!(
                    "{} connection test failed: {}",
                    backend.display_name(),
                    result.error.unwrap_or_default()
                );
            }
        }
        Commands::Usage => print_usage(&runtime),
        Commands::ResetUsage { backend } => match backend {
            Some(id) => {
                let backend: Backend = id.parse()?;
                runtime.orchestrator.ledger().reset_usage(backend).await;
                println!("Usage reset for {}", backend.display_name());
            }
            None => {
                runtime.orchestrator.ledger().reset_all_usage().await;
                println!("Usage reset for all backends");
            }
        },
        Commands::Models => {
            let models = runtime.ollama.list_models().await?;
            if models.is_empty() {
                println!("No models installed at {}", runtime.ollama.base_url());
            }
            for model in models {
                let marker = if model.name == runtime.ollama.model() {
                    "*"
                } else {
                    " "
                };
                println!("{} {}", marker, model.name);
            }
        }
        Commands::Credentials { action } => manage_credentials(&runtime, action).await?,
        Commands::Monitor { interval } => {
            let interval = interval
                .map(Duration::from_secs)
                .unwrap_or(runtime.orchestrator.config().monitor_interval);
            runtime.orchestrator.refresh_availability().await;
            print_status(&runtime);

            runtime.orchestrator.start_monitor(interval)?;
            shutdown_signal().await;
            runtime.orchestrator.stop_monitor();
        }
        Commands::Serve => serve(&config, runtime).await?,
    }

    Ok(())
}

async fn serve(config: &RelayConfig, runtime: Runtime) -> anyhow::Result<()> {
    runtime.orchestrator.refresh_availability().await;
    runtime
        .orchestrator
        .start_monitor(runtime.orchestrator.config().monitor_interval)?;

    let state = StatusState::with_source(runtime.metrics.clone(), runtime.orchestrator.clone());
    let app = status_router(state);

    let addr: SocketAddr = format!("{}:{}", config.status.host, config.status.port).parse()?;
    let listener = TcpListener::bind(addr).await?;

    info!("llmrelay status listening on http://{}", addr);
    info!("   - Health check:       http://{}/healthz", addr);
    info!("   - Readiness check:    http://{}/readyz", addr);
    info!("   - Backend status:     http://{}/status", addr);
    info!("   - Prometheus metrics: http://{}/metrics", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    runtime.orchestrator.stop_monitor();
    Ok(())
}

async fn manage_credentials(runtime: &Runtime, action: CredentialAction) -> anyhow::Result<()> {
    let store = runtime.credentials.as_ref();
    match action {
        CredentialAction::Set { key, value } => {
            parse_credential_key(&key)?;
            store.set(&key, &value).await?;
            println!("Stored {}", key);
        }
        CredentialAction::Get { key } => {
            let (_, field) = parse_credential_key(&key)?;
            match store.get(&key).await? {
                Some(secret) if field.is_secret() => println!("{} = {}", key, mask_secret(&secret)),
                Some(value) => println!("{} = {}", key, value),
                None => println!("{} is not set", key),
            }
        }
        CredentialAction::Delete { key } => {
            parse_credential_key(&key)?;
            store.delete(&key).await?;
            println!("Deleted {}", key);
        }
    }
    Ok(())
}

fn print_backends(setup: bool) {
    println!(
        "{:<13} {:<17} {:<6} {:>9}  {}",
        "ID", "NAME", "KIND", "$/MTOK", "ENDPOINT"
    );
    for backend in Backend::ALL {
        let info = backend.info();
        println!(
            "{:<13} {:<17} {:<6} {:>9.2}  {}",
            info.id,
            info.display_name,
            if backend.is_local() { "local" } else { "cloud" },
            info.cost_per_million_tokens,
            info.default_endpoint.unwrap_or("-")
        );
        println!("    {}", info.description);
        if setup {
            for line in info.setup_instructions.lines() {
                println!("      {}", line);
            }
        }
    }
}

fn print_status(runtime: &Runtime) {
    let orchestrator = &runtime.orchestrator;
    let snapshot = orchestrator.availability();
    let active = orchestrator.active_backend();

    println!("Active backend: {}", active.display_name());
    for (backend, available) in snapshot.iter() {
        let marker = if backend == active { "*" } else { " " };
        let status = if available { "online" } else { "offline" };
        println!("{} {:<17} {}", marker, backend.display_name(), status);
    }
    if snapshot.available().is_empty() {
        warn!("No backend is currently available");
    }
}

fn print_usage(runtime: &Runtime) {
    let mut usage: Vec<_> = runtime
        .orchestrator
        .ledger()
        .usage_snapshot()
        .into_iter()
        .collect();
    usage.sort_by_key(|(backend, _)| *backend);
    if usage.is_empty() {
        println!("No usage recorded");
        return;
    }

    println!(
        "{:<17} {:>9} {:>12} {:>10} {:>10}",
        "BACKEND", "REQUESTS", "TOKENS", "COST", "AVG (s)"
    );
    for (backend, stats) in usage {
        println!(
            "{:<17} {:>9} {:>12} {:>10.4} {:>10.2}",
            backend.display_name(),
            stats.total_requests,
            stats.total_tokens,
            stats.total_cost,
            stats.average_response_time
        );
    }
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
