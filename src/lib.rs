pub mod api;
pub mod cli;
pub mod clients;
pub mod config;
pub mod constants;
pub mod domain;
pub mod library;
pub mod models;
pub mod services;
pub mod state;

use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands, ConfigCommands};
pub use config::Config;
use metrics_exporter_prometheus::PrometheusHandle;
use services::{Scheduler, SweepRunner};
use state::SharedState;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    let prometheus_handle = if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new();
        let handle = builder
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        Some(handle)
    } else {
        None
    };

    init_tracing(&config)?;
    if prometheus_handle.is_some() {
        info!("Prometheus metrics recorder initialized");
    }

    match cli.command {
        Some(Commands::Config {
            command: ConfigCommands::Init,
        }) => cli::cmd_config_init(),
        Some(Commands::Config {
            command: ConfigCommands::Show,
        }) => cli::cmd_config_show(&config),
        Some(Commands::CheckLink { url }) => cli::cmd_check_link(&config, &url).await,
        Some(Commands::Sweep { all }) => {
            config.validate()?;
            cli::cmd_sweep(config, all).await
        }
        Some(Commands::Wanted) => {
            config.validate()?;
            cli::cmd_wanted(config).await
        }
        Some(Commands::Daemon) | None => {
            config.validate()?;
            run_daemon(config, prometheus_handle).await
        }
    }
}

fn init_tracing(config: &Config) -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let fmt_layer = tracing_subscriber::fmt::layer();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    if config.observability.loki_enabled {
        let url = url::Url::parse(&config.observability.loki_url).context("Invalid Loki URL")?;

        let mut builder = tracing_loki::builder().extra_field("env", "production")?;
        for (key, value) in &config.observability.loki_labels {
            builder = builder.label(key.as_str(), value.as_str())?;
        }
        let (layer, task) = builder.build_url(url)?;

        tokio::spawn(task);

        registry.with(layer).init();
        info!(
            "Loki logging initialized at {}",
            config.observability.loki_url
        );
    } else {
        registry.init();
    }

    Ok(())
}

async fn run_daemon(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<()> {
    info!(
        "strmarr v{} starting in daemon mode...",
        env!("CARGO_PKG_VERSION")
    );

    let shutdown = CancellationToken::new();
    let shared = Arc::new(SharedState::new(config.clone(), shutdown.clone())?);

    let scheduler_handle = if config.scheduler.enabled {
        let runner = Arc::new(SweepRunner::new(
            Arc::clone(&shared.sweeps),
            config.scheduler.full_sweep.only_monitored,
        ));
        let scheduler = Scheduler::new(
            config.scheduler.cadences(),
            runner,
            Arc::clone(&shared.schedule),
        );
        Some(tokio::spawn(scheduler.run(shutdown.clone())))
    } else {
        info!("Scheduler disabled");
        None
    };

    let server_handle: Option<tokio::task::JoinHandle<()>> = if config.server.enabled {
        let port = config.server.port;
        info!("Starting Web API on port {}", port);

        let app = api::router(api::create_app_state(Arc::clone(&shared), prometheus_handle));
        let addr = format!("0.0.0.0:{port}");
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let server_shutdown = shutdown.clone();

        Some(tokio::spawn(async move {
            info!("Web server running at http://0.0.0.0:{}", port);
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(server_shutdown.cancelled_owned())
                .await
            {
                error!("Web server error: {}", e);
            }
        }))
    } else {
        None
    };

    info!("Daemon running. Press Ctrl+C to stop.");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
        }
        Err(e) => {
            error!("Error listening for shutdown: {}", e);
        }
    }

    shutdown.cancel();
    if let Some(handle) = scheduler_handle
        && let Err(e) = handle.await
    {
        error!("Scheduler task failed: {}", e);
    }
    if let Some(handle) = server_handle
        && let Err(e) = handle.await
    {
        error!("Web server task failed: {}", e);
    }
    info!("Daemon stopped");

    Ok(())
}
