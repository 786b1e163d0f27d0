use std::sync::Arc;

use anyhow::Context;

use jobstream::config::AppConfig;
use jobstream::registry::{self, JobRegistry};
use jobstream::runner::{CommandWorkload, ScriptedWorkload, Workload};
use jobstream::web::job_routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env()?;

    eprintln!("jobstream v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Listening: http://{}", config.bind_addr);
    eprintln!("   Output dir: {}", config.output_dir.display());
    eprintln!(
        "   Retention: {}h (sweep every {}s)",
        config.retention_hours,
        config.sweep_interval.as_secs()
    );

    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .with_context(|| format!("creating output dir {}", config.output_dir.display()))?;

    let registry = JobRegistry::new();

    // Retention sweep runs for the life of the process.
    let _sweep_handle = registry::spawn_sweep_task(
        Arc::clone(&registry),
        config.sweep_interval,
        config.retention_hours,
    );

    // Workload: external command if configured, scripted demo otherwise.
    let workload: Arc<dyn Workload> = match config
        .workload_command
        .as_deref()
        .and_then(CommandWorkload::from_command_line)
    {
        Some(command) => {
            eprintln!("   Workload: {} <subject>", command.command_line());
            Arc::new(command)
        }
        None => {
            eprintln!("   Workload: scripted demo (set JOBSTREAM_WORKLOAD_CMD to run a real one)");
            Arc::new(ScriptedWorkload::demo())
        }
    };

    let app = job_routes(Arc::clone(&registry), workload, config.clone());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "HTTP server started");
    axum::serve(listener, app).await?;

    Ok(())
}
