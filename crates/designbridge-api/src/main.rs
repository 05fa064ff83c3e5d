//! Binary entrypoint for the DesignBridge API server.
use anyhow::Context;
use designbridge_api::{run, AppState};
use designbridge_core::Config;
use designbridge_stages::build_workflow;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load(None).context("loading configuration")?;
    let runner = build_workflow(&config).context("building workflow")?;
    let state = AppState::new(runner, config.artifacts_dir.clone())?;

    // Default listen address can be overridden with DESIGNBRIDGE_ADDR
    let addr = std::env::var("DESIGNBRIDGE_ADDR").unwrap_or_else(|_| "0.0.0.0:8787".to_string());
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(&addr, state.clone()))?;
    Ok(())
}
