//! Run one workflow from the command line and print the final state.
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use designbridge_core::{Config, ExecutionContext, UserInput, WorkflowState};
use designbridge_stages::build_workflow;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "designbridge-run", version, about = "Run the DesignBridge workflow once")]
struct Cli {
    /// Free-text design request
    #[arg(long, required_unless_present = "graph")]
    prompt: Option<String>,
    /// 0.0 = smallest change, 1.0 = full redesign
    #[arg(long, default_value_t = 0.5)]
    edit_scope: f64,
    /// Reference photo of the room
    #[arg(long)]
    image: Option<String>,
    /// YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print the workflow as a Mermaid diagram and exit
    #[arg(long)]
    graph: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    let runner = build_workflow(&config).context("building workflow")?;

    if cli.graph {
        print!("{}", runner.graph().to_mermaid());
        return Ok(());
    }

    let mut input = UserInput::new(cli.prompt.unwrap_or_default(), cli.edit_scope);
    if let Some(image) = cli.image {
        input = input.with_image(image);
    }

    let ctx = ExecutionContext::new(&config.artifacts_dir);
    let outcome = runner
        .invoke(WorkflowState::from_input(input), &ctx)
        .context("running workflow")?;
    eprintln!("path: {}", outcome.path.join(" -> "));
    println!("{}", serde_json::to_string_pretty(&outcome.state)?);
    Ok(())
}
