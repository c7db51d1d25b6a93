mod session;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tandem_core::{ContextTag, Stimulus};
use tandem_runtime::{Pipeline, PipelineConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;

use crate::session::{Line, SessionCommand};

#[derive(Parser)]
#[command(name = "tandem", about = "Dual-cadence response engine")]
struct Cli {
    /// TOML config file (falls back to $TANDEM_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer one input and print the full response as JSON
    Respond {
        /// Input text
        text: String,

        /// Context tag: urgent, philosophical, creative, or any label
        #[arg(long)]
        context: Option<ContextTag>,

        /// Memory amplitude for the result (default: emotional alignment)
        #[arg(long)]
        salience: Option<f64>,

        /// Deep-pass recursion depth (clamped to the configured maximum)
        #[arg(long)]
        depth: Option<usize>,
    },

    /// Read inputs and `:` commands from stdin, emit JSON-line events
    Serve {
        /// Also emit heartbeat tick events
        #[arg(long)]
        ticks: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    PipelineConfig::load(cli.config.as_deref()).context("failed to load configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Respond {
            text,
            context,
            salience,
            depth,
        } => cmd_respond(&cli, text, context.clone(), *salience, *depth).await,
        Commands::Serve { ticks } => cmd_serve(&cli, *ticks).await,
        Commands::Config => cmd_config(&cli),
    }
}

async fn cmd_respond(
    cli: &Cli,
    text: &str,
    context: Option<ContextTag>,
    salience: Option<f64>,
    depth: Option<usize>,
) -> Result<()> {
    let config = load_config(cli)?;
    let depth = depth.unwrap_or(config.recursion_depth);
    let pipeline = Pipeline::from_config(config).context("failed to build pipeline")?;

    let mut stimulus = Stimulus::new(text);
    if let Some(tag) = context {
        stimulus = stimulus.with_context(tag);
    }

    let response = pipeline
        .respond_with_depth(&stimulus, salience, depth)
        .await
        .context("respond failed")?;
    let rendered =
        serde_json::to_string_pretty(&response).context("failed to serialize response")?;
    println!("{rendered}");
    Ok(())
}

fn emit(value: &impl serde::Serialize) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::warn!("failed to serialize event: {e}"),
    }
}

async fn cmd_serve(cli: &Cli, ticks: bool) -> Result<()> {
    let config = load_config(cli)?;
    let pipeline = Arc::new(Pipeline::from_config(config).context("failed to build pipeline")?);

    let mut events = pipeline.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) if event.is_tick() && !ticks => {}
                Ok(event) => emit(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("event printer lagged, skipped {skipped} events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    pipeline
        .start_heartbeat()
        .context("failed to start heartbeat")?;
    tracing::info!("serving on stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut inflight: JoinSet<()> = JoinSet::new();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                None
            }
        };
        let Some(line) = line else { break };

        match session::parse_line(&line) {
            Ok(Line::Empty) => {}
            Ok(Line::Command(SessionCommand::Quit)) => break,
            Ok(Line::Command(command)) => {
                let pipeline = Arc::clone(&pipeline);
                inflight.spawn(async move { emit(&session::execute(&pipeline, &command).await) });
            }
            Ok(Line::Input(text)) => {
                let pipeline = Arc::clone(&pipeline);
                inflight.spawn(async move {
                    if let Err(e) = pipeline.respond(&Stimulus::new(text.as_str()), None).await {
                        tracing::warn!("input failed: {e}");
                        emit(&json!({ "event": "error", "input": text, "message": e.to_string() }));
                    }
                });
            }
            Err(message) => emit(&json!({ "event": "error", "message": message })),
        }
    }

    while inflight.join_next().await.is_some() {}
    pipeline
        .stop_heartbeat()
        .await
        .context("heartbeat did not stop cleanly")?;

    // Last sender goes with the pipeline; the printer drains and exits.
    drop(pipeline);
    printer.await.context("event printer failed")?;
    Ok(())
}

fn cmd_config(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let rendered = toml::to_string_pretty(&config).context("failed to render config")?;
    print!("{rendered}");
    Ok(())
}
