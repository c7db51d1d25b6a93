//! Line commands accepted by `tandem serve`.
//!
//! Lines starting with `:` are commands; anything else is an input.

use serde_json::{Value, json};
use tandem_core::Coordinate;
use tandem_runtime::Pipeline;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Recall { frequency: f64, tolerance: Option<f64> },
    Near { re: f64, im: f64, radius: f64 },
    Spiral { start: u64, steps: usize },
    Consolidate { threshold: Option<f64> },
    Stats,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Empty,
    Input(String),
    Command(SessionCommand),
}

fn arg<T: std::str::FromStr>(parts: &[&str], i: usize, name: &str) -> Result<T, String> {
    let raw = parts.get(i).ok_or_else(|| format!("missing {name}"))?;
    raw.parse().map_err(|_| format!("bad {name}: {raw}"))
}

fn opt_arg<T: std::str::FromStr>(parts: &[&str], i: usize, name: &str) -> Result<Option<T>, String> {
    match parts.get(i) {
        Some(_) => arg(parts, i, name).map(Some),
        None => Ok(None),
    }
}

pub fn parse_line(line: &str) -> Result<Line, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Line::Empty);
    }
    let Some(rest) = line.strip_prefix(':') else {
        return Ok(Line::Input(line.to_string()));
    };

    let parts: Vec<&str> = rest.split_whitespace().collect();
    let command = match parts.first().copied() {
        Some("recall") => SessionCommand::Recall {
            frequency: arg(&parts, 1, "frequency")?,
            tolerance: opt_arg(&parts, 2, "tolerance")?,
        },
        Some("near") => SessionCommand::Near {
            re: arg(&parts, 1, "real part")?,
            im: arg(&parts, 2, "imaginary part")?,
            radius: arg(&parts, 3, "radius")?,
        },
        Some("spiral") => SessionCommand::Spiral {
            start: arg(&parts, 1, "start time")?,
            steps: arg(&parts, 2, "steps")?,
        },
        Some("consolidate") => SessionCommand::Consolidate {
            threshold: opt_arg(&parts, 1, "threshold")?,
        },
        Some("stats") => SessionCommand::Stats,
        Some("quit") | Some("exit") => SessionCommand::Quit,
        Some(other) => return Err(format!("unknown command :{other}")),
        None => return Err("empty command".to_string()),
    };
    Ok(Line::Command(command))
}

/// Run a non-quit command and render its JSON line.
pub async fn execute(pipeline: &Pipeline, command: &SessionCommand) -> Value {
    match command {
        SessionCommand::Recall {
            frequency,
            tolerance,
        } => {
            let entries = pipeline.recall_by_resonance(*frequency, *tolerance).await;
            json!({ "command": "recall", "entries": entries })
        }
        SessionCommand::Near { re, im, radius } => {
            let entries = pipeline
                .recall_nearby(Coordinate::new(*re, *im), *radius)
                .await;
            json!({ "command": "near", "entries": entries })
        }
        SessionCommand::Spiral { start, steps } => {
            let entries = pipeline.traverse_spiral(*start, *steps).await;
            json!({ "command": "spiral", "entries": entries })
        }
        SessionCommand::Consolidate { threshold } => {
            let merged = pipeline.consolidate(*threshold).await;
            json!({ "command": "consolidate", "merged": merged })
        }
        SessionCommand::Stats => json!({
            "command": "stats",
            "memory": pipeline.memory_stats().await,
            "snapshot": pipeline.snapshot(),
            "memo": {
                "entries": pipeline.deep().memo_len(),
                "hits": pipeline.deep().memo_hits(),
                "evictions": pipeline.deep().memo_evictions(),
            },
        }),
        SessionCommand::Quit => json!({ "command": "quit" }),
    }
}
