//! Command-line front end for the organization import engine.
//!
//! `import` runs a workbook through validation, classification and batched
//! execution against an in-memory store seeded with the persisted codes, so
//! a file can be rehearsed before it reaches the real service.
//! `check-moves` validates pending reparentings against a stored hierarchy.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use orgimport_core::batching::{BatchImportStatus, StatusLine};
use orgimport_core::reorg::{validate_all_pending_moves, validate_move, OrgNode, PendingMove};
use orgimport_core::summary::describe_result;
use orgimport_core::types::ExistingKeys;
use orgimport_core::validation::report::format_finding;
use orgimport_core::workflow::ImportStep;
use orgimport_pipeline::config::SessionConfig;
use orgimport_pipeline::session::ImportSession;
use orgimport_pipeline::store::InMemoryStore;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type CliResult = Result<(), Box<dyn std::error::Error>>;

// ---------------------------------------------------------------------------
// CLI definitions
// ---------------------------------------------------------------------------

/// Validate and rehearse organization imports.
#[derive(Parser)]
#[command(name = "orgimport")]
#[command(about = "Validate and rehearse organization imports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a workbook and run it against an in-memory store.
    Import {
        /// JSON workbook export.
        file: PathBuf,

        /// JSON file with `departments` and `positions` code arrays that
        /// already exist.
        #[arg(long)]
        existing: Option<PathBuf>,

        /// Stop after the preview.
        #[arg(long)]
        preview_only: bool,
    },

    /// Validate pending moves against a stored hierarchy.
    CheckMoves {
        /// JSON file with `nodes` and `pending` arrays.
        file: PathBuf,

        /// Validate moving this node on top of the pending moves.
        #[arg(long)]
        node: Option<String>,

        /// New parent for `--node`. Omit to move it to the root.
        #[arg(long, requires = "node")]
        parent: Option<String>,
    },
}

#[tokio::main]
async fn main() -> CliResult {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "orgimport_pipeline=info,orgimport=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Import {
            file,
            existing,
            preview_only,
        } => cmd_import(&file, existing.as_deref(), preview_only).await,
        Commands::CheckMoves { file, node, parent } => {
            cmd_check_moves(&file, node.as_deref(), parent.as_deref())
        }
    }
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

async fn cmd_import(file: &Path, existing: Option<&Path>, preview_only: bool) -> CliResult {
    let config = SessionConfig::from_env()?;
    tracing::debug!(?config, "Loaded import configuration");
    let existing: ExistingKeys = match existing {
        Some(path) => serde_json::from_slice(&std::fs::read(path)?)?,
        None => ExistingKeys::default(),
    };
    let store = Arc::new(InMemoryStore::with_existing(&existing));
    let mut session = ImportSession::new(store, config);

    let bytes = std::fs::read(file)?;
    let file_name = file.display().to_string();
    let preview = session.upload(&file_name, bytes).await?;

    println!("=== Preview: {file_name} ===");
    println!("Rows: {}", preview.summary.total_rows);
    println!(
        "Departments: {} to create, {} to update",
        preview.summary.departments.create, preview.summary.departments.update
    );
    println!(
        "Positions:   {} to create, {} to update",
        preview.summary.positions.create, preview.summary.positions.update
    );
    println!();
    for finding in &preview.findings {
        println!("{}", format_finding(finding));
    }
    println!("{}", preview.report().summarize());

    if !preview.is_submittable() {
        return Err(format!("{} blocking finding(s)", preview.blocking_count()).into());
    }
    if preview_only {
        return Ok(());
    }

    session.confirm()?;
    let controller = session.controller()?;
    let events = controller.subscribe();
    let progress = tokio::spawn(forward_progress(events, |line| eprintln!("{line}")));

    let step = session.execute(controller).await?;
    // The channel closes when the run ends.
    let _ = progress.await;

    println!();
    match step {
        ImportStep::Success { result, .. } => {
            println!("Imported: {}", describe_result(result));
            for failure in &result.failures {
                println!("  {} ({}): {}", failure.item_id, failure.item_type, failure.error);
            }
            Ok(())
        }
        ImportStep::NoChanges { .. } => {
            println!("No changes were applied");
            Ok(())
        }
        ImportStep::Error { category, message } => {
            Err(format!("{}: {message}", category.as_str()).into())
        }
        other => Err(format!("import ended in unexpected step '{}'", other.name()).into()),
    }
}

/// Hand every snapshot to `emit` until the run ends. A lagging receiver
/// skips ahead instead of stopping.
async fn forward_progress(
    mut events: broadcast::Receiver<BatchImportStatus>,
    mut emit: impl FnMut(StatusLine),
) {
    loop {
        match events.recv().await {
            Ok(status) => emit(status.compact()),
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Progress output fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

// ---------------------------------------------------------------------------
// Move checks
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct HierarchyFile {
    nodes: Vec<OrgNode>,
    #[serde(default)]
    pending: Vec<PendingMove>,
}

fn cmd_check_moves(file: &Path, node: Option<&str>, parent: Option<&str>) -> CliResult {
    let hierarchy: HierarchyFile = serde_json::from_slice(&std::fs::read(file)?)?;

    let invalid = validate_all_pending_moves(&hierarchy.pending, &hierarchy.nodes);
    println!(
        "Pending moves: {} checked, {} invalid",
        hierarchy.pending.len(),
        invalid.len()
    );
    for entry in &invalid {
        for issue in &entry.errors {
            println!("  [error] {}: {}", entry.pending_move.node_key, issue.message);
        }
    }

    let mut rejected = !invalid.is_empty();
    if let Some(node) = node {
        let validation = validate_move(node, parent, &hierarchy.nodes, &hierarchy.pending);
        println!();
        println!(
            "Move {node} -> {}: {}",
            parent.unwrap_or("(root)"),
            if validation.is_valid { "ok" } else { "rejected" }
        );
        for issue in &validation.errors {
            println!("  [error] {}", issue.message);
        }
        for issue in &validation.warnings {
            println!("  [warning] {}", issue.message);
        }
        rejected |= !validation.is_valid;
    }

    if rejected {
        return Err("one or more moves are invalid".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn progress_survives_a_lagging_receiver() {
        let (tx, rx) = broadcast::channel(2);
        for processed in 1..=5 {
            let mut status = BatchImportStatus::new(5, 1);
            status.processed = processed;
            status.succeeded = processed;
            tx.send(status).unwrap();
        }
        drop(tx);

        let mut seen = Vec::new();
        forward_progress(rx, |line| seen.push(line.processed)).await;
        assert_eq!(seen, vec![4, 5]);
    }
}
