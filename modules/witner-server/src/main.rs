use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use buffer_client::BufferClient;
use directions_client::DirectionsClient;
use witner_common::{AnalysisConfig, Config, Incident, Response};
use witner_core::notify::LogPoster;
use witner_core::{
    Arbitration, CostRanker, HazardEvaluator, IncidentChange, IncidentIndex, IncidentStore,
    MemoryIncidentStore, StatusArbiter,
};

#[derive(Parser)]
#[command(name = "witner-server", about = "Replay incidents and replies through claim arbitration")]
struct Cli {
    /// JSON-lines event file. Reads stdin when omitted.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Analysis TOML file. Overrides WITNER_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,
}

/// One line of the replay stream.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ReplayEvent {
    Incident(Incident),
    Response(Response),
}

#[derive(Debug, Default)]
struct ReplayStats {
    incidents: u32,
    responses: u32,
    unqualified: u32,
    qualified: u32,
    rejected: u32,
    suggestions: u32,
    skipped: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("witner=info")),
        )
        .init();

    info!("Starting witner-server");

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let analysis = match &cli.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => config.analysis()?,
    };

    let tracks = analysis.tracks();
    if tracks.is_empty() {
        warn!("No reply tracks configured; every reply will be unqualified");
    }

    let router = Arc::new(DirectionsClient::new(&config.google_maps_api_key));
    let buffer = Arc::new(BufferClient::new(&config.buffer_service_url));
    let evaluator = HazardEvaluator::new(router, buffer, &analysis);
    let ranker = CostRanker::new(evaluator, &analysis);

    let store = Arc::new(MemoryIncidentStore::new());
    let mut changes = store.subscribe();
    let index = Arc::new(IncidentIndex::load(store.as_ref()).await?);

    let arbiter = StatusArbiter::new(
        store.clone(),
        index.clone(),
        Arc::new(LogPoster::default()),
        ranker,
        tracks,
    );

    let input: Box<dyn AsyncRead + Unpin + Send> = match &cli.input {
        Some(path) => Box::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdin()),
    };

    let stats = replay(input, store.as_ref(), &index, &mut changes, &arbiter).await?;
    info!(?stats, indexed = index.len(), "Replay finished");

    Ok(())
}

/// Dispatch each event in order. The index applies every queued change before
/// the next event is read, so rankings never see a state older than the
/// previous event's outcome.
async fn replay(
    input: impl AsyncRead + Unpin,
    store: &dyn IncidentStore,
    index: &IncidentIndex,
    changes: &mut broadcast::Receiver<IncidentChange>,
    arbiter: &StatusArbiter,
) -> Result<ReplayStats> {
    let mut stats = ReplayStats::default();
    let mut lines = BufReader::new(input).lines();
    let mut line_no = 0u64;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }

        let event: ReplayEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping unparseable event");
                stats.skipped += 1;
                continue;
            }
        };

        match event {
            ReplayEvent::Incident(incident) => {
                store.upsert_incident(&incident).await?;
                stats.incidents += 1;
            }
            ReplayEvent::Response(response) => {
                stats.responses += 1;
                match arbiter.handle_response(&response).await {
                    Ok(Some(handled)) => {
                        match handled.arbitration {
                            Arbitration::Unqualified => stats.unqualified += 1,
                            Arbitration::Qualified { .. } => stats.qualified += 1,
                            Arbitration::Rejected { .. } => stats.rejected += 1,
                        }
                        if handled.suggestion.is_some() {
                            stats.suggestions += 1;
                        }
                    }
                    Ok(None) => stats.skipped += 1,
                    Err(e) => {
                        warn!(response = %response.id, error = %e, "Arbitration failed");
                        stats.skipped += 1;
                    }
                }
            }
        }

        index.catch_up(changes);
    }

    Ok(stats)
}
