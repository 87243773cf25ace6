use anyhow::{Context, Result};
use cbdc_sentinel::{
    collaborators::{AddressBook, LoggingExecutionGateway, SimulatedCredentialExchange},
    config::load_config,
    InboundMessage, ProofOrchestrator, ProofOutcome, ProofOutcomeEvent, ProofResponseHandler,
    Sentinel, TransactionLedger,
};
use log::{error, info, warn};
use std::{sync::Arc, time::Duration};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config().context("failed to load configuration")?;

    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.monitoring.log_level.as_str()),
    )
    .init();

    info!("CBDC Sentinel: {}", config.sentinel.name);
    info!("Requesting proofs against: {}", config.proof.schema_ref);

    let capacity = config.processing.channel_capacity;
    let (message_tx, message_rx) = mpsc::channel::<InboundMessage>(capacity);
    let (outcome_tx, outcome_rx) = mpsc::channel::<ProofOutcomeEvent>(capacity);

    let address_book = Arc::new(AddressBook::from_parties(&config.parties).await);
    let auto_outcome = config.simulation.auto_outcome.clone().map(ProofOutcome::from);
    if let Some(outcome) = &auto_outcome {
        info!("Simulated parties answer every proof request with: {}", outcome);
    }
    let exchange = Arc::new(SimulatedCredentialExchange::new(
        &outcome_tx,
        auto_outcome,
        Duration::from_millis(config.simulation.respond_after_ms),
    ));
    let gateway = Arc::new(LoggingExecutionGateway::new());

    let ledger = Arc::new(TransactionLedger::new());
    let orchestrator = Arc::new(ProofOrchestrator::new(
        address_book,
        exchange,
        config.proof.schema_ref.clone(),
    ));
    let handler = Arc::new(ProofResponseHandler::new(Arc::clone(&ledger), gateway.clone()));
    let sentinel = Arc::new(Sentinel::new(
        config.sentinel.name.clone(),
        config.processing.clone(),
        ledger,
        orchestrator,
        handler,
    ));

    let mut handle = Arc::clone(&sentinel).spawn(message_rx, outcome_rx);

    info!("Reading messages from stdin as '<label>> <text>' (JSON lines are proof outcomes)");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with('{') {
            match serde_json::from_str::<ProofOutcomeEvent>(line) {
                Ok(event) => outcome_tx.send(event).await.context("outcome channel closed")?,
                Err(e) => warn!("Ignoring invalid proof outcome {:?}: {}", line, e),
            }
        } else {
            message_tx
                .send(InboundMessage::from_line(line))
                .await
                .context("message channel closed")?;
        }
    }

    info!("Input closed, draining in-flight events");
    drop(message_tx);
    handle.drain_messages().await?;
    drop(outcome_tx);
    if let Err(e) = handle.join().await {
        error!("Sentinel stopped with error: {}", e);
    }
    sentinel.shutdown().await?;

    let stats = sentinel.statistics();
    info!(
        "Ledger: {} transactions ({} pending, {} accepted, {} rejected)",
        stats.total, stats.pending, stats.accepted, stats.rejected
    );
    info!("Executed transfers: {}", gateway.executed());
    info!("Metrics: {:?}", sentinel.metrics());

    Ok(())
}
