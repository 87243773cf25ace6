use crate::{
    ledger::TransactionLedger,
    orchestrator::ProofOrchestrator,
    response_handler::{ProofResponseHandler, Resolution},
    types::{
        InboundMessage, LedgerStatistics, ProcessingConfig, ProofOutcomeEvent, SentinelError,
        SentinelMetrics, TransactionRecord,
    },
};
use intent::{parse_message, TransferIntent};
use log::{debug, error, info, warn};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::{
    sync::{mpsc, Semaphore},
    task::JoinHandle,
};

/// Upper bound on `max_concurrent_events`, well below the semaphore limit
pub const MAX_CONCURRENT_EVENTS: usize = 10_000;

/// What happened to an inbound text message
#[derive(Debug, Clone)]
pub enum Ingest {
    NotAnIntent,
    Malformed,
    Duplicate(TransactionRecord),
    Admitted(TransactionRecord),
}

#[derive(Debug, Default)]
struct Counters {
    messages_received: AtomicU64,
    intents_admitted: AtomicU64,
    duplicate_intents: AtomicU64,
    malformed_intents: AtomicU64,
    orchestrations_aborted: AtomicU64,
    proof_requests_sent: AtomicU64,
    outcomes_received: AtomicU64,
    outcomes_dropped: AtomicU64,
    executions: AtomicU64,
    execution_failures: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> SentinelMetrics {
        SentinelMetrics {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            intents_admitted: self.intents_admitted.load(Ordering::Relaxed),
            duplicate_intents: self.duplicate_intents.load(Ordering::Relaxed),
            malformed_intents: self.malformed_intents.load(Ordering::Relaxed),
            orchestrations_aborted: self.orchestrations_aborted.load(Ordering::Relaxed),
            proof_requests_sent: self.proof_requests_sent.load(Ordering::Relaxed),
            outcomes_received: self.outcomes_received.load(Ordering::Relaxed),
            outcomes_dropped: self.outcomes_dropped.load(Ordering::Relaxed),
            executions: self.executions.load(Ordering::Relaxed),
            execution_failures: self.execution_failures.load(Ordering::Relaxed),
        }
    }
}

/// Reconciliation dispatcher.
///
/// Consumes inbound messages and proof outcome events from two independent
/// channels. Each event is processed on its own task, bounded by a
/// semaphore; the ledger is the only state shared between them.
pub struct Sentinel {
    name: String,
    ledger: Arc<TransactionLedger>,
    orchestrator: Arc<ProofOrchestrator>,
    handler: Arc<ProofResponseHandler>,
    processing_semaphore: Arc<Semaphore>,
    permits: u32,
    counters: Arc<Counters>,
}

/// Background consumers started by [`Sentinel::spawn`]
pub struct SentinelHandle {
    messages: Option<JoinHandle<()>>,
    outcomes: JoinHandle<()>,
}

impl SentinelHandle {
    /// Wait until the message channel is closed and every admitted intent
    /// has been orchestrated. Proof outcomes keep flowing meanwhile.
    pub async fn drain_messages(&mut self) -> Result<(), SentinelError> {
        if let Some(messages) = self.messages.take() {
            messages
                .await
                .map_err(|e| SentinelError::ChannelClosed(format!("message consumer: {}", e)))?;
        }
        Ok(())
    }

    /// Wait until both channels are closed and every in-flight event is done
    pub async fn join(mut self) -> Result<(), SentinelError> {
        self.drain_messages().await?;
        self.outcomes
            .await
            .map_err(|e| SentinelError::ChannelClosed(format!("outcome consumer: {}", e)))?;
        Ok(())
    }
}

impl Sentinel {
    pub fn new(
        name: impl Into<String>,
        config: ProcessingConfig,
        ledger: Arc<TransactionLedger>,
        orchestrator: Arc<ProofOrchestrator>,
        handler: Arc<ProofResponseHandler>,
    ) -> Self {
        let name = name.into();
        let permits = config.max_concurrent_events.clamp(1, MAX_CONCURRENT_EVENTS);
        if permits != config.max_concurrent_events {
            warn!(
                "{}: max_concurrent_events {} out of range, using {}",
                name, config.max_concurrent_events, permits
            );
        }
        let processing_semaphore = Arc::new(Semaphore::new(permits));
        Self {
            name,
            ledger,
            orchestrator,
            handler,
            processing_semaphore,
            permits: u32::try_from(permits).unwrap_or(u32::MAX),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Parse and admit a message, then request proofs for new transactions
    pub async fn ingest(&self, message: InboundMessage) -> Ingest {
        Counters::bump(&self.counters.messages_received);
        debug!("{} received message: {}", self.name, message.content);

        let intent = match parse_message(&message.content) {
            Ok(Some(intent)) => intent,
            Ok(None) => return Ingest::NotAnIntent,
            Err(e) => {
                Counters::bump(&self.counters.malformed_intents);
                warn!("Dropping malformed intent {:?}: {}", message.content, e);
                return Ingest::Malformed;
            }
        };

        info!(
            "{} received a transaction from {}: {} to {} for {} with nonce {}",
            self.name,
            message.sender.as_deref().unwrap_or("unknown connection"),
            intent.from,
            intent.to,
            intent.amount,
            intent.nonce
        );

        let admission = self.ledger.admit(intent);
        if !admission.is_new {
            Counters::bump(&self.counters.duplicate_intents);
            info!("Transaction already exists: {}", admission.record.intent);
            return Ingest::Duplicate(admission.record);
        }
        Counters::bump(&self.counters.intents_admitted);

        match self.orchestrator.orchestrate(&admission.record).await {
            Ok(sent) => {
                self.counters
                    .proof_requests_sent
                    .fetch_add(sent as u64, Ordering::Relaxed);
            }
            Err(e) => {
                Counters::bump(&self.counters.orchestrations_aborted);
                warn!(
                    "Orchestration aborted for {}, left pending: {}",
                    admission.record.intent, e
                );
            }
        }

        Ingest::Admitted(admission.record)
    }

    /// Apply a proof outcome event to its transaction
    pub async fn resolve(&self, event: ProofOutcomeEvent) -> Result<Resolution, SentinelError> {
        Counters::bump(&self.counters.outcomes_received);
        let result = self.handler.handle(event).await;
        match &result {
            Ok(Resolution::Accepted) => Counters::bump(&self.counters.executions),
            Ok(Resolution::AcceptedExecutionFailed) => {
                Counters::bump(&self.counters.execution_failures)
            }
            Ok(_) => {}
            Err(e) => {
                Counters::bump(&self.counters.outcomes_dropped);
                warn!("Dropping proof outcome: {}", e);
            }
        }
        result
    }

    /// Start consuming both channels until their senders are dropped
    pub fn spawn(
        self: Arc<Self>,
        messages: mpsc::Receiver<InboundMessage>,
        outcomes: mpsc::Receiver<ProofOutcomeEvent>,
    ) -> SentinelHandle {
        info!(
            "Starting {} with up to {} concurrent events",
            self.name, self.permits
        );

        let message_task = {
            let sentinel = Arc::clone(&self);
            Self::consume(messages, Arc::clone(&self.processing_semaphore), move |message| {
                let sentinel = Arc::clone(&sentinel);
                async move {
                    sentinel.ingest(message).await;
                }
            })
        };

        let outcome_task = {
            let sentinel = Arc::clone(&self);
            Self::consume(outcomes, Arc::clone(&self.processing_semaphore), move |event| {
                let sentinel = Arc::clone(&sentinel);
                async move {
                    let _ = sentinel.resolve(event).await;
                }
            })
        };

        SentinelHandle {
            messages: Some(message_task),
            outcomes: outcome_task,
        }
    }

    fn consume<T, F, Fut>(
        mut receiver: mpsc::Receiver<T>,
        semaphore: Arc<Semaphore>,
        process: F,
    ) -> JoinHandle<()>
    where
        T: Send + 'static,
        F: Fn(T) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            let mut in_flight = Vec::new();
            while let Some(item) = receiver.recv().await {
                let permit = match Arc::clone(&semaphore).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        error!("Processing semaphore closed: {}", e);
                        break;
                    }
                };
                let task = process(item);
                in_flight.push(tokio::spawn(async move {
                    task.await;
                    drop(permit);
                }));
                in_flight.retain(|handle: &JoinHandle<()>| !handle.is_finished());
            }
            for handle in in_flight {
                if let Err(e) = handle.await {
                    error!("Event task failed: {}", e);
                }
            }
        })
    }

    pub fn lookup(&self, key: &TransferIntent) -> Option<TransactionRecord> {
        self.ledger.lookup(key)
    }

    pub fn statistics(&self) -> LedgerStatistics {
        self.ledger.statistics()
    }

    pub fn metrics(&self) -> SentinelMetrics {
        self.counters.snapshot()
    }

    /// Wait for in-flight events to finish
    pub async fn shutdown(&self) -> Result<(), SentinelError> {
        info!("Shutting down {}", self.name);
        let _permits = self
            .processing_semaphore
            .acquire_many(self.permits)
            .await
            .map_err(|e| SentinelError::ChannelClosed(e.to_string()))?;
        info!("{} shutdown complete", self.name);
        Ok(())
    }
}
