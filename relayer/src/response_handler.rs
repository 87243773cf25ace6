use crate::{
    collaborators::ExecutionGateway,
    ledger::TransactionLedger,
    types::{ProofOutcome, ProofOutcomeEvent, SentinelError, Transition, TxStatus, Verdict},
};
use intent::{parse_message, TransferIntent};
use log::{debug, error, info};
use std::sync::Arc;

/// What a proof outcome event did to its transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// PENDING -> ACCEPTED and the gateway executed the transfer
    Accepted,
    /// PENDING -> ACCEPTED but the gateway failed; execution is not retried
    AcceptedExecutionFailed,
    /// PENDING -> REJECTED
    Rejected,
    /// The transaction was already final
    AlreadyResolved(TxStatus),
    /// Outcome is not terminal; the transaction stays PENDING
    NotTerminal,
}

/// Drives the transaction state machine from proof outcome events
pub struct ProofResponseHandler {
    ledger: Arc<TransactionLedger>,
    gateway: Arc<dyn ExecutionGateway>,
}

impl ProofResponseHandler {
    pub fn new(ledger: Arc<TransactionLedger>, gateway: Arc<dyn ExecutionGateway>) -> Self {
        Self { ledger, gateway }
    }

    pub async fn handle(&self, event: ProofOutcomeEvent) -> Result<Resolution, SentinelError> {
        let key = Self::correlate(&event.correlation_token)?;
        if self.ledger.lookup(&key).is_none() {
            return Err(SentinelError::UnknownTransaction(event.correlation_token));
        }

        let verdict = match event.outcome {
            ProofOutcome::Success => Verdict::Accept,
            ProofOutcome::Abandoned | ProofOutcome::Declined => Verdict::Reject,
            ProofOutcome::Other(state) => {
                debug!("Proof for {} is {}, waiting", key, state);
                return Ok(Resolution::NotTerminal);
            }
        };

        match self.ledger.transition(&key, verdict) {
            Transition::Applied(record) if verdict == Verdict::Accept => {
                info!(
                    "Transaction accepted: {} -> {} : {}",
                    record.intent.from, record.intent.to, record.intent.amount
                );
                match self
                    .gateway
                    .execute(&record.intent.from, &record.intent.to, record.intent.amount)
                    .await
                {
                    Ok(()) => Ok(Resolution::Accepted),
                    Err(e) => {
                        // Already ACCEPTED; execution is at-most-once.
                        error!("Execution of {} failed: {}", record.intent, e);
                        Ok(Resolution::AcceptedExecutionFailed)
                    }
                }
            }
            Transition::Applied(record) => {
                info!("{} was rejected", record.intent);
                Ok(Resolution::Rejected)
            }
            Transition::Ignored { status } => {
                debug!("Outcome for {} ignored: transaction already {}", key, status);
                Ok(Resolution::AlreadyResolved(status))
            }
            Transition::NotFound => Err(SentinelError::UnknownTransaction(key.to_string())),
        }
    }

    fn correlate(token: &str) -> Result<TransferIntent, SentinelError> {
        match parse_message(token) {
            Ok(Some(intent)) => Ok(intent),
            Ok(None) => Err(SentinelError::UnparseableToken(token.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}
