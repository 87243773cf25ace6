use crate::types::{ProofOutcome, ProofOutcomeEvent, ProofRequest, SentinelError};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::time::Duration;
use tokio::{
    sync::{mpsc, Mutex},
    time::sleep,
};

/// Credential-exchange protocol endpoint.
///
/// Sending is fire-and-forget: the outcome of each request arrives later as a
/// [`ProofOutcomeEvent`] on a separate channel, tagged with the request's
/// correlation token.
#[async_trait]
pub trait CredentialExchange: Send + Sync {
    async fn send_proof_request(&self, request: ProofRequest) -> Result<(), SentinelError>;
}

/// In-process exchange that answers every request with a fixed outcome.
///
/// Only a weak handle to the outcome channel is kept, so the channel closes
/// once the transport drops its sender and every pending answer is delivered.
pub struct SimulatedCredentialExchange {
    outcome_sender: mpsc::WeakSender<ProofOutcomeEvent>,
    auto_outcome: Option<ProofOutcome>,
    respond_after: Duration,
    requests: Mutex<Vec<ProofRequest>>,
}

impl SimulatedCredentialExchange {
    pub fn new(
        outcome_sender: &mpsc::Sender<ProofOutcomeEvent>,
        auto_outcome: Option<ProofOutcome>,
        respond_after: Duration,
    ) -> Self {
        Self {
            outcome_sender: outcome_sender.downgrade(),
            auto_outcome,
            respond_after,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests sent so far, oldest first
    pub async fn requests(&self) -> Vec<ProofRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl CredentialExchange for SimulatedCredentialExchange {
    async fn send_proof_request(&self, request: ProofRequest) -> Result<(), SentinelError> {
        let sender = match self.outcome_sender.upgrade() {
            Some(sender) if !sender.is_closed() => sender,
            _ => return Err(SentinelError::ChannelClosed("proof outcomes".to_string())),
        };

        info!(
            "Proof request sent to {} over {} for {}",
            request.party_label, request.session, request.correlation_token
        );
        self.requests.lock().await.push(request.clone());

        if let Some(outcome) = self.auto_outcome.clone() {
            let delay = self.respond_after;
            tokio::spawn(async move {
                sleep(delay).await;
                debug!("Simulated {} outcome for {}", outcome, request.correlation_token);
                let event = ProofOutcomeEvent::new(request.correlation_token, outcome);
                if sender.send(event).await.is_err() {
                    warn!("Outcome channel closed before simulated response was delivered");
                }
            });
        }

        Ok(())
    }
}
