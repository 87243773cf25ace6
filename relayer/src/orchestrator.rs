use crate::{
    collaborators::{CredentialExchange, IdentityResolver},
    types::{PartyIdentity, ProofRequest, SentinelError, SessionHandle, TransactionRecord},
};
use log::{debug, info, warn};
use std::sync::Arc;

/// Issues one correlated proof request to each party of a new transaction
pub struct ProofOrchestrator {
    resolver: Arc<dyn IdentityResolver>,
    exchange: Arc<dyn CredentialExchange>,
    schema_ref: String,
}

impl ProofOrchestrator {
    pub fn new(
        resolver: Arc<dyn IdentityResolver>,
        exchange: Arc<dyn CredentialExchange>,
        schema_ref: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            exchange,
            schema_ref: schema_ref.into(),
        }
    }

    /// Request proofs from sender and receiver of `record`.
    ///
    /// Returns the number of requests handed to the exchange. Resolution
    /// failures leave the record PENDING; nothing is sent in that case.
    pub async fn orchestrate(&self, record: &TransactionRecord) -> Result<usize, SentinelError> {
        let intent = &record.intent;
        if !record.is_pending() {
            debug!("Skipping orchestration of {}: already {}", intent, record.status);
            return Ok(0);
        }

        info!(
            "Starting a transaction from {} to {} for {}",
            intent.from, intent.to, intent.amount
        );

        let (from, to) = tokio::join!(
            self.resolver.resolve(&intent.from),
            self.resolver.resolve(&intent.to)
        );

        let (from_session, to_session) = match (from, to) {
            (None, None) => return Err(SentinelError::NoPartyResolved),
            (from, to) => (
                Self::session_of(from, &intent.from)?,
                Self::session_of(to, &intent.to)?,
            ),
        };

        info!(
            "Requesting proofs for each address: {} -> {}",
            from_session.0, to_session.0
        );

        let token = intent.correlation_token();
        let mut sent = 0;
        for (label, session) in [from_session, to_session] {
            let request = ProofRequest {
                session,
                schema_ref: self.schema_ref.clone(),
                correlation_token: token.clone(),
                party_label: label,
            };
            let party = request.party_label.clone();
            match self.exchange.send_proof_request(request).await {
                Ok(()) => sent += 1,
                Err(e) => warn!("Proof request to {} for {} failed: {}", party, token, e),
            }
        }

        if sent == 0 {
            return Err(SentinelError::ProofRequestFailed(token));
        }
        Ok(sent)
    }

    fn session_of(
        identity: Option<PartyIdentity>,
        address: &str,
    ) -> Result<(String, SessionHandle), SentinelError> {
        match identity {
            Some(PartyIdentity {
                label,
                session: Some(session),
            }) => Ok((label, session)),
            _ => Err(SentinelError::PartyUnreachable {
                address: address.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collaborators::{AddressBook, SimulatedCredentialExchange},
        types::{ProofOutcomeEvent, Verdict},
        TransactionLedger,
    };
    use async_trait::async_trait;
    use intent::TransferIntent;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct Fixture {
        book: Arc<AddressBook>,
        exchange: Arc<SimulatedCredentialExchange>,
        orchestrator: ProofOrchestrator,
        _outcomes: (mpsc::Sender<ProofOutcomeEvent>, mpsc::Receiver<ProofOutcomeEvent>),
    }

    async fn fixture() -> Fixture {
        let book = Arc::new(AddressBook::new());
        book.register("alice", "Alice").await;
        book.register("bob", "Bob").await;
        book.connect("Alice", SessionHandle("conn-a".to_string())).await;
        book.connect("Bob", SessionHandle("conn-b".to_string())).await;

        let (tx, rx) = mpsc::channel(8);
        let exchange = Arc::new(SimulatedCredentialExchange::new(&tx, None, Duration::ZERO));
        let orchestrator = ProofOrchestrator::new(book.clone(), exchange.clone(), "cred-def:cb");
        Fixture {
            book,
            exchange,
            orchestrator,
            _outcomes: (tx, rx),
        }
    }

    fn record(from: &str, to: &str) -> TransactionRecord {
        TransactionRecord::pending(TransferIntent::new(from, to, 100, "n1").unwrap())
    }

    #[tokio::test]
    async fn test_two_requests_with_identical_token() {
        let f = fixture().await;

        let sent = f.orchestrator.orchestrate(&record("alice", "bob")).await.unwrap();
        assert_eq!(sent, 2);

        let requests = f.exchange.requests().await;
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].session, SessionHandle("conn-a".to_string()));
        assert_eq!(requests[1].session, SessionHandle("conn-b".to_string()));
        for request in &requests {
            assert_eq!(request.correlation_token, "cbdc:alice:bob:100:n1");
            assert_eq!(request.schema_ref, "cred-def:cb");
        }
    }

    #[tokio::test]
    async fn test_neither_party_resolved() {
        let f = fixture().await;

        let result = f.orchestrator.orchestrate(&record("carol", "dave")).await;
        assert!(matches!(result, Err(SentinelError::NoPartyResolved)));
        assert!(f.exchange.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_one_party_unknown() {
        let f = fixture().await;

        let result = f.orchestrator.orchestrate(&record("alice", "dave")).await;
        match result {
            Err(SentinelError::PartyUnreachable { address }) => assert_eq!(address, "dave"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(f.exchange.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_party_without_session() {
        let f = fixture().await;
        f.book.disconnect("Alice").await;

        let result = f.orchestrator.orchestrate(&record("alice", "bob")).await;
        match result {
            Err(SentinelError::PartyUnreachable { address }) => assert_eq!(address, "alice"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(f.exchange.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_resolved_record_is_not_orchestrated() {
        let f = fixture().await;
        let ledger = TransactionLedger::new();
        let intent = TransferIntent::new("alice", "bob", 100, "n1").unwrap();
        ledger.admit(intent.clone());
        ledger.transition(&intent, Verdict::Accept);

        let resolved = ledger.lookup(&intent).unwrap();
        assert_eq!(f.orchestrator.orchestrate(&resolved).await.unwrap(), 0);
        assert!(f.exchange.requests().await.is_empty());
    }

    struct FailingExchange;

    #[async_trait]
    impl CredentialExchange for FailingExchange {
        async fn send_proof_request(&self, request: ProofRequest) -> Result<(), SentinelError> {
            Err(SentinelError::ProofRequestFailed(request.party_label))
        }
    }

    #[tokio::test]
    async fn test_all_sends_failing_is_reported() {
        let f = fixture().await;
        let orchestrator = ProofOrchestrator::new(f.book.clone(), Arc::new(FailingExchange), "cred-def:cb");

        let result = orchestrator.orchestrate(&record("alice", "bob")).await;
        assert!(matches!(result, Err(SentinelError::ProofRequestFailed(_))));
    }

    /// Refuses requests for one party and records the rest
    struct SelectiveExchange {
        refused: &'static str,
        sent: tokio::sync::Mutex<Vec<ProofRequest>>,
    }

    #[async_trait]
    impl CredentialExchange for SelectiveExchange {
        async fn send_proof_request(&self, request: ProofRequest) -> Result<(), SentinelError> {
            if request.party_label == self.refused {
                return Err(SentinelError::ProofRequestFailed(request.party_label));
            }
            self.sent.lock().await.push(request);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failed_send_does_not_stop_the_other() {
        let f = fixture().await;
        let exchange = Arc::new(SelectiveExchange {
            refused: "Alice",
            sent: tokio::sync::Mutex::new(Vec::new()),
        });
        let orchestrator = ProofOrchestrator::new(f.book.clone(), exchange.clone(), "cred-def:cb");

        let sent = orchestrator.orchestrate(&record("alice", "bob")).await.unwrap();
        assert_eq!(sent, 1);

        let requests = exchange.sent.lock().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].session, SessionHandle("conn-b".to_string()));
        assert_eq!(requests[0].correlation_token, "cbdc:alice:bob:100:n1");
    }
}
