//! CBDC Sentinel
//!
//! Reconciles transfer intents with the credential proofs of both parties.
//! Intents arrive as text messages, are admitted into a keyed ledger, and
//! trigger one proof request per party. Proof outcomes arrive asynchronously
//! and move each transaction from PENDING to ACCEPTED or REJECTED; accepted
//! transfers are executed exactly once.
//!
//! # Example
//!
//! ```no_run
//! use cbdc_sentinel::{
//!     collaborators::{AddressBook, LoggingExecutionGateway, SimulatedCredentialExchange},
//!     InboundMessage, ProcessingConfig, ProofOrchestrator, ProofResponseHandler, Sentinel,
//!     TransactionLedger,
//! };
//! use std::{sync::Arc, time::Duration};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (outcome_tx, outcome_rx) = mpsc::channel(64);
//!     let (message_tx, message_rx) = mpsc::channel(64);
//!
//!     let ledger = Arc::new(TransactionLedger::new());
//!     let exchange = Arc::new(SimulatedCredentialExchange::new(&outcome_tx, None, Duration::ZERO));
//!     let orchestrator = Arc::new(ProofOrchestrator::new(
//!         Arc::new(AddressBook::new()),
//!         exchange,
//!         "cred-def",
//!     ));
//!     let handler = Arc::new(ProofResponseHandler::new(
//!         ledger.clone(),
//!         Arc::new(LoggingExecutionGateway::new()),
//!     ));
//!     let config = ProcessingConfig { max_concurrent_events: 8, channel_capacity: 64 };
//!     let sentinel = Arc::new(Sentinel::new("sentinel", config, ledger, orchestrator, handler));
//!
//!     let mut handle = Arc::clone(&sentinel).spawn(message_rx, outcome_rx);
//!     message_tx.send(InboundMessage::new("cbdc:alice:bob:100:n1")).await?;
//!
//!     drop(message_tx);
//!     handle.drain_messages().await?;
//!     drop(outcome_tx);
//!     handle.join().await?;
//!
//!     println!("{:?}", sentinel.statistics());
//!     Ok(())
//! }
//! ```

pub mod collaborators;
pub mod config;
pub mod ledger;
pub mod orchestrator;
pub mod response_handler;
pub mod sentinel;
pub mod types;

pub use intent::{parse_message, MalformedIntent, TransferIntent};
pub use ledger::TransactionLedger;
pub use orchestrator::ProofOrchestrator;
pub use response_handler::{ProofResponseHandler, Resolution};
pub use sentinel::{Ingest, Sentinel, SentinelHandle};
pub use types::{
    Admission, InboundMessage, LedgerStatistics, PartyIdentity, ProcessingConfig, ProofOutcome,
    ProofOutcomeEvent, ProofRequest, SentinelConfig, SentinelError, SentinelMetrics,
    SessionHandle, TransactionRecord, Transition, TxStatus, Verdict,
};
