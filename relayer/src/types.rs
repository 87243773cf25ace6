use chrono::{DateTime, Utc};
use intent::{MalformedIntent, TransferIntent};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// Core types shared by the ledger, the proof orchestration and the dispatcher

/// Lifecycle state of a transaction record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TxStatus {
    Pending,
    Accepted,
    Rejected,
}

impl TxStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TxStatus::Pending)
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxStatus::Pending => write!(f, "PENDING"),
            TxStatus::Accepted => write!(f, "ACCEPTED"),
            TxStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// Target of a state transition. Only terminal states can be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject,
}

impl From<Verdict> for TxStatus {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Accept => TxStatus::Accepted,
            Verdict::Reject => TxStatus::Rejected,
        }
    }
}

/// A transfer intent together with its reconciliation state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub intent: TransferIntent,
    pub status: TxStatus,
    pub admitted_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl TransactionRecord {
    pub fn pending(intent: TransferIntent) -> Self {
        Self {
            id: Uuid::new_v4(),
            intent,
            status: TxStatus::Pending,
            admitted_at: Utc::now(),
            resolved_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TxStatus::Pending
    }
}

/// Result of admitting an intent into the ledger
#[derive(Debug, Clone)]
pub struct Admission {
    pub record: TransactionRecord,
    pub is_new: bool,
}

/// Result of a state transition attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Applied(TransactionRecord),
    /// The record was already final; nothing changed.
    Ignored { status: TxStatus },
    NotFound,
}

/// Opaque handle of a live counterparty connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionHandle(pub String);

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the identity resolver knows about an address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartyIdentity {
    pub label: String,
    pub session: Option<SessionHandle>,
}

/// A proof request addressed to one party of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofRequest {
    pub session: SessionHandle,
    pub schema_ref: String,
    pub correlation_token: String,
    pub party_label: String,
}

/// State reported by the credential exchange for a proof request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProofOutcome {
    Success,
    Abandoned,
    Declined,
    Other(String),
}

impl From<String> for ProofOutcome {
    fn from(state: String) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "done" | "success" => ProofOutcome::Success,
            "abandoned" => ProofOutcome::Abandoned,
            "declined" => ProofOutcome::Declined,
            _ => ProofOutcome::Other(state),
        }
    }
}

impl From<ProofOutcome> for String {
    fn from(outcome: ProofOutcome) -> Self {
        outcome.to_string()
    }
}

impl fmt::Display for ProofOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProofOutcome::Success => write!(f, "done"),
            ProofOutcome::Abandoned => write!(f, "abandoned"),
            ProofOutcome::Declined => write!(f, "declined"),
            ProofOutcome::Other(state) => write!(f, "{}", state),
        }
    }
}

/// Asynchronous notification from the credential exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOutcomeEvent {
    pub correlation_token: String,
    pub outcome: ProofOutcome,
}

impl ProofOutcomeEvent {
    pub fn new(correlation_token: impl Into<String>, outcome: ProofOutcome) -> Self {
        Self {
            correlation_token: correlation_token.into(),
            outcome,
        }
    }
}

/// Raw text message delivered by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Label of the connection the message arrived on, if known
    pub sender: Option<String>,
    pub content: String,
}

impl InboundMessage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            sender: None,
            content: content.into(),
        }
    }

    pub fn from_sender(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender: Some(sender.into()),
            content: content.into(),
        }
    }

    /// Decode a transport line of the form `[<label>> ]<content>`.
    ///
    /// The label is a single word without `:`; anything else is taken as
    /// content with no known sender.
    pub fn from_line(line: &str) -> Self {
        match line.split_once(SENDER_SEPARATOR) {
            Some((label, content))
                if !label.is_empty()
                    && !label.contains(intent::DELIMITER)
                    && !label.contains(char::is_whitespace) =>
            {
                Self::from_sender(label, content.trim_start())
            }
            _ => Self::new(line),
        }
    }
}

/// Separates the sender label from the content on a transport line
pub const SENDER_SEPARATOR: &str = "> ";

/// Snapshot of ledger contents by status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStatistics {
    pub total: u64,
    pub pending: u64,
    pub accepted: u64,
    pub rejected: u64,
}

/// Counters for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentinelMetrics {
    pub messages_received: u64,
    pub intents_admitted: u64,
    pub duplicate_intents: u64,
    pub malformed_intents: u64,
    pub orchestrations_aborted: u64,
    pub proof_requests_sent: u64,
    pub outcomes_received: u64,
    pub outcomes_dropped: u64,
    pub executions: u64,
    pub execution_failures: u64,
}

/// Sentinel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentinelConfig {
    pub sentinel: IdentityConfig,
    pub proof: ProofConfig,
    pub processing: ProcessingConfig,
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub parties: Vec<PartyConfig>,
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofConfig {
    /// Credential definition every party must prove against
    pub schema_ref: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    pub max_concurrent_events: usize,
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyConfig {
    pub address: String,
    pub label: String,
    pub session: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub auto_outcome: Option<String>,
    pub respond_after_ms: u64,
}

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum SentinelError {
    #[error("Malformed intent: {0}")]
    MalformedIntent(#[from] MalformedIntent),

    #[error("Unparseable correlation token: {0}")]
    UnparseableToken(String),

    #[error("Unknown transaction: {0}")]
    UnknownTransaction(String),

    #[error("Neither sender nor receiver is registered")]
    NoPartyResolved,

    #[error("Party {address} is not connected")]
    PartyUnreachable { address: String },

    #[error("Proof request failed: {0}")]
    ProofRequestFailed(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Channel closed: {0}")]
    ChannelClosed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_exchange_state() {
        assert_eq!(ProofOutcome::from("done".to_string()), ProofOutcome::Success);
        assert_eq!(ProofOutcome::from("SUCCESS".to_string()), ProofOutcome::Success);
        assert_eq!(ProofOutcome::from("abandoned".to_string()), ProofOutcome::Abandoned);
        assert_eq!(ProofOutcome::from("declined".to_string()), ProofOutcome::Declined);
        assert_eq!(
            ProofOutcome::from("request-sent".to_string()),
            ProofOutcome::Other("request-sent".to_string())
        );
    }

    #[test]
    fn test_outcome_event_json() {
        let event: ProofOutcomeEvent = serde_json::from_str(
            r#"{"correlation_token":"cbdc:alice:bob:100:n1","outcome":"declined"}"#,
        )
        .unwrap();
        assert_eq!(event.outcome, ProofOutcome::Declined);

        let json = serde_json::to_string(&ProofOutcomeEvent::new("t", ProofOutcome::Success)).unwrap();
        assert_eq!(json, r#"{"correlation_token":"t","outcome":"done"}"#);
    }

    #[test]
    fn test_message_line_with_sender_label() {
        assert_eq!(
            InboundMessage::from_line("Alice> cbdc:alice:bob:100:n1"),
            InboundMessage::from_sender("Alice", "cbdc:alice:bob:100:n1")
        );
        assert_eq!(
            InboundMessage::from_line("cbdc:alice:bob:100:n1"),
            InboundMessage::new("cbdc:alice:bob:100:n1")
        );
        assert_eq!(
            InboundMessage::from_line("note: a > b"),
            InboundMessage::new("note: a > b")
        );
        assert_eq!(InboundMessage::from_line("> hi"), InboundMessage::new("> hi"));
    }

    #[test]
    fn test_verdict_targets_terminal_states() {
        assert_eq!(TxStatus::from(Verdict::Accept), TxStatus::Accepted);
        assert_eq!(TxStatus::from(Verdict::Reject), TxStatus::Rejected);
        assert!(TxStatus::Accepted.is_terminal());
        assert!(!TxStatus::Pending.is_terminal());
    }
}
