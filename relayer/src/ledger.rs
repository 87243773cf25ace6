use crate::types::{
    Admission, LedgerStatistics, TransactionRecord, Transition, TxStatus, Verdict,
};
use chrono::Utc;
use dashmap::{mapref::entry::Entry, DashMap};
use intent::TransferIntent;
use log::{debug, info};

/// Keyed store of transaction records.
///
/// Records are keyed by the full intent (`from`, `to`, `amount`, `nonce`).
/// Every read-modify-write goes through a single map entry while its shard
/// lock is held, so two callers racing on the same key never interleave and
/// callers on different keys do not wait on each other beyond shard
/// contention. Records are never removed.
#[derive(Debug, Default)]
pub struct TransactionLedger {
    records: DashMap<TransferIntent, TransactionRecord>,
}

impl TransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a PENDING record for `intent` unless one already exists.
    pub fn admit(&self, intent: TransferIntent) -> Admission {
        match self.records.entry(intent) {
            Entry::Occupied(entry) => {
                debug!("Transaction already exists: {}", entry.key());
                Admission {
                    record: entry.get().clone(),
                    is_new: false,
                }
            }
            Entry::Vacant(entry) => {
                let record = TransactionRecord::pending(entry.key().clone());
                info!("Transaction added to the ledger: {} ({})", record.intent, record.id);
                entry.insert(record.clone());
                Admission {
                    record,
                    is_new: true,
                }
            }
        }
    }

    pub fn lookup(&self, key: &TransferIntent) -> Option<TransactionRecord> {
        self.records.get(key).map(|record| record.value().clone())
    }

    /// Move a PENDING record to a final state.
    ///
    /// Final states are immutable: a record that is already ACCEPTED or
    /// REJECTED is left untouched and `Transition::Ignored` is returned.
    pub fn transition(&self, key: &TransferIntent, verdict: Verdict) -> Transition {
        let Some(mut record) = self.records.get_mut(key) else {
            return Transition::NotFound;
        };

        if record.status != TxStatus::Pending {
            debug!(
                "Transition to {} ignored for {}: already {}",
                TxStatus::from(verdict),
                key,
                record.status
            );
            return Transition::Ignored {
                status: record.status,
            };
        }

        record.status = verdict.into();
        record.resolved_at = Some(Utc::now());
        Transition::Applied(record.value().clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn statistics(&self) -> LedgerStatistics {
        let mut stats = LedgerStatistics::default();
        for entry in self.records.iter() {
            stats.total += 1;
            match entry.status {
                TxStatus::Pending => stats.pending += 1,
                TxStatus::Accepted => stats.accepted += 1,
                TxStatus::Rejected => stats.rejected += 1,
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn intent(nonce: &str) -> TransferIntent {
        TransferIntent::new("alice", "bob", 100, nonce).unwrap()
    }

    #[test]
    fn test_admit_is_idempotent() {
        let ledger = TransactionLedger::new();

        let first = ledger.admit(intent("n1"));
        assert!(first.is_new);
        assert_eq!(first.record.status, TxStatus::Pending);

        let second = ledger.admit(intent("n1"));
        assert!(!second.is_new);
        assert_eq!(second.record.id, first.record.id);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_distinct_nonces_are_distinct_records() {
        let ledger = TransactionLedger::new();
        ledger.admit(intent("n1"));
        ledger.admit(intent("n2"));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_lookup() {
        let ledger = TransactionLedger::new();
        assert!(ledger.lookup(&intent("n1")).is_none());

        ledger.admit(intent("n1"));
        let record = ledger.lookup(&intent("n1")).unwrap();
        assert_eq!(record.intent, intent("n1"));
        assert!(record.is_pending());
    }

    #[test]
    fn test_transition_from_pending() {
        let ledger = TransactionLedger::new();
        ledger.admit(intent("n1"));

        match ledger.transition(&intent("n1"), Verdict::Accept) {
            Transition::Applied(record) => {
                assert_eq!(record.status, TxStatus::Accepted);
                assert!(record.resolved_at.is_some());
            }
            other => panic!("unexpected transition: {:?}", other),
        }
        assert_eq!(ledger.lookup(&intent("n1")).unwrap().status, TxStatus::Accepted);
    }

    #[test]
    fn test_final_states_are_immutable() {
        let ledger = TransactionLedger::new();
        ledger.admit(intent("n1"));
        ledger.transition(&intent("n1"), Verdict::Reject);

        assert_eq!(
            ledger.transition(&intent("n1"), Verdict::Accept),
            Transition::Ignored {
                status: TxStatus::Rejected
            }
        );
        assert_eq!(
            ledger.transition(&intent("n1"), Verdict::Reject),
            Transition::Ignored {
                status: TxStatus::Rejected
            }
        );
        assert_eq!(ledger.lookup(&intent("n1")).unwrap().status, TxStatus::Rejected);
    }

    #[test]
    fn test_transition_unknown_key() {
        let ledger = TransactionLedger::new();
        assert_eq!(ledger.transition(&intent("n1"), Verdict::Accept), Transition::NotFound);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_readmission_after_resolution_keeps_final_state() {
        let ledger = TransactionLedger::new();
        ledger.admit(intent("n1"));
        ledger.transition(&intent("n1"), Verdict::Accept);

        let again = ledger.admit(intent("n1"));
        assert!(!again.is_new);
        assert_eq!(again.record.status, TxStatus::Accepted);
    }

    #[test]
    fn test_statistics() {
        let ledger = TransactionLedger::new();
        for nonce in ["a", "b", "c", "d"] {
            ledger.admit(intent(nonce));
        }
        ledger.transition(&intent("a"), Verdict::Accept);
        ledger.transition(&intent("b"), Verdict::Reject);

        assert_eq!(
            ledger.statistics(),
            LedgerStatistics {
                total: 4,
                pending: 2,
                accepted: 1,
                rejected: 1,
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_admissions_create_one_record() {
        let ledger = Arc::new(TransactionLedger::new());

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                tokio::spawn(async move { ledger.admit(intent("race")).is_new })
            })
            .collect();

        let mut new_count = 0;
        for handle in handles {
            if handle.await.unwrap() {
                new_count += 1;
            }
        }

        assert_eq!(new_count, 1);
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_transitions_apply_once() {
        let ledger = Arc::new(TransactionLedger::new());
        ledger.admit(intent("race"));

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                let verdict = if i % 2 == 0 { Verdict::Accept } else { Verdict::Reject };
                tokio::spawn(async move { ledger.transition(&intent("race"), verdict) })
            })
            .collect();

        let mut applied = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), Transition::Applied(_)) {
                applied += 1;
            }
        }

        assert_eq!(applied, 1);
        assert!(ledger.lookup(&intent("race")).unwrap().status.is_terminal());
    }
}
