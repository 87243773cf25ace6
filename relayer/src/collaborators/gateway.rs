use crate::types::SentinelError;
use async_trait::async_trait;
use log::info;
use std::sync::atomic::{AtomicU64, Ordering};

/// Backend that moves value once a transaction is accepted
#[async_trait]
pub trait ExecutionGateway: Send + Sync {
    async fn execute(&self, from: &str, to: &str, amount: u64) -> Result<(), SentinelError>;
}

/// Gateway that only records the transfer in the log
#[derive(Debug, Default)]
pub struct LoggingExecutionGateway {
    executed: AtomicU64,
}

impl LoggingExecutionGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ExecutionGateway for LoggingExecutionGateway {
    async fn execute(&self, from: &str, to: &str, amount: u64) -> Result<(), SentinelError> {
        self.executed.fetch_add(1, Ordering::Relaxed);
        info!("opencbdc transaction: {} -> {} : {}", from, to, amount);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_executions() {
        let gateway = LoggingExecutionGateway::new();
        gateway.execute("alice", "bob", 10).await.unwrap();
        gateway.execute("bob", "carol", 5).await.unwrap();
        assert_eq!(gateway.executed(), 2);
    }
}
