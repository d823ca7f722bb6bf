//! Transaction options.

use std::time::Duration;

/// Requested isolation level.
///
/// The in-memory engine serializes all writers behind one lock, so every
/// level executes as serializable; the request is recorded and logged for
/// parity with engines that distinguish them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    #[default]
    Serializable,
}

impl IsolationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "ReadUncommitted",
            IsolationLevel::ReadCommitted => "ReadCommitted",
            IsolationLevel::RepeatableRead => "RepeatableRead",
            IsolationLevel::Serializable => "Serializable",
        }
    }
}

/// Bounds on a transaction's life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxnOptions {
    pub isolation_level: IsolationLevel,
    /// How long to wait for the write lock before giving up.
    pub max_wait: Duration,
    /// How long the body may run before the transaction is rolled back.
    pub timeout: Duration,
}

impl Default for TxnOptions {
    fn default() -> Self {
        Self {
            isolation_level: IsolationLevel::default(),
            max_wait: Duration::from_millis(2000),
            timeout: Duration::from_millis(5000),
        }
    }
}

impl TxnOptions {
    pub fn isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = level;
        self
    }

    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
