//! In-process datapoint transport.
//!
//! Keeps the device's datapoints in a map and records every command written.
//! Backs the simulated door and the controller tests.

use super::DatapointTransport;
use crate::datapoint::{DpChanges, DpValue};
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

pub struct MemoryTransport {
    dps: RwLock<DpChanges>,
    sent: Mutex<Vec<(String, DpValue)>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    /// Forwarded copies of accepted commands, for a simulated device.
    command_tx: Option<mpsc::UnboundedSender<(String, DpValue)>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            dps: RwLock::new(DpChanges::new()),
            sent: Mutex::new(Vec::new()),
            fail_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            command_tx: None,
        }
    }

    /// Forward every accepted command to the given channel.
    pub fn with_command_channel(mut self, tx: mpsc::UnboundedSender<(String, DpValue)>) -> Self {
        self.command_tx = Some(tx);
        self
    }

    /// Merge a report into the stored datapoints and hand the batch back for delivery.
    pub fn report(&self, changes: DpChanges) -> DpChanges {
        let mut dps = self.dps.write();
        for (dp, value) in &changes {
            dps.insert(dp.clone(), value.clone());
        }
        changes
    }

    /// Make subsequent writes fail (true) or succeed (false).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent reads fail (true) or succeed (false).
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// All commands accepted so far, oldest first.
    pub fn sent(&self) -> Vec<(String, DpValue)> {
        self.sent.lock().clone()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatapointTransport for MemoryTransport {
    async fn get_state(&self, dp: &str) -> Result<DpValue> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(BridgeError::Transport(format!("read of dp {} failed", dp)));
        }
        self.dps
            .read()
            .get(dp)
            .cloned()
            .ok_or_else(|| BridgeError::DatapointUnavailable(dp.to_string()))
    }

    async fn set_state(&self, dp: &str, value: DpValue) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BridgeError::Transport(format!("write of dp {} failed", dp)));
        }
        self.sent.lock().push((dp.to_string(), value.clone()));
        if let Some(tx) = &self.command_tx {
            let _ = tx.send((dp.to_string(), value));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_report_then_read() {
        let transport = MemoryTransport::new();
        assert!(matches!(
            transport.get_state("1").await,
            Err(BridgeError::DatapointUnavailable(_))
        ));

        let mut changes = DpChanges::new();
        changes.insert("1".into(), DpValue::Bool(true));
        let delivered = transport.report(changes.clone());
        assert_eq!(delivered, changes);
        assert_eq!(transport.get_state("1").await.unwrap(), DpValue::Bool(true));
    }

    #[tokio::test]
    async fn test_writes_are_recorded_and_forwarded() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let transport = MemoryTransport::new().with_command_channel(tx);

        tokio_test::assert_ok!(transport.set_state("101", "open".into()).await);
        assert_eq!(transport.sent(), vec![("101".to_string(), DpValue::from("open"))]);
        assert_eq!(rx.recv().await, Some(("101".to_string(), DpValue::from("open"))));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let transport = MemoryTransport::new();
        transport.set_fail_writes(true);
        tokio_test::assert_err!(transport.set_state("1", true.into()).await);
        assert!(transport.sent().is_empty());

        transport.set_fail_reads(true);
        tokio_test::assert_err!(transport.get_state("1").await);
    }
}
