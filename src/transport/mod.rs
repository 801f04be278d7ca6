//! Datapoint transport contract.
//!
//! The door controller never talks to the device directly. It reads and writes
//! single datapoints through a [`DatapointTransport`], and receives report
//! batches from whoever owns the device link.

mod memory;

pub use memory::MemoryTransport;

use crate::datapoint::DpValue;
use crate::error::Result;
use async_trait::async_trait;

/// Request interface to a remote datapoint device.
#[async_trait]
pub trait DatapointTransport: Send + Sync {
    /// Read the last known value of a single datapoint.
    async fn get_state(&self, dp: &str) -> Result<DpValue>;

    /// Issue a command. `Ok` means the transport accepted the write, not that
    /// the device finished acting on it.
    async fn set_state(&self, dp: &str, value: DpValue) -> Result<()>;
}
