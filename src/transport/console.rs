//! Console transport - logs all lock commands for testing and debugging

use crate::transport::{LockCommand, LockTransport};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// ConsoleTransport logs every lock command instead of sending it
///
/// This is useful for:
/// - Exercising the engine without a hardware network attached
/// - Watching the exact command stream an operator action produces
/// - Development without lock hardware
pub struct ConsoleTransport {
    name: String,
    /// Track if transport is initialized
    initialized: Arc<RwLock<bool>>,
    /// Commands handled so far
    sent_count: Arc<RwLock<u64>>,
}

impl ConsoleTransport {
    /// Create a new ConsoleTransport with a given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            initialized: Arc::new(RwLock::new(false)),
            sent_count: Arc::new(RwLock::new(0)),
        }
    }

    /// Number of commands this transport has handled
    pub async fn sent_count(&self) -> u64 {
        *self.sent_count.read().await
    }
}

#[async_trait]
impl LockTransport for ConsoleTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&self) -> Result<()> {
        *self.initialized.write().await = true;
        *self.sent_count.write().await = 0;
        info!("✅ ConsoleTransport '{}' initialized", self.name);
        Ok(())
    }

    async fn send(&self, command: LockCommand) -> Result<()> {
        // Check if initialized
        if !*self.initialized.read().await {
            warn!("⚠️  ConsoleTransport '{}' not initialized, dropping command", self.name);
            return Ok(());
        }

        let mut count = self.sent_count.write().await;
        *count += 1;
        let cmd_num = *count;
        drop(count);

        info!(
            "🔐 [{}] Transport '{}' → {} [cmd #{}]",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            self.name,
            command,
            cmd_num
        );

        debug!(
            transport = self.name,
            command = %command,
            cmd_count = cmd_num,
            "ConsoleTransport send"
        );

        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        let was_initialized = *self.initialized.read().await;

        if was_initialized {
            let final_count = *self.sent_count.read().await;
            info!(
                "🛑 ConsoleTransport '{}' shutting down (handled {} commands)",
                self.name, final_count
            );
        }

        *self.initialized.write().await = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{CodeDigits, DeviceId, SlotAddr, SlotIndex};

    fn slot(device: u32, index: u8) -> SlotAddr {
        SlotAddr::new(DeviceId(device), SlotIndex(index))
    }

    #[tokio::test]
    async fn test_console_transport_lifecycle() {
        let transport = ConsoleTransport::new("test");

        assert_eq!(transport.name(), "test");
        assert!(!*transport.initialized.read().await);

        transport.init().await.unwrap();
        assert!(*transport.initialized.read().await);

        transport
            .send(LockCommand::SetUserCode {
                addr: slot(4, 1),
                code: CodeDigits::parse("1234").unwrap(),
            })
            .await
            .unwrap();
        transport
            .send(LockCommand::RefreshSlot { addr: slot(4, 2) })
            .await
            .unwrap();

        assert_eq!(transport.sent_count().await, 2);

        transport.shutdown().await.unwrap();
        assert!(!*transport.initialized.read().await);
    }

    #[tokio::test]
    async fn test_console_transport_send_without_init() {
        let transport = ConsoleTransport::new("uninit_test");

        // Should succeed but warn (not error)
        let result = transport
            .send(LockCommand::ClearUserCode { addr: slot(4, 1) })
            .await;

        assert!(result.is_ok());
        assert_eq!(transport.sent_count().await, 0);
    }

    #[tokio::test]
    async fn test_console_transport_many_sends() {
        let transport = ConsoleTransport::new("multi_test");
        transport.init().await.unwrap();

        for i in 0..10 {
            transport
                .send(LockCommand::RefreshSlot { addr: slot(4, i) })
                .await
                .unwrap();
        }

        assert_eq!(transport.sent_count().await, 10);
    }
}
