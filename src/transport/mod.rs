//! Lock network transports
//!
//! The engine emits [`LockCommand`]s fire-and-forget; a transport owns the
//! actual write to the hardware network. The console transport stands in for
//! real hardware during development and tests.

use crate::engine::{CodeDigits, SlotAddr};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// One outbound command to the lock network
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockCommand {
    /// Write a code into a specific slot
    SetUserCode { addr: SlotAddr, code: CodeDigits },
    /// Erase whatever code a slot holds
    ClearUserCode { addr: SlotAddr },
    /// Explicitly re-query a slot's occupancy status
    RefreshSlot { addr: SlotAddr },
}

impl std::fmt::Display for LockCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockCommand::SetUserCode { addr, code } => write!(f, "set-code {} {}", addr, code),
            LockCommand::ClearUserCode { addr } => write!(f, "clear-code {}", addr),
            LockCommand::RefreshSlot { addr } => write!(f, "refresh {}", addr),
        }
    }
}

/// Transport trait - all lock network integrations implement this
///
/// Note: All methods take &self (not &mut self) to support Arc<dyn LockTransport>.
/// Transports should use interior mutability (RwLock, Mutex, etc.) for mutable state.
#[async_trait]
pub trait LockTransport: Send + Sync {
    /// Get the transport name (e.g., "console", "zwave")
    fn name(&self) -> &str;

    /// Initialize the transport (open the network connection, etc.)
    async fn init(&self) -> Result<()>;

    /// Deliver one command to the network
    async fn send(&self, command: LockCommand) -> Result<()>;

    /// Shutdown the transport gracefully
    async fn shutdown(&self) -> Result<()>;
}

/// Forward queued engine commands into a transport
///
/// Runs until the sending side of the channel is dropped. A failed send is
/// logged and skipped; the engine has already moved on and the confirming
/// notification simply never arrives for that command.
pub fn spawn_pump(
    transport: Arc<dyn LockTransport>,
    mut rx: mpsc::UnboundedReceiver<LockCommand>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            if let Err(e) = transport.send(command.clone()).await {
                warn!("Transport '{}' failed to send {}: {:#}", transport.name(), command, e);
            }
        }
        debug!("Transport pump for '{}' stopped", transport.name());
    })
}

pub mod console;

// Re-export commonly used transports
pub use console::ConsoleTransport;
