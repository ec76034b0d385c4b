//! EngineHandle - Public API for the reconciliation engine
//!
//! Wraps the engine actor's channel interface in ergonomic methods:
//! fire-and-forget senders for the notification hot path, async methods
//! with oneshot responses for operator commands, and a watch channel for
//! observing engine status.

use tokio::sync::{mpsc, oneshot, watch};
use tracing::error;

use super::commands::{AssignReport, EngineCommand};
use super::types::{CodeDigits, CodeError, EngineStatus, SlotAddr, SlotState};

/// Handle for interacting with the EngineActor
///
/// Cheap to clone; every component that feeds or queries the engine holds
/// one. All methods are non-blocking for the caller.
///
/// # Hot Path Methods (fire-and-forget)
/// - `value_added` - a slot was discovered on the network
/// - `value_changed` - a slot reported its raw frame
/// - `poll_tick` - one refresh poller tick
///
/// # Operator Methods (async with response)
/// - `assign_code` - fan a new code out to every lock with a free slot
/// - `clear_code` - clear every slot labeled with a name
/// - `rename_code` - relabel without touching hardware
/// - `list_slots` - snapshot of every known slot
#[derive(Clone)]
pub struct EngineHandle {
    /// Command channel to the EngineActor
    cmd_tx: mpsc::UnboundedSender<EngineCommand>,
    /// Latest published engine status
    status_rx: watch::Receiver<EngineStatus>,
}

impl EngineHandle {
    /// Create a new EngineHandle over the given channels
    pub fn new(
        cmd_tx: mpsc::UnboundedSender<EngineCommand>,
        status_rx: watch::Receiver<EngineStatus>,
    ) -> Self {
        Self { cmd_tx, status_rx }
    }

    // =========================================================================
    // Hot path methods (fire-and-forget, no await)
    // =========================================================================

    /// Report a slot discovered on the network
    ///
    /// Fire-and-forget: the network layer never waits on the engine.
    pub fn value_added(&self, addr: SlotAddr) {
        let _ = self.cmd_tx.send(EngineCommand::ValueAdded { addr });
    }

    /// Report a slot's raw status frame
    ///
    /// Fire-and-forget: decoding happens inside the engine actor.
    pub fn value_changed(&self, addr: SlotAddr, frame: Vec<u8>) {
        let _ = self.cmd_tx.send(EngineCommand::ValueChanged { addr, frame });
    }

    /// Deliver one poller tick
    ///
    /// Fire-and-forget: the poller never waits on the engine either.
    pub fn poll_tick(&self) {
        let _ = self.cmd_tx.send(EngineCommand::PollTick);
    }

    // =========================================================================
    // Operator methods (async with response)
    // =========================================================================

    /// Assign `code` under `name` on every device with a free slot
    ///
    /// Validation precedes all side effects: a code that is not all ASCII
    /// digits is rejected here and nothing reaches the engine or hardware.
    pub async fn assign_code(&self, name: &str, code: &str) -> Result<AssignReport, CodeError> {
        let code = match CodeDigits::parse(code) {
            Ok(code) => code,
            Err(e) => {
                error!("Rejected assign for '{}': {}", name, e);
                return Err(e);
            }
        };

        let (response_tx, response_rx) = oneshot::channel();
        let cmd = EngineCommand::AssignCode {
            name: name.to_string(),
            code,
            response: response_tx,
        };

        self.cmd_tx.send(cmd).map_err(|_| CodeError::EngineClosed)?;
        response_rx.await.map_err(|_| CodeError::EngineClosed)
    }

    /// Clear every slot whose label exactly equals `name`
    ///
    /// Returns the slots transitioned to pending-clear.
    pub async fn clear_code(&self, name: &str) -> Result<Vec<SlotAddr>, CodeError> {
        let (response_tx, response_rx) = oneshot::channel();
        let cmd = EngineCommand::ClearCode {
            name: name.to_string(),
            response: response_tx,
        };

        self.cmd_tx.send(cmd).map_err(|_| CodeError::EngineClosed)?;
        response_rx.await.map_err(|_| CodeError::EngineClosed)
    }

    /// Relabel every slot whose label exactly equals `old_name`
    ///
    /// Durable label only; the codes on the locks are untouched.
    pub async fn rename_code(
        &self,
        old_name: &str,
        new_name: &str,
    ) -> Result<Vec<SlotAddr>, CodeError> {
        let (response_tx, response_rx) = oneshot::channel();
        let cmd = EngineCommand::RenameCode {
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
            response: response_tx,
        };

        self.cmd_tx.send(cmd).map_err(|_| CodeError::EngineClosed)?;
        response_rx.await.map_err(|_| CodeError::EngineClosed)
    }

    /// Snapshot of every known slot and its current state
    pub async fn list_slots(&self) -> Vec<(SlotAddr, SlotState)> {
        let (response_tx, response_rx) = oneshot::channel();
        let cmd = EngineCommand::ListSlots {
            response: response_tx,
        };

        if self.cmd_tx.send(cmd).is_err() {
            return Vec::new();
        }

        response_rx.await.ok().unwrap_or_default()
    }

    // =========================================================================
    // Status methods
    // =========================================================================

    /// Latest published engine status
    pub fn status(&self) -> EngineStatus {
        *self.status_rx.borrow()
    }

    /// Subscribe to status updates
    ///
    /// The receiver yields a fresh status after every save the engine makes.
    pub fn subscribe_status(&self) -> watch::Receiver<EngineStatus> {
        self.status_rx.clone()
    }

    // =========================================================================
    // Lifecycle methods
    // =========================================================================

    /// Check if the actor is still alive
    ///
    /// Returns false if the command channel is closed.
    pub fn is_alive(&self) -> bool {
        !self.cmd_tx.is_closed()
    }

    /// Signal the actor to shut down gracefully
    ///
    /// Fire-and-forget: Does not wait for confirmation.
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(EngineCommand::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::error::TryRecvError;

    fn make_handle() -> (
        EngineHandle,
        mpsc::UnboundedReceiver<EngineCommand>,
        watch::Sender<EngineStatus>,
    ) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(EngineStatus::default());
        (EngineHandle::new(cmd_tx, status_rx), cmd_rx, status_tx)
    }

    #[test]
    fn test_handle_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<EngineHandle>();
    }

    #[tokio::test]
    async fn test_is_alive_tracks_channel() {
        let (handle, cmd_rx, _status_tx) = make_handle();
        assert!(handle.is_alive());
        drop(cmd_rx);
        assert!(!handle.is_alive());
    }

    #[tokio::test]
    async fn test_invalid_code_sends_nothing() {
        let (handle, mut cmd_rx, _status_tx) = make_handle();

        let result = handle.assign_code("bob", "12a4").await;
        assert!(matches!(result, Err(CodeError::InvalidCode { .. })));

        // Nothing crossed the channel: validation aborted before any send
        assert!(matches!(cmd_rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_status_reads_watch_channel() {
        let (handle, _cmd_rx, status_tx) = make_handle();

        assert_eq!(handle.status(), EngineStatus::default());

        let updated = EngineStatus {
            modtime: 42,
            pending_refresh: 1,
            total_slots: 3,
        };
        status_tx.send(updated).unwrap();
        assert_eq!(handle.status(), updated);
    }
}
