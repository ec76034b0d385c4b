//! Command enum for the reconciliation engine actor
//!
//! Message-passing interface separating the hot path (fire-and-forget
//! hardware notifications and poller ticks) from operator commands that
//! need a response.

use super::types::{CodeDigits, DeviceId, SlotAddr, SlotState};
use tokio::sync::oneshot;

/// Commands for the engine actor
///
/// Two categories:
/// - **Hot path** (no response): hardware notifications and poller ticks,
///   sent fire-and-forget so the network layer never blocks on the engine.
/// - **Request-response**: operator commands that report what they did via
///   a oneshot channel.
#[derive(Debug)]
pub enum EngineCommand {
    // -------------------------------------------------------------------------
    // Hot path commands (no response - fire and forget)
    // -------------------------------------------------------------------------
    /// A user-code slot was discovered on the network
    ///
    /// First sighting creates the slot as unknown and queues it for refresh;
    /// repeat sightings are no-ops.
    ValueAdded {
        /// Slot that appeared
        addr: SlotAddr,
    },

    /// A user-code slot reported its current raw frame
    ///
    /// The occupancy bit is decoded inside the actor turn; an undecodable
    /// frame is logged and changes nothing.
    ValueChanged {
        /// Slot that reported
        addr: SlotAddr,
        /// Raw message payload as received from the network
        frame: Vec<u8>,
    },

    /// One poller tick: issue at most one refresh query
    PollTick,

    // -------------------------------------------------------------------------
    // Request-response commands (require oneshot channel)
    // -------------------------------------------------------------------------
    /// Give `name` a code on every device with a free slot
    ///
    /// The code is validated before this command is ever constructed.
    AssignCode {
        /// Label for the new code
        name: String,
        /// Validated digit string to write
        code: CodeDigits,
        /// Response channel
        response: oneshot::Sender<AssignReport>,
    },

    /// Clear every slot whose label exactly equals `name`
    ClearCode {
        /// Label to clear
        name: String,
        /// Slots transitioned to pending-clear
        response: oneshot::Sender<Vec<SlotAddr>>,
    },

    /// Relabel every slot whose label exactly equals `old_name`
    ///
    /// Durable label only; no hardware interaction.
    RenameCode {
        /// Label to replace
        old_name: String,
        /// Replacement label
        new_name: String,
        /// Slots relabeled
        response: oneshot::Sender<Vec<SlotAddr>>,
    },

    /// List every known slot and its current state
    ListSlots {
        /// Response channel
        response: oneshot::Sender<Vec<(SlotAddr, SlotState)>>,
    },

    // -------------------------------------------------------------------------
    // Lifecycle commands
    // -------------------------------------------------------------------------
    /// Gracefully shut down the engine actor
    Shutdown,
}

/// Outcome of an assign fan-out across all devices
///
/// Partial failure is expected: devices with a free slot get the code,
/// devices without one are reported as skipped and nothing is rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssignReport {
    /// Slots transitioned to pending-assign, one per device that had room
    pub assigned: Vec<SlotAddr>,
    /// Devices with no free slot
    pub skipped: Vec<DeviceId>,
}

impl AssignReport {
    /// True when every device took the code
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::SlotIndex;

    #[test]
    fn test_engine_command_debug() {
        let cmd = EngineCommand::ValueAdded {
            addr: SlotAddr::new(DeviceId(4), SlotIndex(1)),
        };
        let debug_str = format!("{:?}", cmd);
        assert!(debug_str.contains("ValueAdded"));

        let cmd = EngineCommand::Shutdown;
        assert_eq!(format!("{:?}", cmd), "Shutdown");
    }

    #[test]
    fn test_assign_command_debug_masks_code() {
        let (tx, _rx) = oneshot::channel();
        let cmd = EngineCommand::AssignCode {
            name: "alice".to_string(),
            code: CodeDigits::parse("1234").unwrap(),
            response: tx,
        };
        let debug_str = format!("{:?}", cmd);
        assert!(debug_str.contains("AssignCode"));
        assert!(debug_str.contains("alice"));
        assert!(!debug_str.contains("1234"));
    }

    #[tokio::test]
    async fn test_oneshot_response_channel() {
        let (tx, rx) = oneshot::channel::<AssignReport>();
        let report = AssignReport {
            assigned: vec![SlotAddr::new(DeviceId(4), SlotIndex(1))],
            skipped: vec![DeviceId(7)],
        };
        tx.send(report.clone()).unwrap();
        let received = rx.await.unwrap();
        assert_eq!(received, report);
        assert!(!received.is_complete());
    }
}
