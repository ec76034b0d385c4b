//! Event listener - inbound notification pump
//!
//! Bridges the lock network's notification stream into the engine. The
//! network side only needs an `UnboundedSender<ValueEvent>`; nothing here
//! depends on any particular event-bus implementation. Everything that is
//! not a user-code slot notification is dropped at this boundary, so the
//! engine never sees reserved indexes or foreign command classes.

use crate::engine::{EngineHandle, SlotAddr};
use crate::protocol::{ValueEvent, ValueEventKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Spawn the listener task
///
/// Runs until the notification sender is dropped.
pub fn spawn_listener(
    handle: EngineHandle,
    mut rx: mpsc::UnboundedReceiver<ValueEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!("Event listener started");
        while let Some(event) = rx.recv().await {
            dispatch(&handle, event);
        }
        debug!("Event listener stopped");
    })
}

/// Filter one notification and forward it into the engine
fn dispatch(handle: &EngineHandle, event: ValueEvent) {
    if !event.is_user_code() {
        trace!(%event, "Ignoring non-user-code event");
        return;
    }

    let addr = SlotAddr::new(event.device, event.index);
    match event.kind {
        ValueEventKind::Added => handle.value_added(addr),
        ValueEventKind::Changed { frame } => handle.value_changed(addr, frame),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{DeviceId, EngineActor, SlotIndex, SlotState, SlotStore};
    use crate::protocol::COMMAND_CLASS_USER_CODE;
    use std::time::Duration;
    use tempfile::TempDir;

    fn added(device: u32, command_class: u8, index: u8) -> ValueEvent {
        ValueEvent {
            device: DeviceId(device),
            command_class,
            index: SlotIndex(index),
            kind: ValueEventKind::Added,
        }
    }

    fn changed(device: u32, index: u8, status: u8) -> ValueEvent {
        ValueEvent {
            device: DeviceId(device),
            command_class: COMMAND_CLASS_USER_CODE,
            index: SlotIndex(index),
            kind: ValueEventKind::Changed {
                frame: vec![0, 0, 0, 0, 0, 0, 0, 0, status],
            },
        }
    }

    #[tokio::test]
    async fn test_listener_filters_foreign_events() {
        let dir = TempDir::new().unwrap();
        let store = SlotStore::load(dir.path().join("slots.yaml"));
        let (lock_tx, _lock_rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = EngineActor::spawn(store, lock_tx);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        spawn_listener(handle.clone(), event_rx);

        event_tx.send(added(4, COMMAND_CLASS_USER_CODE, 1)).unwrap();
        event_tx.send(added(4, COMMAND_CLASS_USER_CODE, 255)).unwrap();
        event_tx.send(added(4, 0x62, 2)).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        let slots = handle.list_slots().await;
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].0, SlotAddr::new(DeviceId(4), SlotIndex(1)));

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_listener_closes_notification_loop() {
        let dir = TempDir::new().unwrap();
        let store = SlotStore::load(dir.path().join("slots.yaml"));
        let (lock_tx, _lock_rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = EngineActor::spawn(store, lock_tx);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        spawn_listener(handle.clone(), event_rx);

        event_tx.send(added(4, COMMAND_CLASS_USER_CODE, 1)).unwrap();
        event_tx.send(changed(4, 1, 0x00)).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        let slots = handle.list_slots().await;
        assert_eq!(slots[0].1, SlotState::Unassigned);
        assert_eq!(handle.status().pending_refresh, 0);

        handle.shutdown();
    }
}
