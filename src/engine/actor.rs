//! EngineActor - actor-based code-slot reconciliation
//!
//! Owns all mutable engine state behind a channel interface. This design:
//! - Serializes hardware notifications, poller ticks, and operator commands
//!   so a fan-out scan always sees a consistent snapshot
//! - Eliminates lock contention on the store and refresh queue
//! - Keeps hardware writes fire-and-forget; nothing ever blocks on a lock
//!   confirming a command

use super::commands::{AssignReport, EngineCommand};
use super::handle::EngineHandle;
use super::store::SlotStore;
use super::types::{CodeDigits, EngineStatus, SlotAddr, SlotState};
use crate::protocol;
use crate::transport::LockCommand;
use std::collections::BTreeSet;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, trace, warn};

/// Actor responsible for reconciling slot labels with hardware reports
///
/// The EngineActor owns the slot store and the refresh queue and processes
/// commands sequentially, so no other component ever touches mutable state.
///
/// # Architecture
///
/// ```text
/// ┌──────────────────────────────────────────────────────────┐
/// │                      EngineActor                         │
/// │  ┌────────────────────────────────────────────────────┐  │
/// │  │ store: SlotStore (device -> slot -> SlotState)     │  │
/// │  │ refresh_queue: BTreeSet<SlotAddr>                  │  │
/// │  └────────────────────────────────────────────────────┘  │
/// │        ▲ commands                 │ lock commands        │
/// │  ┌───────────────────┐    ┌──────────────────────┐       │
/// │  │ command_rx        │    │ lock_tx (unbounded)  │       │
/// │  └───────────────────┘    └──────────────────────┘       │
/// └──────────────────────────────────────────────────────────┘
/// ```
pub struct EngineActor {
    /// Durable slot mapping, loaded once before spawn
    store: SlotStore,

    /// Slots observed but never confirmed by an occupancy report
    ///
    /// Invariant: every member is currently `Unknown`. A slot leaves the
    /// queue exactly once, when a decodable report resolves it.
    refresh_queue: BTreeSet<SlotAddr>,

    /// Receiver for incoming commands
    command_rx: mpsc::UnboundedReceiver<EngineCommand>,

    /// Fire-and-forget channel into the hardware transport pump
    lock_tx: mpsc::UnboundedSender<LockCommand>,

    /// Publishes engine status to external observers after every save
    status_tx: watch::Sender<EngineStatus>,

    /// Counter of change notifications processed
    notification_count: u64,
}

impl EngineActor {
    /// Spawn a new EngineActor and return a handle for interacting with it
    ///
    /// Restores the refresh queue from the loaded store: every slot still
    /// `Unknown` (typically because the process restarted before its report
    /// arrived) is queued again so the poller re-queries it.
    ///
    /// # Arguments
    ///
    /// * `store` - Slot store, already loaded from disk
    /// * `lock_tx` - Channel into the hardware transport pump
    ///
    /// # Returns
    ///
    /// An `EngineHandle` that can be used to interact with the actor
    pub fn spawn(
        store: SlotStore,
        lock_tx: mpsc::UnboundedSender<LockCommand>,
    ) -> EngineHandle {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let refresh_queue: BTreeSet<SlotAddr> = store.unknown_slots().into_iter().collect();

        let initial_status = EngineStatus {
            modtime: store.modtime(),
            pending_refresh: refresh_queue.len(),
            total_slots: store.total_slots(),
        };
        let (status_tx, status_rx) = watch::channel(initial_status);

        info!(
            slots = initial_status.total_slots,
            queued = initial_status.pending_refresh,
            "EngineActor spawned"
        );

        let actor = EngineActor {
            store,
            refresh_queue,
            command_rx: cmd_rx,
            lock_tx,
            status_tx,
            notification_count: 0,
        };

        tokio::spawn(actor.run());

        EngineHandle::new(cmd_tx, status_rx)
    }

    /// Main run loop for the actor
    ///
    /// Processes commands from the channel until the channel is closed or a
    /// shutdown command arrives. Sequential processing is what enforces the
    /// mutual exclusion between notifications, ticks, and operator commands.
    async fn run(mut self) {
        debug!("EngineActor run loop started");

        while let Some(cmd) = self.command_rx.recv().await {
            trace!(?cmd, "Processing command");

            match cmd {
                // Hot path commands (no response)
                EngineCommand::ValueAdded { addr } => {
                    self.handle_value_added(addr);
                }
                EngineCommand::ValueChanged { addr, frame } => {
                    self.handle_value_changed(addr, &frame);
                }
                EngineCommand::PollTick => {
                    self.handle_poll_tick();
                }

                // Request-response commands
                EngineCommand::AssignCode {
                    name,
                    code,
                    response,
                } => {
                    let report = self.handle_assign(&name, &code);
                    let _ = response.send(report);
                }
                EngineCommand::ClearCode { name, response } => {
                    let cleared = self.handle_clear(&name);
                    let _ = response.send(cleared);
                }
                EngineCommand::RenameCode {
                    old_name,
                    new_name,
                    response,
                } => {
                    let renamed = self.handle_rename(&old_name, &new_name);
                    let _ = response.send(renamed);
                }
                EngineCommand::ListSlots { response } => {
                    let _ = response.send(self.store.snapshot());
                }

                // Lifecycle commands
                EngineCommand::Shutdown => {
                    info!("EngineActor received shutdown command");
                    break;
                }
            }
        }

        info!(
            notification_count = self.notification_count,
            "EngineActor run loop terminated"
        );
    }

    /// Handle a value-added notification
    ///
    /// First sighting of a slot creates it as `Unknown`, persists, and queues
    /// it for refresh. Anything else is a no-op; slots are never re-queued by
    /// repeat sightings.
    fn handle_value_added(&mut self, addr: SlotAddr) {
        if !self.store.ensure_slot(addr) {
            trace!(%addr, "Slot already known");
            return;
        }

        debug!(%addr, "New code slot discovered");
        self.refresh_queue.insert(addr);
        self.save_and_publish();
    }

    /// Handle a value-changed notification carrying a raw report frame
    ///
    /// The occupancy bit drives the slot state machine; a report that changes
    /// nothing (an unchanged confirmation) is deliberately not persisted. A
    /// frame too short to decode is logged and leaves the refresh queue
    /// untouched, so the slot will be queried again.
    fn handle_value_changed(&mut self, addr: SlotAddr, frame: &[u8]) {
        self.notification_count += 1;

        // A change for a slot we never saw added still creates it
        let created = self.store.ensure_slot(addr);
        if created {
            debug!(%addr, "Code slot created by change notification");
            self.refresh_queue.insert(addr);
        }

        let occupied = match protocol::slot_occupied(frame) {
            Some(bit) => bit,
            None => {
                warn!(
                    %addr,
                    frame = %protocol::format_hex(frame),
                    "Report frame too short to decode; slot stays queued"
                );
                if created {
                    self.save_and_publish();
                }
                return;
            }
        };

        self.refresh_queue.remove(&addr);

        let current = match self.store.state(addr) {
            Some(state) => state.clone(),
            None => return,
        };

        match current.apply_report(occupied, addr.index) {
            Some(next) => {
                debug!(%addr, occupied, from = %current, to = %next, "Slot state transition");
                self.store.set_state(addr, next);
                self.save_and_publish();
            }
            None => {
                trace!(%addr, occupied, state = %current, "Report changed nothing");
            }
        }
    }

    /// Handle one poller tick
    ///
    /// Issues at most one refresh query. The slot is not removed here; it
    /// stays queued (and is re-queried on later ticks) until its report
    /// arrives, which keeps a single query outstanding system-wide.
    fn handle_poll_tick(&mut self) {
        let next = match self.refresh_queue.iter().next() {
            Some(addr) => *addr,
            None => return,
        };

        debug!(%next, queued = self.refresh_queue.len(), "Refreshing slot");
        self.send_lock(LockCommand::RefreshSlot { addr: next });
    }

    /// Handle an assign fan-out
    ///
    /// Takes the lowest-index free slot on every device; devices with no free
    /// slot end up in the skipped set. Successful devices are never rolled
    /// back because another device was full.
    ///
    /// # Arguments
    ///
    /// * `name` - Label for the new code
    /// * `code` - Digit string, validated before the command was sent
    fn handle_assign(&mut self, name: &str, code: &CodeDigits) -> AssignReport {
        let mut report = AssignReport::default();

        for device in self.store.device_ids() {
            match self.store.first_unassigned(device) {
                Some(index) => {
                    let addr = SlotAddr::new(device, index);
                    self.store
                        .set_state(addr, SlotState::PendingAssign(name.to_string()));
                    self.send_lock(LockCommand::SetUserCode {
                        addr,
                        code: code.clone(),
                    });
                    report.assigned.push(addr);
                }
                None => report.skipped.push(device),
            }
        }

        self.save_and_publish();

        if !report.is_complete() {
            error!(name, skipped = ?report.skipped, "No free slot on some locks; code not written there");
        }
        info!(
            name,
            assigned = report.assigned.len(),
            skipped = report.skipped.len(),
            "Assign fan-out complete"
        );
        report
    }

    /// Handle a clear fan-out
    ///
    /// Every slot whose label exactly equals `name` goes to pending-clear and
    /// gets a hardware clear command, whatever variant it was in.
    fn handle_clear(&mut self, name: &str) -> Vec<SlotAddr> {
        let matches = self.store.slots_labeled(name);

        for addr in &matches {
            self.store
                .set_state(*addr, SlotState::PendingClear(name.to_string()));
            self.send_lock(LockCommand::ClearUserCode { addr: *addr });
        }

        self.save_and_publish();

        info!(name, cleared = matches.len(), "Clear fan-out complete");
        matches
    }

    /// Handle a rename
    ///
    /// Rewrites the durable label on every exact match, preserving the state
    /// variant. No hardware interaction; the code on the lock is untouched.
    fn handle_rename(&mut self, old_name: &str, new_name: &str) -> Vec<SlotAddr> {
        let matches = self.store.slots_labeled(old_name);

        for addr in &matches {
            let renamed = match self.store.state(*addr) {
                Some(SlotState::Named(_)) => SlotState::Named(new_name.to_string()),
                Some(SlotState::PendingAssign(_)) => {
                    SlotState::PendingAssign(new_name.to_string())
                }
                Some(SlotState::PendingClear(_)) => SlotState::PendingClear(new_name.to_string()),
                _ => continue,
            };
            self.store.set_state(*addr, renamed);
        }

        self.save_and_publish();

        info!(old_name, new_name, renamed = matches.len(), "Rename complete");
        matches
    }

    /// Persist the store and republish observable status
    fn save_and_publish(&mut self) {
        self.store.save();
        self.publish_status();
    }

    /// Push current status into the watch channel
    fn publish_status(&self) {
        let status = EngineStatus {
            modtime: self.store.modtime(),
            pending_refresh: self.refresh_queue.len(),
            total_slots: self.store.total_slots(),
        };
        let _ = self.status_tx.send(status);
    }

    /// Queue one command for the hardware transport, fire-and-forget
    fn send_lock(&self, command: LockCommand) {
        trace!(%command, "Issuing lock command");
        let _ = self.lock_tx.send(command);
    }
}
