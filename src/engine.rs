//! Reconciliation engine - code-slot state tracking per lock device
//!
//! This module keeps the durable label mapping for every user-code slot in
//! step with what the hardware actually reports. It owns the slot store, the
//! refresh queue, and the state machine that absorbs out-of-band changes, all
//! behind a single actor so mutation stays serialized.

mod actor;
mod commands;
mod handle;
mod store;
mod types;


pub use actor::EngineActor;
pub use commands::{AssignReport, EngineCommand};
pub use handle::EngineHandle;
pub use store::{decode_label, encode_label, SlotStore};
pub use types::{
    unnamed_entry, CodeDigits, CodeError, DeviceId, EngineStatus, SlotAddr, SlotIndex, SlotState,
};
