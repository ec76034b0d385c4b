//! Lock network protocol utilities
//!
//! Constants and decoding helpers for the user-code command class, plus the
//! inbound notification type delivered by the network layer.

use crate::engine::{DeviceId, SlotIndex};

/// Command class carrying user-code reports and writes
pub const COMMAND_CLASS_USER_CODE: u8 = 0x63;

/// Offset of the occupancy status byte inside a user-code report frame
pub const USER_CODE_STATUS_BYTE: usize = 8;

/// Slot indexes the protocol reserves for its own use
///
/// Index 0 is the enrollment code, 254 triggers a refresh, 255 reports the
/// code count. None of them hold an operator code.
pub const RESERVED_SLOT_INDEXES: [u8; 3] = [0, 254, 255];

/// True when `index` addresses a real user-code slot rather than a reserved one
pub fn is_user_code_slot(index: SlotIndex) -> bool {
    !RESERVED_SLOT_INDEXES.contains(&index.0)
}

/// Decode the occupancy bit out of a raw user-code report frame
///
/// Returns `None` when the frame is too short to carry a status byte; the
/// caller decides what to do with an undecodable report.
pub fn slot_occupied(frame: &[u8]) -> Option<bool> {
    if frame.len() <= USER_CODE_STATUS_BYTE {
        return None;
    }
    Some(frame[USER_CODE_STATUS_BYTE] != 0)
}

/// One notification from the lock network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueEvent {
    pub device: DeviceId,
    pub command_class: u8,
    pub index: SlotIndex,
    pub kind: ValueEventKind,
}

/// What the network is telling us about the value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueEventKind {
    /// Value discovered during network interview; no payload yet
    Added,
    /// Value reported or re-reported with its current raw frame
    Changed { frame: Vec<u8> },
}

impl ValueEvent {
    /// True when this event concerns a user-code slot we track
    pub fn is_user_code(&self) -> bool {
        self.command_class == COMMAND_CLASS_USER_CODE && is_user_code_slot(self.index)
    }
}

impl std::fmt::Display for ValueEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ValueEventKind::Added => {
                write!(f, "added dev:{} cc:{:#04x} idx:{}", self.device, self.command_class, self.index)
            }
            ValueEventKind::Changed { frame } => {
                write!(
                    f,
                    "changed dev:{} cc:{:#04x} idx:{} | {}",
                    self.device,
                    self.command_class,
                    self.index,
                    format_hex(frame)
                )
            }
        }
    }
}

/// Format raw frame bytes as a hex string for logging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
