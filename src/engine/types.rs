//! Slot state type definitions
//!
//! Defines the core types for representing lock devices, code slots, and the
//! tagged slot-state machine the reconciliation engine runs on.

use serde::{Deserialize, Serialize};

/// Opaque identifier of one lock on the hardware network
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub u32);

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numbered user-code slot position on a lock
///
/// Indexes 0, 254 and 255 are reserved by the hardware protocol (enrollment
/// code, refresh, code count) and never reach the engine; the listener
/// filters them out via [`crate::protocol::is_user_code_slot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotIndex(pub u8);

impl std::fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a code slot: which lock and which position
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotAddr {
    pub device: DeviceId,
    pub index: SlotIndex,
}

impl SlotAddr {
    pub fn new(device: DeviceId, index: SlotIndex) -> Self {
        Self { device, index }
    }
}

impl std::fmt::Display for SlotAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.device, self.index)
    }
}

/// What we currently believe about one code slot
///
/// The hardware only ever reports an occupancy bit, never the code value, so
/// the label is ours alone: the persisted store is the single durable record
/// of what each occupied slot means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState {
    /// Slot seen on the network but no occupancy report since process start
    Unknown,
    /// Hardware reports the slot empty
    Unassigned,
    /// Hardware reports the slot occupied; label is operator-chosen
    Named(String),
    /// Assign command issued, awaiting the confirming occupancy report
    PendingAssign(String),
    /// Clear command issued; keeps the old label until the clear is confirmed
    PendingClear(String),
}

impl SlotState {
    /// The label carried by this state, if any variant carries one
    pub fn label(&self) -> Option<&str> {
        match self {
            SlotState::Named(n) | SlotState::PendingAssign(n) | SlotState::PendingClear(n) => {
                Some(n)
            }
            SlotState::Unknown | SlotState::Unassigned => None,
        }
    }

    /// True while the slot has never been confirmed by a hardware report
    pub fn is_unknown(&self) -> bool {
        matches!(self, SlotState::Unknown)
    }

    /// Apply one hardware occupancy report to this state
    ///
    /// Returns the new state, or `None` when the report changes nothing
    /// (an unchanged confirmation) so the caller can skip a redundant save.
    /// A `Named` slot reported empty is absorbed as an external clear (the
    /// lock was reset out-of-band), not treated as an error.
    pub fn apply_report(&self, occupied: bool, index: SlotIndex) -> Option<SlotState> {
        match (self, occupied) {
            (SlotState::Unknown, false) => Some(SlotState::Unassigned),
            (SlotState::Unknown, true) => Some(SlotState::Named(unnamed_entry(index))),
            // Assign confirmed, or the write never took (slot came back empty)
            (SlotState::PendingAssign(_), false) => Some(SlotState::Unassigned),
            (SlotState::PendingAssign(n), true) => Some(SlotState::Named(n.clone())),
            // Clear confirmed; an occupied report means the clear has not
            // reached the lock yet, keep waiting
            (SlotState::PendingClear(_), false) => Some(SlotState::Unassigned),
            (SlotState::PendingClear(_), true) => None,
            (SlotState::Named(_), false) => Some(SlotState::Unassigned),
            (SlotState::Named(_), true) => None,
            (SlotState::Unassigned, false) => None,
            (SlotState::Unassigned, true) => Some(SlotState::Named(unnamed_entry(index))),
        }
    }
}

impl std::fmt::Display for SlotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotState::Unknown => write!(f, "unknown"),
            SlotState::Unassigned => write!(f, "unassigned"),
            SlotState::Named(n) => write!(f, "{}", n),
            SlotState::PendingAssign(n) => write!(f, "{} (assign pending)", n),
            SlotState::PendingClear(n) => write!(f, "{} (clear pending)", n),
        }
    }
}

/// Placeholder label for a slot first observed occupied with no prior label
pub fn unnamed_entry(index: SlotIndex) -> String {
    format!("Unnamed Entry {}", index)
}

/// A user code as an ASCII digit string, validated at construction
///
/// The digits are deliberately hidden from `Debug` and `Display`: commands
/// carrying a code can be logged freely without leaking it. The hardware
/// does the same, reporting stored codes as `****`.
#[derive(Clone, PartialEq, Eq)]
pub struct CodeDigits(String);

impl CodeDigits {
    /// Validate and wrap a code; every character must be an ASCII digit
    pub fn parse(code: &str) -> Result<Self, CodeError> {
        if code.is_empty() || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CodeError::InvalidCode {
                code: code.to_string(),
            });
        }
        Ok(Self(code.to_string()))
    }

    /// The raw digits, for the transport actually writing to hardware
    pub fn digits(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for CodeDigits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CodeDigits").field(&"****").finish()
    }
}

impl std::fmt::Display for CodeDigits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "****")
    }
}

/// Errors surfaced to operator-command callers
#[derive(Debug, thiserror::Error)]
pub enum CodeError {
    /// The code string contains something other than ASCII digits
    #[error("invalid code {code:?}: must be ASCII digits only")]
    InvalidCode { code: String },
    /// The engine actor has shut down and can no longer serve commands
    #[error("engine has shut down")]
    EngineClosed,
}

/// Externally observable engine status, republished after every save
///
/// Mirrors the store's modification timestamp for change detection, plus
/// the refresh backlog as a `"pending of total"` progress pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineStatus {
    /// Unix seconds of the last successful save
    pub modtime: u64,
    /// Slots still awaiting their first occupancy report
    pub pending_refresh: usize,
    /// Total slots known across all devices
    pub total_slots: usize,
}

impl std::fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} of {}", self.pending_refresh, self.total_slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx(i: u8) -> SlotIndex {
        SlotIndex(i)
    }

    #[test]
    fn test_unknown_resolves_to_unassigned() {
        assert_eq!(
            SlotState::Unknown.apply_report(false, idx(3)),
            Some(SlotState::Unassigned)
        );
    }

    #[test]
    fn test_unknown_occupied_gets_placeholder() {
        assert_eq!(
            SlotState::Unknown.apply_report(true, idx(3)),
            Some(SlotState::Named("Unnamed Entry 3".to_string()))
        );
    }

    #[test]
    fn test_pending_assign_confirmed() {
        let pending = SlotState::PendingAssign("alice".to_string());
        assert_eq!(
            pending.apply_report(true, idx(1)),
            Some(SlotState::Named("alice".to_string()))
        );
    }

    #[test]
    fn test_pending_assign_write_failed() {
        let pending = SlotState::PendingAssign("alice".to_string());
        assert_eq!(pending.apply_report(false, idx(1)), Some(SlotState::Unassigned));
    }

    #[test]
    fn test_pending_clear_waits_for_empty() {
        let pending = SlotState::PendingClear("bob".to_string());
        assert_eq!(pending.apply_report(true, idx(1)), None);
        assert_eq!(pending.apply_report(false, idx(1)), Some(SlotState::Unassigned));
    }

    #[test]
    fn test_named_external_clear() {
        let named = SlotState::Named("carol".to_string());
        assert_eq!(named.apply_report(false, idx(2)), Some(SlotState::Unassigned));
        assert_eq!(named.apply_report(true, idx(2)), None);
    }

    #[test]
    fn test_unassigned_external_assign() {
        assert_eq!(SlotState::Unassigned.apply_report(false, idx(5)), None);
        assert_eq!(
            SlotState::Unassigned.apply_report(true, idx(5)),
            Some(SlotState::Named("Unnamed Entry 5".to_string()))
        );
    }

    #[test]
    fn test_label_across_variants() {
        assert_eq!(SlotState::Named("x".into()).label(), Some("x"));
        assert_eq!(SlotState::PendingAssign("x".into()).label(), Some("x"));
        assert_eq!(SlotState::PendingClear("x".into()).label(), Some("x"));
        assert_eq!(SlotState::Unknown.label(), None);
        assert_eq!(SlotState::Unassigned.label(), None);
    }

    #[test]
    fn test_code_digits_accepts_digits_only() {
        assert!(CodeDigits::parse("1234").is_ok());
        assert!(CodeDigits::parse("0").is_ok());
        assert!(matches!(
            CodeDigits::parse("12a4"),
            Err(CodeError::InvalidCode { .. })
        ));
        assert!(matches!(
            CodeDigits::parse(""),
            Err(CodeError::InvalidCode { .. })
        ));
    }

    #[test]
    fn test_code_digits_masked_in_debug_and_display() {
        let code = CodeDigits::parse("8642").unwrap();
        let debug = format!("{:?}", code);
        let display = format!("{}", code);
        assert!(!debug.contains("8642"));
        assert!(!display.contains("8642"));
        assert_eq!(code.digits(), "8642");
    }

    #[test]
    fn test_status_display_matches_progress_pair() {
        let status = EngineStatus {
            modtime: 0,
            pending_refresh: 2,
            total_slots: 60,
        };
        assert_eq!(status.to_string(), "2 of 60");
    }
}
