//! SlotStore - durable device/slot/label mapping
//!
//! Owns the persisted YAML file that is the only durable record of what each
//! code slot means, and the label codec that maps [`SlotState`] onto the
//! on-disk string encoding.

use super::types::{DeviceId, SlotAddr, SlotIndex, SlotState};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Sentinel for a slot with no occupancy report since process start
const CODE_UNKNOWN: &str = "_unknown";
/// Sentinel for a slot the hardware reports empty
const CODE_UNASSIGNED: &str = "_unassigned";
/// Marker prefix for a label awaiting assign confirmation
const PENDING_ASSIGN_PREFIX: &str = "_+";
/// Marker prefix for a label awaiting clear confirmation
const PENDING_CLEAR_PREFIX: &str = "_-";

type DeviceSlots = BTreeMap<SlotIndex, SlotState>;

/// On-disk document shape
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct StoreFile {
    /// Unix seconds of the save that produced this file
    modtime: u64,
    /// deviceId -> slotIndex -> encoded label
    devices: BTreeMap<DeviceId, BTreeMap<SlotIndex, String>>,
}

/// Persisted mapping of every known code slot to its state
///
/// Slots are only ever added, never removed: once a device reports a slot it
/// stays in the store across restarts, resurfacing as whatever its encoded
/// label says it was.
pub struct SlotStore {
    path: PathBuf,
    devices: BTreeMap<DeviceId, DeviceSlots>,
    modtime: u64,
}

impl SlotStore {
    /// Load the store from `path`, or start empty when unreadable
    ///
    /// A missing file is the normal first run; a corrupt one is logged and
    /// discarded rather than blocking startup.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file = if path.exists() {
            match read_store_file(&path) {
                Ok(file) => Some(file),
                Err(e) => {
                    warn!("Discarding unreadable slot store {}: {:#}", path.display(), e);
                    None
                }
            }
        } else {
            debug!("No slot store at {}; starting empty", path.display());
            None
        };

        let (modtime, devices) = match file {
            Some(file) => {
                let devices = file
                    .devices
                    .into_iter()
                    .map(|(device, slots)| {
                        let slots = slots
                            .into_iter()
                            .map(|(index, label)| (index, decode_label(&label)))
                            .collect();
                        (device, slots)
                    })
                    .collect();
                (file.modtime, devices)
            }
            None => (0, BTreeMap::new()),
        };

        Self {
            path,
            devices,
            modtime,
        }
    }

    /// Write the full mapping to disk; one attempt, failure logged only
    ///
    /// The modification timestamp advances only when the write lands, so a
    /// failed save leaves both the file and the published modtime untouched
    /// while in-memory state stays authoritative for the next attempt.
    pub fn save(&mut self) {
        let stamp = chrono::Utc::now().timestamp() as u64;
        match self.write_store_file(stamp) {
            Ok(()) => {
                self.modtime = stamp;
                debug!("Saved slot store to {}", self.path.display());
            }
            Err(e) => {
                warn!("Failed to save slot store {}: {:#}", self.path.display(), e);
            }
        }
    }

    fn write_store_file(&self, stamp: u64) -> Result<()> {
        let devices = self
            .devices
            .iter()
            .map(|(device, slots)| {
                let slots = slots
                    .iter()
                    .map(|(index, state)| (*index, encode_label(state)))
                    .collect();
                (*device, slots)
            })
            .collect();
        let file = StoreFile {
            modtime: stamp,
            devices,
        };

        let yaml = serde_yaml::to_string(&file).context("failed to serialize slot store")?;
        std::fs::write(&self.path, yaml)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }

    /// Unix seconds of the last successful save (0 when never saved)
    pub fn modtime(&self) -> u64 {
        self.modtime
    }

    /// Create the slot as `Unknown` if unseen; returns true when created
    pub fn ensure_slot(&mut self, addr: SlotAddr) -> bool {
        let slots = self.devices.entry(addr.device).or_default();
        if slots.contains_key(&addr.index) {
            return false;
        }
        slots.insert(addr.index, SlotState::Unknown);
        true
    }

    /// Current state of one slot, if the slot has ever been seen
    pub fn state(&self, addr: SlotAddr) -> Option<&SlotState> {
        self.devices.get(&addr.device)?.get(&addr.index)
    }

    /// Overwrite the state of one slot, creating it if needed
    pub fn set_state(&mut self, addr: SlotAddr, state: SlotState) {
        self.devices
            .entry(addr.device)
            .or_default()
            .insert(addr.index, state);
    }

    /// All devices the store has seen, in id order
    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.devices.keys().copied().collect()
    }

    /// Lowest-index `Unassigned` slot on a device, if it has one
    pub fn first_unassigned(&self, device: DeviceId) -> Option<SlotIndex> {
        self.devices.get(&device)?.iter().find_map(|(index, state)| {
            matches!(state, SlotState::Unassigned).then_some(*index)
        })
    }

    /// Every slot whose current label exactly equals `name`
    pub fn slots_labeled(&self, name: &str) -> Vec<SlotAddr> {
        self.iter()
            .filter(|(_, state)| state.label() == Some(name))
            .map(|(addr, _)| addr)
            .collect()
    }

    /// Every slot still `Unknown`, for refresh-queue seeding after a restart
    pub fn unknown_slots(&self) -> Vec<SlotAddr> {
        self.iter()
            .filter(|(_, state)| state.is_unknown())
            .map(|(addr, _)| addr)
            .collect()
    }

    /// Total number of slots tracked across all devices
    pub fn total_slots(&self) -> usize {
        self.devices.values().map(|slots| slots.len()).sum()
    }

    /// Iterate every slot in (device, index) order
    pub fn iter(&self) -> impl Iterator<Item = (SlotAddr, &SlotState)> {
        self.devices.iter().flat_map(|(device, slots)| {
            slots
                .iter()
                .map(|(index, state)| (SlotAddr::new(*device, *index), state))
        })
    }

    /// Owned copy of the full mapping, for operator-facing listings
    pub fn snapshot(&self) -> Vec<(SlotAddr, SlotState)> {
        self.iter().map(|(addr, state)| (addr, state.clone())).collect()
    }
}

fn read_store_file(path: &Path) -> Result<StoreFile> {
    let yaml = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_yaml::from_str(&yaml).context("failed to parse slot store YAML")
}

/// Encode a slot state as its on-disk label string
pub fn encode_label(state: &SlotState) -> String {
    match state {
        SlotState::Unknown => CODE_UNKNOWN.to_string(),
        SlotState::Unassigned => CODE_UNASSIGNED.to_string(),
        SlotState::Named(n) => n.clone(),
        SlotState::PendingAssign(n) => format!("{}{}", PENDING_ASSIGN_PREFIX, n),
        SlotState::PendingClear(n) => format!("{}{}", PENDING_CLEAR_PREFIX, n),
    }
}

/// Decode an on-disk label string back into a slot state
///
/// The reserved encodings share the label namespace: an operator label that
/// is literally `_unknown` or `_unassigned`, or that starts with `_+` or
/// `_-`, decodes as the reserved meaning instead of as a plain name. That
/// ambiguity is inherent to the single-string file format; it is not
/// resolved here, only confined to this function.
pub fn decode_label(label: &str) -> SlotState {
    if label == CODE_UNKNOWN {
        return SlotState::Unknown;
    }
    if label == CODE_UNASSIGNED {
        return SlotState::Unassigned;
    }
    if let Some(name) = label.strip_prefix(PENDING_ASSIGN_PREFIX) {
        return SlotState::PendingAssign(name.to_string());
    }
    if let Some(name) = label.strip_prefix(PENDING_CLEAR_PREFIX) {
        return SlotState::PendingClear(name.to_string());
    }
    SlotState::Named(label.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn addr(device: u32, index: u8) -> SlotAddr {
        SlotAddr::new(DeviceId(device), SlotIndex(index))
    }

    #[test]
    fn test_label_codec_round_trip() {
        let states = [
            SlotState::Unknown,
            SlotState::Unassigned,
            SlotState::Named("alice".to_string()),
            SlotState::PendingAssign("bob".to_string()),
            SlotState::PendingClear("carol".to_string()),
        ];
        for state in states {
            assert_eq!(decode_label(&encode_label(&state)), state);
        }
    }

    #[test]
    fn test_reserved_labels_decode_as_reserved() {
        // The file format cannot tell these apart from real names
        assert_eq!(decode_label("_unassigned"), SlotState::Unassigned);
        assert_eq!(decode_label("_unknown"), SlotState::Unknown);
        assert_eq!(
            decode_label("_+dave"),
            SlotState::PendingAssign("dave".to_string())
        );
        // A plain underscore name survives as long as it hits no marker
        assert_eq!(
            decode_label("_basement"),
            SlotState::Named("_basement".to_string())
        );
    }

    #[test]
    fn test_ensure_slot_is_create_once() {
        let dir = TempDir::new().unwrap();
        let mut store = SlotStore::load(dir.path().join("slots.yaml"));

        assert!(store.ensure_slot(addr(4, 1)));
        assert!(!store.ensure_slot(addr(4, 1)));
        assert_eq!(store.state(addr(4, 1)), Some(&SlotState::Unknown));
        assert_eq!(store.total_slots(), 1);
    }

    #[test]
    fn test_first_unassigned_scans_in_index_order() {
        let dir = TempDir::new().unwrap();
        let mut store = SlotStore::load(dir.path().join("slots.yaml"));

        store.set_state(addr(4, 5), SlotState::Unassigned);
        store.set_state(addr(4, 2), SlotState::Named("alice".to_string()));
        store.set_state(addr(4, 3), SlotState::Unassigned);

        assert_eq!(store.first_unassigned(DeviceId(4)), Some(SlotIndex(3)));
        assert_eq!(store.first_unassigned(DeviceId(9)), None);
    }

    #[test]
    fn test_slots_labeled_matches_exactly() {
        let dir = TempDir::new().unwrap();
        let mut store = SlotStore::load(dir.path().join("slots.yaml"));

        store.set_state(addr(4, 1), SlotState::Named("alice".to_string()));
        store.set_state(addr(5, 2), SlotState::PendingAssign("alice".to_string()));
        store.set_state(addr(5, 3), SlotState::Named("alice2".to_string()));
        store.set_state(addr(5, 4), SlotState::Unassigned);

        let matches = store.slots_labeled("alice");
        assert_eq!(matches, vec![addr(4, 1), addr(5, 2)]);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("slots.yaml");

        let mut store = SlotStore::load(&path);
        store.set_state(addr(4, 1), SlotState::Named("alice".to_string()));
        store.set_state(addr(4, 2), SlotState::Unassigned);
        store.set_state(addr(7, 1), SlotState::PendingAssign("bob".to_string()));
        store.set_state(addr(7, 2), SlotState::PendingClear("carol".to_string()));
        store.set_state(addr(7, 3), SlotState::Unknown);
        store.save();
        assert!(store.modtime() > 0);

        let reloaded = SlotStore::load(&path);
        assert_eq!(reloaded.modtime(), store.modtime());
        assert_eq!(reloaded.snapshot(), store.snapshot());
    }

    #[test]
    fn test_load_missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let store = SlotStore::load(dir.path().join("nope.yaml"));
        assert_eq!(store.total_slots(), 0);
        assert_eq!(store.modtime(), 0);
    }

    #[test]
    fn test_load_corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("slots.yaml");
        std::fs::write(&path, "{not yaml: [").unwrap();

        let store = SlotStore::load(&path);
        assert_eq!(store.total_slots(), 0);
    }

    #[test]
    fn test_failed_save_keeps_modtime() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing-dir").join("slots.yaml");

        let mut store = SlotStore::load(&path);
        store.set_state(addr(4, 1), SlotState::Unassigned);
        store.save();

        // Write into a nonexistent directory fails; state stays in memory
        assert_eq!(store.modtime(), 0);
        assert_eq!(store.state(addr(4, 1)), Some(&SlotState::Unassigned));
    }

    #[test]
    fn test_unknown_slots_for_seeding() {
        let dir = TempDir::new().unwrap();
        let mut store = SlotStore::load(dir.path().join("slots.yaml"));

        store.set_state(addr(4, 1), SlotState::Unknown);
        store.set_state(addr(4, 2), SlotState::Named("alice".to_string()));
        store.set_state(addr(6, 1), SlotState::Unknown);

        assert_eq!(store.unknown_slots(), vec![addr(4, 1), addr(6, 1)]);
    }
}
