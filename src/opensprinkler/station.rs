use serde::{Deserialize, Serialize};

use super::{
    state::StationBits,
    store::{self, layout, Store},
};

/// Stations/Zones per board
pub const SHIFT_REGISTER_LINES: usize = 8;

/// Number of extension boards supported by the persisted layout
pub const MAX_EXT_BOARDS: usize = 5;

/// maximum number of 8-zone boards including expanders
pub const MAX_NUM_BOARDS: usize = 1 + MAX_EXT_BOARDS;

/// maximum number of stations
pub const MAX_NUM_STATIONS: usize = MAX_NUM_BOARDS * SHIFT_REGISTER_LINES;

/// maximum number of bytes in each station name (including the terminator)
pub const STATION_NAME_SIZE: usize = 16;

/// Flat station index (`board * 8 + line`)
pub type StationIndex = usize;

const GROUP_MASK: u8 = 0b0000_0011;
const TYPE_SHIFT: u8 = 2;
const TYPE_MASK: u8 = 0b0000_0111;

/// Scheduling group of a station
///
/// Only stored here, the scheduler decides what a group means.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StationGroup {
    /// Stations run one after another
    GlobalSerial = 0,
    /// Stations run at the same time
    GlobalConcurrent = 1,
    Custom1 = 2,
    Custom2 = 3,
}

impl From<u8> for StationGroup {
    fn from(bits: u8) -> Self {
        match bits & GROUP_MASK {
            0 => StationGroup::GlobalSerial,
            1 => StationGroup::GlobalConcurrent,
            2 => StationGroup::Custom1,
            _ => StationGroup::Custom2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StationType {
    /// Standard (relay) station
    Standard,
    /// RF station
    RadioFrequency,
    /// Custom station type (`2`–`7`)
    Custom(u8),
}

impl From<u8> for StationType {
    fn from(bits: u8) -> Self {
        match bits & TYPE_MASK {
            0 => StationType::Standard,
            1 => StationType::RadioFrequency,
            custom => StationType::Custom(custom),
        }
    }
}

impl From<StationType> for u8 {
    fn from(station_type: StationType) -> Self {
        match station_type {
            StationType::Standard => 0,
            StationType::RadioFrequency => 1,
            StationType::Custom(custom) => custom.clamp(2, TYPE_MASK),
        }
    }
}

/// Default name of a station (`S01`, `S02`, ...)
pub fn default_name(station_index: StationIndex) -> String {
    format!("S{:02}", station_index + 1)
}

fn name_address(station_index: StationIndex) -> usize {
    assert!(station_index < MAX_NUM_STATIONS, "Station index {} out of range", station_index);
    layout::STATION_NAMES + station_index * STATION_NAME_SIZE
}

/// Get station name
pub fn get_name(store: &dyn Store, station_index: StationIndex) -> String {
    store.read_string(name_address(station_index), STATION_NAME_SIZE)
}

/// Set station name (truncated to `STATION_NAME_SIZE - 1` bytes)
pub fn set_name(store: &mut dyn Store, station_index: StationIndex, name: &str) -> store::Result<()> {
    store.write_string(name_address(station_index), STATION_NAME_SIZE, name)
}

/// Persisted station metadata
///
/// The per-board bit vectors are loaded and saved as a whole; they are edited as a set and
/// rarely change at runtime.
#[derive(Clone, Debug, PartialEq)]
pub struct Stations {
    /// Station activates the master valve when running
    pub master_operation: StationBits,
    /// Station ignores rain delay and the rain sensor
    pub ignore_rain: StationBits,
    /// Station is disabled
    pub disabled: StationBits,
    /// Group (bits 0–1) and type (bits 2–4)
    attrib: [u8; MAX_NUM_STATIONS],
}

impl Stations {
    /// Metadata written on factory reset
    pub fn factory() -> Self {
        Self {
            master_operation: StationBits::all(),
            ignore_rain: StationBits::new(),
            disabled: StationBits::new(),
            attrib: [0; MAX_NUM_STATIONS],
        }
    }

    pub fn activates_master(&self, station_index: StationIndex) -> bool {
        self.master_operation.is_set(station_index)
    }

    pub fn set_master_operation(&mut self, station_index: StationIndex, value: bool) {
        self.master_operation.set(station_index, value);
    }

    pub fn ignores_rain(&self, station_index: StationIndex) -> bool {
        self.ignore_rain.is_set(station_index)
    }

    pub fn set_ignore_rain(&mut self, station_index: StationIndex, value: bool) {
        self.ignore_rain.set(station_index, value);
    }

    pub fn is_disabled(&self, station_index: StationIndex) -> bool {
        self.disabled.is_set(station_index)
    }

    pub fn set_disabled(&mut self, station_index: StationIndex, value: bool) {
        self.disabled.set(station_index, value);
    }

    pub fn group(&self, station_index: StationIndex) -> StationGroup {
        StationGroup::from(self.attrib[station_index])
    }

    pub fn set_group(&mut self, station_index: StationIndex, group: StationGroup) {
        let attrib = &mut self.attrib[station_index];
        *attrib = (*attrib & !GROUP_MASK) | group as u8;
    }

    pub fn station_type(&self, station_index: StationIndex) -> StationType {
        StationType::from(self.attrib[station_index] >> TYPE_SHIFT)
    }

    pub fn set_type(&mut self, station_index: StationIndex, station_type: StationType) {
        let attrib = &mut self.attrib[station_index];
        *attrib = (*attrib & !(TYPE_MASK << TYPE_SHIFT)) | (u8::from(station_type) << TYPE_SHIFT);
    }

    /// Load station master operation bits
    pub fn masop_load(&mut self, store: &dyn Store) {
        self.master_operation = load_bits(store, layout::MASTER_OPERATION);
    }

    /// Save station master operation bits
    pub fn masop_save(&self, store: &mut dyn Store) -> store::Result<()> {
        store.write_block(layout::MASTER_OPERATION, self.master_operation.boards())
    }

    /// Load ignore rain bits
    pub fn ignrain_load(&mut self, store: &dyn Store) {
        self.ignore_rain = load_bits(store, layout::IGNORE_RAIN);
    }

    /// Save ignore rain bits
    pub fn ignrain_save(&self, store: &mut dyn Store) -> store::Result<()> {
        store.write_block(layout::IGNORE_RAIN, self.ignore_rain.boards())
    }

    /// Load station disabled bits
    pub fn stndis_load(&mut self, store: &dyn Store) {
        self.disabled = load_bits(store, layout::STATION_DISABLED);
    }

    /// Save station disabled bits
    pub fn stndis_save(&self, store: &mut dyn Store) -> store::Result<()> {
        store.write_block(layout::STATION_DISABLED, self.disabled.boards())
    }

    /// Load group/type attribute bytes
    pub fn attrib_load(&mut self, store: &dyn Store) {
        store.read_block(layout::STATION_ATTRIB, &mut self.attrib);
    }

    /// Save group/type attribute bytes
    pub fn attrib_save(&self, store: &mut dyn Store) -> store::Result<()> {
        store.write_block(layout::STATION_ATTRIB, &self.attrib)
    }

    pub fn load(&mut self, store: &dyn Store) {
        self.masop_load(store);
        self.ignrain_load(store);
        self.stndis_load(store);
        self.attrib_load(store);
    }

    pub fn save(&self, store: &mut dyn Store) -> store::Result<()> {
        self.masop_save(store)?;
        self.ignrain_save(store)?;
        self.stndis_save(store)?;
        self.attrib_save(store)
    }
}

impl Default for Stations {
    fn default() -> Self {
        Self::factory()
    }
}

fn load_bits(store: &dyn Store, address: usize) -> StationBits {
    let mut boards = [0u8; MAX_NUM_BOARDS];
    store.read_block(address, &mut boards);
    StationBits::from_boards(boards)
}
