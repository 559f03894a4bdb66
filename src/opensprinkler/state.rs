use serde::Serialize;

use super::{
    rain::RainState,
    station::{self, StationIndex},
    status::ControllerStatus,
};

/// One byte per board, bit `n` is line `n` of that board
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StationBits([u8; station::MAX_NUM_BOARDS]);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StationChange {
    /// The state of the station was not changed
    NoChange,
    /// The state of the station was changed
    Change(bool),
}

fn locate(station_index: StationIndex) -> (usize, u8) {
    assert!(station_index < station::MAX_NUM_STATIONS, "Station index {} out of range", station_index);
    (station_index >> 3, 1 << (station_index & 0x07))
}

impl StationBits {
    pub const fn new() -> Self {
        Self([0; station::MAX_NUM_BOARDS])
    }

    pub const fn all() -> Self {
        Self([0xFF; station::MAX_NUM_BOARDS])
    }

    pub const fn from_boards(boards: [u8; station::MAX_NUM_BOARDS]) -> Self {
        Self(boards)
    }

    pub fn is_set(&self, station_index: StationIndex) -> bool {
        let (board, mask) = locate(station_index);
        self.0[board] & mask != 0
    }

    pub fn set(&mut self, station_index: StationIndex, value: bool) -> StationChange {
        if self.is_set(station_index) == value {
            return StationChange::NoChange;
        }

        let (board, mask) = locate(station_index);
        if value {
            self.0[board] |= mask;
        } else {
            self.0[board] &= !mask;
        }

        StationChange::Change(value)
    }

    pub fn board(&self, board: usize) -> u8 {
        self.0[board]
    }

    pub fn boards(&self) -> &[u8; station::MAX_NUM_BOARDS] {
        &self.0
    }

    /// Set all bits to `0`
    pub fn clear(&mut self) {
        self.0 = [0; station::MAX_NUM_BOARDS];
    }

    pub fn any(&self) -> bool {
        self.0.iter().any(|&board| board != 0)
    }

    /// Indices of all set stations (ascending)
    pub fn iter(&self) -> impl Iterator<Item = StationIndex> + '_ {
        (0..station::MAX_NUM_STATIONS).filter(move |&station_index| self.is_set(station_index))
    }
}

#[derive(Debug, Default)]
pub struct StationState {
    /// Bits requested by callers
    pub requested: StationBits,
    /// Bits last latched onto the outputs
    pub physical: StationBits,
    /// Requested bits (or policy inputs) changed since the last successful apply
    pub apply_pending: bool,
}

impl StationState {
    pub fn is_running(&self, station_index: StationIndex) -> bool {
        self.physical.is_set(station_index)
    }
}

#[derive(Debug, Default)]
pub struct ControllerState {
    pub station: StationState,
    pub rain: RainState,
    pub status: ControllerStatus,

    /// A reboot has been requested (e.g. an option that needs a reboot was committed)
    pub reboot_request: bool,
}
