//! Activation engine
//!
//! Resolves the requested station bits into the bits that are latched onto the outputs.

use super::{
    state::StationBits,
    station::{StationIndex, Stations, MAX_NUM_BOARDS, SHIFT_REGISTER_LINES},
    status::ControllerStatus,
};

/// Resolve the physical station bits
///
/// - Nothing is energized while the controller is disabled.
/// - Disabled stations and stations beyond `board_count` are never energized.
/// - While rain is delayed or sensed, only stations that ignore rain are energized.
/// - The master station ignores its own request and is on iff another running station activates it.
pub fn resolve_station_bits(requested: &StationBits, stations: &Stations, status: &ControllerStatus, master: Option<StationIndex>, board_count: usize) -> StationBits {
    let mut physical = StationBits::new();

    if !status.enabled {
        return physical;
    }

    let rain = status.rain_delayed || status.rain_sensed;
    let station_count = board_count.min(MAX_NUM_BOARDS) * SHIFT_REGISTER_LINES;

    for station_index in 0..station_count {
        // Master station is handled separately
        if master == Some(station_index) {
            continue;
        }

        if !requested.is_set(station_index) || stations.is_disabled(station_index) {
            continue;
        }

        if rain && !stations.ignores_rain(station_index) {
            continue;
        }

        physical.set(station_index, true);
    }

    if let Some(master) = master.filter(|&master| master < station_count) {
        physical.set(master, activate_master_station(master, &physical, stations));
    }

    physical
}

/// Whether the master station should be on for the given (non-master) physical bits
pub fn activate_master_station(master: StationIndex, physical: &StationBits, stations: &Stations) -> bool {
    physical.iter().any(|station_index| station_index != master && stations.activates_master(station_index))
}

/// Patterns to latch in order to go from `previous` to `target`
///
/// When the master bit changes, the pattern with the master bit at its previous value is latched
/// first and the master change last.
pub fn latch_sequence(previous: &StationBits, target: &StationBits, master: Option<StationIndex>) -> Vec<StationBits> {
    let mut sequence = Vec::with_capacity(2);

    if let Some(master) = master {
        let master_previous = previous.is_set(master);
        if master_previous != target.is_set(master) {
            let mut intermediate = *target;
            intermediate.set(master, master_previous);
            if intermediate != *previous {
                sequence.push(intermediate);
            }
        }
    }

    sequence.push(*target);
    sequence
}
