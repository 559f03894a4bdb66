//! Options registry
//!
//! A fixed, statically indexed table of byte options. Every option has a maximum value and
//! [Options::set] clamps to it, so `value <= max` always holds. Changes are kept in memory until
//! [Options::save] is called, which keeps the number of non-volatile writes down while a user is
//! scrolling through values.
//!
//! The table (count, order and bounds) is part of the persisted layout.

pub mod cli;

use serde::Serialize;

use super::{
    sensor::NormalState,
    station::{self, StationIndex},
    store::{self, layout, Store},
};

/// Firmware version stored in the `fwv` option (2.0.7)
pub const FIRMWARE_VERSION: u8 = 207;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OptionFlags {
    /// Value is fixed by the firmware
    pub read_only: bool,
    /// A reboot is needed before a new value takes effect
    pub reboot: bool,
    /// Editable from the local setup menu
    pub setup_edit: bool,
}

const READ_ONLY: OptionFlags = OptionFlags { read_only: true, reboot: false, setup_edit: false };
const EDIT: OptionFlags = OptionFlags { read_only: false, reboot: false, setup_edit: true };
const EDIT_REBOOT: OptionFlags = OptionFlags { read_only: false, reboot: true, setup_edit: true };

#[derive(Debug)]
pub struct OptionSpec {
    pub default: u8,
    pub max: u8,
    /// Display name
    pub name: &'static str,
    /// Wire/JSON name
    pub json_name: &'static str,
    pub flags: OptionFlags,
}

const fn option(default: u8, max: u8, name: &'static str, json_name: &'static str, flags: OptionFlags) -> OptionSpec {
    OptionSpec { default, max, name, json_name, flags }
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptionIndex {
    FirmwareVersion = 0,
    TimeZone,
    UseNtp,
    UseDhcp,
    StaticIp1,
    StaticIp2,
    StaticIp3,
    StaticIp4,
    Gateway1,
    Gateway2,
    Gateway3,
    Gateway4,
    HttpPort0,
    HttpPort1,
    ExtensionBoards,
    Sequential,
    StationDelay,
    MasterStation,
    MasterOnAdjust,
    MasterOffAdjust,
    UseRainSensor,
    RainSensorType,
    RainSensorOnDelay,
    RainSensorOffDelay,
    WaterPercentage,
    IgnorePassword,
    DeviceId,
    ResetAll,
}

pub const NUM_OPTIONS: usize = 28;

const _: () = assert!(NUM_OPTIONS <= layout::OPTIONS_SIZE);

static OPTIONS: [OptionSpec; NUM_OPTIONS] = [
    option(FIRMWARE_VERSION, FIRMWARE_VERSION, "Firmware", "fwv", READ_ONLY),
    option(48, 108, "Time zone", "tz", EDIT),
    option(1, 1, "NTP sync", "ntp", EDIT),
    option(1, 1, "Use DHCP", "dhcp", EDIT_REBOOT),
    option(192, 255, "Static.ip1", "ip1", EDIT_REBOOT),
    option(168, 255, "Static.ip2", "ip2", EDIT_REBOOT),
    option(1, 255, "Static.ip3", "ip3", EDIT_REBOOT),
    option(22, 255, "Static.ip4", "ip4", EDIT_REBOOT),
    option(192, 255, "Gateway.ip1", "gw1", EDIT_REBOOT),
    option(168, 255, "Gateway.ip2", "gw2", EDIT_REBOOT),
    option(1, 255, "Gateway.ip3", "gw3", EDIT_REBOOT),
    option(1, 255, "Gateway.ip4", "gw4", EDIT_REBOOT),
    option(80, 255, "HTTP port", "hp0", EDIT_REBOOT),
    option(0, 255, "HTTP port (upper)", "hp1", EDIT_REBOOT),
    option(0, station::MAX_EXT_BOARDS as u8, "Ext. boards", "ext", EDIT),
    option(1, 1, "Sequential", "seq", EDIT),
    option(0, 240, "Station delay", "sdt", EDIT),
    option(0, station::SHIFT_REGISTER_LINES as u8, "Master station", "mas", EDIT),
    option(0, 60, "Mas. on adj.", "mton", EDIT),
    option(0, 60, "Mas. off adj.", "mtof", EDIT),
    option(0, 1, "Use rain sensor", "urs", EDIT),
    option(1, 1, "Normally open", "rso", EDIT),
    option(0, 60, "Rain on delay", "rson", EDIT),
    option(0, 60, "Rain off delay", "rsof", EDIT),
    option(100, 250, "Water level", "wl", EDIT),
    option(0, 1, "Ignore password", "ipas", EDIT),
    option(0, 255, "Device ID", "devid", EDIT_REBOOT),
    option(0, 1, "Factory reset", "reset", EDIT_REBOOT),
];

impl OptionIndex {
    pub const ALL: [OptionIndex; NUM_OPTIONS] = [
        OptionIndex::FirmwareVersion,
        OptionIndex::TimeZone,
        OptionIndex::UseNtp,
        OptionIndex::UseDhcp,
        OptionIndex::StaticIp1,
        OptionIndex::StaticIp2,
        OptionIndex::StaticIp3,
        OptionIndex::StaticIp4,
        OptionIndex::Gateway1,
        OptionIndex::Gateway2,
        OptionIndex::Gateway3,
        OptionIndex::Gateway4,
        OptionIndex::HttpPort0,
        OptionIndex::HttpPort1,
        OptionIndex::ExtensionBoards,
        OptionIndex::Sequential,
        OptionIndex::StationDelay,
        OptionIndex::MasterStation,
        OptionIndex::MasterOnAdjust,
        OptionIndex::MasterOffAdjust,
        OptionIndex::UseRainSensor,
        OptionIndex::RainSensorType,
        OptionIndex::RainSensorOnDelay,
        OptionIndex::RainSensorOffDelay,
        OptionIndex::WaterPercentage,
        OptionIndex::IgnorePassword,
        OptionIndex::DeviceId,
        OptionIndex::ResetAll,
    ];

    pub fn spec(self) -> &'static OptionSpec {
        &OPTIONS[self as usize]
    }

    pub fn from_json_name(json_name: &str) -> Option<OptionIndex> {
        Self::ALL.iter().copied().find(|index| index.spec().json_name == json_name)
    }

    fn address(self) -> usize {
        layout::OPTIONS + self as usize
    }
}

/// Option value as seen by readers (display, network)
#[derive(Debug, Serialize)]
pub struct OptionValue {
    pub name: &'static str,
    pub json_name: &'static str,
    pub value: u8,
    pub max: u8,
    pub flags: OptionFlags,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    values: [u8; NUM_OPTIONS],
}

impl Options {
    /// Options with default values
    pub fn new() -> Self {
        let mut options = Self { values: [0; NUM_OPTIONS] };
        options.setup();
        options
    }

    /// Reset every option to its default value
    pub fn setup(&mut self) {
        for index in OptionIndex::ALL {
            self.values[index as usize] = index.spec().default;
        }
    }

    /// Load option values from the store
    ///
    /// A stored value above the maximum is clamped.
    pub fn load(&mut self, store: &dyn Store) {
        for index in OptionIndex::ALL {
            let stored = store.read(index.address());
            let max = index.spec().max;
            if stored > max {
                tracing::warn!("Stored option {} = {} exceeds maximum {}", index.spec().json_name, stored, max);
            }
            self.values[index as usize] = stored.min(max);
        }
    }

    /// Write every option value to the store
    pub fn save(&self, store: &mut dyn Store) -> store::Result<()> {
        store.write_block(layout::OPTIONS, &self.values)
    }

    /// An option that needs a reboot differs from its stored value
    pub fn reboot_needed(&self, store: &dyn Store) -> bool {
        OptionIndex::ALL.iter().any(|&index| index.spec().flags.reboot && store.read(index.address()) != self.get(index))
    }

    pub fn get(&self, index: OptionIndex) -> u8 {
        self.values[index as usize]
    }

    /// Set an option value (memory only)
    ///
    /// The value is clamped to the option's maximum. Read-only options are left unchanged.
    /// Returns the value now held by the option.
    pub fn set(&mut self, index: OptionIndex, value: impl Into<u32>) -> u8 {
        let spec = index.spec();
        if spec.flags.read_only {
            tracing::debug!("Option {} is read-only", spec.json_name);
            return self.get(index);
        }

        let clamped = value.into().min(u32::from(spec.max)) as u8;
        self.values[index as usize] = clamped;
        clamped
    }

    /// Set an option by its JSON name
    pub fn set_by_name(&mut self, json_name: &str, value: impl Into<u32>) -> Option<u8> {
        OptionIndex::from_json_name(json_name).map(|index| self.set(index, value))
    }

    pub fn iter(&self) -> impl Iterator<Item = OptionValue> + '_ {
        OptionIndex::ALL.iter().map(move |&index| {
            let spec = index.spec();
            OptionValue {
                name: spec.name,
                json_name: spec.json_name,
                value: self.get(index),
                max: spec.max,
                flags: spec.flags,
            }
        })
    }

    /// Number of eight-zone station boards (including the main board)
    pub fn board_count(&self) -> usize {
        usize::from(self.get(OptionIndex::ExtensionBoards)) + 1
    }

    pub fn station_count(&self) -> usize {
        self.board_count() * station::SHIFT_REGISTER_LINES
    }

    /// Index of the master station (the option is 1-based, `0` means no master station)
    pub fn master_station(&self) -> Option<StationIndex> {
        match self.get(OptionIndex::MasterStation) {
            0 => None,
            mas => Some(usize::from(mas) - 1),
        }
    }

    pub fn http_port(&self) -> u16 {
        (u16::from(self.get(OptionIndex::HttpPort1)) << 8) | u16::from(self.get(OptionIndex::HttpPort0))
    }

    pub fn rain_sensor_enabled(&self) -> bool {
        self.get(OptionIndex::UseRainSensor) == 1
    }

    pub fn rain_sensor_normal_state(&self) -> NormalState {
        match self.get(OptionIndex::RainSensorType) {
            0 => NormalState::Closed,
            _ => NormalState::Open,
        }
    }

    /// Rain sensor on delay (minutes)
    pub fn rain_sensor_on_delay(&self) -> u8 {
        self.get(OptionIndex::RainSensorOnDelay)
    }

    /// Rain sensor off delay (minutes)
    pub fn rain_sensor_off_delay(&self) -> u8 {
        self.get(OptionIndex::RainSensorOffDelay)
    }

    pub fn password_ignored(&self) -> bool {
        self.get(OptionIndex::IgnorePassword) == 1
    }

    pub fn reset_requested(&self) -> bool {
        self.get(OptionIndex::ResetAll) == 1
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads the stored firmware version and reset flag without loading the whole table
pub fn stored_reset_condition(store: &dyn Store) -> bool {
    let firmware_version = store.read(OptionIndex::FirmwareVersion.address());
    let reset = store.read(OptionIndex::ResetAll.address());
    firmware_version != FIRMWARE_VERSION || reset == 1
}
