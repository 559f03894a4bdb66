pub mod auth;
pub mod clock;
pub mod controller;
pub mod errors;
pub mod gpio;
pub mod options;
pub mod rain;
pub mod sensor;
pub mod state;
pub mod station;
pub mod status;
pub mod store;

use std::path::{Path, PathBuf};

use serde::Serialize;

use self::{
    clock::Clock,
    options::{OptionIndex, OptionValue, Options},
    rain::RainState,
    state::{ControllerState, StationBits, StationChange},
    station::{StationIndex, Stations},
    status::ControllerStatus,
    store::Store,
};

include!(concat!(env!("OUT_DIR"), "/firmware_banner.rs"));

/// Read-only view of the controller for the display and network collaborators
#[derive(Debug, Serialize)]
pub struct Snapshot {
    pub timestamp: i64,
    pub status: ControllerStatus,
    pub board_count: usize,
    pub master_station: Option<StationIndex>,
    pub requested: StationBits,
    pub physical: StationBits,
    pub rain_delay_stop_time: Option<i64>,
    pub station_names: Vec<String>,
    pub options: Vec<OptionValue>,
}

pub struct Controller {
    store: Box<dyn Store>,
    gpio: Box<dyn gpio::Backend>,
    clock: Box<dyn Clock>,
    options: Options,
    stations: Stations,
    pub state: ControllerState,
    removable_storage: Option<PathBuf>,
}

impl Controller {
    /// Controller with default options and metadata
    ///
    /// Nothing is read from the store or written to the outputs until [Controller::setup] is called.
    pub fn new<S, B, C>(store: S, gpio: B, clock: C) -> Self
    where
        S: Store + 'static,
        B: gpio::Backend + 'static,
        C: Clock + 'static,
    {
        Self {
            store: Box::new(store),
            gpio: Box::new(gpio),
            clock: Box::new(clock),
            options: Options::new(),
            stations: Stations::default(),
            state: ControllerState::default(),
            removable_storage: None,
        }
    }

    /// Directory whose presence marks removable storage
    pub fn with_removable_storage<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.removable_storage = Some(path.into());
        self
    }

    /// Setup controller
    ///
    /// Performs a factory reset if the stored firmware version differs or a reset was requested,
    /// otherwise loads the persisted configuration. Outputs are cleared before they are enabled.
    pub fn setup(&mut self) -> errors::Result<()> {
        self.load()?;
        self.detect_peripherals();

        // Reset all stations
        self.clear_all_station_bits();
        self.apply_all_station_bits()?;
        self.gpio.enable_outputs()?;

        tracing::info!("{} ready ({} boards, controller {})", FIRMWARE_BANNER, self.board_count(), if self.state.status.enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    /// Load the persisted configuration without touching the outputs
    pub fn load(&mut self) -> store::Result<()> {
        if options::stored_reset_condition(self.store.as_ref()) {
            self.factory_reset()?;
        } else {
            self.options.load(self.store.as_ref());
            self.stations.load(self.store.as_ref());
        }

        // physical bits still describe the outputs, requests start over
        self.state.status = ControllerStatus::constatus_load(self.store.as_ref());
        self.state.rain = RainState {
            stop_time: rain::stop_time_load(self.store.as_ref()),
            ..RainState::default()
        };
        self.state.reboot_request = false;
        self.clear_all_station_bits();
        Ok(())
    }

    /// Factory reset
    ///
    /// Writes default options, station names and metadata, the default password, and clears the
    /// rain delay.
    pub fn factory_reset(&mut self) -> store::Result<()> {
        tracing::info!("Resetting controller to defaults");

        self.options.setup();
        self.options.save(self.store.as_mut())?;

        for station_index in 0..station::MAX_NUM_STATIONS {
            station::set_name(self.store.as_mut(), station_index, &station::default_name(station_index))?;
        }
        self.stations = Stations::factory();
        self.stations.save(self.store.as_mut())?;

        auth::password_save(self.store.as_mut(), auth::DEFAULT_PASSWORD)?;

        self.state.status = ControllerStatus::default();
        self.state.status.constatus_save(self.store.as_mut())?;

        self.state.rain = RainState::default();
        rain::stop_time_save(self.store.as_mut(), None)?;

        Ok(())
    }

    /// Detect optional peripherals
    ///
    /// Missing peripherals only clear the presence flags.
    pub fn detect_peripherals(&mut self) {
        self.state.status.has_rtc = self.clock.is_hardware_backed();
        self.state.status.has_sd = self.removable_storage.as_deref().map_or(false, Path::is_dir);

        if !self.state.status.has_rtc {
            tracing::debug!("No real-time clock detected");
        }
        if let (Some(path), false) = (&self.removable_storage, self.state.status.has_sd) {
            tracing::warn!("Removable storage not found at {}", path.display());
        }
    }

    // region: GETTERS

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn stations(&self) -> &Stations {
        &self.stations
    }

    /// Station metadata for editing
    ///
    /// Changes are picked up by the next apply, and persisted with the matching `*_save` call.
    pub fn stations_mut(&mut self) -> &mut Stations {
        self.state.station.apply_pending = true;
        &mut self.stations
    }

    pub fn status(&self) -> &ControllerStatus {
        &self.state.status
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Number of eight-zone station boards (including the main board)
    pub fn board_count(&self) -> usize {
        self.options.board_count()
    }

    pub fn station_count(&self) -> usize {
        self.options.station_count()
    }

    pub fn master_station(&self) -> Option<StationIndex> {
        self.options.master_station()
    }

    pub fn is_station_running(&self, station_index: StationIndex) -> bool {
        self.state.station.is_running(station_index)
    }

    // endregion GETTERS

    // region: STATIONS

    /// Set station bit
    ///
    /// This function sets the corresponding requested bit. [Controller::apply_all_station_bits()]
    /// must be called after to apply the bits (which results in physically actuating the valves).
    pub fn set_station_bit(&mut self, station_index: StationIndex, value: bool) -> StationChange {
        let change = self.state.station.requested.set(station_index, value);

        if change != StationChange::NoChange {
            self.state.station.apply_pending = true;
        }
        if value {
            self.state.status.program_busy = true;
        }

        change
    }

    /// Clear all station bits
    pub fn clear_all_station_bits(&mut self) {
        self.state.station.requested.clear();
        self.state.station.apply_pending = true;
        self.state.status.program_busy = false;
    }

    /// Apply all station bits
    ///
    /// **This will actuate valves**
    ///
    /// Physical bits are only updated after the pattern was latched. On error the apply stays
    /// pending.
    pub fn apply_all_station_bits(&mut self) -> gpio::Result<()> {
        let master = self.master_station();
        let target = controller::resolve_station_bits(&self.state.station.requested, &self.stations, &self.state.status, master, self.board_count());

        for bits in controller::latch_sequence(&self.state.station.physical, &target, master) {
            if let Err(error) = self.gpio.latch(bits.boards()) {
                tracing::error!("Cannot latch station outputs: {}", error);
                self.state.station.apply_pending = true;
                return Err(error);
            }
            self.state.station.physical = bits;
        }

        tracing::debug!("Station outputs: {:02x?}", self.state.station.physical.boards());
        self.state.station.apply_pending = false;
        Ok(())
    }

    pub fn get_station_name(&self, station_index: StationIndex) -> String {
        station::get_name(self.store.as_ref(), station_index)
    }

    pub fn set_station_name(&mut self, station_index: StationIndex, name: &str) -> store::Result<()> {
        station::set_name(self.store.as_mut(), station_index, name)
    }

    pub fn masop_load(&mut self) {
        self.stations.masop_load(self.store.as_ref());
        self.state.station.apply_pending = true;
    }

    pub fn masop_save(&mut self) -> store::Result<()> {
        self.stations.masop_save(self.store.as_mut())
    }

    pub fn ignrain_load(&mut self) {
        self.stations.ignrain_load(self.store.as_ref());
        self.state.station.apply_pending = true;
    }

    pub fn ignrain_save(&mut self) -> store::Result<()> {
        self.stations.ignrain_save(self.store.as_mut())
    }

    pub fn stndis_load(&mut self) {
        self.stations.stndis_load(self.store.as_ref());
        self.state.station.apply_pending = true;
    }

    pub fn stndis_save(&mut self) -> store::Result<()> {
        self.stations.stndis_save(self.store.as_mut())
    }

    pub fn attrib_load(&mut self) {
        self.stations.attrib_load(self.store.as_ref());
    }

    pub fn attrib_save(&mut self) -> store::Result<()> {
        self.stations.attrib_save(self.store.as_mut())
    }

    // endregion STATIONS

    // region: OPTIONS

    pub fn option(&self, index: OptionIndex) -> u8 {
        self.options.get(index)
    }

    /// Set an option value (memory only, see [Controller::options_save])
    ///
    /// Returns the (clamped) value now held by the option.
    pub fn set_option(&mut self, index: OptionIndex, value: impl Into<u32>) -> u8 {
        let previous = self.options.get(index);
        let value = self.options.set(index, value);

        if value != previous {
            tracing::debug!("Option {}: {} -> {}", index.spec().json_name, previous, value);
            self.state.station.apply_pending = true;
        }

        value
    }

    pub fn set_option_by_name(&mut self, json_name: &str, value: impl Into<u32>) -> Option<u8> {
        OptionIndex::from_json_name(json_name).map(|index| self.set_option(index, value))
    }

    /// Commit option values to the store
    ///
    /// Requests a reboot if an option that needs one differs from its stored value.
    pub fn options_save(&mut self) -> store::Result<()> {
        let reboot = self.options.reboot_needed(self.store.as_ref());
        self.options.save(self.store.as_mut())?;

        if reboot {
            self.request_reboot();
        }
        Ok(())
    }

    /// Discard uncommitted option values
    pub fn options_load(&mut self) {
        self.options.load(self.store.as_ref());
        self.state.station.apply_pending = true;
    }

    // endregion OPTIONS

    // region: OPERATION

    /// Enable controller operation
    ///
    /// Stations are not re-activated, requests made while disabled are dropped.
    pub fn enable(&mut self) -> store::Result<()> {
        self.clear_all_station_bits();
        self.state.status.enabled = true;
        self.state.status.constatus_save(self.store.as_mut())?;
        tracing::info!("Controller enabled");
        Ok(())
    }

    /// Disable controller operation
    ///
    /// All stations are turned off immediately.
    pub fn disable(&mut self) -> errors::Result<()> {
        self.state.status.enabled = false;
        self.clear_all_station_bits();
        let applied = self.apply_all_station_bits();
        self.state.status.constatus_save(self.store.as_mut())?;
        applied?;

        tracing::info!("Controller disabled");
        Ok(())
    }

    pub fn manual_mode_on(&mut self) {
        self.state.status.manual_mode = true;
    }

    /// Leave manual mode (turns off all stations)
    pub fn manual_mode_off(&mut self) {
        if self.state.status.manual_mode {
            self.clear_all_station_bits();
        }
        self.state.status.manual_mode = false;
    }

    /// Show the next configured board on the display
    pub fn next_display_board(&mut self) -> u8 {
        let board_count = self.board_count() as u8;
        self.state.status.display_board = (self.state.status.display_board + 1) % board_count;
        self.state.status.display_board
    }

    // endregion OPERATION

    // region: RAIN

    /// Start rain delay
    ///
    /// Returns the stop time.
    pub fn rain_delay_start(&mut self, hours: u16) -> store::Result<i64> {
        let now = self.clock.now();
        let stop_time = self.state.rain.start(&mut self.state.status, now, hours);
        rain::stop_time_save(self.store.as_mut(), Some(stop_time))?;
        self.state.station.apply_pending = true;

        tracing::info!("Rain delay started for {} hours", hours);
        Ok(stop_time)
    }

    /// Stop rain delay
    pub fn rain_delay_stop(&mut self) -> store::Result<()> {
        self.state.rain.stop(&mut self.state.status);
        rain::stop_time_save(self.store.as_mut(), None)?;
        self.state.station.apply_pending = true;

        tracing::info!("Rain delay stopped");
        Ok(())
    }

    /// Update the rain sensor and rain delay status
    pub fn update_sensor_status(&mut self) -> store::Result<()> {
        let stop_time = self.state.rain.stop_time;
        let now = self.clock.now();
        let edge = self.gpio.take_rain_sensor_edge();

        let reading = if self.options.rain_sensor_enabled() {
            match self.gpio.read_rain_sensor() {
                Ok(level) => Some(Some(self.options.rain_sensor_normal_state().detected(level))),
                Err(error) => {
                    tracing::error!("Cannot read rain sensor: {}", error);
                    None
                }
            }
        } else {
            Some(None)
        };

        if let Some(detected) = reading {
            let (on_delay, off_delay) = (self.options.rain_sensor_on_delay(), self.options.rain_sensor_off_delay());
            if let Some(sensed) = self.state.rain.update_sensor(&mut self.state.status, now, detected, edge, on_delay, off_delay) {
                tracing::info!("Rain sensor: {}", if sensed { "rain" } else { "dry" });
                self.state.station.apply_pending = true;
            }
        }

        match self.state.rain.check_rain_delay(&mut self.state.status, now) {
            Some(true) => {
                tracing::info!("Rain delay resumed");
                self.state.station.apply_pending = true;
            }
            Some(false) => {
                tracing::info!("Rain delay expired");
                self.state.station.apply_pending = true;
            }
            None => (),
        }

        if stop_time.is_some() && self.state.rain.stop_time.is_none() {
            rain::stop_time_save(self.store.as_mut(), None)?;
        }

        Ok(())
    }

    /// One iteration of the control loop
    pub fn tick(&mut self) -> errors::Result<()> {
        self.update_sensor_status()?;

        if self.state.station.apply_pending {
            self.apply_all_station_bits()?;
        }

        Ok(())
    }

    // endregion RAIN

    // region: AUTH

    pub fn password_set(&mut self, password: &str) -> store::Result<()> {
        auth::password_save(self.store.as_mut(), password)
    }

    pub fn password_verify(&self, password: &str) -> bool {
        self.options.password_ignored() || auth::verify(self.store.as_ref(), password)
    }

    /// Verify a password and keep count of consecutive failures
    pub fn authenticate(&mut self, password: &str) -> bool {
        if self.password_verify(password) {
            self.state.status.reset_network_fails();
            return true;
        }

        self.state.status.network_fail();
        tracing::warn!("Authentication failed ({} consecutive)", self.state.status.network_fails);
        false
    }

    // endregion AUTH

    pub fn request_reboot(&mut self) {
        tracing::info!("Reboot requested");
        self.state.reboot_request = true;
    }

    pub fn reboot_requested(&self) -> bool {
        self.state.reboot_request
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            timestamp: self.clock.now(),
            status: self.state.status,
            board_count: self.board_count(),
            master_station: self.master_station(),
            requested: self.state.station.requested,
            physical: self.state.station.physical,
            rain_delay_stop_time: self.state.rain.stop_time,
            station_names: (0..self.station_count()).map(|station_index| self.get_station_name(station_index)).collect(),
            options: self.options.iter().collect(),
        }
    }

    /// Release the store (e.g. to hand it to a new controller after a simulated reboot)
    pub fn into_store(self) -> Box<dyn Store> {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::{
        clock::ManualClock,
        gpio::{Level, Simulated},
        options::OptionIndex,
        rain,
        state::{StationBits, StationChange},
        store::{layout, MemoryStore, Store},
        Controller,
    };

    const NOW: i64 = 1_660_000_000;

    fn controller() -> (Controller, Simulated, ManualClock) {
        controller_with_store(MemoryStore::default())
    }

    fn controller_with_store(store: MemoryStore) -> (Controller, Simulated, ManualClock) {
        let gpio = Simulated::new();
        let clock = ManualClock::new(NOW);
        let mut controller = Controller::new(store, gpio.clone(), clock.clone());
        controller.setup().unwrap();
        (controller, gpio, clock)
    }

    /// Copy of the store contents, as they would survive a power cycle
    fn power_cycle(controller: Controller) -> MemoryStore {
        let store = controller.into_store();
        let mut image = vec![0; store.size()];
        store.read_block(0, &mut image);
        MemoryStore::from_image(image)
    }

    fn bits(stations: &[usize]) -> StationBits {
        let mut bits = StationBits::new();
        for &station_index in stations {
            bits.set(station_index, true);
        }
        bits
    }

    #[test]
    fn setup_on_blank_store_resets_to_factory() {
        let (controller, gpio, _) = controller();

        assert_eq!(controller.option(OptionIndex::FirmwareVersion), super::options::FIRMWARE_VERSION);
        assert_eq!(controller.get_station_name(0), "S01");
        assert_eq!(controller.get_station_name(47), "S48");
        assert!(controller.stations().activates_master(12));
        assert!(controller.password_verify("opendoor"));
        assert!(controller.status().enabled);
        assert_eq!(gpio.outputs(), Some([0; 6]), "Testing outputs are cleared at boot");
        assert!(gpio.pins().outputs_enabled);
    }

    #[test]
    fn disable_turns_everything_off() {
        let (mut controller, gpio, _) = controller();
        controller.set_option(OptionIndex::ExtensionBoards, 1u8);
        controller.set_station_bit(3, true);
        controller.set_station_bit(9, true);
        controller.tick().unwrap();
        assert!(controller.state.station.physical.any());

        controller.disable().unwrap();
        assert!(!controller.state.station.physical.any());
        assert_eq!(gpio.outputs(), Some([0; 6]));

        controller.set_station_bit(3, true);
        controller.tick().unwrap();
        assert!(!controller.state.station.physical.any(), "Testing requests are ignored while disabled");
    }

    #[test]
    fn enable_does_not_reactivate() {
        let (mut controller, _, _) = controller();
        controller.set_station_bit(2, true);
        controller.disable().unwrap();
        controller.enable().unwrap();
        controller.tick().unwrap();
        assert!(!controller.state.station.physical.any());
    }

    #[test]
    fn enable_discards_requests_made_while_disabled() {
        let (mut controller, gpio, clock) = controller();
        controller.disable().unwrap();
        controller.rain_delay_start(1).unwrap();
        controller.set_station_bit(3, true);
        controller.tick().unwrap();

        controller.enable().unwrap();
        controller.tick().unwrap();
        assert_eq!(gpio.outputs(), Some([0; 6]));

        clock.advance(3600);
        controller.tick().unwrap();
        assert!(!controller.status().rain_delayed);
        assert_eq!(gpio.outputs(), Some([0; 6]), "Testing stale request stays off after the rain delay");
        assert!(!controller.state.station.physical.any());
    }

    #[test]
    fn load_keeps_outputs_in_sync() {
        let (mut controller, gpio, _) = controller();
        controller.set_station_bit(2, true);
        controller.tick().unwrap();
        assert_eq!(gpio.outputs(), Some([0b0000_0100, 0, 0, 0, 0, 0]));

        controller.load().unwrap();
        assert_eq!(controller.state.station.physical, bits(&[2]), "Testing physical bits describe the outputs");
        controller.tick().unwrap();
        assert!(!controller.state.station.physical.any());
        assert_eq!(gpio.outputs(), Some([0; 6]));
    }

    #[test]
    fn apply_is_idempotent() {
        let (mut controller, gpio, _) = controller();
        controller.set_station_bit(1, true);
        controller.apply_all_station_bits().unwrap();
        let first = (controller.state.station.physical, gpio.outputs());
        controller.apply_all_station_bits().unwrap();
        assert_eq!((controller.state.station.physical, gpio.outputs()), first);
    }

    #[test]
    fn set_station_bit_reports_change() {
        let (mut controller, _, _) = controller();
        assert_eq!(controller.set_station_bit(4, true), StationChange::Change(true));
        assert_eq!(controller.set_station_bit(4, true), StationChange::NoChange);
        assert!(controller.status().program_busy);
        controller.clear_all_station_bits();
        assert!(!controller.status().program_busy);
        assert!(!controller.state.station.requested.any());
    }

    #[test]
    fn two_boards_with_master() {
        let (mut controller, gpio, _) = controller();
        controller.set_option(OptionIndex::ExtensionBoards, 1u8);
        controller.set_option(OptionIndex::MasterStation, 1u8);

        controller.set_station_bit(5, true);
        controller.tick().unwrap();
        assert_eq!(controller.state.station.physical, bits(&[0, 5]));

        let latched = gpio.pins().latched.clone();
        assert_eq!(latched[latched.len() - 2][0], 0b0010_0000, "Testing zone is latched before the master");
        assert_eq!(latched[latched.len() - 1][0], 0b0010_0001);

        controller.set_station_bit(5, false);
        controller.tick().unwrap();
        assert_eq!(controller.state.station.physical, StationBits::new());
        let latched = gpio.pins().latched.clone();
        assert_eq!(latched[latched.len() - 2][0], 0b0000_0001, "Testing master is switched off last");
    }

    #[test]
    fn master_without_masop_station() {
        let (mut controller, _, _) = controller();
        controller.set_option(OptionIndex::MasterStation, 1u8);
        controller.stations_mut().set_master_operation(5, false);
        controller.set_station_bit(5, true);
        controller.set_station_bit(0, true);
        controller.tick().unwrap();
        assert_eq!(controller.state.station.physical, bits(&[5]));
    }

    #[test]
    fn rain_delay_suppresses_stations() {
        let (mut controller, _, clock) = controller();
        controller.stations_mut().set_ignore_rain(2, true);
        controller.set_station_bit(1, true);
        controller.set_station_bit(2, true);

        assert_eq!(controller.rain_delay_start(1).unwrap(), NOW + 3600);
        controller.tick().unwrap();
        assert_eq!(controller.state.station.physical, bits(&[2]));

        clock.advance(3600);
        controller.tick().unwrap();
        assert!(!controller.status().rain_delayed, "Testing rain delay expires");
        assert_eq!(controller.state.station.physical, bits(&[1, 2]));
    }

    #[test]
    fn rain_sensed_suppresses_stations() {
        let (mut controller, gpio, clock) = controller();
        controller.set_option(OptionIndex::UseRainSensor, 1u8);
        // normally open, closes (low) on rain
        controller.set_option(OptionIndex::RainSensorType, 1u8);
        controller.set_station_bit(3, true);
        controller.tick().unwrap();
        assert_eq!(controller.state.station.physical, bits(&[3]));

        gpio.set_rain_sensor(Level::Low);
        controller.tick().unwrap();
        clock.advance(5);
        controller.tick().unwrap();
        assert!(controller.status().rain_sensed);
        assert!(!controller.state.station.physical.any());
    }

    #[test]
    fn master_off_while_rain_sensed() {
        let (mut controller, gpio, clock) = controller();
        controller.set_option(OptionIndex::ExtensionBoards, 1u8);
        controller.set_option(OptionIndex::MasterStation, 1u8);
        controller.set_option(OptionIndex::UseRainSensor, 1u8);
        controller.set_option(OptionIndex::RainSensorType, 1u8);
        controller.set_station_bit(5, true);
        controller.tick().unwrap();
        assert_eq!(controller.state.station.physical, bits(&[0, 5]));

        gpio.set_rain_sensor(Level::Low);
        controller.tick().unwrap();
        clock.advance(5);
        controller.tick().unwrap();
        assert!(controller.status().rain_sensed);
        assert!(!controller.state.station.physical.is_set(5));
        assert!(!controller.state.station.physical.is_set(0), "Testing master follows its zone off");
        assert_eq!(gpio.outputs(), Some([0; 6]));
    }

    #[test]
    fn stale_stop_time_is_cleared() {
        let (controller, _, _) = controller();
        let mut store = power_cycle(controller);
        rain::stop_time_save(&mut store, Some(NOW - 60)).unwrap();

        let (mut controller, _, _) = controller_with_store(store);
        controller.tick().unwrap();
        assert!(!controller.status().rain_delayed);
        assert_eq!(controller.snapshot().rain_delay_stop_time, None);
        assert_eq!(rain::stop_time_load(controller.store()), None, "Testing cleared stop time is persisted");
    }

    #[test]
    fn rain_delay_resumes_after_reboot() {
        let (mut controller, _, _) = controller();
        controller.rain_delay_start(2).unwrap();

        let (mut controller, _, clock) = controller_with_store(power_cycle(controller));
        assert!(!controller.status().rain_delayed);
        clock.advance(60);
        controller.tick().unwrap();
        assert!(controller.status().rain_delayed);
        assert_eq!(controller.state.rain.stop_time, Some(NOW + 7200));
    }

    #[test]
    fn wrong_password_counts_failures() {
        let (mut controller, _, _) = controller();
        controller.set_station_bit(1, true);
        controller.tick().unwrap();
        let physical = controller.state.station.physical;
        let requested = controller.state.station.requested;

        for _ in 0..3 {
            assert!(!controller.authenticate("wrong"));
        }
        assert_eq!(controller.status().network_fails, 3);
        assert_eq!(controller.state.station.physical, physical);
        assert_eq!(controller.state.station.requested, requested);

        assert!(controller.authenticate("opendoor"));
        assert_eq!(controller.status().network_fails, 0);
    }

    #[test]
    fn ignore_password_accepts_anything() {
        let (mut controller, _, _) = controller();
        controller.set_option(OptionIndex::IgnorePassword, 1u8);
        assert!(controller.authenticate("anything"));
        controller.password_set("secret").unwrap();
        controller.set_option(OptionIndex::IgnorePassword, 0u8);
        assert!(controller.password_verify("secret"));
        assert!(!controller.password_verify("opendoor"));
    }

    #[test]
    fn configuration_survives_reboot() {
        let (mut controller, _, _) = controller();
        controller.set_option(OptionIndex::ExtensionBoards, 2u8);
        controller.set_option(OptionIndex::TimeZone, 56u8);
        controller.options_save().unwrap();
        controller.set_station_name(9, "Back lawn").unwrap();
        controller.stations_mut().set_master_operation(9, false);
        controller.stations_mut().set_ignore_rain(10, true);
        controller.masop_save().unwrap();
        controller.ignrain_save().unwrap();
        controller.disable().unwrap();

        let (controller, _, _) = controller_with_store(power_cycle(controller));
        assert_eq!(controller.board_count(), 3);
        assert_eq!(controller.option(OptionIndex::TimeZone), 56);
        assert_eq!(controller.get_station_name(9), "Back lawn");
        assert!(!controller.stations().activates_master(9));
        assert!(controller.stations().ignores_rain(10));
        assert!(!controller.status().enabled, "Testing disabled state is persisted");
    }

    #[test]
    fn reboot_option_requests_reboot_on_commit() {
        let (mut controller, _, _) = controller();
        controller.set_option(OptionIndex::TimeZone, 10u8);
        controller.options_save().unwrap();
        assert!(!controller.reboot_requested());

        controller.set_option(OptionIndex::ResetAll, 1u8);
        assert!(!controller.reboot_requested(), "Testing reboot waits for the commit");
        controller.options_save().unwrap();
        assert!(controller.reboot_requested());

        let (controller, _, _) = controller_with_store(power_cycle(controller));
        assert_eq!(controller.option(OptionIndex::TimeZone), 48, "Testing reset option triggers factory reset");
        assert_eq!(controller.option(OptionIndex::ResetAll), 0);
    }

    #[test]
    fn reverted_reboot_option_does_not_reboot() {
        let (mut controller, _, _) = controller();
        controller.set_option(OptionIndex::DeviceId, 5u8);
        controller.set_option(OptionIndex::DeviceId, 0u8);
        controller.options_save().unwrap();
        assert!(!controller.reboot_requested());

        controller.set_option(OptionIndex::DeviceId, 5u8);
        controller.options_load();
        controller.options_save().unwrap();
        assert!(!controller.reboot_requested(), "Testing discarded edit does not reboot");
    }

    #[test]
    fn firmware_mismatch_triggers_factory_reset() {
        let (mut controller, _, _) = controller();
        controller.set_station_name(0, "Front").unwrap();
        let mut store = power_cycle(controller);
        store.write(layout::OPTIONS, 100).unwrap();

        let (controller, _, _) = controller_with_store(store);
        assert_eq!(controller.get_station_name(0), "S01");
    }

    #[test]
    fn failed_latch_keeps_physical_bits() {
        let (mut controller, gpio, _) = controller();
        controller.set_station_bit(2, true);
        gpio.pins().fail_latch = true;

        assert!(controller.tick().is_err());
        assert!(!controller.state.station.physical.any());
        assert!(controller.state.station.apply_pending);

        gpio.pins().fail_latch = false;
        controller.tick().unwrap();
        assert_eq!(controller.state.station.physical, bits(&[2]));
        assert!(!controller.state.station.apply_pending);
    }

    #[test]
    fn manual_mode_and_display() {
        let (mut controller, _, _) = controller();
        controller.set_option(OptionIndex::ExtensionBoards, 2u8);
        controller.manual_mode_on();
        controller.set_station_bit(4, true);
        controller.manual_mode_off();
        assert!(!controller.state.station.requested.any());

        assert_eq!(controller.next_display_board(), 1);
        assert_eq!(controller.next_display_board(), 2);
        assert_eq!(controller.next_display_board(), 0);
    }

    #[test]
    fn snapshot_serializes() {
        let (mut controller, _, _) = controller();
        controller.set_station_bit(0, true);
        controller.tick().unwrap();

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.station_names.len(), 8);
        assert_eq!(snapshot.physical.boards()[0], 1);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["status"]["enabled"], true);
        assert_eq!(json["options"][0]["json_name"], "fwv");
    }
}
