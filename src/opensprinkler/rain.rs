//! Rain delay and rain sensor
//!
//! Both produce one override consulted by the activation engine: a station is suppressed while
//! `rain_delayed || rain_sensed` unless it ignores rain. Rain delay expiry is polled from the host
//! loop, there is no timer callback.

use super::{
    status::ControllerStatus,
    store::{self, layout, Store},
};

const SECS_PER_HOUR: i64 = 3600;
const SECS_PER_MINUTE: i64 = 60;

/// Debounce state of the rain sensor
#[derive(Clone, Copy, Debug, Default)]
pub struct SensorState {
    /// Time after which a continuous detection is accepted
    pub timestamp_on: Option<i64>,
    /// Time after which a continuous non-detection is accepted
    pub timestamp_off: Option<i64>,
    /// Most recent time rain was sensed
    pub timestamp_activated: Option<i64>,
    /// Last raw (polarity corrected) reading
    pub detected: bool,
}

impl SensorState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Default)]
pub struct RainState {
    /// Time when rain delay stops (seconds since epoch)
    pub stop_time: Option<i64>,
    /// Time when the most recent rain delay started
    pub timestamp_active_last: Option<i64>,
    pub sensor: SensorState,
}

impl RainState {
    /// Start rain delay for `hours` from `now`
    ///
    /// Returns the new stop time.
    pub fn start(&mut self, status: &mut ControllerStatus, now: i64, hours: u16) -> i64 {
        let stop_time = now + i64::from(hours) * SECS_PER_HOUR;
        if !status.rain_delayed {
            self.timestamp_active_last = Some(now);
        }
        self.stop_time = Some(stop_time);
        status.rain_delayed = true;
        stop_time
    }

    /// Stop rain delay
    pub fn stop(&mut self, status: &mut ControllerStatus) {
        status.rain_delayed = false;
        self.stop_time = None;
    }

    /// Check rain delay status
    ///
    /// Stops an expired rain delay and resumes one whose stop time still lies ahead (e.g. after a
    /// reboot). Returns the new state when it changed.
    pub fn check_rain_delay(&mut self, status: &mut ControllerStatus, now: i64) -> Option<bool> {
        if status.rain_delayed {
            if now >= self.stop_time.unwrap_or(0) {
                // rain delay is over
                self.stop(status);
                return Some(false);
            }
        } else if let Some(stop_time) = self.stop_time {
            if stop_time > now {
                status.rain_delayed = true;
                self.timestamp_active_last = Some(now);
                return Some(true);
            }
            // stale stop time left over from a delay that ended while powered off
            self.stop_time = None;
        }

        None
    }

    /// Update the debounced rain sensor status
    ///
    /// - `detected`: polarity corrected reading, [None] when the rain sensor is not in use
    /// - `edge`: the input changed since the last poll, which restarts the debounce window
    /// - `on_delay` / `off_delay`: minutes a reading must be stable (at least 5 seconds)
    ///
    /// Returns the new `rain_sensed` state when it changed.
    pub fn update_sensor(&mut self, status: &mut ControllerStatus, now: i64, detected: Option<bool>, edge: bool, on_delay: u8, off_delay: u8) -> Option<bool> {
        let previous = status.rain_sensed;

        let detected = match detected {
            Some(detected) => detected,
            None => {
                self.sensor.reset();
                status.rain_sensed = false;
                return if previous { Some(false) } else { None };
            }
        };

        if edge {
            self.sensor.timestamp_on = None;
            self.sensor.timestamp_off = None;
        }
        self.sensor.detected = detected;

        if detected {
            self.sensor.timestamp_off = None;
            match self.sensor.timestamp_on {
                Some(timestamp_on) if now >= timestamp_on => status.rain_sensed = true,
                Some(_) => (),
                None => self.sensor.timestamp_on = Some(now + (i64::from(on_delay) * SECS_PER_MINUTE).max(super::sensor::MINIMUM_ON_DELAY)),
            }
        } else {
            self.sensor.timestamp_on = None;
            match self.sensor.timestamp_off {
                Some(timestamp_off) if now >= timestamp_off => status.rain_sensed = false,
                Some(_) => (),
                None => self.sensor.timestamp_off = Some(now + (i64::from(off_delay) * SECS_PER_MINUTE).max(super::sensor::MINIMUM_OFF_DELAY)),
            }
        }

        if status.rain_sensed == previous {
            return None;
        }

        if status.rain_sensed {
            self.sensor.timestamp_activated = Some(now);
        }
        Some(status.rain_sensed)
    }

    /// Seconds until the rain delay stops
    pub fn remaining(&self, now: i64) -> Option<i64> {
        self.stop_time.map(|stop_time| (stop_time - now).max(0))
    }
}

/// Load the persisted rain delay stop time
pub fn stop_time_load(store: &dyn Store) -> Option<i64> {
    match store.read_u32(layout::RAIN_DELAY_STOP) {
        0 | u32::MAX => None,
        stop_time => Some(i64::from(stop_time)),
    }
}

/// Persist the rain delay stop time ([None] is stored as `0`)
pub fn stop_time_save(store: &mut dyn Store, stop_time: Option<i64>) -> store::Result<()> {
    let value = stop_time.map_or(0, |stop_time| stop_time.clamp(1, i64::from(u32::MAX - 1)) as u32);
    store.write_u32(layout::RAIN_DELAY_STOP, value)
}
