use serde::Serialize;

use super::store::{self, layout, Store};

const NIBBLE_MAX: u8 = 0x0F;

/// Controller status bits
///
/// Persisted as one little-endian word:
///
/// | bit(s) | field           |
/// | ------ | --------------- |
/// | 0      | `enabled`       |
/// | 1      | `rain_delayed`  |
/// | 2      | `rain_sensed`   |
/// | 3      | `program_busy`  |
/// | 4      | `manual_mode`   |
/// | 5      | `has_rtc`       |
/// | 6      | `has_sd`        |
/// | 8–11   | `display_board` |
/// | 12–15  | `network_fails` |
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ControllerStatus {
    /// Controller operation is enabled
    pub enabled: bool,
    /// Rain delay is in effect
    pub rain_delayed: bool,
    /// Rain sensor reports rain (debounced)
    pub rain_sensed: bool,
    /// A program is being executed
    pub program_busy: bool,
    /// Stations are being switched manually
    pub manual_mode: bool,
    /// A real-time clock was detected at boot
    pub has_rtc: bool,
    /// Removable storage was detected at boot
    pub has_sd: bool,
    /// Board shown on the display
    pub display_board: u8,
    /// Consecutive network (authentication) failures, saturates at `15`
    pub network_fails: u8,
}

impl ControllerStatus {
    pub fn to_word(&self) -> u16 {
        let flags = [self.enabled, self.rain_delayed, self.rain_sensed, self.program_busy, self.manual_mode, self.has_rtc, self.has_sd];
        let mut word = 0u16;
        for (bit, flag) in flags.iter().enumerate() {
            if *flag {
                word |= 1 << bit;
            }
        }
        word | (u16::from(self.display_board & NIBBLE_MAX) << 8) | (u16::from(self.network_fails & NIBBLE_MAX) << 12)
    }

    pub fn from_word(word: u16) -> Self {
        let bit = |n: u16| word & (1 << n) != 0;
        Self {
            enabled: bit(0),
            rain_delayed: bit(1),
            rain_sensed: bit(2),
            program_busy: bit(3),
            manual_mode: bit(4),
            has_rtc: bit(5),
            has_sd: bit(6),
            display_board: ((word >> 8) as u8) & NIBBLE_MAX,
            network_fails: ((word >> 12) as u8) & NIBBLE_MAX,
        }
    }

    /// Status at boot
    ///
    /// Only the enable flag is taken from the persisted word, everything else starts from its
    /// safe default.
    pub fn constatus_load(store: &dyn Store) -> Self {
        let persisted = Self::from_word(store.read_u16(layout::CONTROLLER_STATUS));
        Self {
            enabled: persisted.enabled,
            ..Self::default()
        }
    }

    pub fn constatus_save(&self, store: &mut dyn Store) -> store::Result<()> {
        store.write_u16(layout::CONTROLLER_STATUS, self.to_word())
    }

    /// Count a network failure (saturating)
    pub fn network_fail(&mut self) {
        if self.network_fails < NIBBLE_MAX {
            self.network_fails += 1;
        }
    }

    pub fn reset_network_fails(&mut self) {
        self.network_fails = 0;
    }
}

impl Default for ControllerStatus {
    fn default() -> Self {
        Self {
            enabled: true,
            rain_delayed: false,
            rain_sensed: false,
            program_busy: false,
            manual_mode: false,
            has_rtc: false,
            has_sd: false,
            display_board: 0,
            network_fails: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ControllerStatus;
    use crate::opensprinkler::store::MemoryStore;

    #[test]
    fn word_packing() {
        let status = ControllerStatus {
            enabled: true,
            rain_delayed: false,
            rain_sensed: true,
            program_busy: false,
            manual_mode: true,
            has_rtc: false,
            has_sd: true,
            display_board: 3,
            network_fails: 9,
        };
        assert_eq!(status.to_word(), 0b1001_0011_0101_0101);
        assert_eq!(ControllerStatus::from_word(status.to_word()), status);
    }

    #[test]
    fn network_fails_saturate() {
        let mut status = ControllerStatus::default();
        for _ in 0..20 {
            status.network_fail();
        }
        assert_eq!(status.network_fails, 15);
        status.reset_network_fails();
        assert_eq!(status.network_fails, 0);
    }

    #[test]
    fn only_enabled_is_restored() {
        let mut store = MemoryStore::default();
        let status = ControllerStatus {
            enabled: false,
            rain_delayed: true,
            program_busy: true,
            manual_mode: true,
            network_fails: 4,
            ..ControllerStatus::default()
        };
        status.constatus_save(&mut store).unwrap();

        let restored = ControllerStatus::constatus_load(&store);
        assert!(!restored.enabled, "Testing enabled flag is restored");
        assert!(!restored.program_busy, "Testing program busy starts cleared");
        assert!(!restored.manual_mode);
        assert!(!restored.rain_delayed);
        assert_eq!(restored.network_fails, 0);
    }
}
