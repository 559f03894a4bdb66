use core::fmt;
use serde::{Deserialize, Serialize};

use super::gpio::Level;

/// Minimum on delay (seconds)
pub const MINIMUM_ON_DELAY: i64 = 5;
/// Minimum off delay (seconds)
pub const MINIMUM_OFF_DELAY: i64 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum NormalState {
    Closed = 0,
    Open = 1,
}

impl NormalState {
    /// Whether the sensor reports a detection (evaluates the normal state)
    ///
    /// The input is pulled up, so an open contact reads [Level::High].
    ///
    /// |                       | [Level::Low] | [Level::High] |
    /// | --------------------- | ------------ | ------------- |
    /// | [NormalState::Closed] | [false]      | [true]        |
    /// | [NormalState::Open]   | [true]       | [false]       |
    pub fn detected(&self, level: Level) -> bool {
        match level {
            Level::Low => match self {
                NormalState::Closed => false,
                NormalState::Open => true,
            },
            Level::High => match self {
                NormalState::Closed => true,
                NormalState::Open => false,
            },
        }
    }
}

impl fmt::Display for NormalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Closed => write!(f, "NC"),
            Self::Open => write!(f, "NO"),
        }
    }
}
