use std::{
    path::Path,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
};

/// Device node of a battery backed real-time clock
const RTC_DEVICE: &str = "/dev/rtc0";

/// Source of the current time (seconds since unix epoch)
pub trait Clock {
    fn now(&self) -> i64;

    /// The time is kept by a battery backed clock (rather than estimated)
    fn is_hardware_backed(&self) -> bool {
        false
    }
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }

    fn is_hardware_backed(&self) -> bool {
        Path::new(RTC_DEVICE).exists()
    }
}

/// Clock that only moves when told to
///
/// Clones share the same time.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self { now: Arc::new(AtomicI64::new(now)) }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
