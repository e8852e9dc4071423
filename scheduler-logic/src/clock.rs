use chrono::{DateTime, Utc};

/// Injectable source of wall-clock time, so that `HotLoop`/`TransferLoop`
/// scenario tests (`spec.md` §8 scenarios a–f) can drive time directly
/// instead of sleeping in real time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub use fake::FakeClock;
