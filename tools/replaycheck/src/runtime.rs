use crate::archive::Archive;
use crate::errors::ReplayCheckError;
use crate::loopback::Loopback;
use crate::transport::Transport;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
    fn sleep(&self, duration: Duration) -> Result<(), ReplayCheckError>;
    /// Give up the scheduling slot without sleeping. Busy-wait loops call
    /// this between attempts; swapping it for a sleep changes the observed
    /// timing characteristics of the offer and poll loops.
    fn yield_now(&self);
}

pub struct ProductionClock;

impl Clock for ProductionClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    fn sleep(&self, duration: Duration) -> Result<(), ReplayCheckError> {
        std::thread::sleep(duration);
        Ok(())
    }

    fn yield_now(&self) {
        std::thread::yield_now();
    }
}

/// The seams one verification run needs: a clock plus the transport and
/// archive capabilities it runs against.
pub struct Harness {
    pub clock: Arc<dyn Clock>,
    pub transport: Arc<dyn Transport>,
    pub archive: Arc<dyn Archive>,
}

impl Harness {
    /// In-memory transport/archive pair on the production clock.
    pub fn loopback() -> Self {
        let loopback = Loopback::new();
        Self {
            clock: Arc::new(ProductionClock),
            transport: loopback.transport(),
            archive: loopback.archive(),
        }
    }
}

#[derive(Clone)]
pub struct FakeClock {
    now: Arc<Mutex<SystemTime>>,
    sleeps: Arc<Mutex<Vec<Duration>>>,
    yields: Arc<Mutex<u64>>,
}

impl FakeClock {
    pub fn new(now: SystemTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
            sleeps: Arc::new(Mutex::new(Vec::new())),
            yields: Arc::new(Mutex::new(0)),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().expect("sleep lock").clone()
    }

    pub fn yield_count(&self) -> u64 {
        *self.yields.lock().expect("yield lock")
    }

    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().expect("clock lock");
        *now += duration;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new(SystemTime::UNIX_EPOCH)
    }
}

impl Clock for FakeClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().expect("clock lock")
    }

    fn sleep(&self, duration: Duration) -> Result<(), ReplayCheckError> {
        self.sleeps.lock().expect("sleep lock").push(duration);
        let mut now = self.now.lock().expect("clock lock");
        *now += duration;
        Ok(())
    }

    fn yield_now(&self) {
        *self.yields.lock().expect("yield lock") += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_records_sleeps_and_advances() {
        let clock = FakeClock::default();
        clock.sleep(Duration::from_millis(500)).expect("sleep");
        clock.sleep(Duration::from_millis(10)).expect("sleep");
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(500), Duration::from_millis(10)]
        );
        assert_eq!(
            clock
                .now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .expect("elapsed"),
            Duration::from_millis(510)
        );
    }

    #[test]
    fn fake_clock_counts_yields() {
        let clock = FakeClock::default();
        clock.yield_now();
        clock.yield_now();
        assert_eq!(clock.yield_count(), 2);
    }
}
