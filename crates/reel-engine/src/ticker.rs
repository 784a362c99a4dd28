//! Fixed-rate pacing against the monotonic clock.

use std::thread;
use std::time::{Duration, Instant};

use reel_ipc::MIN_FPS;

/// Paces a loop to fixed boundaries `epoch + n * period`.
///
/// Deadlines are derived from the epoch rather than from the previous wake
/// up, so sleep jitter does not accumulate. A loop that overruns skips the
/// missed boundaries instead of bursting to catch up.
pub struct Ticker {
    epoch: Instant,
    period: Duration,
    tick: u64,
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        Self::starting_at(Instant::now(), period)
    }

    /// One tick per frame at `fps`, floored at [`MIN_FPS`].
    pub fn from_fps(fps: f64) -> Self {
        Self::new(Duration::from_secs_f64(1.0 / fps.max(MIN_FPS)))
    }

    pub fn starting_at(epoch: Instant, period: Duration) -> Self {
        Self {
            epoch,
            period: period.max(Duration::from_micros(1)),
            tick: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Advance to the next boundary and return it, or `None` when `now` is
    /// already past it. A late tick realigns to the boundary before `now`.
    pub fn schedule(&mut self, now: Instant) -> Option<Instant> {
        self.tick += 1;
        let deadline = self.boundary(self.tick);
        if deadline > now {
            return Some(deadline);
        }

        let elapsed = now.saturating_duration_since(self.epoch);
        self.tick = (elapsed.as_nanos() / self.period.as_nanos()) as u64;
        None
    }

    /// Sleep until the next boundary.
    pub fn wait(&mut self) {
        let now = Instant::now();
        if let Some(deadline) = self.schedule(now) {
            thread::sleep(deadline - now);
        }
    }

    fn boundary(&self, tick: u64) -> Instant {
        let nanos = self.period.as_nanos() * u128::from(tick);
        self.epoch + Duration::from_nanos(nanos.min(u128::from(u64::MAX)) as u64)
    }
}
