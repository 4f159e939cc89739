use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// The adapter's single time source. Connection ticks use milliseconds since creation, which
/// never go backward. ISN generation uses wall-clock milliseconds, derived from a Unix time
/// sampled once at creation and advanced by the same monotonic clock.
pub struct Epoch {
    time_base: Instant,
    wall_base_ms: u64,
}

impl Epoch {
    pub fn new() -> Self {
        // A clock set before 1970 only weakens ISN spacing, so fall back to zero
        let wall_base_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self::with_wall_base_ms(wall_base_ms)
    }

    pub fn with_wall_base_ms(wall_base_ms: u64) -> Self {
        Self {
            time_base: Instant::now(),
            wall_base_ms,
        }
    }

    /// Milliseconds elapsed since creation.
    pub fn time_now_ms(&self) -> u64 {
        self.time_base.elapsed().as_millis() as u64
    }

    /// Milliseconds since the Unix epoch, as sampled at creation plus the time elapsed since.
    pub fn wall_clock_ms(&self) -> u64 {
        self.wall_base_ms.wrapping_add(self.time_now_ms())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_clock_tracks_monotonic_clock() {
        let epoch = Epoch::with_wall_base_ms(5_000);

        let wall_ms = epoch.wall_clock_ms();
        let now_ms = epoch.time_now_ms();

        assert!(wall_ms >= 5_000);
        assert!(wall_ms - 5_000 <= now_ms);

        std::thread::sleep(std::time::Duration::from_millis(20));

        assert!(epoch.time_now_ms() >= 20);
        assert!(epoch.wall_clock_ms() >= wall_ms + 20);
    }

    #[test]
    fn new_starts_near_system_time() {
        let before_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64;

        let epoch = Epoch::new();

        assert!(epoch.wall_clock_ms() >= before_ms);
    }
}
