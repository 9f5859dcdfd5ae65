//! Time management utilities

use std::time::{Duration, Instant};

/// Frame timer for the simulation loop
pub struct Timer {
    last_frame: Instant,
    delta_time: Duration,
    total_time: Duration,
    frame_count: u64,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    /// Create a new timer
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            delta_time: Duration::ZERO,
            total_time: Duration::ZERO,
            frame_count: 0,
        }
    }

    /// Update the timer (should be called once per frame)
    pub fn update(&mut self) {
        let now = Instant::now();
        self.delta_time = now.duration_since(self.last_frame);
        self.total_time += self.delta_time;
        self.last_frame = now;
        self.frame_count += 1;
    }

    /// Get the time since the last frame
    pub fn delta_time(&self) -> Duration {
        self.delta_time
    }

    /// Time since the last frame in whole milliseconds, saturating
    pub fn delta_millis(&self) -> u32 {
        u32::try_from(self.delta_time.as_millis()).unwrap_or(u32::MAX)
    }

    /// Get the total elapsed time since timer creation
    pub fn total_time(&self) -> Duration {
        self.total_time
    }

    /// Get the current frame count
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_counting() {
        let mut timer = Timer::new();
        assert_eq!(timer.frame_count(), 0);

        timer.update();
        timer.update();
        assert_eq!(timer.frame_count(), 2);
        assert!(timer.total_time() >= timer.delta_time());
    }
}
