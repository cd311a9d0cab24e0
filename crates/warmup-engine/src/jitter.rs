//! Randomized delays.
//!
//! Every randomized wait in the engine is drawn from a `JitterWindow`, so the
//! timing policy lives in configuration rather than in action code.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A closed range `[min, max]` to draw delays from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JitterWindow {
    pub min: Duration,
    pub max: Duration,
}

impl JitterWindow {
    /// Window between `min` and `max`. Swapped bounds are reordered.
    pub fn new(min: Duration, max: Duration) -> Self {
        if min > max {
            Self { min: max, max: min }
        } else {
            Self { min, max }
        }
    }

    pub const fn from_secs(min: u64, max: u64) -> Self {
        let (min, max) = if min > max { (max, min) } else { (min, max) };
        Self {
            min: Duration::from_secs(min),
            max: Duration::from_secs(max),
        }
    }

    pub const fn from_mins(min: u64, max: u64) -> Self {
        Self::from_secs(min * 60, max * 60)
    }

    /// A window that always yields zero.
    pub const fn none() -> Self {
        Self::from_secs(0, 0)
    }

    /// Draw a delay using `rng`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        if min == max {
            return self.min;
        }
        Duration::from_millis(rng.gen_range(min..=max))
    }

    /// Draw a delay from the thread-local generator.
    pub fn draw(&self) -> Duration {
        self.sample(&mut rand::thread_rng())
    }

    /// Draw a delay and convert it for timestamp arithmetic.
    pub fn draw_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.draw()).unwrap_or(chrono::Duration::zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_zero_window() {
        assert_eq!(JitterWindow::none().draw(), Duration::ZERO);
    }

    #[test]
    fn test_swapped_bounds() {
        let window = JitterWindow::from_secs(30, 10);
        assert_eq!(window.min, Duration::from_secs(10));
        assert_eq!(window.max, Duration::from_secs(30));
    }

    #[test]
    fn test_draws_vary() {
        let window = JitterWindow::from_mins(30, 120);
        let mut rng = StdRng::seed_from_u64(7);
        let draws: Vec<_> = (0..20).map(|_| window.sample(&mut rng)).collect();
        assert!(draws.iter().any(|d| *d != draws[0]));
    }

    proptest! {
        #[test]
        fn sample_stays_in_window(min in 0u64..10_000, span in 0u64..10_000, seed in any::<u64>()) {
            let window = JitterWindow::from_secs(min, min + span);
            let mut rng = StdRng::seed_from_u64(seed);
            let delay = window.sample(&mut rng);
            prop_assert!(delay >= window.min);
            prop_assert!(delay <= window.max);
        }
    }
}
