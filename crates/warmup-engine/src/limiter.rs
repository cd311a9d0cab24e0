//! Sliding-window rate limiter shared by all workers.
//!
//! A slot is taken when a job is dispatched and held until one full window
//! after the job finishes. So however long jobs run, no more than `limit`
//! of them can finish inside any window.

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
enum Slot {
    InFlight(u64),
    Done(Instant),
}

#[derive(Default)]
struct Slots {
    next_id: u64,
    taken: Vec<Slot>,
}

/// Admits at most `limit` jobs per `window`, across all workers.
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    slots: Mutex<Slots>,
    released: Notify,
}

/// A dispatch slot. The window starts counting down when it is dropped.
pub struct RatePermit<'a> {
    limiter: &'a RateLimiter,
    id: u64,
}

impl Drop for RatePermit<'_> {
    fn drop(&mut self) {
        self.limiter.release(self.id);
    }
}

impl RateLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            slots: Mutex::new(Slots::default()),
            released: Notify::new(),
        }
    }

    /// Wait until a slot is free, then take it.
    pub async fn acquire(&self) -> RatePermit<'_> {
        loop {
            let notified = self.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let wait = match self.try_take() {
                Ok(permit) => return permit,
                Err(wait) => wait,
            };

            match wait {
                Some(wait) => {
                    debug!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting");
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
                None => {
                    debug!("rate limit reached, waiting for a job to finish");
                    notified.await;
                }
            }
        }
    }

    /// Take a slot if one is free right now.
    pub fn try_acquire(&self) -> Option<RatePermit<'_>> {
        self.try_take().ok()
    }

    /// Jobs dispatched and not yet aged out of the window.
    pub fn in_use(&self) -> usize {
        let mut slots = self.lock();
        self.prune(&mut slots, Instant::now());
        slots.taken.len()
    }

    /// Take a slot, or say how long until one might free up.
    ///
    /// `Err(None)` means every slot belongs to a job still running.
    fn try_take(&self) -> Result<RatePermit<'_>, Option<Duration>> {
        let now = Instant::now();
        let mut slots = self.lock();
        self.prune(&mut slots, now);

        if slots.taken.len() < self.limit {
            let id = slots.next_id;
            slots.next_id += 1;
            slots.taken.push(Slot::InFlight(id));
            return Ok(RatePermit { limiter: self, id });
        }

        Err(slots
            .taken
            .iter()
            .filter_map(|s| match s {
                Slot::Done(at) => Some(self.window.saturating_sub(now.duration_since(*at))),
                Slot::InFlight(_) => None,
            })
            .min())
    }

    fn prune(&self, slots: &mut Slots, now: Instant) {
        slots.taken.retain(|s| match s {
            Slot::Done(at) => now.duration_since(*at) < self.window,
            Slot::InFlight(_) => true,
        });
    }

    fn release(&self, id: u64) {
        {
            let mut slots = self.lock();
            let now = Instant::now();
            for slot in slots.taken.iter_mut() {
                if matches!(slot, Slot::InFlight(i) if *i == id) {
                    *slot = Slot::Done(now);
                }
            }
        }
        self.released.notify_waiters();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slots> {
        // Slots stay consistent even if a holder panicked.
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}
