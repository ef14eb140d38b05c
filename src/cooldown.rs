//! Per-clip cooldown timers.
//!
//! A clip that triggered may not trigger again until its cooldown expires.
//! Each pending expiry is an explicit [`CooldownHandle`] keyed by clip id, so
//! story changes and cleanup cancel them deterministically instead of leaving
//! detached timers behind.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime};

/// Time source for cooldowns and event timestamps.
pub trait Clock {
    /// Monotonic time, used for cooldown deadlines.
    fn now(&self) -> Instant;

    /// Wall-clock time stamped on trigger events.
    fn wall_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug)]
struct ManualTime {
    now: Instant,
    wall: SystemTime,
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    time: Arc<Mutex<ManualTime>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(SystemTime::now())
    }

    /// Starts the wall clock at `wall`.
    pub fn starting_at(wall: SystemTime) -> Self {
        Self {
            time: Arc::new(Mutex::new(ManualTime {
                now: Instant::now(),
                wall,
            })),
        }
    }

    fn time(&self) -> MutexGuard<'_, ManualTime> {
        self.time.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves both the monotonic and the wall clock forward.
    pub fn advance(&self, by: Duration) {
        let mut time = self.time();
        time.now += by;
        time.wall += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.time().now
    }

    fn wall_time(&self) -> SystemTime {
        self.time().wall
    }
}

/// A scheduled cooldown expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownHandle {
    pub started_at: Instant,
    pub expires_at: Instant,
}

impl CooldownHandle {
    pub fn remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}

#[derive(Debug)]
pub struct CooldownTimers {
    duration: Duration,
    pending: HashMap<String, CooldownHandle>,
}

impl CooldownTimers {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            pending: HashMap::new(),
        }
    }

    /// Starts (or restarts) the cooldown for `clip_id`.
    pub fn schedule(&mut self, clip_id: &str, now: Instant) -> CooldownHandle {
        let handle = CooldownHandle {
            started_at: now,
            expires_at: now + self.duration,
        };
        self.pending.insert(clip_id.to_string(), handle);
        handle
    }

    /// Whether `clip_id` is still cooling down at `now`. Expired entries that
    /// have not been collected by [`CooldownTimers::expire`] yet do not count.
    pub fn is_cooling(&self, clip_id: &str, now: Instant) -> bool {
        self.pending
            .get(clip_id)
            .is_some_and(|handle| now < handle.expires_at)
    }

    pub fn get(&self, clip_id: &str) -> Option<&CooldownHandle> {
        self.pending.get(clip_id)
    }

    pub fn cancel(&mut self, clip_id: &str) -> Option<CooldownHandle> {
        self.pending.remove(clip_id)
    }

    /// Cancels every pending expiry. Returns how many were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    /// Removes and returns the ids whose cooldown has run out, oldest first.
    pub fn expire(&mut self, now: Instant) -> Vec<String> {
        let mut expired: Vec<(String, Instant)> = self
            .pending
            .iter()
            .filter(|(_, handle)| now >= handle.expires_at)
            .map(|(id, handle)| (id.clone(), handle.expires_at))
            .collect();
        expired.sort_by_key(|(_, expires_at)| *expires_at);

        for (id, _) in &expired {
            self.pending.remove(id);
        }
        expired.into_iter().map(|(id, _)| id).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
