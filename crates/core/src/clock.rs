use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use crate::timestamp::Timestamp;

/// Source of "now" for stamping edits.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_datetime(Utc::now())
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone)]
pub struct FixedClock(Timestamp);

impl FixedClock {
    pub fn new(at: Timestamp) -> Self {
        Self(at)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0.clone()
    }
}

/// A clock that only moves when told to, optionally advancing by `step`
/// after every reading.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
    step: Duration,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self::stepping(start, Duration::zero())
    }

    pub fn stepping(start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            current: Mutex::new(start),
            step,
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.lock() = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut current = self.lock();
        *current += by;
    }

    pub fn peek(&self) -> Timestamp {
        Timestamp::from_datetime(*self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        let mut current = self.lock();
        let reading = Timestamp::from_datetime(*current);
        *current += self.step;
        reading
    }
}

/// Identity and clock for one editing session, passed into every operation
/// that stamps `last_modified`/`modified_by`.
#[derive(Clone)]
pub struct EditContext {
    user: String,
    clock: Arc<dyn Clock>,
}

impl EditContext {
    pub fn new(user: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            user: user.into(),
            clock,
        }
    }

    pub fn system(user: impl Into<String>) -> Self {
        Self::new(user, Arc::new(SystemClock))
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }
}

impl std::fmt::Debug for EditContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditContext").field("user", &self.user).finish_non_exhaustive()
    }
}
