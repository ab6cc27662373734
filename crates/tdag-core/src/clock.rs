//! Injected sources of time and identity.
//!
//! The core never reads the system clock or a random source directly; every
//! operation receives them through [`OpsContext`](crate::ops::OpsContext) so
//! tests can pin both.

use std::cell::Cell;

use chrono::Utc;

use crate::model::{TaskId, Timestamp};

/// Source of the current instant.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_datetime(Utc::now())
    }
}

/// A clock pinned to one instant, optionally advancing by a fixed step on
/// every read.
#[derive(Debug, Clone)]
pub struct FixedClock {
    current: Cell<Timestamp>,
    step_secs: i64,
}

impl FixedClock {
    #[must_use]
    pub const fn new(at: Timestamp) -> Self {
        Self {
            current: Cell::new(at),
            step_secs: 0,
        }
    }

    /// Advance by `step_secs` after each call to [`Clock::now`].
    #[must_use]
    pub const fn ticking(at: Timestamp, step_secs: i64) -> Self {
        Self {
            current: Cell::new(at),
            step_secs,
        }
    }

    pub fn set(&self, at: Timestamp) {
        self.current.set(at);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        let now = self.current.get();
        if self.step_secs != 0 {
            let next = Timestamp::from_unix_seconds(now.unix_seconds() + self.step_secs)
                .unwrap_or(now);
            self.current.set(next);
        }
        now
    }
}

/// Source of fresh task identifiers.
///
/// `attempt` counts collisions for the current insertion, starting at zero,
/// so deterministic generators can still produce a different id on retry.
pub trait IdGenerator {
    fn next_id(&self, now: Timestamp, attempt: u32) -> TaskId;
}

/// `<32 hex>_<YYYYmmddHHMMSS>_<actor>` identifiers backed by a random
/// 128-bit value.
#[derive(Debug, Clone)]
pub struct RandomIdGenerator {
    actor: String,
}

impl RandomIdGenerator {
    /// `actor` is sanitized so the generated id is always a valid [`TaskId`].
    #[must_use]
    pub fn new(actor: &str) -> Self {
        let actor = sanitize(actor);
        let actor = if actor.is_empty() {
            "anonymous".to_string()
        } else {
            actor
        };
        Self { actor }
    }

    #[must_use]
    pub fn actor(&self) -> &str {
        &self.actor
    }
}

impl IdGenerator for RandomIdGenerator {
    fn next_id(&self, now: Timestamp, _attempt: u32) -> TaskId {
        let nonce: u128 = rand::random();
        let raw = format!(
            "{nonce:032x}_{}_{}",
            now.as_datetime().format("%Y%m%d%H%M%S"),
            self.actor
        );
        TaskId::from_trusted(raw)
    }
}

fn sanitize(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '.' { c } else { '-' })
        .collect()
}

/// Deterministic `<prefix>-<n>` identifiers for tests and fixtures.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: Cell<u64>,
}

impl SequentialIdGenerator {
    #[must_use]
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: sanitize(prefix),
            next: Cell::new(1),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self, _now: Timestamp, _attempt: u32) -> TaskId {
        let n = self.next.get();
        self.next.set(n + 1);
        TaskId::from_trusted(format!("{}-{n}", self.prefix))
    }
}
