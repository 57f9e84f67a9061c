//! Bounded polling for eventually consistent reads.
//!
//! A probe is evaluated immediately and then again after each fixed wait,
//! until it yields the wanted value or the attempt budget runs out. The wait
//! goes through a [`Sleeper`] so tests can run without real delays.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_ATTEMPTS: u32 = 50;
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(200);

/// How often and how long to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Total number of probes, including the first.
    pub attempts: u32,
    /// Wait before every probe but the first.
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            interval: DEFAULT_INTERVAL,
        }
    }
}

/// The wait was cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted;

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sleep interrupted")
    }
}

impl std::error::Error for Interrupted {}

/// Blocking wait between poll attempts.
pub trait Sleeper: Send {
    fn sleep(&self, duration: Duration) -> std::result::Result<(), Interrupted>;
}

/// Sleeps on the current thread; can be woken early through an
/// [`Interrupter`].
#[derive(Debug, Default)]
pub struct ThreadSleeper {
    state: Arc<(Mutex<bool>, Condvar)>,
}

/// Handle that interrupts a [`ThreadSleeper`] from another thread.
#[derive(Debug, Clone)]
pub struct Interrupter {
    state: Arc<(Mutex<bool>, Condvar)>,
}

impl ThreadSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupter(&self) -> Interrupter {
        Interrupter {
            state: Arc::clone(&self.state),
        }
    }
}

impl Interrupter {
    /// Wake the sleeper. If it is not currently sleeping, its next sleep
    /// fails immediately.
    pub fn interrupt(&self) {
        let (flag, wake) = &*self.state;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        wake.notify_all();
    }
}

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) -> std::result::Result<(), Interrupted> {
        let (flag, wake) = &*self.state;
        let guard = flag.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut interrupted, _) = wake
            .wait_timeout_while(guard, duration, |interrupted| !*interrupted)
            .unwrap_or_else(PoisonError::into_inner);
        if *interrupted {
            // Consumed; the next sleep waits normally.
            *interrupted = false;
            return Err(Interrupted);
        }
        Ok(())
    }
}

/// How a poll ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The probe yielded a wanted value.
    Converged { value: T, attempts: u32 },
    /// The budget ran out; `last` is the final observation.
    Exhausted { last: T, attempts: u32 },
}

impl<T> PollOutcome<T> {
    pub fn is_converged(&self) -> bool {
        matches!(self, PollOutcome::Converged { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            PollOutcome::Converged { attempts, .. } | PollOutcome::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Probe until `done` accepts the observation or the budget runs out.
///
/// Probe errors are returned as is. An interrupted wait becomes
/// [`Error::Interrupted`] naming `awaiting`.
pub fn poll_until<T, P, D>(
    policy: &PollPolicy,
    sleeper: &dyn Sleeper,
    awaiting: &str,
    mut probe: P,
    done: D,
) -> Result<PollOutcome<T>>
where
    P: FnMut() -> Result<T>,
    D: Fn(&T) -> bool,
    T: fmt::Debug,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        let value = probe()?;
        log::debug!("Awaiting {awaiting}: attempt {attempt}/{attempts} observed {value:?}");
        if done(&value) {
            return Ok(PollOutcome::Converged {
                value,
                attempts: attempt,
            });
        }
        if attempt == attempts {
            return Ok(PollOutcome::Exhausted {
                last: value,
                attempts: attempt,
            });
        }
        sleeper
            .sleep(policy.interval)
            .map_err(|Interrupted| Error::Interrupted {
                awaiting: awaiting.to_string(),
            })?;
        attempt += 1;
    }
}
