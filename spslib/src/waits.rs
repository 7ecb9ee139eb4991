//! Blocking waits for procedures
//!
//! `wait_for` measures its budget against a deadline taken when the call
//! starts, so slow predicates do not stretch it, and checks a cancel token
//! on every poll.

use log::{debug, info};
use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use spslibgs::{SpecificTime, SpsError, SpsResult};

use crate::config::constants;

/// Shared flag that stops any wait polling it
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Budget and poll period for `wait_for`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub poll_period: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: constants::WAIT_FOR_TIMEOUT,
            poll_period: constants::POLL_PERIOD,
        }
    }
}

fn seconds(value: f64, what: &str) -> SpsResult<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| SpsError::InvalidTime(format!("{} of {} seconds is not a valid duration", what, value)))
}

/// Deadline `duration` from now. `None` when the clock cannot represent
/// it, which callers treat as no deadline.
fn deadline_after(duration: Duration) -> Option<Instant> {
    let deadline = Instant::now().checked_add(duration);
    if deadline.is_none() {
        debug!("{:?} is past the end of the clock, waiting without a deadline", duration);
    }
    deadline
}

/// Time left before `deadline`, or `None` once it has passed
fn remaining(deadline: Option<Instant>, step: Duration) -> Option<Duration> {
    match deadline {
        Some(deadline) => {
            let now = Instant::now();
            (now < deadline).then(|| step.min(deadline - now))
        }
        None => Some(step),
    }
}

/// Sleep until `deadline` in steps of at most `step`, giving up early if
/// `cancel` trips
fn sleep_until(deadline: Option<Instant>, step: Duration, cancel: &CancelToken) -> SpsResult<()> {
    loop {
        if cancel.is_cancelled() {
            return Err(SpsError::Cancelled("Wait cancelled".to_string()));
        }
        match remaining(deadline, step) {
            Some(pause) => thread::sleep(pause),
            None => return Ok(()),
        }
    }
}

/// Block for `seconds`
pub fn wait(seconds_to_wait: f64) -> SpsResult<()> {
    thread::sleep(seconds(seconds_to_wait, "Wait")?);
    Ok(())
}

/// Block for `duration`, polling `cancel` every `step`
pub fn wait_cancellable(duration: Duration, step: Duration, cancel: &CancelToken) -> SpsResult<()> {
    sleep_until(deadline_after(duration), step.max(Duration::from_millis(1)), cancel)
}

/// Poll `predicate` until it is true. `timeout` and `poll_period` are in
/// seconds and default to 5 and 0.1.
#[track_caller]
pub fn wait_for<F>(predicate: F, timeout: Option<f64>, poll_period: Option<f64>) -> SpsResult<()>
where
    F: FnMut() -> bool,
{
    let mut options = WaitOptions::default();
    if let Some(timeout) = timeout {
        options.timeout = seconds(timeout, "Timeout")?;
    }
    if let Some(poll_period) = poll_period {
        options.poll_period = seconds(poll_period, "Poll period")?;
    }
    wait_for_with(predicate, &options, &CancelToken::default())
}

/// Poll `predicate` until it is true, the budget in `options` runs out, or
/// `cancel` trips. Timeouts name the caller's line.
#[track_caller]
pub fn wait_for_with<F>(mut predicate: F, options: &WaitOptions, cancel: &CancelToken) -> SpsResult<()>
where
    F: FnMut() -> bool,
{
    let line = Location::caller().line();
    let deadline = deadline_after(options.timeout);
    let step = options.poll_period.max(Duration::from_millis(1));

    loop {
        if cancel.is_cancelled() {
            return Err(SpsError::Cancelled(format!("Wait at line {} cancelled", line)));
        }
        if predicate() {
            debug!("Wait at line {} satisfied", line);
            return Ok(());
        }
        match remaining(deadline, step) {
            Some(pause) => thread::sleep(pause),
            None => {
                info!("Wait at line {} timed out", line);
                return Err(SpsError::Timeout(format!("Wait at line {} timed out", line)));
            }
        }
    }
}

/// Block until `instant`. Instants in the past return at once.
pub fn wait_until(instant: SpecificTime) -> SpsResult<()> {
    wait_until_cancellable(instant, constants::POLL_PERIOD, &CancelToken::default())
}

pub fn wait_until_cancellable(instant: SpecificTime, step: Duration, cancel: &CancelToken) -> SpsResult<()> {
    let remaining = instant - SpecificTime::now();
    match remaining.to_std() {
        Some(duration) if !duration.is_zero() => wait_cancellable(duration, step, cancel),
        _ => Ok(()),
    }
}
