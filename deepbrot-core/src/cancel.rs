//! Cooperative cancellation: a shared generation counter, tokens that
//! remember the generation they were issued for, and a rate-limited probe
//! for hot loops.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Default number of pixel iterations between two token checks.
pub const DEFAULT_STOP_CHECK_INTERVAL: u32 = 200;

/// Shared cancellation token for a sequence of jobs.
///
/// Incrementing the generation signals all in-flight tiles of older jobs to
/// stop early. The progress counters let a front-end display a progress
/// bar.
#[derive(Debug)]
pub struct RenderCancel {
    generation: Arc<AtomicU64>,
    progress_done: AtomicUsize,
    progress_total: AtomicUsize,
}

impl RenderCancel {
    pub fn new() -> Self {
        Self {
            generation: Arc::new(AtomicU64::new(0)),
            progress_done: AtomicUsize::new(0),
            progress_total: AtomicUsize::new(0),
        }
    }

    /// Invalidate every token issued so far. Returns the new generation.
    pub fn cancel(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Read the current generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// A token that stays live until the next [`cancel`](Self::cancel).
    pub fn token(&self) -> JobToken {
        JobToken {
            generation: Some(Arc::clone(&self.generation)),
            expected: self.generation(),
        }
    }

    /// Reset progress for a new phase with `total` work units.
    pub fn reset_progress(&self, total: usize) {
        self.progress_total.store(total, Ordering::Relaxed);
        self.progress_done.store(0, Ordering::Relaxed);
    }

    /// Increment completed work units by one.
    pub fn inc_progress(&self) {
        self.progress_done.fetch_add(1, Ordering::Relaxed);
    }

    /// Read the current progress as `(done, total)`.
    pub fn progress(&self) -> (usize, usize) {
        (
            self.progress_done.load(Ordering::Relaxed),
            self.progress_total.load(Ordering::Relaxed),
        )
    }
}

impl Default for RenderCancel {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifies the job generation a task belongs to.
///
/// The default token is detached from any [`RenderCancel`] and is always
/// live.
#[derive(Debug, Clone, Default)]
pub struct JobToken {
    generation: Option<Arc<AtomicU64>>,
    expected: u64,
}

impl JobToken {
    pub fn detached() -> Self {
        Self::default()
    }

    /// Whether the job this token was issued for is still current.
    #[inline]
    pub fn is_live(&self) -> bool {
        match &self.generation {
            Some(generation) => generation.load(Ordering::Relaxed) == self.expected,
            None => true,
        }
    }

    /// The generation this token was issued for.
    pub fn generation(&self) -> u64 {
        self.expected
    }
}

/// Rate-limited cancellation probe for the inner loops.
///
/// Once the token is observed dead the probe stays stopped.
#[derive(Debug, Clone)]
pub struct StopCheck {
    token: JobToken,
    interval: u32,
    countdown: u32,
    stopped: bool,
}

impl StopCheck {
    pub fn new(token: JobToken, interval: u32) -> Self {
        let interval = interval.max(1);
        Self {
            token,
            interval,
            countdown: interval,
            stopped: false,
        }
    }

    /// A probe that never fires.
    pub fn never() -> Self {
        Self::new(JobToken::detached(), u32::MAX)
    }

    /// Account for `work` iterations and consult the token when the
    /// interval has elapsed. Returns `true` once the job is cancelled.
    #[inline]
    pub fn tick(&mut self, work: u32) -> bool {
        if self.stopped {
            return true;
        }
        self.countdown = self.countdown.saturating_sub(work);
        if self.countdown == 0 {
            self.countdown = self.interval;
            self.stopped = !self.token.is_live();
        }
        self.stopped
    }

    /// Consult the token immediately (once per scan-line).
    pub fn check_now(&mut self) -> bool {
        if !self.stopped {
            self.countdown = self.interval;
            self.stopped = !self.token.is_live();
        }
        self.stopped
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}
