//! Cooperative periodic task table.
//!
//! Each context (core) runs its own table in a tight loop. A task that is due
//! runs once and is rescheduled one period after *now*, so a context that
//! stalls never sees a burst of catch-up runs.

/// Source of the monotonic microsecond clock for a task context.
pub trait Clock {
    fn now_us(&self) -> u64;
}

/// Period that makes a task run on every pass.
pub const EVERY_PASS: u64 = 0;

/// Period in microseconds for a task running `n` times per second.
#[must_use]
pub const fn hz(n: u64) -> u64 {
    if n == 0 {
        return u64::MAX;
    }
    1_000_000 / n
}

/// A periodic callback over context `C`.
pub struct Task<C> {
    pub exec: fn(&mut C),
    /// Period in microseconds.
    pub period: u64,
    /// Earliest time of the next run.
    pub next_run: u64,
}

impl<C> Task<C> {
    #[must_use]
    pub const fn new(exec: fn(&mut C), period: u64) -> Self {
        Self {
            exec,
            period,
            next_run: 0,
        }
    }

    /// Run the task if it is due at `now`. Returns whether it ran.
    pub fn poll(&mut self, ctx: &mut C, now: u64) -> bool {
        if now < self.next_run {
            return false;
        }
        self.next_run = now.saturating_add(self.period);
        (self.exec)(ctx);
        true
    }
}

/// Give every task in `tasks`, in order, a chance to run.
///
/// The clock is read again before each task.
pub fn run_tasks<C: Clock>(ctx: &mut C, tasks: &mut [Task<C>]) {
    for task in tasks.iter_mut() {
        let now = ctx.now_us();
        task.poll(ctx, now);
    }
}
