//! Admission gate and completion tracker for concurrent extraction work.
//!
//! A [`Limiter`] is created per top-level input and handed (as an
//! `Arc<Limiter>`) to every task spawned on behalf of that input, including
//! nested ones. Its two counters are private; they move only through the
//! guards returned by [`Limiter::acquire`] and [`Limiter::track_start`], so
//! every increment is paired with exactly one decrement, on error paths too.

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use parking_lot::Condvar;
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct LimiterState {
    in_flight: usize,
    outstanding: usize,
    peak: usize,
}

/// Counting admission gate plus outstanding-task tracker.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use unspool_core::Limiter;
///
/// let limiter = Arc::new(Limiter::new(2));
/// let admission = limiter.acquire();
/// let ticket = limiter.track_start();
///
/// let worker = {
///     let limiter = Arc::clone(&limiter);
///     std::thread::spawn(move || {
///         let _admission = admission;
///         let _ticket = ticket;
///         assert!(limiter.in_flight() <= 2);
///     })
/// };
///
/// limiter.wait();
/// worker.join().unwrap();
/// assert_eq!(limiter.outstanding(), 0);
/// ```
#[derive(Debug)]
pub struct Limiter {
    capacity: usize,
    state: Mutex<LimiterState>,
    admission_freed: Condvar,
    all_done: Condvar,
}

impl Limiter {
    /// Creates a limiter admitting at most `capacity` tasks at once.
    /// A capacity of zero is treated as one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(LimiterState::default()),
            admission_freed: Condvar::new(),
            all_done: Condvar::new(),
        }
    }

    /// Returns the admission capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Blocks until a slot is free, then takes it.
    ///
    /// The slot is released when the returned [`Admission`] is dropped. A
    /// thread that already holds an admission must not call this; use
    /// [`Limiter::try_acquire`] instead.
    pub fn acquire(self: &Arc<Self>) -> Admission {
        let mut state = self.state.lock();
        while state.in_flight >= self.capacity {
            self.admission_freed.wait(&mut state);
        }
        Self::admit(&mut state);
        Admission {
            limiter: Arc::clone(self),
        }
    }

    /// Takes a slot if one is free, without blocking.
    pub fn try_acquire(self: &Arc<Self>) -> Option<Admission> {
        let mut state = self.state.lock();
        if state.in_flight >= self.capacity {
            return None;
        }
        Self::admit(&mut state);
        Some(Admission {
            limiter: Arc::clone(self),
        })
    }

    fn admit(state: &mut LimiterState) {
        state.in_flight += 1;
        state.peak = state.peak.max(state.in_flight);
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        drop(state);
        self.admission_freed.notify_one();
    }

    /// Registers one more outstanding task. [`Limiter::wait`] does not
    /// return until the returned [`TaskTicket`] is dropped.
    pub fn track_start(self: &Arc<Self>) -> TaskTicket {
        self.state.lock().outstanding += 1;
        TaskTicket {
            limiter: Arc::clone(self),
        }
    }

    fn track_done(&self) {
        let mut state = self.state.lock();
        state.outstanding = state.outstanding.saturating_sub(1);
        if state.outstanding == 0 {
            self.all_done.notify_all();
        }
    }

    /// Blocks until every tracked task has finished.
    pub fn wait(&self) {
        let mut state = self.state.lock();
        while state.outstanding > 0 {
            self.all_done.wait(&mut state);
        }
    }

    /// Like [`Limiter::wait`] but gives up after `timeout`. Returns `true`
    /// if all tracked tasks finished in time.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.outstanding > 0 {
            if self.all_done.wait_until(&mut state, deadline).timed_out() {
                return state.outstanding == 0;
            }
        }
        true
    }

    /// Number of currently admitted tasks.
    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }

    /// Number of tracked tasks that have not finished.
    pub fn outstanding(&self) -> usize {
        self.state.lock().outstanding
    }

    /// Highest admission count observed since construction.
    pub fn peak_in_flight(&self) -> usize {
        self.state.lock().peak
    }
}

/// A held admission slot. Dropping it releases the slot.
#[derive(Debug)]
#[must_use = "dropping an admission releases it immediately"]
pub struct Admission {
    limiter: Arc<Limiter>,
}

impl Admission {
    /// Releases the slot explicitly.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        self.limiter.release();
    }
}

/// An outstanding task registration. Dropping it marks the task done.
#[derive(Debug)]
#[must_use = "dropping a ticket marks the task done immediately"]
pub struct TaskTicket {
    limiter: Arc<Limiter>,
}

impl TaskTicket {
    /// Marks the task done explicitly.
    pub fn done(self) {
        drop(self);
    }
}

impl Drop for TaskTicket {
    fn drop(&mut self) {
        self.limiter.track_done();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::thread;

    #[test]
    fn test_zero_capacity_is_one() {
        let limiter = Limiter::new(0);
        assert_eq!(limiter.capacity(), 1);
    }

    #[test]
    fn test_try_acquire_respects_capacity() {
        let limiter = Arc::new(Limiter::new(2));
        let a = limiter.try_acquire().unwrap();
        let b = limiter.try_acquire().unwrap();
        assert!(limiter.try_acquire().is_none());
        assert_eq!(limiter.in_flight(), 2);

        a.release();
        let c = limiter.try_acquire();
        assert!(c.is_some());
        drop(b);
        drop(c);
        assert_eq!(limiter.in_flight(), 0);
    }

    #[test]
    fn test_wait_without_tasks_returns() {
        let limiter = Limiter::new(3);
        limiter.wait();
        assert!(limiter.wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn test_wait_timeout_with_pending_ticket() {
        let limiter = Arc::new(Limiter::new(1));
        let ticket = limiter.track_start();
        assert!(!limiter.wait_timeout(Duration::from_millis(20)));
        ticket.done();
        assert!(limiter.wait_timeout(Duration::from_millis(20)));
    }

    #[test]
    fn test_admission_never_exceeds_capacity() {
        const CAPACITY: usize = 3;
        const TASKS: usize = 24;

        let limiter = Arc::new(Limiter::new(CAPACITY));
        let concurrent = Arc::new(AtomicUsize::new(0));
        let observed_max = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();

        for _ in 0..TASKS {
            let admission = limiter.acquire();
            let ticket = limiter.track_start();
            let concurrent = Arc::clone(&concurrent);
            let observed_max = Arc::clone(&observed_max);
            handles.push(thread::spawn(move || {
                let _admission = admission;
                let _ticket = ticket;
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                observed_max.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
                concurrent.fetch_sub(1, Ordering::SeqCst);
            }));
        }

        limiter.wait();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(observed_max.load(Ordering::SeqCst) <= CAPACITY);
        assert!(limiter.peak_in_flight() <= CAPACITY);
        assert_eq!(limiter.outstanding(), 0);
        assert_eq!(limiter.in_flight(), 0);
    }

    #[test]
    fn test_wait_blocks_for_nested_tickets() {
        let limiter = Arc::new(Limiter::new(2));
        let finished = Arc::new(AtomicUsize::new(0));

        let outer_ticket = limiter.track_start();
        let outer = {
            let limiter = Arc::clone(&limiter);
            let finished = Arc::clone(&finished);
            thread::spawn(move || {
                let _ticket = outer_ticket;
                let inner_ticket = limiter.track_start();
                let inner_finished = Arc::clone(&finished);
                thread::spawn(move || {
                    let _ticket = inner_ticket;
                    thread::sleep(Duration::from_millis(20));
                    inner_finished.fetch_add(1, Ordering::SeqCst);
                });
                finished.fetch_add(1, Ordering::SeqCst);
            })
        };

        limiter.wait();
        assert_eq!(finished.load(Ordering::SeqCst), 2);
        outer.join().unwrap();
    }
}
