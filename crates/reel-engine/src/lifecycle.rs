//! Start/stop coordination for a group of worker threads.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

struct Inner {
    running: AtomicBool,
    live: Mutex<usize>,
    quiesced: Condvar,
}

/// Handle given to each worker to observe (and request) a group stop.
#[derive(Clone)]
pub struct StopSignal {
    inner: Arc<Inner>,
}

impl StopSignal {
    /// Returns true until a stop has been signalled.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Ask every worker of the group to exit.
    pub fn signal_stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
    }
}

/// Decrements the live worker count when a worker exits, even by panic.
struct LiveGuard(Arc<Inner>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        let mut live = self.0.live.lock();
        *live = live.saturating_sub(1);
        if *live == 0 {
            self.0.quiesced.notify_all();
        }
    }
}

/// A group of worker threads sharing one running flag.
///
/// `start` raises the flag, workers poll it through their [`StopSignal`],
/// `signal_stop` lowers it and `wait_quiesced` blocks until every worker has
/// returned. `stop` does all three and joins the threads.
pub struct Lifecycle {
    name: &'static str,
    inner: Arc<Inner>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Lifecycle {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Arc::new(Inner {
                running: AtomicBool::new(false),
                live: Mutex::new(0),
                quiesced: Condvar::new(),
            }),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Raise the running flag for a new round of workers.
    pub fn start(&self) {
        debug!(group = self.name, "Starting workers");
        self.inner.running.store(true, Ordering::SeqCst);
    }

    /// Lower the running flag. Workers exit at their next check.
    pub fn signal_stop(&self) {
        self.signal().signal_stop();
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn signal(&self) -> StopSignal {
        StopSignal {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Number of workers that have not returned yet.
    pub fn live_workers(&self) -> usize {
        *self.inner.live.lock()
    }

    /// Run `work` on a new named thread belonging to this group.
    pub fn spawn<F>(&self, name: &str, work: F) -> io::Result<()>
    where
        F: FnOnce(StopSignal) + Send + 'static,
    {
        *self.inner.live.lock() += 1;
        let guard = LiveGuard(Arc::clone(&self.inner));
        let signal = self.signal();

        // On spawn failure the closure, and with it the guard, is dropped.
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _guard = guard;
                work(signal);
            })?;

        trace!(group = self.name, worker = name, "Worker spawned");
        self.handles.lock().push(handle);
        Ok(())
    }

    /// Block until every worker has returned or `timeout` elapses.
    /// Returns true when the group is quiet.
    pub fn wait_quiesced(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut live = self.inner.live.lock();
        while *live > 0 {
            if self
                .inner
                .quiesced
                .wait_until(&mut live, deadline)
                .timed_out()
            {
                return *live == 0;
            }
        }
        true
    }

    /// Join every finished or finishing worker thread.
    pub fn join(&self) {
        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        for handle in handles {
            let worker = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                warn!(group = self.name, worker = %worker, "Worker panicked");
            }
        }
    }

    /// Signal, wait up to `timeout`, then join. Returns false when a worker
    /// overran the timeout; the join still waits for it.
    pub fn stop(&self, timeout: Duration) -> bool {
        self.signal_stop();
        let quiet = self.wait_quiesced(timeout);
        if !quiet {
            warn!(
                group = self.name,
                live = self.live_workers(),
                "Workers did not stop in time"
            );
        }
        self.join();
        quiet
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        self.signal_stop();
        self.join();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn test_stop_waits_for_all_workers() {
        let lifecycle = Lifecycle::new("test");
        let ticks = Arc::new(AtomicUsize::new(0));

        lifecycle.start();
        for i in 0..3 {
            let ticks = Arc::clone(&ticks);
            lifecycle
                .spawn(&format!("worker-{i}"), move |signal| {
                    while signal.is_running() {
                        ticks.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(1));
                    }
                })
                .unwrap();
        }
        assert_eq!(lifecycle.live_workers(), 3);

        assert!(lifecycle.stop(Duration::from_secs(2)));
        assert_eq!(lifecycle.live_workers(), 0);
        assert!(!lifecycle.is_running());

        let after = ticks.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(ticks.load(Ordering::SeqCst), after);
    }

    #[test]
    fn test_worker_can_stop_the_group() {
        let lifecycle = Lifecycle::new("test");
        lifecycle.start();

        lifecycle.spawn("quitter", |signal| signal.signal_stop()).unwrap();
        lifecycle
            .spawn("follower", |signal| {
                while signal.is_running() {
                    thread::sleep(Duration::from_millis(1));
                }
            })
            .unwrap();

        assert!(lifecycle.wait_quiesced(Duration::from_secs(2)));
        assert!(!lifecycle.is_running());
        lifecycle.join();
    }

    #[test]
    fn test_wait_quiesced_times_out() {
        let lifecycle = Lifecycle::new("test");
        lifecycle.start();
        lifecycle
            .spawn("sleeper", |_| thread::sleep(Duration::from_millis(200)))
            .unwrap();

        assert!(!lifecycle.wait_quiesced(Duration::from_millis(10)));
        lifecycle.join();
        assert_eq!(lifecycle.live_workers(), 0);
    }

    #[test]
    fn test_panicking_worker_is_counted_out() {
        let lifecycle = Lifecycle::new("test");
        lifecycle.start();
        lifecycle.spawn("panicker", |_| panic!("boom")).unwrap();

        assert!(lifecycle.wait_quiesced(Duration::from_secs(2)));
        lifecycle.join();
    }
}
