//! Foreground task queue.
//!
//! Every listener notification produced by this crate (discovery events,
//! command outcomes, web-app messages) is posted here instead of being run
//! on the platform thread that produced it. An application either drains
//! the queue from its own loop with [`Dispatcher::run_pending`] or hands it
//! to a dedicated thread with [`Dispatcher::spawn_loop`]. Only one consumer
//! should drain a given dispatcher.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use tracing::{debug, error};

type Task = Box<dyn FnOnce() + Send + 'static>;

const LOOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone)]
pub struct Dispatcher {
    name: Arc<str>,
    tx: Sender<Task>,
    rx: Receiver<Task>,
}

impl Dispatcher {
    pub fn new(name: &str) -> Self {
        let (tx, rx) = unbounded::<Task>();
        Self {
            name: Arc::from(name),
            tx,
            rx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queues `task` for execution on the consumer side.
    pub fn post<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        // Cannot fail: `self` keeps the receiving end alive.
        let _ = self.tx.send(Box::new(task));
    }

    /// Number of queued tasks not yet executed.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Runs queued tasks until the queue is empty, including tasks posted by
    /// the tasks themselves. Returns how many tasks ran.
    pub fn run_pending(&self) -> usize {
        let mut count = 0;
        while let Ok(task) = self.rx.try_recv() {
            self.run(task);
            count += 1;
        }
        count
    }

    /// Drains the queue on a named background thread until the returned
    /// handle is stopped or dropped.
    pub fn spawn_loop(&self) -> std::io::Result<DispatcherThread> {
        let stop = Arc::new(AtomicBool::new(false));
        let worker = self.clone();
        let worker_stop = stop.clone();

        let handle = thread::Builder::new()
            .name(format!("pmocast-{}", self.name))
            .spawn(move || {
                debug!(dispatcher = %worker.name, "Dispatcher loop started");
                while !worker_stop.load(Ordering::Acquire) {
                    match worker.rx.recv_timeout(LOOP_POLL_INTERVAL) {
                        Ok(task) => worker.run(task),
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!(dispatcher = %worker.name, "Dispatcher loop stopped");
            })?;

        Ok(DispatcherThread {
            stop,
            handle: Some(handle),
        })
    }

    fn run(&self, task: Task) {
        if catch_unwind(AssertUnwindSafe(task)).is_err() {
            error!(dispatcher = %self.name, "Listener panicked while handling a Cast notification");
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.name)
            .field("pending", &self.pending())
            .finish()
    }
}

/// Handle on a thread started by [`Dispatcher::spawn_loop`].
pub struct DispatcherThread {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DispatcherThread {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DispatcherThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Instant;

    #[test]
    fn test_tasks_run_only_when_drained() {
        let dispatcher = Dispatcher::new("test");
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let seen = seen.clone();
            dispatcher.post(move || seen.lock().unwrap().push(i));
        }

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(dispatcher.pending(), 3);
        assert_eq!(dispatcher.run_pending(), 3);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(dispatcher.run_pending(), 0);
    }

    #[test]
    fn test_nested_posts_are_drained() {
        let dispatcher = Dispatcher::new("test");
        let seen = Arc::new(Mutex::new(0));

        let inner = dispatcher.clone();
        let counter = seen.clone();
        dispatcher.post(move || {
            let counter = counter.clone();
            inner.post(move || *counter.lock().unwrap() += 1);
        });

        assert_eq!(dispatcher.run_pending(), 2);
        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[test]
    fn test_panicking_task_does_not_stop_the_queue() {
        let dispatcher = Dispatcher::new("test");
        let seen = Arc::new(Mutex::new(false));

        dispatcher.post(|| panic!("listener failure"));
        let flag = seen.clone();
        dispatcher.post(move || *flag.lock().unwrap() = true);

        assert_eq!(dispatcher.run_pending(), 2);
        assert!(*seen.lock().unwrap());
    }

    #[test]
    fn test_spawned_loop_executes_tasks() {
        let dispatcher = Dispatcher::new("loop");
        let thread = dispatcher.spawn_loop().unwrap();
        let (tx, rx) = crossbeam_channel::bounded(1);

        dispatcher.post(move || {
            let _ = tx.send(thread::current().name().map(str::to_string));
        });

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("pmocast-loop"));

        let start = Instant::now();
        thread.stop();
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
