//! Submitting work functions. Every submission is handed to a [`Spawner`],
//! which by default starts a fresh OS thread for it.
//!
use crate::{Error, Promise};
use std::sync::Arc;
use std::thread;
use tracing::{debug, trace};

/// A unit of work handed to a [`Spawner`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Decides where submitted jobs run.
///
/// This is the one place admission control would go: a spawner may queue,
/// pool or refuse jobs without the [`Promise`] contract changing.
pub trait Spawner: Send + Sync {
    fn spawn(&self, job: Job) -> Result<(), Error>;
}

/// Runs every job on its own thread, immediately. No upper bound.
#[derive(Debug, Clone, Default)]
pub struct ThreadSpawner {
    name: Option<String>,
    stack_size: Option<usize>,
}

impl Spawner for ThreadSpawner {
    fn spawn(&self, job: Job) -> Result<(), Error> {
        let mut builder = thread::Builder::new();
        if let Some(ref name) = self.name {
            builder = builder.name(name.clone());
        }
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }
        builder.spawn(job)?;
        Ok(())
    }
}

/// Submits work functions and hands each one its [`Promise`].
///
/// # Examples
///
/// ```
/// use go_promise::Executor;
/// let executor = Executor::builder().thread_name("worker").build();
/// let promise = executor.go_with(|p, (s, n)| {
///     std::thread::sleep(std::time::Duration::from_millis(n));
///     p.resolve(s.to_string()).unwrap();
/// }, ("A", 10));
/// assert_eq!(promise.wait(), Ok::<_, ()>("A".to_string()));
/// ```
#[derive(Clone)]
pub struct Executor {
    spawner: Arc<dyn Spawner>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor").finish_non_exhaustive()
    }
}

impl Executor {
    /// An executor backed by [`ThreadSpawner`].
    pub fn new() -> Self {
        Self::with_spawner(ThreadSpawner::default())
    }

    pub fn with_spawner<S>(spawner: S) -> Self
    where
        S: Spawner + 'static,
    {
        Self { spawner: Arc::new(spawner) }
    }

    pub fn builder() -> ExecutorBuilder {
        ExecutorBuilder::default()
    }

    pub(crate) fn spawn(&self, job: Job) -> Result<(), Error> {
        self.spawner.spawn(job)
    }

    /// Submit `work` and return its promise without waiting for it to start.
    ///
    /// The promise is [`NotStarted`](crate::State::NotStarted) until the
    /// spawner runs the job, which marks it pending and calls `work` with a
    /// handle to it. Fails only if the spawner refuses the job.
    pub fn try_go<T, E, F>(&self, work: F) -> Result<Promise<T, E>, Error>
    where
        T: Send + Sync + 'static,
        E: Send + Sync + 'static,
        F: FnOnce(Promise<T, E>) + Send + 'static,
    {
        let promise = Promise::new();
        let handle = promise.clone();
        self.spawn(Box::new(move || {
            trace!("worker started");
            handle.start();
            work(handle);
        }))?;
        debug!("work submitted");
        Ok(promise)
    }

    /// Like [`Executor::try_go`].
    ///
    /// # Panics
    ///
    /// Panics if the spawner refuses the job, as [`std::thread::spawn`] does
    /// when the OS cannot create a thread.
    pub fn go<T, E, F>(&self, work: F) -> Promise<T, E>
    where
        T: Send + Sync + 'static,
        E: Send + Sync + 'static,
        F: FnOnce(Promise<T, E>) + Send + 'static,
    {
        match self.try_go(work) {
            Ok(promise) => promise,
            Err(err) => panic!("failed to submit work: {err}"),
        }
    }

    /// Submit `work`, forwarding `args` to it alongside its promise.
    pub fn go_with<T, E, A, F>(&self, work: F, args: A) -> Promise<T, E>
    where
        T: Send + Sync + 'static,
        E: Send + Sync + 'static,
        A: Send + 'static,
        F: FnOnce(Promise<T, E>, A) + Send + 'static,
    {
        self.go(move |promise| work(promise, args))
    }
}

/// Configuration for an [`Executor`].
#[derive(Default)]
pub struct ExecutorBuilder {
    threads: ThreadSpawner,
    spawner: Option<Arc<dyn Spawner>>,
}

impl ExecutorBuilder {
    /// Name given to every worker thread.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.threads.name = Some(name.into());
        self
    }

    /// Stack size, in bytes, of every worker thread.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.threads.stack_size = Some(size);
        self
    }

    /// Replace the thread spawner altogether. Thread name and stack size are
    /// then ignored.
    pub fn spawner<S>(mut self, spawner: S) -> Self
    where
        S: Spawner + 'static,
    {
        self.spawner = Some(Arc::new(spawner));
        self
    }

    pub fn build(self) -> Executor {
        match self.spawner {
            Some(spawner) => Executor { spawner },
            None => Executor::with_spawner(self.threads),
        }
    }
}

/// Submit `work` on the default executor. See [`Executor::go`].
pub fn go<T, E, F>(work: F) -> Promise<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
    F: FnOnce(Promise<T, E>) + Send + 'static,
{
    Executor::new().go(work)
}

/// Submit `work` with `args` on the default executor. See [`Executor::go_with`].
pub fn go_with<T, E, A, F>(work: F, args: A) -> Promise<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
    A: Send + 'static,
    F: FnOnce(Promise<T, E>, A) + Send + 'static,
{
    Executor::new().go_with(work, args)
}

#[cfg(test)]
pub(crate) mod tests {
use super::{go, go_with, Executor, Job, Spawner};
use crate::{Error, State};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Holds jobs until `run_all` is called.
#[derive(Clone, Default)]
pub(crate) struct DeferredSpawner {
    jobs: Arc<Mutex<Vec<Job>>>,
}

impl DeferredSpawner {
    pub(crate) fn run_all(&self) {
        let jobs: Vec<Job> = std::mem::take(&mut *self.jobs.lock().unwrap());
        for job in jobs {
            job()
        }
    }
}

impl Spawner for DeferredSpawner {
    fn spawn(&self, job: Job) -> Result<(), Error> {
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }
}

struct RefusingSpawner;

impl Spawner for RefusingSpawner {
    fn spawn(&self, _job: Job) -> Result<(), Error> {
        Err(Error::Spawn(std::io::Error::new(std::io::ErrorKind::Other, "no threads left")))
    }
}

fn process(promise: crate::Promise<String, String>, (s, ms, fail): (&'static str, u64, Option<&'static str>)) {
    thread::sleep(Duration::from_millis(ms));
    match fail {
        Some(err) => promise.reject(err.to_string()).unwrap(),
        None => promise.resolve(s.to_string()).unwrap(),
    }
}

#[test]
fn test_go_promise_base() {
    let spawner = DeferredSpawner::default();
    let executor = Executor::with_spawner(spawner.clone());
    let promise = executor.go_with(process, ("A", 0, None));

    assert_eq!(promise.state(), State::NotStarted);
    assert!(!promise.is_pending());
    assert!(!promise.is_finished());

    spawner.run_all();
    assert!(promise.is_finished());
    assert_eq!(promise.wait(), Ok("A".to_string()));
}

#[test]
fn test_go_promise() {
    let promise = go_with(process, ("A", 100, None));
    assert_eq!(promise.wait(), Ok("A".to_string()));
    assert!(promise.is_finished());

    let promise = go_with(process, ("A", 100, Some("invalid-action")));
    assert_eq!(promise.wait(), Err("invalid-action".to_string()));
    assert!(promise.is_finished());
}

#[test]
fn test_pending_while_running() {
    let (tx, rx) = std::sync::mpsc::channel::<()>();
    let promise = go(move |p: crate::Promise<(), ()>| {
        rx.recv().unwrap();
        p.resolve(()).unwrap();
    });
    while promise.is_not_started() {
        thread::yield_now();
    }
    assert!(promise.is_pending());
    tx.send(()).unwrap();
    assert_eq!(promise.wait(), Ok(()));
}

#[test]
fn test_named_worker_thread() {
    let executor = Executor::builder().thread_name("promise-worker").stack_size(256 * 1024).build();
    let promise = executor.go(|p: crate::Promise<Option<String>, ()>| {
        p.resolve(thread::current().name().map(str::to_string)).unwrap();
    });
    assert_eq!(promise.wait(), Ok(Some("promise-worker".to_string())));
}

#[test]
fn test_refused_submission() {
    let executor = Executor::builder().spawner(RefusingSpawner).build();
    let submitted = executor.try_go(|p: crate::Promise<(), ()>| {
        p.resolve(()).unwrap();
    });
    assert!(matches!(submitted, Err(Error::Spawn(_))));
}

#[test]
#[should_panic(expected = "failed to submit work")]
fn test_go_panics_when_refused() {
    let executor = Executor::with_spawner(RefusingSpawner);
    executor.go(|p: crate::Promise<(), ()>| {
        p.resolve(()).unwrap();
    });
}
}
