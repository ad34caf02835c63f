use std::fmt::Debug;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::{future::Future, task::{Poll, Waker}};
use tracing::{debug, trace, warn};
use crate::Error;

/// Lifecycle of a [`Promise`]. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum State {
    /// Created, work not begun yet.
    NotStarted,
    /// Work is in flight.
    Pending,
    /// Terminal, the outcome is available.
    Finished,
}

pub(crate) type Callback = Box<dyn FnOnce() + Send + 'static>;

/// A write-once result cell that many readers may block on.
///
/// A `Promise` is a handle: clones share the same cell. The work function
/// holding one clone calls [`Promise::complete`] (or `resolve`/`reject`)
/// exactly once; every other holder reads the outcome with
/// [`Promise::wait`], [`Promise::wait_shared`] or by `.await`ing it.
///
/// # Examples
///
/// ```
/// use go_promise::Promise;
/// use futures::executor::block_on;
/// use std::thread;
/// let promise = Promise::<String, String>::new();
/// let reader = promise.clone();
/// let task1 = thread::spawn(move || reader.wait());
/// let task2 = thread::spawn(move || block_on(async {
///     let waiter = promise.clone();
///     promise.resolve("Hi".into()).unwrap();
///     waiter.await
/// }));
/// assert_eq!(task1.join().expect("The task1 thread has panicked."), Ok("Hi".to_string()));
/// assert_eq!(*task2.join().expect("The task2 thread has panicked."), Ok("Hi".to_string()));
/// ```
pub struct Promise<T, E> {
    shared: Arc<Shared<T, E>>,
}

struct Shared<T, E> {
    inner: Mutex<Inner<T, E>>,
    finished: Condvar,
}

struct Inner<T, E> {
    state: State,
    outcome: Option<Arc<Result<T, E>>>,
    wakers: Vec<Waker>,
    callbacks: Vec<Callback>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self { shared: self.shared.clone() }
    }
}

impl<T, E> Default for Promise<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Debug, E: Debug> Debug for Promise<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("Promise")
            .field("state", &inner.state)
            .field("outcome", &inner.outcome)
            .finish()
    }
}

impl<T, E> Promise<T, E> {
    /// A detached promise in [`State::NotStarted`]. Nothing runs on its behalf;
    /// whoever holds it is responsible for completing it.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: State::NotStarted,
                    outcome: None,
                    wakers: vec![],
                    callbacks: vec![],
                }),
                finished: Condvar::new(),
            }),
        }
    }

    // No user code ever runs under this lock, so a poisoned guard still holds
    // consistent data.
    fn lock(&self) -> MutexGuard<'_, Inner<T, E>> {
        self.shared.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// NotStarted -> Pending. Does nothing in any other state.
    pub(crate) fn start(&self) {
        let mut inner = self.lock();
        if inner.state == State::NotStarted {
            inner.state = State::Pending;
            trace!("promise pending");
        }
    }

    /// Store the single outcome and wake everyone waiting for it.
    ///
    /// `Ok` is the success outcome and `Err` the failure outcome. Only the
    /// first call has an effect; later calls return
    /// [`Error::AlreadyCompleted`] and leave the stored outcome untouched.
    ///
    /// # Panics
    ///
    /// If an [`on_finish`](Promise::on_finish) callback panics, the remaining
    /// callbacks still run and the first panic is resumed afterwards. The
    /// outcome is stored either way.
    pub fn complete(&self, outcome: Result<T, E>) -> Result<(), Error> {
        let (wakers, callbacks) = {
            let mut inner = self.lock();
            if inner.state == State::Finished {
                warn!("promise completed more than once; keeping the first outcome");
                return Err(Error::AlreadyCompleted);
            }
            debug!(failed = outcome.is_err(), "promise finished");
            inner.outcome = Some(Arc::new(outcome));
            inner.state = State::Finished;
            (
                std::mem::take(&mut inner.wakers),
                std::mem::take(&mut inner.callbacks),
            )
        };
        self.shared.finished.notify_all();
        for waker in wakers {
            waker.wake()
        }
        let mut panicked = None;
        for callback in callbacks {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(callback)) {
                warn!("promise callback panicked");
                panicked.get_or_insert(payload);
            }
        }
        if let Some(payload) = panicked {
            panic::resume_unwind(payload);
        }
        Ok(())
    }

    /// `complete(Ok(value))`
    pub fn resolve(&self, value: T) -> Result<(), Error> {
        self.complete(Ok(value))
    }

    /// `complete(Err(err))`
    pub fn reject(&self, err: E) -> Result<(), Error> {
        self.complete(Err(err))
    }

    /// Block until finished and return the shared outcome. There is no
    /// timeout: if the promise is never completed this never returns.
    pub fn wait_shared(&self) -> Arc<Result<T, E>> {
        let inner = self.lock();
        let inner = self
            .shared
            .finished
            .wait_while(inner, |inner| inner.outcome.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        match inner.outcome {
            Some(ref outcome) => outcome.clone(),
            None => unreachable!("woke up without an outcome"),
        }
    }

    /// The outcome, if the promise has finished. Never blocks.
    pub fn try_outcome(&self) -> Option<Arc<Result<T, E>>> {
        self.lock().outcome.clone()
    }

    pub fn state(&self) -> State {
        self.lock().state
    }

    pub fn is_not_started(&self) -> bool {
        self.state() == State::NotStarted
    }

    pub fn is_pending(&self) -> bool {
        self.state() == State::Pending
    }

    pub fn is_finished(&self) -> bool {
        self.state() == State::Finished
    }

    /// Run `callback` once the promise has finished. If it already has, the
    /// callback runs right away on the calling thread; otherwise it runs on
    /// the thread that completes the promise.
    pub fn on_finish<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut inner = self.lock();
        if inner.state == State::Finished {
            drop(inner);
            callback();
        } else {
            inner.callbacks.push(Box::new(callback));
        }
    }
}

impl<T: Clone, E: Clone> Promise<T, E> {
    /// Block until finished and return a copy of the outcome.
    ///
    /// Any number of threads may wait at once, any number of times; all of
    /// them see the same outcome.
    pub fn wait(&self) -> Result<T, E> {
        (*self.wait_shared()).clone()
    }
}

impl<T, E> Future for Promise<T, E> {
    type Output = Arc<Result<T, E>>;

    fn poll(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        let mut inner = self.lock();
        match inner.outcome {
            Some(ref outcome) => Poll::Ready(outcome.clone()),
            None => {
                if !inner.wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
                    inner.wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}
