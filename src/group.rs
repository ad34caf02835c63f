//! Grouping promises into one composite promise.
//!
//! A group never starts or orders its children's work: every child was
//! already running from the moment it was submitted. The discipline only
//! decides how the group *observes* its children finishing.
//!
//! - [`Discipline::Concurrent`] counts children down as they finish, in
//!   whatever order that happens.
//! - [`Discipline::Sequential`] waits on each child strictly in list order on
//!   a worker of its own. A child that finishes early is only noticed once
//!   every child before it has been noticed; its work and side effects are
//!   not delayed by that.
//!
//! The composite carries no payload. It resolves to `()` once every child has
//! finished, whether those children succeeded or failed; read a child's
//! outcome from your own handle to it.
//!
//! # Examples
//!
//! ```
//! use go_promise::{concurrent, go, sequential, Promise};
//! let leaf = |s: &'static str| go(move |p: Promise<&'static str, ()>| { p.resolve(s).unwrap(); });
//! let a = leaf("A");
//! let tree = concurrent![a.clone(), sequential![leaf("B"), leaf("C")], leaf("D")];
//! assert_eq!(tree.wait(), Ok(()));
//! assert_eq!(a.wait(), Ok("A"));
//! ```

use crate::spawn::Executor;
use crate::{Error, Promise, State};
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// The promise a group hands back.
pub type GroupPromise = Promise<(), Infallible>;

/// Anything a group can wait on: a leaf promise or another group.
pub trait Waitable: Send + Sync {
    fn state(&self) -> State;

    /// Block until finished, discarding the outcome.
    fn wait_finished(&self);

    /// Run `callback` once finished, immediately if that already happened.
    fn on_finish(&self, callback: Box<dyn FnOnce() + Send + 'static>);
}

impl<T, E> Waitable for Promise<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn state(&self) -> State {
        Promise::state(self)
    }

    fn wait_finished(&self) {
        self.wait_shared();
    }

    fn on_finish(&self, callback: Box<dyn FnOnce() + Send + 'static>) {
        Promise::on_finish(self, callback)
    }
}

impl<W: Waitable + ?Sized> Waitable for Box<W> {
    fn state(&self) -> State {
        (**self).state()
    }

    fn wait_finished(&self) {
        (**self).wait_finished()
    }

    fn on_finish(&self, callback: Box<dyn FnOnce() + Send + 'static>) {
        (**self).on_finish(callback)
    }
}

impl<W: Waitable + ?Sized> Waitable for Arc<W> {
    fn state(&self) -> State {
        (**self).state()
    }

    fn wait_finished(&self) {
        (**self).wait_finished()
    }

    fn on_finish(&self, callback: Box<dyn FnOnce() + Send + 'static>) {
        (**self).on_finish(callback)
    }
}

/// A child of a group.
pub type Child = Box<dyn Waitable>;

/// How a group observes its children finishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discipline {
    Concurrent,
    Sequential,
}

impl Executor {
    pub fn group<I>(&self, discipline: Discipline, children: I) -> Result<GroupPromise, Error>
    where
        I: IntoIterator<Item = Child>,
    {
        match discipline {
            Discipline::Concurrent => Ok(self.concurrent(children)),
            Discipline::Sequential => self.try_sequential(children),
        }
    }

    /// A promise that finishes once every child has, in any order.
    ///
    /// Nothing is spawned, so the executor's spawner is never used here: the
    /// group is pending straight away and the last child to finish completes
    /// it, on that child's thread.
    pub fn concurrent<I>(&self, children: I) -> GroupPromise
    where
        I: IntoIterator<Item = Child>,
    {
        let children: Vec<Child> = children.into_iter().collect();
        let group = GroupPromise::new();
        group.start();
        debug!(
            children = children.len(),
            finished = finished_count(&children),
            "concurrent group"
        );
        if children.is_empty() {
            finish(&group);
            return group;
        }
        let remaining = Arc::new(AtomicUsize::new(children.len()));
        for child in children {
            let remaining = remaining.clone();
            let group = group.clone();
            child.on_finish(Box::new(move || {
                if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                    finish(&group);
                }
            }));
        }
        group
    }

    /// A promise that waits on each child in list order, then finishes.
    ///
    /// # Panics
    ///
    /// Panics if the spawner refuses the waiting job. See
    /// [`Executor::try_sequential`].
    pub fn sequential<I>(&self, children: I) -> GroupPromise
    where
        I: IntoIterator<Item = Child>,
    {
        match self.try_sequential(children) {
            Ok(group) => group,
            Err(err) => panic!("failed to submit sequential group: {err}"),
        }
    }

    pub fn try_sequential<I>(&self, children: I) -> Result<GroupPromise, Error>
    where
        I: IntoIterator<Item = Child>,
    {
        let children: Vec<Child> = children.into_iter().collect();
        debug!(
            children = children.len(),
            finished = finished_count(&children),
            "sequential group"
        );
        self.try_go(move |group: GroupPromise| {
            for child in &children {
                child.wait_finished();
            }
            finish(&group);
        })
    }
}

fn finished_count(children: &[Child]) -> usize {
    children
        .iter()
        .filter(|child| child.state() == State::Finished)
        .count()
}

fn finish(group: &GroupPromise) {
    // only the group's own waiting logic ever completes it
    if group.resolve(()).is_ok() {
        debug!("group finished");
    }
}

/// A [`Discipline::Concurrent`] group on the default executor.
pub fn concurrent<I>(children: I) -> GroupPromise
where
    I: IntoIterator<Item = Child>,
{
    Executor::new().concurrent(children)
}

/// A [`Discipline::Sequential`] group on the default executor.
pub fn sequential<I>(children: I) -> GroupPromise
where
    I: IntoIterator<Item = Child>,
{
    Executor::new().sequential(children)
}

/// Build a concurrent group from any mix of promises and groups.
#[macro_export]
macro_rules! concurrent {
    ($($child:expr),* $(,)?) => {
        $crate::group::concurrent(::std::vec![$(::std::boxed::Box::new($child) as $crate::Child),*])
    };
}

/// Build a sequential group from any mix of promises and groups.
#[macro_export]
macro_rules! sequential {
    ($($child:expr),* $(,)?) => {
        $crate::group::sequential(::std::vec![$(::std::boxed::Box::new($child) as $crate::Child),*])
    };
}
