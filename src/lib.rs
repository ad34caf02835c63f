//! Promises for work running on its own thread, and groups of them.
//!
//! [`go`] submits a work function. It starts on a fresh thread straight away
//! and gets a [`Promise`] handle it completes exactly once, with `Ok` or
//! `Err`. Everyone else holding the promise blocks on [`Promise::wait`] or
//! `.await`s it.
//!
//! [`concurrent!`] and [`sequential!`] turn a list of promises, leaves or
//! other groups, into one promise that finishes after all of them.
//!
//! ```
//! use go_promise::{concurrent, go_with, sequential, Promise};
//! use std::{thread, time::Duration};
//!
//! fn process(p: Promise<String, String>, (s, ms): (&'static str, u64)) {
//!     thread::sleep(Duration::from_millis(ms));
//!     p.resolve(s.to_string()).unwrap();
//! }
//!
//! let a = go_with(process, ("A", 30));
//! concurrent![
//!     a.clone(),
//!     sequential![go_with(process, ("B", 20)), go_with(process, ("C", 0))],
//! ]
//! .wait()
//! .unwrap();
//! assert_eq!(a.wait(), Ok("A".to_string()));
//! ```
use thiserror::Error;

pub mod group;
pub mod promise;
pub mod spawn;

pub use group::{concurrent, sequential, Child, Discipline, GroupPromise, Waitable};
pub use promise::{Promise, State};
pub use spawn::{go, go_with, Executor, ExecutorBuilder, Job, Spawner, ThreadSpawner};

#[derive(Debug, Error)]
pub enum Error {
    #[error("The promise was already completed")]
    AlreadyCompleted,
    #[error("Failed to spawn a worker: {0}")]
    Spawn(#[from] std::io::Error),
}
