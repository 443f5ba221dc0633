//! # flotilla-engine
//!
//! Bounded-concurrency execution of per-repository work.
//!
//! Call [`clone::clone_all`] to populate a workspace or [`sync::sync_all`] to
//! fetch and fast-forward checkouts. Both fan out through a [`Dispatcher`] and
//! report one [`TaskOutcome`] per repository; individual failures are data,
//! never errors.

pub mod clone;
pub mod dispatcher;
pub mod error;
pub mod outcome;
pub mod probe;
pub mod process;
pub mod progress;
pub mod remote;
pub mod retry;
pub mod setup;
pub mod status;
pub mod sync;

pub use clone::{clone_all, clone_repos, CloneOptions};
pub use dispatcher::{DispatchOutcome, Dispatcher, Job, TaskFailure};
pub use error::{EngineError, ProbeError, ProcessError, RemoteError};
pub use outcome::{Action, Tally, TaskOutcome};
pub use probe::{GitProbe, VcsProbe};
pub use process::{CommandRunner, ProcessRunner};
pub use progress::{ProgressSink, SharedProgress};
pub use remote::{CiStatus, GhClient, RemoteClient};
pub use retry::{Retryable, RetryPolicy};
pub use sync::{sync_all, SyncOptions, SyncTarget};
