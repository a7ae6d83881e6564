//! Deferred-execution primitives for cooperative syntax work.
//!
//! All syntax work runs on the host's single event thread. Long operations are
//! spread over several turns of that thread instead of being moved to another
//! OS thread, so the only thing the syntax core needs from its host is a way
//! to run a closure "soon", "later", or "soon, once per key".
//!
//! * [`Scheduler`]: the seam the syntax core depends on
//! * [`ManualScheduler`]: deterministic, owner-driven queue with a virtual clock
//! * [`LocalScheduler`]: tokio `LocalSet` implementation for async hosts

mod class;
mod local;
mod manual;
mod schedule;

pub use class::TaskClass;
pub use local::LocalScheduler;
pub use manual::ManualScheduler;
pub use schedule::{Scheduler, Task, TaskKey, TimerId};
