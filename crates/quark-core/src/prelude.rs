pub use crate::computation::{Computation, WatchOptions, Watcher};
pub use crate::computed::Computed;
pub use crate::config::RuntimeConfig;
pub use crate::dep::Dep;
pub use crate::effects::Dispose;
pub use crate::error::{Error, Result};
pub use crate::reactive::{ComputationId, ComputationKind, DepId, Runtime};
pub use crate::scheduler::PostUpdateQueue;
pub use crate::scope::Scope;
pub use crate::signal::{Signal, signal};
