//! # Cells, Computations, and the Scheduler
//!
//! Quark's reactive core tracks which pieces of state a computation reads and
//! re-runs only the computations affected when that state changes. There are
//! four main pieces:
//!
//! - `Dep` — a dependency cell: the set of computations that read a slot.
//! - `Computation` / `Computed` / `Watcher` — tracked units of work in three
//!   flavors: render (push), computed (lazy, pull) and user observer.
//! - The scheduler — coalesces stale marks into bursts and runs each affected
//!   computation at most once per burst.
//! - `Scope` — ownership boundary that releases computations together.
//!
//! ## Explicit context
//!
//! There is no hidden global. Every reactive read takes the `Runtime` it
//! belongs to, and the runtime's stack decides which computation the read
//! registers with (always the innermost one):
//!
//! ```rust
//! use quark_core::*;
//!
//! let rt = Runtime::new();
//! let count = signal(0);
//! count.set(&rt, 1).unwrap();
//! count.update(&rt, |v| *v += 1).unwrap();
//! assert_eq!(count.get(&rt), 2);
//! ```
//!
//! ## Render computations
//!
//! A render computation runs once when first evaluated and then again after
//! every burst that changed something it read:
//!
//! ```rust
//! use quark_core::*;
//! use std::{cell::RefCell, rc::Rc};
//!
//! let rt = Runtime::new();
//! let name = signal("world".to_string());
//! let out = Rc::new(RefCell::new(String::new()));
//!
//! let render = Computation::render(&rt, "greeting", {
//!     let (name, out) = (name.clone(), out.clone());
//!     move |rt| {
//!         *out.borrow_mut() = format!("hello {}", name.get(rt));
//!         Ok(())
//!     }
//! });
//! render.evaluate(&rt).unwrap();
//! name.set(&rt, "quark".into()).unwrap();
//! assert_eq!(*out.borrow(), "hello quark");
//! ```
//!
//! ## Bursts
//!
//! Each notification outside a batch is its own burst. Wrap several writes in
//! `Runtime::batch` to have dependents re-run once, after all of them:
//!
//! ```rust
//! use quark_core::prelude::*;
//!
//! let rt = Runtime::new();
//! let a = signal(1);
//! rt.batch(|| {
//!     a.set(&rt, 2).unwrap();
//!     a.set(&rt, 3).unwrap();
//! })
//! .unwrap();
//! ```
//!
//! Deferred "after update" work goes through a `PostUpdateQueue`, flushed by
//! whoever owns the render right after it completes.

pub mod computation;
pub mod computed;
pub mod config;
pub mod dep;
pub mod effects;
pub mod error;
pub mod prelude;
pub mod reactive;
pub mod scheduler;
pub mod scope;
pub mod signal;
pub mod tests;

pub use computation::*;
pub use computed::*;
pub use config::*;
pub use dep::*;
pub use effects::*;
pub use error::*;
pub use reactive::{ComputationId, ComputationKind, DepId, Runtime};
pub use scheduler::PostUpdateQueue;
pub use scope::*;
pub use signal::*;
