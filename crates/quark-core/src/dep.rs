use std::cell::{Cell, RefCell};

use crate::reactive::{DepId, WeakRuntime};
use crate::{Result, Runtime};

/// A dependency cell: the atomic unit of observable state.
///
/// A `Dep` holds no value. Whatever owns the observable slot calls
/// [`depend`](Dep::depend) when the slot is read and [`notify`](Dep::notify)
/// after it changed. The graph node behind it is allocated on first use, so
/// cells that are never read cost nothing.
///
/// ```rust
/// use quark_core::*;
///
/// let rt = Runtime::new();
/// let dep = Dep::new();
/// let runs = std::rc::Rc::new(std::cell::Cell::new(0));
///
/// let render = Computation::render(&rt, "probe", {
///     let dep = dep.clone_handle();
///     let runs = runs.clone();
///     move |rt| {
///         dep.depend(rt);
///         runs.set(runs.get() + 1);
///         Ok(())
///     }
/// });
/// render.evaluate(&rt).unwrap();
/// dep.notify(&rt).unwrap();
/// assert_eq!(runs.get(), 2);
/// ```
#[derive(Default)]
pub struct Dep {
    shared: std::rc::Rc<DepSlot>,
}

#[derive(Default)]
struct DepSlot {
    id: Cell<Option<DepId>>,
    rt: RefCell<Option<WeakRuntime>>,
}

impl Drop for DepSlot {
    fn drop(&mut self) {
        if let Some(id) = self.id.get()
            && let Some(rt) = self.rt.get_mut().as_ref().and_then(WeakRuntime::upgrade)
        {
            rt.release_dep(id);
        }
    }
}

impl Dep {
    pub fn new() -> Self {
        Self::default()
    }

    /// A second handle to the same cell. The graph node is released when the
    /// last handle drops.
    pub fn clone_handle(&self) -> Dep {
        Dep {
            shared: self.shared.clone(),
        }
    }

    /// Graph id of this cell, allocating it in `rt` if needed.
    pub fn id(&self, rt: &Runtime) -> DepId {
        if let Some(id) = self.shared.id.get() {
            debug_assert!(
                self.shared
                    .rt
                    .borrow()
                    .as_ref()
                    .and_then(WeakRuntime::upgrade)
                    .is_none_or(|owner| owner.ptr_eq(rt)),
                "a Dep must stay within the runtime that allocated it"
            );
            return id;
        }
        let id = rt.alloc_dep();
        self.shared.id.set(Some(id));
        *self.shared.rt.borrow_mut() = Some(rt.downgrade());
        id
    }

    /// Subscribes the innermost evaluating computation of `rt`, if any.
    pub fn depend(&self, rt: &Runtime) {
        if rt.active().is_none() {
            return;
        }
        let id = self.id(rt);
        rt.track(id);
    }

    /// Marks every current subscriber stale, then flushes the scheduler if no
    /// batch or flush is in progress.
    pub fn notify(&self, rt: &Runtime) -> Result<()> {
        match self.shared.id.get() {
            Some(id) => rt.notify_dep(id),
            None => Ok(()),
        }
    }

    /// Number of computations currently subscribed.
    pub fn subscriber_count(&self, rt: &Runtime) -> usize {
        match self.shared.id.get() {
            Some(id) => rt.subscribers(id).len(),
            None => 0,
        }
    }
}

impl std::fmt::Debug for Dep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dep").field("id", &self.shared.id.get()).finish()
    }
}
