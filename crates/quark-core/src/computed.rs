use std::borrow::Cow;
use std::cell::RefCell;

use crate::reactive::{ComputationId, ComputationKind, WeakRuntime};
use crate::{Computation, Dep, Error, Result, Runtime};

/// Lazily evaluated, cached derived value.
///
/// Nothing is computed until the first [`get`](Computed::get). A change to
/// any cell the last evaluation read only marks the cache dirty (and tells
/// whoever read this computed); the getter runs again on the next read.
///
/// ```rust
/// use quark_core::*;
///
/// let rt = Runtime::new();
/// let first = signal("Jane".to_string());
/// let last = signal("Doe".to_string());
///
/// let full = Computed::new(&rt, "full_name", {
///     let (first, last) = (first.clone(), last.clone());
///     move |rt| Ok(format!("{} {}", first.get(rt), last.get(rt)))
/// });
///
/// assert_eq!(full.get(&rt).unwrap(), "Jane Doe");
/// last.set(&rt, "Roe".to_string()).unwrap();
/// assert!(full.is_dirty(&rt));
/// assert_eq!(full.get(&rt).unwrap(), "Jane Roe");
/// ```
pub struct Computed<T> {
    id: ComputationId,
    label: Cow<'static, str>,
    getter: Box<dyn Fn(&Runtime) -> anyhow::Result<T>>,
    cached: RefCell<Option<T>>,
    output: Dep,
    rt: WeakRuntime,
}

impl<T: Clone + 'static> Computed<T> {
    pub fn new(
        rt: &Runtime,
        label: impl Into<Cow<'static, str>>,
        getter: impl Fn(&Runtime) -> anyhow::Result<T> + 'static,
    ) -> Self {
        let label = label.into();
        let output = Dep::new();
        let out = output.id(rt);
        let id = rt.create_node(ComputationKind::Computed, label.clone(), None, Some(out));
        Self {
            id,
            label,
            getter: Box::new(getter),
            cached: RefCell::new(None),
            output,
            rt: rt.downgrade(),
        }
    }

    /// Reads the value, recomputing only if the cache is dirty.
    ///
    /// The reader subscribes to this computed, not to the cells the getter
    /// reads.
    pub fn get(&self, rt: &Runtime) -> Result<T> {
        self.output.depend(rt);

        if !rt.contains(self.id) {
            return rt
                .untrack(|| (self.getter)(rt))
                .map_err(|source| self.failed(source));
        }
        if rt.is_running(self.id) {
            return self
                .cached
                .borrow()
                .clone()
                .ok_or_else(|| self.failed(anyhow::anyhow!("`{}` reads itself", self.label)));
        }
        if !rt.is_dirty(self.id)
            && let Some(v) = self.cached.borrow().as_ref()
        {
            return Ok(v.clone());
        }

        rt.set_dirty(self.id, false);
        let result = {
            let _frame = rt.enter(self.id);
            (self.getter)(rt)
        };
        match result {
            Ok(v) => {
                *self.cached.borrow_mut() = Some(v.clone());
                Ok(v)
            }
            Err(source) => {
                rt.set_failed(self.id);
                Err(self.failed(source))
            }
        }
    }

    /// Last cached value, without evaluating or tracking.
    pub fn peek(&self) -> Option<T> {
        self.cached.borrow().clone()
    }

    pub fn is_dirty(&self, rt: &Runtime) -> bool {
        rt.is_dirty(self.id)
    }

    /// Forces the next read to recompute, notifying readers.
    pub fn invalidate(&self, rt: &Runtime) -> Result<()> {
        rt.mark_stale(self.id);
        rt.flush_if_idle()
    }

    pub fn computation(&self) -> Computation {
        Computation { id: self.id }
    }

    fn failed(&self, source: anyhow::Error) -> Error {
        Error::Evaluation {
            label: self.label.to_string(),
            source,
        }
    }
}

impl<T> Drop for Computed<T> {
    fn drop(&mut self) {
        if let Some(rt) = self.rt.upgrade() {
            rt.release_node(self.id);
        }
    }
}
