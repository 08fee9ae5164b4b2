use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;

use crate::reactive::{ComputationId, ComputationKind, DepId, Job, WeakRuntime};
use crate::{Error, Result, Runtime};

/// Handle to a push-mode computation (render or observer).
///
/// The handle is `Copy`; the graph node lives until [`dispose`] is called or
/// the owning [`Scope`](crate::Scope) is disposed.
///
/// [`dispose`]: Computation::dispose
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Computation {
    pub(crate) id: ComputationId,
}

impl Computation {
    /// A render computation. Nothing runs until [`evaluate`](Self::evaluate)
    /// is called for the first time; after that every notification routes
    /// through the scheduler.
    pub fn render(
        rt: &Runtime,
        label: impl Into<Cow<'static, str>>,
        f: impl Fn(&Runtime) -> anyhow::Result<()> + 'static,
    ) -> Self {
        Self::with_kind(rt, ComputationKind::Render, label, f)
    }

    /// A bare observer computation; see [`Watcher`] for the comparing variant.
    pub fn observer(
        rt: &Runtime,
        label: impl Into<Cow<'static, str>>,
        f: impl Fn(&Runtime) -> anyhow::Result<()> + 'static,
    ) -> Self {
        Self::with_kind(rt, ComputationKind::Observer, label, f)
    }

    fn with_kind(
        rt: &Runtime,
        kind: ComputationKind,
        label: impl Into<Cow<'static, str>>,
        f: impl Fn(&Runtime) -> anyhow::Result<()> + 'static,
    ) -> Self {
        let job: Job = Rc::new(f);
        Self {
            id: rt.create_node(kind, label.into(), Some(job), None),
        }
    }

    pub fn id(&self) -> ComputationId {
        self.id
    }

    /// `None` once disposed.
    pub fn kind(&self, rt: &Runtime) -> Option<ComputationKind> {
        rt.kind_of(self.id)
    }

    pub fn label(&self, rt: &Runtime) -> String {
        rt.label_of(self.id)
    }

    /// Runs the computation now and rebuilds its subscriptions.
    ///
    /// The run is its own burst: writes it performs are coalesced and flushed
    /// after it returns. Called while the computation is already running, the
    /// request is deferred until the current run finishes.
    pub fn evaluate(&self, rt: &Runtime) -> Result<()> {
        if !rt.contains(self.id) {
            return Err(Error::Disposed {
                label: format!("{:?}", self.id),
            });
        }
        if rt.is_running(self.id) {
            rt.mark_stale(self.id);
            return Ok(());
        }
        rt.dequeue(self.id);
        let mut ran = Ok(());
        let flushed = rt.batch(|| ran = rt.run(self.id));
        match (ran, flushed) {
            (Err(err), Err(extra)) => {
                log::error!("{extra}");
                Err(err)
            }
            (Err(err), Ok(())) => Err(err),
            (Ok(()), flushed) => flushed,
        }
    }

    /// Marks the computation stale and flushes if nothing else is in flight.
    pub fn schedule(&self, rt: &Runtime) -> Result<()> {
        rt.mark_stale(self.id);
        rt.flush_if_idle()
    }

    /// Drops every subscription and removes the computation from the graph.
    pub fn dispose(&self, rt: &Runtime) {
        rt.release_node(self.id);
    }

    pub fn is_disposed(&self, rt: &Runtime) -> bool {
        !rt.contains(self.id)
    }

    /// Cells read by the last evaluation.
    pub fn sources(&self, rt: &Runtime) -> Vec<DepId> {
        rt.sources_of(self.id)
    }
}

/// Options of a [`Watcher`].
pub struct WatchOptions<T> {
    /// Fire the callback once at construction with `(initial, None)`.
    pub immediate: bool,
    /// Change detection; the callback fires when this returns `false`.
    pub equals: Rc<dyn Fn(&T, &T) -> bool>,
}

impl<T: PartialEq + 'static> Default for WatchOptions<T> {
    fn default() -> Self {
        Self {
            immediate: false,
            equals: Rc::new(|a: &T, b: &T| a == b),
        }
    }
}

impl<T> Clone for WatchOptions<T> {
    fn clone(&self) -> Self {
        Self {
            immediate: self.immediate,
            equals: self.equals.clone(),
        }
    }
}

impl<T> WatchOptions<T> {
    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    pub fn equals(mut self, f: impl Fn(&T, &T) -> bool + 'static) -> Self {
        self.equals = Rc::new(f);
        self
    }
}

type Getter<T> = Box<dyn Fn(&Runtime) -> anyhow::Result<T>>;
type Callback<T> = Box<dyn Fn(&Runtime, &T, Option<&T>) -> anyhow::Result<()>>;

struct WatchState<T> {
    getter: Getter<T>,
    callback: Callback<T>,
    equals: Rc<dyn Fn(&T, &T) -> bool>,
    value: RefCell<Option<T>>,
}

impl<T: Clone + 'static> WatchState<T> {
    fn check(&self, rt: &Runtime) -> anyhow::Result<()> {
        let next = (self.getter)(rt)?;
        let changed = match &*self.value.borrow() {
            Some(prev) => !(self.equals)(prev, &next),
            None => true,
        };
        if !changed {
            return Ok(());
        }
        let prev = self.value.replace(Some(next.clone()));
        rt.untrack(|| (self.callback)(rt, &next, prev.as_ref()))
    }
}

/// User observer: re-evaluates a watched expression on every notification
/// and calls back with `(new, Some(old))` when the value changed.
///
/// The callback runs untracked, so reads inside it do not become
/// dependencies of the watcher.
pub struct Watcher<T> {
    computation: Computation,
    state: Rc<WatchState<T>>,
    rt: WeakRuntime,
}

impl<T: Clone + 'static> Watcher<T> {
    /// Creates the watcher and evaluates `getter` once to establish the
    /// baseline subscription.
    pub fn new(
        rt: &Runtime,
        label: impl Into<Cow<'static, str>>,
        getter: impl Fn(&Runtime) -> anyhow::Result<T> + 'static,
        callback: impl Fn(&Runtime, &T, Option<&T>) -> anyhow::Result<()> + 'static,
        options: WatchOptions<T>,
    ) -> Result<Self> {
        let label = label.into();
        let state = Rc::new(WatchState {
            getter: Box::new(getter),
            callback: Box::new(callback),
            equals: options.equals,
            value: RefCell::new(None),
        });
        let job: Job = {
            let state = Rc::downgrade(&state);
            Rc::new(move |rt: &Runtime| match state.upgrade() {
                Some(state) => state.check(rt),
                None => Ok(()),
            })
        };
        let id = rt.create_node(ComputationKind::Observer, label.clone(), Some(job), None);
        let watcher = Watcher {
            computation: Computation { id },
            state,
            rt: rt.downgrade(),
        };

        let initial = {
            let _frame = rt.enter(id);
            (watcher.state.getter)(rt)
        }
        .map_err(|source| Error::Evaluation {
            label: label.to_string(),
            source,
        })?;
        *watcher.state.value.borrow_mut() = Some(initial.clone());

        if options.immediate {
            rt.untrack(|| (watcher.state.callback)(rt, &initial, None))
                .map_err(|source| Error::Evaluation {
                    label: label.to_string(),
                    source,
                })?;
        }
        Ok(watcher)
    }

    /// Value seen by the last evaluation.
    pub fn value(&self) -> Option<T> {
        self.state.value.borrow().clone()
    }

    pub fn computation(&self) -> Computation {
        self.computation
    }
}

impl<T> Drop for Watcher<T> {
    fn drop(&mut self) {
        if let Some(rt) = self.rt.upgrade() {
            rt.release_node(self.computation.id);
        }
    }
}
