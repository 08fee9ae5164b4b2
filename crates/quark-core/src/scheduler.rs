//! Update scheduling.
//!
//! A notification never re-evaluates anything inline: it marks subscribers
//! stale, and push-mode computations land in a queue that is flushed once the
//! current burst settles. A burst is either a single notification or
//! everything inside [`Runtime::batch`].
//!
//! The queue is ordered by creation sequence, so watch bindings created at
//! instance construction run before the instance's render, and a computation
//! sits in the queue at most once no matter how many of its cells notify.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::reactive::{ComputationId, ComputationKind, DepId, NodeFlags};
use crate::{Error, Result, Runtime};

#[derive(Default)]
pub(crate) struct Scheduler {
    queue: BTreeMap<u64, ComputationId>,
    runs: HashMap<ComputationId, u32>,
}

impl Scheduler {
    pub(crate) fn forget(&mut self, seq: u64) {
        self.queue.remove(&seq);
    }
}

impl Runtime {
    pub(crate) fn notify_dep(&self, dep: DepId) -> Result<()> {
        for sub in self.subscribers(dep) {
            self.mark_stale(sub);
        }
        self.flush_if_idle()
    }

    /// Records that `id` no longer reflects its sources.
    ///
    /// Lazy computeds only flip their dirty flag and pass the mark on to
    /// whoever reads them; push-mode computations are queued once.
    pub(crate) fn mark_stale(&self, id: ComputationId) {
        let downstream = {
            let mut guard = self.graph();
            let g = &mut *guard;
            let Some(node) = g.nodes.get_mut(id) else {
                return;
            };
            match node.kind {
                ComputationKind::Computed => {
                    // readers already know, unless the last evaluation failed
                    if node.flags.contains(NodeFlags::DIRTY)
                        && !node.flags.contains(NodeFlags::FAILED)
                    {
                        return;
                    }
                    node.flags.remove(NodeFlags::FAILED);
                    node.flags.insert(NodeFlags::DIRTY);
                    let output = node.output;
                    output
                        .and_then(|dep| g.deps.get(dep))
                        .map(|d| d.subscribers.clone())
                }
                ComputationKind::Render | ComputationKind::Observer => {
                    if node.flags.contains(NodeFlags::QUEUED) {
                        return;
                    }
                    node.flags.insert(NodeFlags::QUEUED);
                    let seq = node.seq;
                    g.scheduler.queue.insert(seq, id);
                    None
                }
            }
        };
        for sub in downstream.into_iter().flatten() {
            self.mark_stale(sub);
        }
    }

    /// Runs `f` as one burst: notifications inside it only queue work, and
    /// the queue is flushed when the outermost batch closes.
    ///
    /// ```rust
    /// use quark_core::*;
    ///
    /// let rt = Runtime::new();
    /// let a = signal(1);
    /// let b = signal(2);
    /// let sums = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    ///
    /// let render = Computation::render(&rt, "sum", {
    ///     let (a, b, sums) = (a.clone(), b.clone(), sums.clone());
    ///     move |rt| {
    ///         sums.borrow_mut().push(a.get(rt) + b.get(rt));
    ///         Ok(())
    ///     }
    /// });
    /// render.evaluate(&rt).unwrap();
    ///
    /// rt.batch(|| {
    ///     a.set(&rt, 10)?;
    ///     b.set(&rt, 20)
    /// })
    /// .unwrap()
    /// .unwrap();
    /// assert_eq!(*sums.borrow(), vec![3, 30]);
    /// ```
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> Result<R> {
        let depth = &self.inner.batch_depth;
        depth.set(depth.get() + 1);
        let out = {
            let _guard = BatchGuard { rt: self };
            f()
        };
        self.flush_if_idle()?;
        Ok(out)
    }

    /// Whether a batch or a flush is currently open.
    pub fn is_batching(&self) -> bool {
        self.inner.batch_depth.get() > 0 || self.inner.flushing.get()
    }

    /// Takes `id` out of the queue, if it is there.
    pub(crate) fn dequeue(&self, id: ComputationId) {
        let mut guard = self.graph();
        let g = &mut *guard;
        if let Some(node) = g.nodes.get_mut(id)
            && node.flags.contains(NodeFlags::QUEUED)
        {
            node.flags.remove(NodeFlags::QUEUED);
            g.scheduler.queue.remove(&node.seq);
        }
    }

    /// Whether `id` is currently evaluating.
    pub(crate) fn is_running(&self, id: ComputationId) -> bool {
        self.graph()
            .nodes
            .get(id)
            .is_some_and(|n| n.flags.contains(NodeFlags::RUNNING))
    }

    pub(crate) fn flush_if_idle(&self) -> Result<()> {
        if self.is_batching() { Ok(()) } else { self.flush() }
    }

    /// Runs every queued computation until the queue is empty.
    ///
    /// Work queued by the computations themselves joins the same flush. A
    /// failing computation does not stop the others; the first error is
    /// returned and the rest are logged.
    pub fn flush(&self) -> Result<()> {
        if self.inner.flushing.replace(true) {
            return Ok(());
        }
        let _guard = FlushGuard { rt: self };
        self.graph().scheduler.runs.clear();
        let limit = self.config().max_reruns;
        let mut errors = Vec::new();

        loop {
            let (id, runs, label) = {
                let mut g = self.graph();
                let Some((_, id)) = g.scheduler.queue.pop_first() else {
                    break;
                };
                let label = match g.nodes.get_mut(id) {
                    Some(node) => {
                        node.flags.remove(NodeFlags::QUEUED);
                        node.label.to_string()
                    }
                    None => continue,
                };
                let runs = g.scheduler.runs.entry(id).or_insert(0);
                *runs += 1;
                (id, *runs, label)
            };
            if runs > limit {
                log::error!("`{label}` keeps invalidating itself; dropped after {limit} runs");
                errors.push(Error::RerunLimit { label, limit });
                continue;
            }
            if let Err(err) = self.run(id) {
                errors.push(err);
            }
        }

        let mut errors = errors.into_iter();
        match errors.next() {
            Some(first) => {
                for extra in errors {
                    log::error!("{extra}");
                }
                Err(first)
            }
            None => Ok(()),
        }
    }

    /// Evaluates a push-mode computation under its own tracking frame.
    pub(crate) fn run(&self, id: ComputationId) -> Result<()> {
        let (job, label) = {
            let g = self.graph();
            match g.nodes.get(id) {
                Some(node) => (node.job.clone(), node.label.to_string()),
                None => return Ok(()),
            }
        };
        let Some(job) = job else {
            return Ok(());
        };
        let result = {
            let _frame = self.enter(id);
            job(self)
        };
        result.map_err(|source| Error::Evaluation { label, source })
    }
}

struct BatchGuard<'a> {
    rt: &'a Runtime,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        let depth = &self.rt.inner.batch_depth;
        depth.set(depth.get().saturating_sub(1));
    }
}

struct FlushGuard<'a> {
    rt: &'a Runtime,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.rt.inner.flushing.set(false);
    }
}

/// FIFO of callbacks deferred until after the render that observed a change.
///
/// [`flush`](PostUpdateQueue::flush) takes the queued callbacks before running
/// them, so callbacks queued while flushing wait for the next flush, and each
/// callback runs exactly once.
#[derive(Default)]
pub struct PostUpdateQueue {
    pending: RefCell<VecDeque<Box<dyn FnOnce()>>>,
}

impl PostUpdateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, cb: impl FnOnce() + 'static) {
        self.pending.borrow_mut().push_back(Box::new(cb));
    }

    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }

    /// Runs and removes everything queued so far. Returns how many ran.
    pub fn flush(&self) -> usize {
        let batch = std::mem::take(&mut *self.pending.borrow_mut());
        let n = batch.len();
        for cb in batch {
            cb();
        }
        n
    }

    /// Drops queued callbacks without running them.
    pub fn clear(&self) {
        let dropped = std::mem::take(&mut *self.pending.borrow_mut());
        drop(dropped);
    }
}
