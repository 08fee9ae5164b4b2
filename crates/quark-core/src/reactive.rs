use std::borrow::Cow;
use std::cell::{Cell, RefCell, RefMut};
use std::rc::{Rc, Weak};

use bitflags::bitflags;
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::RuntimeConfig;
use crate::scheduler::Scheduler;

new_key_type! {
    /// Graph identity of a dependency cell.
    pub struct DepId;
    /// Graph identity of a computation.
    pub struct ComputationId;
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub(crate) struct NodeFlags: u8 {
        /// Lazy computed whose cache no longer reflects its sources.
        const DIRTY = 1 << 0;
        const RUNNING = 1 << 1;
        const QUEUED = 1 << 2;
        /// Last evaluation of a lazy computed failed; readers have not been
        /// told about any change since.
        const FAILED = 1 << 3;
    }
}

/// Evaluation mode of a computation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComputationKind {
    /// Push-based: re-runs through the scheduler on every notification.
    Render,
    /// Pull-based: notification only invalidates the cache.
    Computed,
    /// Push-based user watch binding.
    Observer,
}

pub(crate) type Job = Rc<dyn Fn(&Runtime) -> anyhow::Result<()>>;

#[derive(Default)]
pub(crate) struct DepNode {
    pub(crate) subscribers: SmallVec<[ComputationId; 4]>,
}

pub(crate) struct Node {
    pub(crate) kind: ComputationKind,
    pub(crate) label: Cow<'static, str>,
    pub(crate) seq: u64,
    pub(crate) flags: NodeFlags,
    pub(crate) sources: SmallVec<[DepId; 4]>,
    pub(crate) job: Option<Job>,
    /// Output cell of a lazy computed; readers subscribe to it.
    pub(crate) output: Option<DepId>,
}

#[derive(Default)]
pub(crate) struct Graph {
    pub(crate) deps: SlotMap<DepId, DepNode>,
    pub(crate) nodes: SlotMap<ComputationId, Node>,
    // innermost evaluation last; `None` frames suppress tracking
    pub(crate) stack: Vec<Option<ComputationId>>,
    pub(crate) scheduler: Scheduler,
    next_seq: u64,
}

impl Graph {
    fn unlink_sources(&mut self, id: ComputationId) {
        let sources = match self.nodes.get_mut(id) {
            Some(node) => std::mem::take(&mut node.sources),
            None => return,
        };
        for dep in sources {
            if let Some(d) = self.deps.get_mut(dep) {
                d.subscribers.retain(|s| *s != id);
            }
        }
    }

    fn remove_dep(&mut self, dep: DepId) {
        if let Some(node) = self.deps.remove(dep) {
            for sub in node.subscribers {
                if let Some(n) = self.nodes.get_mut(sub) {
                    n.sources.retain(|d| *d != dep);
                }
            }
        }
    }

    fn link(&mut self, dep: DepId, id: ComputationId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if node.sources.contains(&dep) {
            return;
        }
        let Some(d) = self.deps.get_mut(dep) else {
            return;
        };
        node.sources.push(dep);
        d.subscribers.push(id);
    }
}

pub(crate) struct RuntimeInner {
    pub(crate) graph: RefCell<Graph>,
    /// Cells dropped while the graph was borrowed; reclaimed on next access.
    released: RefCell<Vec<DepId>>,
    /// Open [`Runtime::batch`] calls.
    pub(crate) batch_depth: Cell<usize>,
    pub(crate) flushing: Cell<bool>,
    config: RuntimeConfig,
}

/// Handle to one reactive graph.
///
/// Every reactive read takes the runtime explicitly, so the innermost
/// evaluating computation is always the top of *this* runtime's stack.
/// Cloning is cheap and yields a handle to the same graph.
#[derive(Clone)]
pub struct Runtime {
    pub(crate) inner: Rc<RuntimeInner>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.graph.try_borrow() {
            Ok(g) => f
                .debug_struct("Runtime")
                .field("cells", &g.deps.len())
                .field("computations", &g.nodes.len())
                .field("depth", &g.stack.len())
                .finish(),
            Err(_) => f.debug_struct("Runtime").finish_non_exhaustive(),
        }
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                graph: RefCell::new(Graph::default()),
                released: RefCell::new(Vec::new()),
                batch_depth: Cell::new(0),
                flushing: Cell::new(false),
                config,
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Whether both handles point at the same graph.
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakRuntime {
        WeakRuntime(Rc::downgrade(&self.inner))
    }

    pub(crate) fn graph(&self) -> RefMut<'_, Graph> {
        let mut g = self.inner.graph.borrow_mut();
        let released = std::mem::take(&mut *self.inner.released.borrow_mut());
        for dep in released {
            g.remove_dep(dep);
        }
        g
    }

    pub(crate) fn alloc_dep(&self) -> DepId {
        self.graph().deps.insert(DepNode::default())
    }

    pub(crate) fn release_dep(&self, dep: DepId) {
        match self.inner.graph.try_borrow_mut() {
            Ok(mut g) => g.remove_dep(dep),
            Err(_) => self.inner.released.borrow_mut().push(dep),
        }
    }

    /// Registers `dep` with the innermost tracking frame, if any.
    pub(crate) fn track(&self, dep: DepId) {
        let mut g = self.graph();
        if let Some(Some(top)) = g.stack.last().copied() {
            g.link(dep, top);
        }
    }

    /// Copy of a cell's subscriber set, safe to iterate while the set changes.
    pub(crate) fn subscribers(&self, dep: DepId) -> SmallVec<[ComputationId; 4]> {
        self.graph()
            .deps
            .get(dep)
            .map(|d| d.subscribers.clone())
            .unwrap_or_default()
    }

    pub(crate) fn create_node(
        &self,
        kind: ComputationKind,
        label: Cow<'static, str>,
        job: Option<Job>,
        output: Option<DepId>,
    ) -> ComputationId {
        let mut g = self.graph();
        let seq = g.next_seq;
        g.next_seq += 1;
        let flags = if kind == ComputationKind::Computed {
            NodeFlags::DIRTY
        } else {
            NodeFlags::empty()
        };
        g.nodes.insert(Node {
            kind,
            label,
            seq,
            flags,
            sources: SmallVec::new(),
            job,
            output,
        })
    }

    /// Removes a computation and every subscription it holds.
    pub(crate) fn release_node(&self, id: ComputationId) {
        let node = {
            let mut g = self.graph();
            g.unlink_sources(id);
            let node = g.nodes.remove(id);
            if let Some(node) = &node {
                g.scheduler.forget(node.seq);
            }
            node
        };
        // the job may own cells; they release themselves once the borrow is gone
        drop(node);
    }

    pub(crate) fn contains(&self, id: ComputationId) -> bool {
        self.graph().nodes.contains_key(id)
    }

    pub(crate) fn label_of(&self, id: ComputationId) -> String {
        self.graph()
            .nodes
            .get(id)
            .map(|n| n.label.to_string())
            .unwrap_or_default()
    }

    pub(crate) fn kind_of(&self, id: ComputationId) -> Option<ComputationKind> {
        self.graph().nodes.get(id).map(|n| n.kind)
    }

    pub(crate) fn is_dirty(&self, id: ComputationId) -> bool {
        self.graph()
            .nodes
            .get(id)
            .is_some_and(|n| n.flags.contains(NodeFlags::DIRTY))
    }

    pub(crate) fn set_dirty(&self, id: ComputationId, dirty: bool) {
        if let Some(node) = self.graph().nodes.get_mut(id) {
            node.flags.set(NodeFlags::DIRTY, dirty);
            if !dirty {
                node.flags.remove(NodeFlags::FAILED);
            }
        }
    }

    /// Leaves a lazy computed dirty after a failed evaluation. The next
    /// stale mark still reaches its readers.
    pub(crate) fn set_failed(&self, id: ComputationId) {
        if let Some(node) = self.graph().nodes.get_mut(id) {
            node.flags.insert(NodeFlags::DIRTY | NodeFlags::FAILED);
        }
    }

    /// Makes `id` the innermost tracking frame after dropping all of its
    /// previous subscriptions. The frame is popped when the guard drops.
    pub(crate) fn enter(&self, id: ComputationId) -> EvalGuard<'_> {
        let mut g = self.graph();
        g.unlink_sources(id);
        if let Some(node) = g.nodes.get_mut(id) {
            node.flags.insert(NodeFlags::RUNNING);
            if self.inner.config.trace_evaluations {
                log::trace!("evaluate `{}` ({:?})", node.label, node.kind);
            }
        }
        g.stack.push(Some(id));
        EvalGuard { rt: self, id: Some(id) }
    }

    /// Runs `f` without recording any reads.
    pub fn untrack<R>(&self, f: impl FnOnce() -> R) -> R {
        self.graph().stack.push(None);
        let _guard = EvalGuard { rt: self, id: None };
        f()
    }

    /// The innermost evaluating computation.
    pub fn active(&self) -> Option<ComputationId> {
        self.graph().stack.last().copied().flatten()
    }

    /// Whether a read right now would register a dependency.
    pub fn is_tracking(&self) -> bool {
        self.active().is_some()
    }

    /// Number of live tracking frames, untracked ones included.
    pub fn depth(&self) -> usize {
        self.graph().stack.len()
    }

    /// Number of computations currently alive in the graph.
    pub fn live_computations(&self) -> usize {
        self.graph().nodes.len()
    }

    /// Cells read by the last evaluation of `id`.
    pub fn sources_of(&self, id: ComputationId) -> Vec<DepId> {
        self.graph()
            .nodes
            .get(id)
            .map(|n| n.sources.to_vec())
            .unwrap_or_default()
    }
}

#[derive(Clone)]
pub(crate) struct WeakRuntime(Weak<RuntimeInner>);

impl WeakRuntime {
    pub(crate) fn upgrade(&self) -> Option<Runtime> {
        self.0.upgrade().map(|inner| Runtime { inner })
    }
}

/// Pops a tracking frame on every exit path, unwinding included.
pub(crate) struct EvalGuard<'a> {
    rt: &'a Runtime,
    id: Option<ComputationId>,
}

impl Drop for EvalGuard<'_> {
    fn drop(&mut self) {
        let Ok(mut g) = self.rt.inner.graph.try_borrow_mut() else {
            log::error!("tracking frame could not be popped: graph is borrowed");
            return;
        };
        g.stack.pop();
        if let Some(id) = self.id
            && let Some(node) = g.nodes.get_mut(id)
        {
            node.flags.remove(NodeFlags::RUNNING);
        }
    }
}
