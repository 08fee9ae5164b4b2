use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::{Computation, Runtime};

/// Ownership boundary for computations and cleanups.
///
/// An instance keeps one scope; disposing it releases every computation it
/// adopted (dropping their subscriptions) and runs its disposers. Children
/// are disposed before their parent.
pub struct Scope {
    inner: Rc<ScopeInner>,
}

struct ScopeInner {
    computations: RefCell<Vec<Computation>>,
    disposers: RefCell<Vec<Box<dyn FnOnce()>>>,
    children: RefCell<Vec<Scope>>,
    disposed: Cell<bool>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                computations: RefCell::new(Vec::new()),
                disposers: RefCell::new(Vec::new()),
                children: RefCell::new(Vec::new()),
                disposed: Cell::new(false),
            }),
        }
    }

    /// Takes ownership of `c`. Adopting into a disposed scope releases `c`
    /// right away.
    pub fn adopt(&self, rt: &Runtime, c: Computation) {
        if self.inner.disposed.get() {
            c.dispose(rt);
            return;
        }
        self.inner.computations.borrow_mut().push(c);
    }

    pub fn add_disposer(&self, disposer: impl FnOnce() + 'static) {
        if self.inner.disposed.get() {
            disposer();
            return;
        }
        self.inner.disposers.borrow_mut().push(Box::new(disposer));
    }

    pub fn child(&self) -> Scope {
        let child = Scope::new();
        if self.inner.disposed.get() {
            child.inner.disposed.set(true);
        } else {
            self.inner.children.borrow_mut().push(child.clone());
        }
        child
    }

    pub fn len(&self) -> usize {
        self.inner.computations.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.computations.borrow().is_empty()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Runs at most once; later calls are no-ops.
    pub fn dispose(&self, rt: &Runtime) {
        if self.inner.disposed.replace(true) {
            return;
        }

        // Dispose children first
        let children = std::mem::take(&mut *self.inner.children.borrow_mut());
        for child in children {
            child.dispose(rt);
        }

        let computations = std::mem::take(&mut *self.inner.computations.borrow_mut());
        for c in computations {
            c.dispose(rt);
        }

        let disposers = std::mem::take(&mut *self.inner.disposers.borrow_mut());
        for disposer in disposers {
            disposer();
        }
    }
}

impl Clone for Scope {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}
