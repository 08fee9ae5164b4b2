use std::cell::RefCell;
use std::rc::Rc;

use crate::{Dep, Result, Runtime};

/// A value paired with its own dependency cell.
///
/// Reads through [`get`](Signal::get) / [`with`](Signal::with) subscribe the
/// evaluating computation; writes notify subscribers after the new value is
/// stored, so re-evaluations always observe it.
pub struct Signal<T>(Rc<SignalInner<T>>);

struct SignalInner<T> {
    value: RefCell<T>,
    dep: Dep,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Signal").field(&*self.0.value.borrow()).finish()
    }
}

impl<T> Signal<T> {
    pub fn new(value: T) -> Self {
        Self(Rc::new(SignalInner {
            value: RefCell::new(value),
            dep: Dep::new(),
        }))
    }

    pub fn get(&self, rt: &Runtime) -> T
    where
        T: Clone,
    {
        self.0.dep.depend(rt);
        self.0.value.borrow().clone()
    }

    pub fn with<R>(&self, rt: &Runtime, f: impl FnOnce(&T) -> R) -> R {
        self.0.dep.depend(rt);
        f(&self.0.value.borrow())
    }

    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.0.value.borrow().clone()
    }

    /// Stores `v` and notifies if it differs from the current value.
    /// Returns whether anything changed.
    pub fn set(&self, rt: &Runtime, v: T) -> Result<bool>
    where
        T: PartialEq,
    {
        if *self.0.value.borrow() == v {
            return Ok(false);
        }
        *self.0.value.borrow_mut() = v;
        self.0.dep.notify(rt)?;
        Ok(true)
    }

    /// Stores `v` unconditionally and returns the previous value.
    pub fn replace(&self, rt: &Runtime, v: T) -> Result<T> {
        let prev = self.0.value.replace(v);
        self.0.dep.notify(rt)?;
        Ok(prev)
    }

    pub fn update(&self, rt: &Runtime, f: impl FnOnce(&mut T)) -> Result<()> {
        f(&mut self.0.value.borrow_mut());
        self.0.dep.notify(rt)
    }

    pub fn dep(&self) -> &Dep {
        &self.0.dep
    }
}

pub fn signal<T>(t: T) -> Signal<T> {
    Signal::new(t)
}
