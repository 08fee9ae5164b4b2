use std::cell::RefCell;
use std::rc::Rc;

use slotmap::{SlotMap, new_key_type};

use crate::Value;

new_key_type! {
    pub struct ListenerId;
}

/// A custom event dispatched by an instance.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub name: String,
    pub detail: Value,
    /// Propagation hint for the host platform. Handlers bound on this
    /// instance run either way.
    pub bubbles: bool,
}

impl Event {
    /// Bubbling event carrying `detail`.
    pub fn new(name: impl Into<String>, detail: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            detail: detail.into(),
            bubbles: true,
        }
    }

    pub fn bubbles(mut self, bubbles: bool) -> Self {
        self.bubbles = bubbles;
        self
    }
}

type Handler = Rc<dyn Fn(&Event)>;

/// Event bindings of one instance.
#[derive(Default)]
pub struct ListenerRegistry {
    bindings: RefCell<SlotMap<ListenerId, (String, Handler)>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, event: impl Into<String>, handler: impl Fn(&Event) + 'static) -> ListenerId {
        self.bindings
            .borrow_mut()
            .insert((event.into(), Rc::new(handler)))
    }

    /// Returns whether the binding was still live.
    pub fn off(&self, id: ListenerId) -> bool {
        self.bindings.borrow_mut().remove(id).is_some()
    }

    /// Calls every handler bound to `event.name`. Handlers may bind or unbind
    /// while the event is being delivered; the set delivered to is fixed when
    /// dispatch starts. Returns how many ran.
    pub fn emit(&self, event: &Event) -> usize {
        let handlers: Vec<Handler> = self
            .bindings
            .borrow()
            .values()
            .filter(|(name, _)| *name == event.name)
            .map(|(_, h)| h.clone())
            .collect();
        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }

    pub fn clear(&self) {
        let dropped = std::mem::take(&mut *self.bindings.borrow_mut());
        drop(dropped);
    }

    pub fn len(&self) -> usize {
        self.bindings.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.borrow().is_empty()
    }
}
