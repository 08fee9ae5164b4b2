use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use quark_core::{Computed, Dispose, PostUpdateQueue, Runtime, Scope, Signal, WatchOptions, Watcher};

use crate::{
    AttributeStore, ComponentDef, Controller, ElementError, Event, Lifecycle, LifecycleState,
    ListenerRegistry, ReflectionBridge, Result, Value,
};

/// The non-generic core of one component instance.
///
/// Owns everything reactive about the instance: the attribute store and the
/// bridges over it, state slots, computed properties, watch bindings,
/// controllers, event bindings and the post-update queue. [`Element`] adds
/// the component and its renderer on top.
///
/// Every entry point that changes something (property or state writes,
/// attribute notifications) is one burst: renders that depend on it run once,
/// after it, and post-update callbacks run after that render.
///
/// [`Element`]: crate::Element
pub struct Host {
    this: Weak<Host>,
    rt: Runtime,
    def: Rc<ComponentDef>,
    store: RefCell<Box<dyn AttributeStore>>,
    bridges: Vec<ReflectionBridge>,
    by_attribute: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
    states: HashMap<String, Signal<Value>>,
    // created on first read
    computeds: RefCell<HashMap<String, Rc<Computed<Value>>>>,
    watchers: RefCell<Vec<Watcher<Value>>>,
    controllers: RefCell<Vec<Rc<dyn Controller>>>,
    listeners: Rc<ListenerRegistry>,
    post_update: PostUpdateQueue,
    /// Raw value an attribute had before a boolean `"false"` correction.
    stash: RefCell<HashMap<String, Option<String>>>,
    lifecycle: Cell<LifecycleState>,
    mounted: Cell<bool>,
    hooks: RefCell<Option<Rc<dyn Lifecycle>>>,
    scope: Scope,
}

impl Host {
    /// Builds an instance of `def` over `store` and installs its watch
    /// bindings, firing the `immediate` ones.
    pub fn new(
        rt: &Runtime,
        def: Rc<ComponentDef>,
        store: impl AttributeStore + 'static,
    ) -> Result<Rc<Self>> {
        let bridges: Vec<ReflectionBridge> = def
            .props()
            .iter()
            .cloned()
            .map(ReflectionBridge::new)
            .collect();
        let by_attribute: HashMap<String, usize> = bridges
            .iter()
            .enumerate()
            .map(|(i, b)| (b.attribute().to_owned(), i))
            .collect();
        let by_name: HashMap<String, usize> = bridges
            .iter()
            .enumerate()
            .map(|(i, b)| (b.name().to_owned(), i))
            .collect();
        let states: HashMap<String, Signal<Value>> = def
            .states()
            .iter()
            .map(|s| (s.name.clone(), Signal::new(s.initial.clone())))
            .collect();

        let host = Rc::new_cyclic(|this| Host {
            this: this.clone(),
            rt: rt.clone(),
            def,
            store: RefCell::new(Box::new(store)),
            bridges,
            by_attribute,
            by_name,
            states,
            computeds: RefCell::new(HashMap::new()),
            watchers: RefCell::new(Vec::new()),
            controllers: RefCell::new(Vec::new()),
            listeners: Rc::new(ListenerRegistry::new()),
            post_update: PostUpdateQueue::new(),
            stash: RefCell::new(HashMap::new()),
            lifecycle: Cell::new(LifecycleState::Constructed),
            mounted: Cell::new(false),
            hooks: RefCell::new(None),
            scope: Scope::new(),
        });
        host.install_watchers()?;
        Ok(host)
    }

    fn install_watchers(&self) -> Result<()> {
        for decl in self.def.watches() {
            let label = format!("<{}> watch `{}`", self.tag(), decl.path);
            let options: WatchOptions<Value> = decl.options.clone();
            let watcher = Watcher::new(
                &self.rt,
                label,
                {
                    let this = self.this.clone();
                    let path = decl.path.clone();
                    move |_rt| {
                        let host = this
                            .upgrade()
                            .ok_or_else(|| anyhow::anyhow!("instance was dropped"))?;
                        Ok(host.get(&path)?)
                    }
                },
                {
                    let this = self.this.clone();
                    let callback = decl.callback.clone();
                    move |_rt, new, old| match this.upgrade() {
                        Some(host) => callback(&host, new, old),
                        None => Ok(()),
                    }
                },
                options,
            )?;
            self.watchers.borrow_mut().push(watcher);
        }
        Ok(())
    }

    pub fn runtime(&self) -> &Runtime {
        &self.rt
    }

    pub fn definition(&self) -> &ComponentDef {
        &self.def
    }

    pub fn tag(&self) -> &str {
        self.def.tag()
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.lifecycle.get()
    }

    /// Whether the first render completed.
    pub fn is_mounted(&self) -> bool {
        self.mounted.get()
    }

    /// Instance scope; released on disconnect.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    fn bridge(&self, name: &str) -> Option<&ReflectionBridge> {
        self.by_name.get(name).map(|&i| &self.bridges[i])
    }

    /// Tracked read of a declared property.
    pub fn prop(&self, name: &str) -> Result<Value> {
        let bridge = self
            .bridge(name)
            .ok_or_else(|| ElementError::UnknownProperty(name.to_owned()))?;
        Ok(bridge.get(&self.rt, &**self.store.borrow()))
    }

    /// Writes the serialized form of `value` to the property's attribute.
    ///
    /// The change reaches dependents through the attribute notification, the
    /// same way an external attribute write does.
    pub fn set_property(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let bridge = self
            .bridge(name)
            .ok_or_else(|| ElementError::UnknownProperty(name.to_owned()))?;
        match bridge.serialize(&value.into()) {
            Some(raw) => self.set_attribute(bridge.attribute(), &raw),
            None => self.remove_attribute(bridge.attribute()),
        }
    }

    /// Tracked read of a state slot.
    pub fn state(&self, name: &str) -> Result<Value> {
        let slot = self
            .states
            .get(name)
            .ok_or_else(|| ElementError::UnknownState(name.to_owned()))?;
        Ok(slot.get(&self.rt))
    }

    /// Returns whether the value changed. Same-value writes do nothing.
    pub fn set_state(&self, name: &str, value: impl Into<Value>) -> Result<bool> {
        let slot = self
            .states
            .get(name)
            .ok_or_else(|| ElementError::UnknownState(name.to_owned()))?;
        let value = value.into();
        let old = slot.get_untracked();
        if old == value {
            return Ok(false);
        }
        self.rt.batch(|| -> Result<()> {
            slot.set(&self.rt, value.clone())?;
            self.enqueue_updated(name, old, value);
            Ok(())
        })??;
        Ok(true)
    }

    /// Tracked read of a computed property.
    ///
    /// The computed is created on first read and cached until one of its
    /// sources changes. After disconnect the getter runs uncached.
    pub fn computed(&self, name: &str) -> Result<Value> {
        let decl = self
            .def
            .computeds()
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| ElementError::UnknownMember(name.to_owned()))?;

        if self.lifecycle.get() == LifecycleState::Disconnected {
            return self
                .rt
                .untrack(|| (decl.getter)(self))
                .map_err(|source| {
                    quark_core::Error::Evaluation {
                        label: name.to_owned(),
                        source,
                    }
                    .into()
                });
        }

        let existing = self.computeds.borrow().get(name).cloned();
        let computed = match existing {
            Some(c) => c,
            None => {
                let getter = decl.getter.clone();
                let this = self.this.clone();
                let c = Rc::new(Computed::new(
                    &self.rt,
                    format!("<{}> computed `{name}`", self.tag()),
                    move |_rt| {
                        let host = this
                            .upgrade()
                            .ok_or_else(|| anyhow::anyhow!("instance was dropped"))?;
                        getter(&host)
                    },
                ));
                self.computeds
                    .borrow_mut()
                    .insert(name.to_owned(), c.clone());
                c
            }
        };
        Ok(computed.get(&self.rt)?)
    }

    /// Reads a property, state slot or computed, in that order of lookup.
    pub fn get(&self, name: &str) -> Result<Value> {
        if self.by_name.contains_key(name) {
            return self.prop(name);
        }
        if self.states.contains_key(name) {
            return self.state(name);
        }
        if self.def.computeds().iter().any(|c| c.name == name) {
            return self.computed(name);
        }
        Err(ElementError::UnknownMember(name.to_owned()))
    }

    /// Assigns a property or state slot. Computeds are read-only.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        if self.by_name.contains_key(name) {
            return self.set_property(name, value);
        }
        if self.states.contains_key(name) {
            return self.set_state(name, value).map(|_| ());
        }
        if self.def.computeds().iter().any(|c| c.name == name) {
            return Err(ElementError::ReadOnly(name.to_owned()));
        }
        Err(ElementError::UnknownMember(name.to_owned()))
    }

    /// Raw attribute value, untracked.
    pub fn attribute(&self, key: &str) -> Option<String> {
        self.store.borrow().get_raw(key)
    }

    /// Writes the store, then delivers the change notification if the raw
    /// value actually changed.
    pub fn set_attribute(&self, key: &str, value: &str) -> Result<()> {
        let old = self.store.borrow().get_raw(key);
        if old.as_deref() == Some(value) {
            return Ok(());
        }
        self.store.borrow_mut().set_raw(key, value);
        self.attribute_changed(key, old.as_deref(), Some(value))
    }

    pub fn remove_attribute(&self, key: &str) -> Result<()> {
        let Some(old) = self.store.borrow().get_raw(key) else {
            return Ok(());
        };
        self.store.borrow_mut().remove_raw(key);
        self.attribute_changed(key, Some(&old), None)
    }

    /// Inbound attribute notification. The store already holds `new`.
    ///
    /// Undeclared and unobserved keys are ignored. A boolean attribute set to
    /// the literal `"false"` is corrected to absence first; the value it had
    /// before is kept so the eventual update reports it as the old value.
    pub fn attribute_changed(&self, key: &str, old: Option<&str>, new: Option<&str>) -> Result<()> {
        let Some(bridge) = self.by_attribute.get(key).map(|&i| &self.bridges[i]) else {
            log::trace!("<{}> ignores undeclared attribute `{key}`", self.tag());
            return Ok(());
        };
        if !bridge.is_observed() {
            return Ok(());
        }
        let name = bridge.name();

        if old != new && new == Some("false") && self.def.is_boolean_attribute(key) {
            self.stash
                .borrow_mut()
                .insert(name.to_owned(), old.map(str::to_owned));
            return self.set_property(name, "false");
        }

        let stashed = self.stash.borrow_mut().remove(name);
        self.rt.batch(|| -> Result<()> {
            bridge.dep().notify(&self.rt)?;
            if self.accepts_updates() {
                let previous = stashed.unwrap_or_else(|| old.map(str::to_owned));
                let old_value = bridge.resolve(previous.as_deref());
                let new_value = bridge.resolve(new);
                self.enqueue_updated(name, old_value, new_value);
            }
            Ok(())
        })?
    }

    /// Registers a controller once. It is told about the connection right
    /// away when the instance is already connected.
    pub fn add_controller(&self, controller: Rc<dyn Controller>) {
        {
            let mut list = self.controllers.borrow_mut();
            if list.iter().any(|c| Rc::ptr_eq(c, &controller)) {
                return;
            }
            list.push(controller.clone());
        }
        if self.lifecycle.get().is_live() {
            self.rt.untrack(|| controller.host_connected(self));
        }
    }

    pub fn remove_controller(&self, controller: &Rc<dyn Controller>) -> bool {
        let mut list = self.controllers.borrow_mut();
        let before = list.len();
        list.retain(|c| !Rc::ptr_eq(c, controller));
        list.len() != before
    }

    pub fn controller_count(&self) -> usize {
        self.controllers.borrow().len()
    }

    /// Binds `handler` to `event` until the returned handle runs or the
    /// instance disconnects.
    pub fn on(&self, event: impl Into<String>, handler: impl Fn(&Event) + 'static) -> Dispose {
        let id = self.listeners.on(event, handler);
        let listeners = Rc::downgrade(&self.listeners);
        Dispose::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners.off(id);
            }
        })
    }

    /// Dispatches a bubbling event. Returns how many handlers ran.
    pub fn emit(&self, event: impl Into<String>, detail: impl Into<Value>) -> usize {
        self.dispatch(&Event::new(event, detail))
    }

    pub fn dispatch(&self, event: &Event) -> usize {
        self.rt.untrack(|| self.listeners.emit(event))
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Runs `f` as one burst.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> Result<R> {
        Ok(self.rt.batch(f)?)
    }

    /// Post-update callbacks waiting for the next render.
    pub fn pending_updates(&self) -> usize {
        self.post_update.len()
    }

    fn accepts_updates(&self) -> bool {
        self.mounted.get() && self.lifecycle.get().is_live()
    }

    fn enqueue_updated(&self, name: &str, old: Value, new: Value) {
        if !self.accepts_updates() {
            return;
        }
        let Some(hooks) = self.hooks.borrow().clone() else {
            return;
        };
        if !self.rt.untrack(|| hooks.should_update(name, &old, &new)) {
            return;
        }
        let this = self.this.clone();
        let name = name.to_owned();
        self.post_update.push(move || {
            if let Some(host) = this.upgrade() {
                hooks.updated(&host, &name, &old, &new);
            }
        });
    }

    pub(crate) fn set_hooks(&self, hooks: Rc<dyn Lifecycle>) {
        *self.hooks.borrow_mut() = Some(hooks);
    }

    pub(crate) fn set_lifecycle(&self, state: LifecycleState) {
        let prev = self.lifecycle.replace(state);
        if prev != state {
            log::debug!("<{}> {prev:?} -> {state:?}", self.tag());
        }
    }

    /// Marks the first render done. Returns `true` only the first time.
    pub(crate) fn mark_mounted(&self) -> bool {
        !self.mounted.replace(true)
    }

    pub(crate) fn controllers(&self) -> Vec<Rc<dyn Controller>> {
        self.controllers.borrow().clone()
    }

    /// Copies every observed attribute into its property once, normalising
    /// the raw values.
    pub(crate) fn push_attributes(&self) -> Result<()> {
        self.rt.batch(|| -> Result<()> {
            for bridge in self.bridges.iter().filter(|b| b.is_observed()) {
                let raw = self.store.borrow().get_raw(bridge.attribute());
                self.set_property(bridge.name(), Value::from_raw(raw.as_deref()))?;
            }
            Ok(())
        })?
    }

    pub(crate) fn flush_post_update(&self) -> usize {
        self.rt.untrack(|| self.post_update.flush())
    }

    pub(crate) fn clear_listeners(&self) {
        self.listeners.clear();
    }

    /// Drops every computation of the instance and enters `Disconnected`.
    pub(crate) fn release(&self) {
        self.set_lifecycle(LifecycleState::Disconnected);
        self.post_update.clear();
        self.stash.borrow_mut().clear();
        self.scope.dispose(&self.rt);
        let watchers = std::mem::take(&mut *self.watchers.borrow_mut());
        drop(watchers);
        let computeds = std::mem::take(&mut *self.computeds.borrow_mut());
        drop(computeds);
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        self.scope.dispose(&self.rt);
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("tag", &self.tag())
            .field("lifecycle", &self.lifecycle.get())
            .field("mounted", &self.mounted.get())
            .finish_non_exhaustive()
    }
}
