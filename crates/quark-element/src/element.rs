use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;

use quark_core::{Computation, Runtime};
use web_time::{Duration, Instant};

use crate::{
    AttributeStore, Component, ComponentDef, ElementError, Host, LifecycleState, Result,
    TreeRenderer,
};

/// Render counters of one element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub renders: u64,
    pub last: Option<Duration>,
    pub total: Duration,
}

impl RenderStats {
    fn record(self, took: Duration) -> Self {
        Self {
            renders: self.renders + 1,
            last: Some(took),
            total: self.total + took,
        }
    }
}

/// A component instance bound to its renderer.
///
/// The host platform drives it with [`connected`], [`attribute_changed`] and
/// [`disconnected`]; everything in between is reactive. The render
/// computation is created on connect and re-runs whenever something it read
/// changes.
///
/// [`connected`]: Element::connected
/// [`attribute_changed`]: Element::attribute_changed
/// [`disconnected`]: Element::disconnected
pub struct Element<C: Component, R: TreeRenderer<C::Output>> {
    host: Rc<Host>,
    component: Rc<C>,
    renderer: Rc<RefCell<R>>,
    render: Cell<Option<Computation>>,
    stats: Rc<Cell<RenderStats>>,
}

impl<C, R> Element<C, R>
where
    C: Component,
    R: TreeRenderer<C::Output> + 'static,
{
    pub fn new(
        rt: &Runtime,
        def: Rc<ComponentDef>,
        component: C,
        renderer: R,
        store: impl AttributeStore + 'static,
    ) -> Result<Self> {
        let host = Host::new(rt, def, store)?;
        let component = Rc::new(component);
        host.set_hooks(component.clone());
        Ok(Self {
            host,
            component,
            renderer: Rc::new(RefCell::new(renderer)),
            render: Cell::new(None),
            stats: Rc::new(Cell::new(RenderStats::default())),
        })
    }

    pub fn host(&self) -> &Rc<Host> {
        &self.host
    }

    pub fn component(&self) -> &C {
        &self.component
    }

    pub fn renderer(&self) -> Ref<'_, R> {
        self.renderer.borrow()
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.host.lifecycle()
    }

    pub fn render_stats(&self) -> RenderStats {
        self.stats.get()
    }

    /// The render computation, once connected.
    pub fn render_computation(&self) -> Option<Computation> {
        self.render.get()
    }

    /// Inserted into a live tree.
    ///
    /// Pushes attributes into properties, tells controllers, then renders for
    /// the first time (which mounts). A second connect while live is ignored;
    /// connecting after disconnect fails with [`ElementError::Reconnect`].
    pub fn connected(&self) -> Result<()> {
        let host = &self.host;
        match host.lifecycle() {
            LifecycleState::Constructed => {}
            LifecycleState::Connected | LifecycleState::Updated => {
                log::warn!("<{}> is already connected", host.tag());
                return Ok(());
            }
            LifecycleState::Disconnected => {
                return Err(ElementError::Reconnect {
                    tag: host.tag().to_owned(),
                });
            }
        }

        host.push_attributes()?;
        host.set_lifecycle(LifecycleState::Connected);
        for controller in host.controllers() {
            host.runtime().untrack(|| controller.host_connected(host));
        }
        self.ensure_render().evaluate(host.runtime())?;
        Ok(())
    }

    pub fn attribute_changed(&self, key: &str, old: Option<&str>, new: Option<&str>) -> Result<()> {
        self.host.attribute_changed(key, old, new)
    }

    /// Re-renders now if connected, even though nothing changed.
    pub fn request_update(&self) -> Result<()> {
        if !self.host.lifecycle().is_live() {
            return Ok(());
        }
        if let Some(render) = self.render.get() {
            render.schedule(self.host.runtime())?;
        }
        Ok(())
    }

    /// Removed from the live tree. Terminal.
    ///
    /// Unmount hook, event bindings dropped, controllers told, output
    /// cleared, then every computation of the instance released. A failing
    /// clear still releases everything before the error is returned.
    pub fn disconnected(&self) -> Result<()> {
        let host = &self.host;
        if host.lifecycle() == LifecycleState::Disconnected {
            return Ok(());
        }
        let rt = host.runtime();
        rt.untrack(|| self.component.will_unmount(host));
        host.clear_listeners();
        for controller in host.controllers() {
            rt.untrack(|| controller.host_disconnected(host));
        }
        let cleared = self
            .renderer
            .borrow_mut()
            .patch(None)
            .map_err(ElementError::Render);
        host.release();
        self.render.set(None);
        cleared
    }

    fn ensure_render(&self) -> Computation {
        if let Some(render) = self.render.get() {
            return render;
        }
        let host = Rc::downgrade(&self.host);
        let component = self.component.clone();
        let renderer = self.renderer.clone();
        let stats = self.stats.clone();

        let render = Computation::render(
            self.host.runtime(),
            format!("<{}> render", self.host.tag()),
            move |rt| {
                let Some(host) = host.upgrade() else {
                    return Ok(());
                };
                let started = Instant::now();
                if let Some(tree) = component.render(&host)? {
                    renderer.borrow_mut().patch(Some(tree))?;
                }
                let took = started.elapsed();
                stats.set(stats.get().record(took));
                log::debug!("<{}> rendered in {took:?}", host.tag());

                rt.untrack(|| {
                    if host.mark_mounted() {
                        component.mounted(&host);
                        for controller in host.controllers() {
                            controller.host_mounted(&host);
                        }
                    } else {
                        host.set_lifecycle(LifecycleState::Updated);
                        for controller in host.controllers() {
                            controller.host_updated(&host);
                        }
                        host.flush_post_update();
                    }
                });
                Ok(())
            },
        );
        self.host.scope().adopt(self.host.runtime(), render);
        self.render.set(Some(render));
        render
    }
}
