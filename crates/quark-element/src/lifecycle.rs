use crate::{Host, Value};

/// Where an instance is in its life.
///
/// `Constructed -> Connected -> Updated* -> Disconnected`; `Disconnected` is
/// terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    #[default]
    Constructed,
    /// Inserted into a live tree and rendered once.
    Connected,
    /// Rendered again since connecting.
    Updated,
    Disconnected,
}

impl LifecycleState {
    /// Connected, whether or not it re-rendered since.
    pub fn is_live(self) -> bool {
        matches!(self, LifecycleState::Connected | LifecycleState::Updated)
    }
}

/// Hooks a component author overrides. All of them run untracked.
pub trait Lifecycle {
    /// After the first render was handed to the tree renderer.
    fn mounted(&self, _host: &Host) {}

    /// First step of disconnecting, while everything is still in place.
    fn will_unmount(&self, _host: &Host) {}

    /// Decides whether a change to `name` queues an [`updated`] call.
    ///
    /// [`updated`]: Lifecycle::updated
    fn should_update(&self, _name: &str, old: &Value, new: &Value) -> bool {
        old != new
    }

    /// Runs once per change, after the render that observed it.
    fn updated(&self, _host: &Host, _name: &str, _old: &Value, _new: &Value) {}
}

/// A renderable component type.
pub trait Component: Lifecycle + 'static {
    type Output: 'static;

    /// Produces the output tree. Every property, state slot or computed read
    /// here becomes a dependency of the render; `None` leaves the current
    /// output untouched.
    fn render(&self, host: &Host) -> anyhow::Result<Option<Self::Output>>;
}
