use crate::Host;

/// External participant in an element's lifecycle.
///
/// Controllers are registered per instance with [`Host::add_controller`]. All
/// hooks are optional and run untracked.
pub trait Controller {
    fn host_connected(&self, _host: &Host) {}
    /// After the first render was handed to the tree renderer.
    fn host_mounted(&self, _host: &Host) {}
    /// After every later render, before post-update callbacks run.
    fn host_updated(&self, _host: &Host) {}
    fn host_disconnected(&self, _host: &Host) {}
}
