/// Tunables for a [`Runtime`](crate::Runtime).
///
/// ```rust
/// use quark_core::*;
///
/// let rt = Runtime::with_config(RuntimeConfig {
///     max_reruns: 8,
///     ..RuntimeConfig::default()
/// });
/// assert_eq!(rt.config().max_reruns, 8);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct RuntimeConfig {
    /// How many times one computation may run inside a single flush before
    /// the scheduler gives up on it and reports `Error::RerunLimit`.
    pub max_reruns: u32,
    /// Emit a `trace` record for every evaluation.
    pub trace_evaluations: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_reruns: 100,
            trace_evaluations: false,
        }
    }
}
