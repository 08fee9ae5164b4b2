use thiserror::Error;

pub type Result<T, E = ElementError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ElementError {
    #[error(transparent)]
    Reactive(#[from] quark_core::Error),

    #[error("no declared property `{0}`")]
    UnknownProperty(String),

    #[error("no state slot `{0}`")]
    UnknownState(String),

    /// Not a property, a state slot or a computed.
    #[error("`{0}` is not a member of this component")]
    UnknownMember(String),

    #[error("`{0}` is computed and cannot be assigned")]
    ReadOnly(String),

    /// The tree renderer failed outside a render computation (clearing on
    /// disconnect).
    #[error("tree render failed")]
    Render(#[source] anyhow::Error),

    #[error("`<{tag}>` was disconnected and cannot connect again")]
    Reconnect { tag: String },
}
