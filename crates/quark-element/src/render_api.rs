/// Receives every tree produced by a render, and `None` when the element
/// leaves the live tree and its output must be cleared.
pub trait TreeRenderer<T> {
    fn patch(&mut self, tree: Option<T>) -> anyhow::Result<()>;
}

impl<T, F> TreeRenderer<T> for F
where
    F: FnMut(Option<T>) -> anyhow::Result<()>,
{
    fn patch(&mut self, tree: Option<T>) -> anyhow::Result<()> {
        self(tree)
    }
}
