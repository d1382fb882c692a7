/// A record with a stable identity inside its store.
///
/// Repositories key records by `id()`.
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}
