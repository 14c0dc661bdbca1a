use crate::model::registry::GridId;

/// Set while an item moves between grids, until its first positioning in
/// the new grid completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Migrate {
    from: Option<GridId>,
}

impl Migrate {
    pub fn is_active(&self) -> bool { self.from.is_some() }

    pub fn source(&self) -> Option<GridId> { self.from }

    pub fn start(&mut self, from: GridId) { self.from = Some(from); }

    /// Returns the grid the item came from if a migration was running.
    pub fn stop(&mut self) -> Option<GridId> { self.from.take() }
}
