use tracing::info;

use super::grid::{Position, SendOptions};
use super::{Engine, EngineError};
use crate::actor::drag_sort::normalize_array_index;
use crate::model::emitter::{GridEvent, Migration};
use crate::model::registry::{GridId, ItemId};
use crate::sys::host::ElementHost;

impl<H> Engine<H>
where H: ElementHost + 'static
{
    /// Moves `item` into `target` at `position`. Any drag, release,
    /// positioning or visibility animation of the item is interrupted first.
    /// The element is appended to `options.append_to` (the target container
    /// by default) and rebased so it does not jump; an active item then
    /// animates to its new slot once the receiving grid lays out.
    ///
    /// Returns false when the item already belongs to `target`.
    pub fn send(
        &mut self,
        item: ItemId,
        target: GridId,
        position: impl Into<Position>,
        options: SendOptions,
    ) -> Result<bool, EngineError> {
        let from_grid = self.item(item)?.grid;
        let target_grid = self.grid(target)?;
        let target_container = target_grid.container;
        if from_grid == target {
            return Ok(false);
        }
        let to_index = match position.into() {
            Position::Index(index) => normalize_array_index(target_grid.items.len(), index, 1),
            Position::Item(other) => target_grid
                .index_of(other)
                .ok_or(EngineError::ForeignItem { item: other, grid: target })?,
        };
        let from_index = self
            .grid(from_grid)?
            .index_of(item)
            .ok_or(EngineError::ForeignItem { item, grid: from_grid })?;

        self.abort_drag(item);
        self.stop_positioning(item);
        self.finish_release(item);
        self.stop_migrate(item);
        self.stop_visibility(item);

        let migration = Migration {
            item,
            from_grid,
            from_index,
            to_grid: target,
            to_index,
        };
        self.events.emit(GridEvent::BeforeSend(migration.clone()));
        self.events.emit(GridEvent::BeforeReceive(migration.clone()));

        if let Some(grid) = self.grids.get_mut(from_grid) {
            grid.items.retain(|&other| other != item);
        }
        if let Some(grid) = self.grids.get_mut(target) {
            let at = to_index.min(grid.items.len());
            grid.items.insert(at, item);
        }
        let Some(found) = self.items.get_mut(item) else {
            return Ok(false);
        };
        found.grid = target;
        found.sort_data = None;
        let active = found.active;
        if active {
            found.migrate.start(from_grid);
        }
        // Hidden items are not positioned again until shown, so they go
        // straight to the target container.
        let container = if active { options.append_to.unwrap_or(target_container) } else { target_container };
        self.move_element(item, container);
        info!(?item, ?from_grid, to_grid = ?target, to_index, "Sent item");

        self.events.emit(GridEvent::Send(migration.clone()));
        self.events.emit(GridEvent::Receive(migration));

        if active {
            if options.layout_sender {
                self.relayout(from_grid);
            }
            if options.layout_receiver {
                self.relayout(target);
            }
        }
        Ok(true)
    }
}
