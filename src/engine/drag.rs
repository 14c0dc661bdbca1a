use tracing::{debug, info, warn};

use super::grid::{Position, SendOptions, apply_action};
use super::{ActiveDrag, Engine, EngineError};
use crate::actor::drag_sort::{SortCandidate, SortCheck, SortPlan, SortTarget, sort_predicate};
use crate::actor::{DragSortManager, DragStartPredicate};
use crate::model::emitter::{GridEvent, Migration, SortAction};
use crate::model::item::{DragPhase, DragSession};
use crate::model::registry::{GridId, ItemId};
use crate::sys::geometry::{Point, Rect};
use crate::sys::host::{ElementHost, ItemFlag};

impl<H> Engine<H>
where H: ElementHost + 'static
{
    /// A pointer pressed on `item`. Returns whether the press was accepted
    /// as a potential drag; the drag itself starts once the pointer has
    /// travelled `start_distance` pixels and was held for `start_delay`.
    pub fn pointer_down(&mut self, item: ItemId, pointer: Point, now: f64) -> Result<bool, EngineError> {
        self.now = now;
        let found = self.item(item)?;
        let settings = self.grid(found.grid)?.settings.drag.clone();
        if !settings.enabled || !found.active || self.drag.is_some() || self.pending_start.is_some() {
            return Ok(false);
        }

        let predicate = DragStartPredicate::new(item, pointer, now, &settings);
        if predicate.is_resolved(now) {
            self.start_drag(item, pointer);
        } else {
            self.pending_start = Some(predicate);
        }
        Ok(true)
    }

    pub fn pointer_move(&mut self, pointer: Point, now: f64) {
        self.now = now;
        if let Some(start) = self.pending_start.as_mut() {
            if !start.on_move(pointer, now) {
                return;
            }
            if let Some(start) = self.pending_start.take() {
                self.start_drag(start.item(), start.origin());
            }
        }

        let Some(drag) = self.drag.as_mut() else {
            return;
        };
        drag.session.pointer = pointer;
        let (id, translate) = (drag.session.item, drag.session.translate());
        let sort_enabled = self
            .grids
            .get(drag.session.grid)
            .is_some_and(|grid| grid.settings.drag_sort.enabled);
        let check = if sort_enabled { drag.sorter.on_move(pointer, now) } else { SortCheck::Wait };

        self.write_translate(id, translate);
        if check == SortCheck::Evaluate {
            self.evaluate_sort();
        }
        if let Some(drag) = &self.drag {
            self.events.emit(GridEvent::DragMove {
                grid: drag.session.grid,
                item: id,
                pointer,
            });
        }
    }

    /// The pointer was released. A sort evaluation still owed to the
    /// interval runs first, then the item plays its release animation.
    pub fn pointer_up(&mut self, now: f64) {
        self.now = now;
        if self.pending_start.take().is_some() {
            return;
        }
        if self.drag.as_mut().is_some_and(|drag| drag.sorter.take_pending(now)) {
            self.evaluate_sort();
        }
        self.end_drag();
    }

    /// Input capture was lost. Ends the drag without a last sort.
    pub fn pointer_cancel(&mut self, now: f64) {
        self.now = now;
        self.pending_start = None;
        self.end_drag();
    }

    pub(crate) fn start_drag(&mut self, id: ItemId, pointer: Point) {
        let Some(item) = self.items.get(id) else {
            return;
        };
        let grid_id = item.grid;
        let Some(grid) = self.grids.get(grid_id) else {
            return;
        };
        let container = grid.settings.drag_container.unwrap_or(grid.container);
        let heuristics = grid.settings.drag_sort_heuristics.clone();

        self.abort_release(id);
        self.stop_positioning(id);
        self.stop_migrate(id);
        self.move_element(id, container);

        let Some(item) = self.items.get_mut(id) else {
            return;
        };
        let session = DragSession::new(id, grid_id, pointer, item.translate, container);
        item.drag = DragPhase::Dragging;
        self.host.set_flag(item.element, ItemFlag::Dragging, true);
        self.drag = Some(ActiveDrag {
            session,
            sorter: DragSortManager::new(heuristics, pointer),
        });
        info!(item = ?id, grid = ?grid_id, "Drag started");

        self.events.emit(GridEvent::DragInit { grid: grid_id, item: id, pointer });
        self.events.emit(GridEvent::DragStart { grid: grid_id, item: id, pointer });
    }

    fn end_drag(&mut self) {
        let Some(ActiveDrag { session, .. }) = self.drag.take() else {
            return;
        };
        let id = session.item;
        let Some(item) = self.items.get_mut(id) else {
            return;
        };
        item.drag = DragPhase::Releasing { positioning_started: false };
        let (element, grid) = (item.element, item.grid);
        self.host.set_flag(element, ItemFlag::Dragging, false);
        self.host.set_flag(element, ItemFlag::Releasing, true);
        info!(item = ?id, ?grid, migrated = session.has_migrated(), "Drag ended");

        self.events.emit(GridEvent::DragEnd { grid, item: id, pointer: session.pointer });
        self.events.emit(GridEvent::DragReleaseStart { grid, item: id });

        // A queued layout picks the item up; otherwise it returns on its own.
        if !self.grids.get(grid).is_some_and(|grid| grid.pending.is_some()) {
            self.start_positioning(id, false, None);
        }
    }

    /// Drops the drag of `id` silently and returns the element to its grid
    /// container.
    pub(crate) fn abort_drag(&mut self, id: ItemId) {
        if self.pending_start.as_ref().is_some_and(|start| start.item() == id) {
            self.pending_start = None;
        }
        if self.dragged_item() != Some(id) {
            return;
        }
        self.drag = None;
        let Some(item) = self.items.get_mut(id) else {
            return;
        };
        item.drag = DragPhase::Idle;
        let (element, grid) = (item.element, item.grid);
        self.host.set_flag(element, ItemFlag::Dragging, false);
        if let Some(container) = self.grids.get(grid).map(|grid| grid.container) {
            self.move_element(id, container);
        }
        debug!(item = ?id, "Aborted drag");
    }

    /// Scores the dragged item against its grid and the connected grids and
    /// applies the winning move or migration.
    pub(crate) fn evaluate_sort(&mut self) {
        let Some(drag) = self.drag.as_ref() else {
            return;
        };
        let (id, current) = (drag.session.item, drag.session.grid);
        let (Some(item), Some(grid)) = (self.items.get(id), self.grids.get(current)) else {
            return;
        };
        if !grid.settings.drag_sort.enabled {
            return;
        }

        let origin = self.host.container_rect(drag.session.container).origin();
        let translate = drag.session.translate();
        let item_rect = Rect::new(
            origin.x + translate.x + item.size.margin_left,
            origin.y + translate.y + item.size.margin_top,
            item.size.width,
            item.size.height,
        );

        let mut candidates = Vec::with_capacity(grid.connections.len() + 1);
        for &grid_id in std::iter::once(&current).chain(&grid.connections) {
            let Some(target) = self.grids.get(grid_id) else {
                continue;
            };
            let rect = self.host.container_rect(target.container);
            let items = target
                .items
                .iter()
                .filter_map(|&other| self.items.get(other))
                .map(|other| SortTarget {
                    item: other.id,
                    rect: other.slot_rect().translate(rect.left, rect.top),
                    active: other.active,
                })
                .collect();
            candidates.push(SortCandidate { grid: grid_id, rect, items });
        }

        let Some(intent) = sort_predicate(id, item_rect, current, &candidates, &grid.settings.drag_sort) else {
            return;
        };
        let Some(current_index) = grid.index_of(id) else {
            return;
        };
        let target_len = self.grids.get(intent.grid).map_or(0, |target| target.items.len());
        let Some(plan) = self
            .drag
            .as_mut()
            .and_then(|drag| drag.sorter.plan(intent, current, current_index, target_len))
        else {
            return;
        };

        match plan {
            SortPlan::Move { from, to, action } => {
                let Some(grid) = self.grids.get_mut(current) else {
                    return;
                };
                apply_action(&mut grid.items, from, to, action);
                self.events.emit(GridEvent::Move {
                    grid: current,
                    item: id,
                    from_index: from,
                    to_index: to,
                    action,
                });
                self.relayout(current);
            }
            SortPlan::Migrate { from, to_grid, to, action } => {
                self.migrate_dragged(id, current, from, to_grid, to, action);
            }
        }
    }

    /// Moves the dragged item into `to_grid` while the drag goes on.
    fn migrate_dragged(
        &mut self,
        id: ItemId,
        from_grid: GridId,
        from_index: usize,
        to_grid: GridId,
        to_index: usize,
        action: SortAction,
    ) {
        let Some(target_container) = self.grids.get(to_grid).map(|grid| grid.container) else {
            return;
        };
        let displaced = self.grids.get(to_grid).and_then(|grid| grid.items.get(to_index).copied());
        let migration = Migration {
            item: id,
            from_grid,
            from_index,
            to_grid,
            to_index,
        };
        self.events.emit(GridEvent::BeforeSend(migration.clone()));
        self.events.emit(GridEvent::BeforeReceive(migration.clone()));

        if let Some(grid) = self.grids.get_mut(from_grid) {
            grid.items.retain(|&other| other != id);
        }
        if let Some(grid) = self.grids.get_mut(to_grid) {
            let at = to_index.min(grid.items.len());
            grid.items.insert(at, id);
        }
        if let Some(item) = self.items.get_mut(id) {
            item.grid = to_grid;
            item.sort_data = None;
        }

        // Without a dedicated drag container the element follows the item
        // into the new grid's container.
        let origin_container = self.grids.get(from_grid).map(|grid| grid.container);
        let drag_container = self.drag.as_mut().map(|drag| {
            drag.session.grid = to_grid;
            drag.session.container
        });
        if let Some(old) = drag_container
            && origin_container == Some(old)
        {
            let offset = self.container_offset(old, target_container);
            if let Some(drag) = self.drag.as_mut() {
                drag.session.container = target_container;
                drag.session.start_translate = drag.session.start_translate.offset(offset.x, offset.y);
            }
            self.move_element(id, target_container);
        }
        info!(item = ?id, ?from_grid, ?to_grid, to_index, "Dragged item migrated");

        self.events.emit(GridEvent::Send(migration.clone()));
        self.events.emit(GridEvent::Receive(migration));

        if action == SortAction::Swap
            && let Some(displaced) = displaced
            && displaced != id
            && self.items.get(displaced).is_some_and(|item| item.active && item.grid == to_grid)
        {
            let options = SendOptions {
                append_to: None,
                layout_sender: false,
                layout_receiver: false,
            };
            if let Err(error) = self.send(displaced, from_grid, Position::Index(from_index as isize), options) {
                warn!(item = ?displaced, %error, "Failed to swap item back");
            }
        }

        self.relayout(from_grid);
        self.relayout(to_grid);
    }
}
