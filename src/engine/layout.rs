use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, trace, warn};

use super::grid::{LayoutCallback, PendingLayout};
use super::{Engine, EngineError, TaskKind};
use crate::layout_engine::{LayoutId, LayoutRequest, LayoutResult};
use crate::model::callbacks::Completion;
use crate::model::emitter::{EventBus, GridEvent};
use crate::model::item::{DragPhase, PositionOutcome};
use crate::model::registry::{GridId, ItemId};
use crate::model::tween::Tween;
use crate::sys::geometry::{Point, Size};
use crate::sys::host::{ElementHost, ElementId, ItemFlag};

/// Counts down the items of one applied layout and reports when all of them
/// settled.
struct LayoutCompletion {
    grid: GridId,
    id: LayoutId,
    remaining: Cell<usize>,
    current: Rc<Cell<LayoutId>>,
    finished: Rc<Cell<bool>>,
    items: Vec<ItemId>,
    callback: RefCell<Option<LayoutCallback>>,
    events: EventBus,
}

impl LayoutCompletion {
    fn settle_one(&self) {
        let remaining = self.remaining.get().saturating_sub(1);
        self.remaining.set(remaining);
        if remaining > 0 {
            return;
        }
        let changed = self.current.get() != self.id;
        if !changed {
            self.finished.set(true);
        }
        if let Some(callback) = self.callback.borrow_mut().take() {
            callback(&self.items, changed);
        }
        if !changed {
            trace!(grid = ?self.grid, id = ?self.id, "Layout finished");
            self.events.emit(GridEvent::LayoutEnd {
                grid: self.grid,
                items: self.items.clone(),
            });
        }
    }

    fn callback(self: &Rc<Self>) -> Completion {
        let this = self.clone();
        Box::new(move |_, _| this.settle_one())
    }
}

impl<H> Engine<H>
where H: ElementHost + 'static
{
    /// Packs the grid's active items and positions them. `callback` receives
    /// the positioned items once they all settled, and `true` if a newer
    /// layout superseded this one first.
    pub fn layout(&mut self, grid: GridId, instant: bool, callback: Option<LayoutCallback>) -> Result<(), EngineError> {
        let container = self.grid(grid)?.container;

        // An unfinished request for this grid is superseded.
        if let Some(previous) = self.grid_mut(grid)?.pending.take() {
            debug!(?grid, id = ?previous.id, "Superseding pending layout");
            if let Some(callback) = previous.callback {
                callback(&previous.items, true);
            }
        }

        let items: Vec<ItemId> = self
            .grid(grid)?
            .items
            .iter()
            .copied()
            .filter(|&id| self.items.get(id).is_some_and(|item| item.active))
            .collect();
        let sizes: Vec<_> = items.iter().filter_map(|&id| self.items.get(id).map(|item| item.size)).collect();
        let container_size = self.host.container_rect(container).size();

        self.next_layout = self.next_layout.next();
        let id = self.next_layout;
        let settings = &self.grid(grid)?.settings.layout;
        let options = settings.packer_options();
        let use_pool = items.len() >= settings.worker_threshold.max(1);
        let request = LayoutRequest::new(id, &sizes, container_size, options);

        self.grid_mut(grid)?.pending = Some(PendingLayout { id, instant, items, callback });
        trace!(?grid, ?id, count = request.sizes.len(), "Requested layout");

        if use_pool && let Some(pool) = &self.pool {
            match pool.submit(grid, &request) {
                Ok(()) => return Ok(()),
                Err(error) => warn!(?grid, %error, "Falling back to packing on this thread"),
            }
        }
        let result = self.packer.run(&request);
        self.apply_layout(grid, result);
        Ok(())
    }

    /// Lays the grid out from an internal path where the grid is known to
    /// exist.
    pub(crate) fn relayout(&mut self, grid: GridId) {
        if let Err(error) = self.layout(grid, false, None) {
            warn!(?grid, %error, "Skipping layout");
        }
    }

    /// Applies finished worker layouts. Called from `tick`.
    pub(crate) fn poll_layouts(&mut self) {
        let Some(pool) = &self.pool else {
            return;
        };
        for (grid, result) in pool.poll() {
            self.apply_layout(grid, result);
        }
    }

    pub(crate) fn apply_layout(&mut self, grid_id: GridId, result: LayoutResult) {
        let Some(grid) = self.grids.get_mut(grid_id) else {
            return;
        };
        let Some(pending) = grid.pending.take_if(|pending| pending.id == result.id) else {
            debug!(grid = ?grid_id, id = ?result.id, "Ignoring stale layout result");
            return;
        };

        if !grid.layout_finished.get() {
            let aborted = std::mem::take(&mut grid.layout_items);
            debug!(grid = ?grid_id, previous = ?grid.current_layout.get(), "Aborting unfinished layout");
            self.events.emit(GridEvent::LayoutAbort { grid: grid_id, items: aborted });
        }
        let Some(grid) = self.grids.get_mut(grid_id) else {
            return;
        };
        grid.current_layout.set(pending.id);
        grid.layout_finished.set(false);
        grid.layout_items = pending.items.clone();
        grid.size = Size::new(result.width, result.height);
        let completion = Rc::new(LayoutCompletion {
            grid: grid_id,
            id: pending.id,
            remaining: Cell::new(pending.items.len()),
            current: grid.current_layout.clone(),
            finished: grid.layout_finished.clone(),
            items: pending.items.clone(),
            callback: RefCell::new(pending.callback),
            events: self.events.clone(),
        });
        let deferred = std::mem::take(&mut grid.deferred);

        self.events.emit(GridEvent::LayoutStart {
            grid: grid_id,
            items: pending.items.clone(),
            instant: pending.instant,
        });
        for batch in deferred {
            self.trigger_visibility(grid_id, batch);
        }

        if pending.items.is_empty() {
            completion.remaining.set(1);
            completion.settle_one();
            return;
        }

        for (index, &id) in pending.items.iter().enumerate() {
            let slot = result.slot(index);
            let Some(item) = self.items.get_mut(id).filter(|item| item.grid == grid_id) else {
                completion.settle_one();
                continue;
            };
            if let Some((left, top)) = slot {
                item.left = left;
                item.top = top;
            }
            if item.is_dragging() {
                completion.settle_one();
                continue;
            }
            self.start_positioning(id, pending.instant, Some(completion.callback()));
        }
    }

    /// Translation that puts the item at its slot, expressed in the
    /// coordinates of the container its element lives in right now.
    pub(crate) fn slot_translate(&self, id: ItemId) -> Option<Point> {
        let item = self.items.get(id)?;
        let grid = self.grids.get(item.grid)?;
        let offset = self.container_offset(grid.container, item.container);
        Some(item.position().offset(offset.x, offset.y))
    }

    /// Where `from`'s origin sits inside `to`, in client pixels.
    pub(crate) fn container_offset(&self, from: ElementId, to: ElementId) -> Point {
        if from == to {
            return Point::ZERO;
        }
        let from = self.host.container_rect(from).origin();
        let to = self.host.container_rect(to).origin();
        to.delta_to(from)
    }

    /// Reparents the element and rebases its translation so it does not
    /// visually move.
    pub(crate) fn move_element(&mut self, id: ItemId, container: ElementId) {
        let Some(item) = self.items.get(id) else {
            return;
        };
        if item.container == container {
            return;
        }
        let offset = self.container_offset(item.container, container);
        let (element, translate) = (item.element, item.translate.offset(offset.x, offset.y));
        self.host.append_to(element, container);
        self.host.set_translate(element, translate);
        if let Some(item) = self.items.get_mut(id) {
            item.container = container;
            item.translate = translate;
        }
    }

    pub(crate) fn write_translate(&mut self, id: ItemId, translate: Point) {
        if let Some(item) = self.items.get_mut(id) {
            item.translate = translate;
            self.host.set_translate(item.element, translate);
        }
    }

    pub(crate) fn start_positioning(&mut self, id: ItemId, instant: bool, callback: Option<Completion>) {
        let Some(target) = self.slot_translate(id) else {
            if let Some(callback) = callback {
                callback(true, id);
            }
            return;
        };
        let Some(item) = self.items.get_mut(id) else {
            return;
        };
        let Some(grid) = self.grids.get(item.grid) else {
            return;
        };

        let just_released = item.drag.is_just_released();
        let (duration, easing) = if just_released {
            (grid.settings.drag.release_duration, grid.settings.drag.release_easing)
        } else {
            (grid.settings.layout.duration, grid.settings.layout.easing)
        };
        if just_released {
            item.drag = DragPhase::Releasing { positioning_started: true };
        }

        let animate = !instant && duration > 0.0;
        let was_active = item.positioning.is_active();
        item.positioning.begin(id, target, animate, callback);
        let outcome = item.positioning.plan(item.translate);
        trace!(item = ?id, ?target, ?outcome, "Positioning item");

        match outcome {
            PositionOutcome::Skipped => self.finish_positioning(id),
            PositionOutcome::Instant => {
                self.ticker.cancel_read_write((TaskKind::Layout, id));
                self.write_translate(id, target);
                self.finish_positioning(id);
            }
            PositionOutcome::Animating => {
                let from = if was_active {
                    item.positioning.sample(self.now).map(|(point, _)| point).unwrap_or(item.translate)
                } else {
                    item.translate
                };
                item.positioning.animate(Tween::new(from, target, self.now, duration, easing));
                let element = item.element;
                self.host.set_flag(element, ItemFlag::Positioning, true);
                self.schedule_positioning_frame(id);
            }
        }
    }

    fn schedule_positioning_frame(&mut self, id: ItemId) {
        let sample = Rc::new(Cell::new(None));
        let read = sample.clone();
        self.ticker.schedule_read_write(
            (TaskKind::Layout, id),
            Box::new(move |engine: &mut Engine<H>| {
                read.set(engine.items.get(id).and_then(|item| item.positioning.sample(engine.now)));
            }),
            Box::new(move |engine: &mut Engine<H>| {
                let Some((translate, done)) = sample.get() else {
                    return;
                };
                engine.write_translate(id, translate);
                if done {
                    engine.finish_positioning(id);
                } else {
                    engine.schedule_positioning_frame(id);
                }
            }),
        );
    }

    /// Positioning reached its target: settles release and migration, then
    /// runs the queued callbacks.
    pub(crate) fn finish_positioning(&mut self, id: ItemId) {
        self.ticker.cancel_read_write((TaskKind::Layout, id));
        let Some(item) = self.items.get_mut(id) else {
            return;
        };
        item.positioning.settle();
        self.host.set_flag(item.element, ItemFlag::Positioning, false);
        if item.is_releasing() {
            self.finish_release(id);
        }
        self.stop_migrate(id);
        if let Some(item) = self.items.get_mut(id) {
            item.positioning.flush(id, false);
        }
    }

    /// Cancels positioning where it currently is.
    pub(crate) fn stop_positioning(&mut self, id: ItemId) {
        self.ticker.cancel_read_write((TaskKind::Layout, id));
        let now = self.now;
        let Some(item) = self.items.get_mut(id) else {
            return;
        };
        if !item.positioning.is_active() {
            return;
        }
        let current = item.positioning.sample(now).map(|(point, _)| point);
        item.positioning.stop(id, true);
        let element = item.element;
        self.host.set_flag(element, ItemFlag::Positioning, false);
        if let Some(current) = current {
            self.write_translate(id, current);
        }
    }

    /// Ends the release: the element returns to its grid container and the
    /// drag phase goes back to idle.
    pub(crate) fn finish_release(&mut self, id: ItemId) {
        let Some(item) = self.items.get_mut(id) else {
            return;
        };
        if !item.is_releasing() {
            return;
        }
        item.drag = DragPhase::Idle;
        let (element, grid) = (item.element, item.grid);
        self.host.set_flag(element, ItemFlag::Releasing, false);
        if let Some(container) = self.grids.get(grid).map(|grid| grid.container) {
            self.move_element(id, container);
        }
        debug!(item = ?id, ?grid, "Release finished");
        self.events.emit(GridEvent::DragReleaseEnd { grid, item: id });
    }

    /// Snaps a releasing item to its slot so a new drag can start.
    pub(crate) fn abort_release(&mut self, id: ItemId) {
        if !self.items.get(id).is_some_and(|item| item.is_releasing()) {
            return;
        }
        self.ticker.cancel_read_write((TaskKind::Layout, id));
        let target = self.slot_translate(id);
        if let Some(item) = self.items.get_mut(id)
            && item.positioning.settle()
        {
            self.host.set_flag(item.element, ItemFlag::Positioning, false);
        }
        if let Some(target) = target {
            self.write_translate(id, target);
        }
        self.finish_release(id);
        self.stop_migrate(id);
        if let Some(item) = self.items.get_mut(id) {
            item.positioning.flush(id, true);
        }
    }

    pub(crate) fn stop_migrate(&mut self, id: ItemId) {
        let Some(item) = self.items.get_mut(id) else {
            return;
        };
        if item.migrate.stop().is_none() || item.is_dragging() {
            return;
        }
        if let Some(container) = self.grids.get(item.grid).map(|grid| grid.container) {
            self.move_element(id, container);
        }
    }

    pub(crate) fn cancel_item_tasks(&mut self, id: ItemId) {
        self.ticker.cancel_read_write((TaskKind::Layout, id));
        self.ticker.cancel_read_write((TaskKind::Visibility, id));
    }
}
