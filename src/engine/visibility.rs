use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, trace};

use super::grid::{BatchCallback, VisibilityBatch};
use super::{Engine, EngineError, TaskKind};
use crate::model::callbacks::Completion;
use crate::model::emitter::{EventBus, GridEvent};
use crate::model::item::{Item, VisibilityState, VisibilityStep};
use crate::model::registry::{GridId, ItemId};
use crate::model::tween::Tween;
use crate::sys::geometry::Point;
use crate::sys::host::{ElementHost, ItemFlag};

/// Collects the per-item results of a show or hide batch.
struct BatchCompletion {
    grid: GridId,
    show: bool,
    announce: bool,
    remaining: Cell<usize>,
    completed: RefCell<Vec<ItemId>>,
    callback: RefCell<Option<BatchCallback>>,
    events: EventBus,
}

impl BatchCompletion {
    fn settle_one(&self, interrupted: bool, item: ItemId) {
        if !interrupted {
            self.completed.borrow_mut().push(item);
        }
        let remaining = self.remaining.get().saturating_sub(1);
        self.remaining.set(remaining);
        if remaining > 0 {
            return;
        }
        let completed = self.completed.borrow().clone();
        if let Some(callback) = self.callback.borrow_mut().take() {
            callback(completed.clone());
        }
        if self.announce {
            let event = if self.show {
                GridEvent::ShowEnd { grid: self.grid, items: completed }
            } else {
                GridEvent::HideEnd { grid: self.grid, items: completed }
            };
            self.events.emit(event);
        }
    }

    fn callback(self: &Rc<Self>) -> Completion {
        let this = self.clone();
        Box::new(move |interrupted, item| this.settle_one(interrupted, item))
    }
}

impl<H> Engine<H>
where H: ElementHost + 'static
{
    /// Shows `items`. Items that were excluded from the layout rejoin it and
    /// the animation starts together with the next layout. `callback`
    /// receives the items that finished showing without interruption.
    pub fn show(
        &mut self,
        grid: GridId,
        items: &[ItemId],
        instant: bool,
        callback: Option<BatchCallback>,
    ) -> Result<(), EngineError> {
        self.set_items_visibility(grid, items, true, instant, true, callback)
    }

    pub fn hide(
        &mut self,
        grid: GridId,
        items: &[ItemId],
        instant: bool,
        callback: Option<BatchCallback>,
    ) -> Result<(), EngineError> {
        self.set_items_visibility(grid, items, false, instant, true, callback)
    }

    /// Shows the items matching `predicate` and hides the rest, then lays the
    /// grid out once.
    pub fn filter(
        &mut self,
        grid: GridId,
        mut predicate: impl FnMut(&Item) -> bool,
        instant: bool,
    ) -> Result<(), EngineError> {
        let mut shown = Vec::new();
        let mut hidden = Vec::new();
        for &id in self.grid(grid)?.items() {
            let Some(item) = self.items.get(id) else {
                continue;
            };
            let visible = item.visibility.is_visible();
            match (predicate(item), visible) {
                (true, false) => shown.push(id),
                (false, true) => hidden.push(id),
                _ => {}
            }
        }

        if !shown.is_empty() {
            self.set_items_visibility(grid, &shown, true, instant, false, None)?;
        }
        if !hidden.is_empty() {
            self.set_items_visibility(grid, &hidden, false, instant, false, None)?;
        }
        if !shown.is_empty() || !hidden.is_empty() {
            debug!(?grid, shown = shown.len(), hidden = hidden.len(), "Filtered items");
            self.events.emit(GridEvent::Filter { grid, shown, hidden });
            self.layout(grid, instant, None)?;
        }
        Ok(())
    }

    fn set_items_visibility(
        &mut self,
        grid: GridId,
        items: &[ItemId],
        show: bool,
        instant: bool,
        layout: bool,
        callback: Option<BatchCallback>,
    ) -> Result<(), EngineError> {
        self.grid(grid)?;
        for &id in items {
            self.owned_item(grid, id)?;
        }
        if items.is_empty() {
            if let Some(callback) = callback {
                callback(Vec::new());
            }
            return Ok(());
        }

        let mut needs_layout = false;
        let mut hidden = Vec::new();
        for &id in items {
            let Some(item) = self.items.get_mut(id) else {
                continue;
            };
            if item.active != show {
                needs_layout = true;
                if show {
                    item.positioning.skip_next_animation();
                }
            }
            if show && item.visibility.is_hidden() {
                hidden.push(id);
            }
            item.active = show;
        }
        self.refresh_item_sizes(&hidden);

        let batch = VisibilityBatch {
            show,
            items: items.to_vec(),
            instant,
            announce: needs_layout,
            callback,
        };
        if needs_layout && layout {
            self.grid_mut(grid)?.deferred.push(batch);
            self.layout(grid, false, None)?;
        } else {
            self.trigger_visibility(grid, batch);
        }
        Ok(())
    }

    pub(crate) fn trigger_visibility(&mut self, grid: GridId, batch: VisibilityBatch) {
        if batch.announce {
            let items = batch.items.clone();
            self.events.emit(if batch.show {
                GridEvent::ShowStart { grid, items }
            } else {
                GridEvent::HideStart { grid, items }
            });
        }
        let completion = Rc::new(BatchCompletion {
            grid,
            show: batch.show,
            announce: batch.announce,
            remaining: Cell::new(batch.items.len()),
            completed: RefCell::new(Vec::new()),
            callback: RefCell::new(batch.callback),
            events: self.events.clone(),
        });
        for &id in &batch.items {
            self.set_item_visibility(id, batch.show, batch.instant, Some(completion.callback()));
        }
    }

    pub(crate) fn set_item_visibility(
        &mut self,
        id: ItemId,
        show: bool,
        instant: bool,
        callback: Option<Completion>,
    ) {
        let now = self.now;
        let Some(item) = self.items.get_mut(id) else {
            if let Some(callback) = callback {
                callback(true, id);
            }
            return;
        };
        let Some(settings) = self.grids.get(item.grid).map(|grid| grid.settings.visibility.clone()) else {
            if let Some(callback) = callback {
                callback(true, id);
            }
            return;
        };

        let step = if show {
            item.visibility.show(id, instant, callback)
        } else {
            item.visibility.hide(id, instant, callback)
        };
        let VisibilityStep::Started { reveal } = step else {
            return;
        };

        let element = item.element;
        let from = item.visibility.amount(now);
        let target = if show { 1.0 } else { 0.0 };
        let duration = if show { settings.show_duration } else { settings.hide_duration };
        trace!(item = ?id, show, instant, "Visibility transition");

        self.ticker.cancel_read_write((TaskKind::Visibility, id));
        if reveal {
            self.host.set_displayed(element, true);
        }
        self.host.set_flag(element, ItemFlag::Visible, show);
        self.host.set_flag(element, ItemFlag::Hidden, !show);

        if instant || duration <= 0.0 {
            self.host.set_visibility(element, target);
            self.finish_visibility(id);
            return;
        }
        if let Some(item) = self.items.get_mut(id) {
            item.visibility.animate(Tween::new(from, target, now, duration, settings.easing));
        }
        self.schedule_visibility_frame(id);
    }

    fn schedule_visibility_frame(&mut self, id: ItemId) {
        let sample = Rc::new(Cell::new(None));
        let read = sample.clone();
        self.ticker.schedule_read_write(
            (TaskKind::Visibility, id),
            Box::new(move |engine: &mut Engine<H>| {
                read.set(engine.items.get(id).and_then(|item| item.visibility.sample(engine.now)));
            }),
            Box::new(move |engine: &mut Engine<H>| {
                let Some((amount, done)) = sample.get() else {
                    return;
                };
                if let Some(item) = engine.items.get(id) {
                    engine.host.set_visibility(item.element, amount);
                }
                if done {
                    engine.finish_visibility(id);
                } else {
                    engine.schedule_visibility_frame(id);
                }
            }),
        );
    }

    /// Settles a running show or hide. A finished hide also parks the
    /// element: positioning stops, the translation resets and the element
    /// stops being displayed.
    pub(crate) fn finish_visibility(&mut self, id: ItemId) {
        self.ticker.cancel_read_write((TaskKind::Visibility, id));
        let Some(state) = self.items.get(id).map(|item| item.visibility.state()) else {
            return;
        };
        if state == VisibilityState::Hiding {
            self.ticker.cancel_read_write((TaskKind::Layout, id));
            if let Some(item) = self.items.get_mut(id) {
                item.positioning.stop(id, true);
                let element = item.element;
                self.host.set_flag(element, ItemFlag::Positioning, false);
                self.host.set_displayed(element, false);
            }
            self.write_translate(id, Point::ZERO);
        }
        if let Some(item) = self.items.get_mut(id) {
            item.visibility.finish(id);
        }
    }

    /// Interrupts a running show or hide and jumps to its end state.
    pub(crate) fn stop_visibility(&mut self, id: ItemId) {
        let Some(item) = self.items.get_mut(id) else {
            return;
        };
        if !item.visibility.is_animating() {
            return;
        }
        item.visibility.stop(id, true);
        let target = if item.visibility.is_visible() { 1.0 } else { 0.0 };
        let element = item.element;
        self.host.set_visibility(element, target);
        self.finish_visibility(id);
    }
}
