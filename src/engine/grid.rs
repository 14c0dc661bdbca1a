use std::cell::Cell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, info, warn};

use super::{Engine, EngineError};
use crate::common::collections::HashSet;
use crate::common::config::{
    Config, DragSettings, DragSortHeuristics, DragSortSettings, LayoutSettings, VisibilitySettings,
};
use crate::layout_engine::LayoutId;
use crate::model::emitter::{GridEvent, SortAction};
use crate::model::item::{Item, SortData};
use crate::model::registry::{GridId, ItemId};
use crate::sys::geometry::{Point, Size};
use crate::sys::host::{ElementHost, ElementId, ItemFlag};

/// Called when a layout settles with the items it positioned and whether a
/// newer layout replaced it before it finished.
pub type LayoutCallback = Box<dyn FnOnce(&[ItemId], bool)>;
/// Called when a show or hide batch settles with the items that completed
/// without interruption.
pub type BatchCallback = Box<dyn FnOnce(Vec<ItemId>)>;
pub type SortDataFn = Rc<dyn Fn(ElementId) -> SortData>;

#[derive(Clone, Default)]
pub struct GridSettings {
    pub layout: LayoutSettings,
    pub visibility: VisibilitySettings,
    pub drag: DragSettings,
    pub drag_sort: DragSortSettings,
    pub drag_sort_heuristics: DragSortHeuristics,
    /// Element dragged items are moved into for the duration of a drag.
    pub drag_container: Option<ElementId>,
    pub sort_data: Option<SortDataFn>,
}

impl From<&Config> for GridSettings {
    fn from(config: &Config) -> Self {
        GridSettings {
            layout: config.layout.clone(),
            visibility: config.visibility.clone(),
            drag: config.drag.clone(),
            drag_sort: config.drag_sort.clone(),
            drag_sort_heuristics: config.drag_sort_heuristics.clone(),
            drag_container: None,
            sort_data: None,
        }
    }
}

impl fmt::Debug for GridSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridSettings")
            .field("layout", &self.layout)
            .field("visibility", &self.visibility)
            .field("drag", &self.drag)
            .field("drag_sort", &self.drag_sort)
            .field("drag_sort_heuristics", &self.drag_sort_heuristics)
            .field("drag_container", &self.drag_container)
            .field("sort_data", &self.sort_data.is_some())
            .finish()
    }
}

/// An item addressed by index (negative counts from the end) or by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Index(isize),
    Item(ItemId),
}

impl From<isize> for Position {
    fn from(index: isize) -> Self { Position::Index(index) }
}

impl From<ItemId> for Position {
    fn from(item: ItemId) -> Self { Position::Item(item) }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub name: String,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(name: &str) -> Self { SortKey { name: name.to_string(), descending: false } }

    pub fn desc(name: &str) -> Self { SortKey { name: name.to_string(), descending: true } }
}

pub enum SortBy {
    Comparator(Box<dyn Fn(&Item, &Item) -> Ordering>),
    Keys(Vec<SortKey>),
    /// The complete new order.
    Order(Vec<ItemId>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    /// Container the element moves into while it animates to the new grid.
    /// Defaults to the target grid's container.
    pub append_to: Option<ElementId>,
    pub layout_sender: bool,
    pub layout_receiver: bool,
}

impl Default for SendOptions {
    fn default() -> Self {
        SendOptions {
            append_to: None,
            layout_sender: true,
            layout_receiver: true,
        }
    }
}

pub(crate) struct PendingLayout {
    pub id: LayoutId,
    pub instant: bool,
    pub items: Vec<ItemId>,
    pub callback: Option<LayoutCallback>,
}

/// A show or hide waiting for the next layout to start.
pub(crate) struct VisibilityBatch {
    pub show: bool,
    pub items: Vec<ItemId>,
    pub instant: bool,
    /// Whether the batch changed which items take part in the layout and
    /// therefore announces itself with start and end events.
    pub announce: bool,
    pub callback: Option<BatchCallback>,
}

pub struct Grid {
    pub(crate) id: GridId,
    pub(crate) container: ElementId,
    pub(crate) settings: GridSettings,
    pub(crate) items: Vec<ItemId>,
    pub(crate) connections: Vec<GridId>,
    pub(crate) size: Size,
    pub(crate) current_layout: Rc<Cell<LayoutId>>,
    pub(crate) layout_finished: Rc<Cell<bool>>,
    pub(crate) layout_items: Vec<ItemId>,
    pub(crate) pending: Option<PendingLayout>,
    pub(crate) deferred: Vec<VisibilityBatch>,
}

impl Grid {
    fn new(id: GridId, container: ElementId, settings: GridSettings) -> Self {
        Grid {
            id,
            container,
            settings,
            items: Vec::new(),
            connections: Vec::new(),
            size: Size::default(),
            current_layout: Rc::new(Cell::new(LayoutId::default())),
            layout_finished: Rc::new(Cell::new(true)),
            layout_items: Vec::new(),
            pending: None,
            deferred: Vec::new(),
        }
    }

    pub fn id(&self) -> GridId { self.id }

    pub fn container(&self) -> ElementId { self.container }

    pub fn settings(&self) -> &GridSettings { &self.settings }

    pub fn items(&self) -> &[ItemId] { &self.items }

    pub fn connections(&self) -> &[GridId] { &self.connections }

    /// Content size of the last applied layout.
    pub fn size(&self) -> Size { self.size }

    pub fn is_layout_finished(&self) -> bool { self.layout_finished.get() }

    pub fn has_pending_layout(&self) -> bool { self.pending.is_some() }

    pub fn index_of(&self, item: ItemId) -> Option<usize> { self.items.iter().position(|&i| i == item) }

    /// Resolves a position to an item of this grid.
    pub fn resolve(&self, position: Position) -> Option<ItemId> {
        match position {
            Position::Item(item) => self.index_of(item).map(|_| item),
            Position::Index(index) => {
                let len = self.items.len() as isize;
                let index = if index < 0 { len + index } else { index };
                usize::try_from(index).ok().and_then(|index| self.items.get(index).copied())
            }
        }
    }
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grid")
            .field("id", &self.id)
            .field("container", &self.container)
            .field("items", &self.items)
            .field("size", &self.size)
            .field("pending", &self.pending.as_ref().map(|pending| pending.id))
            .finish()
    }
}

pub(crate) fn array_move(items: &mut Vec<ItemId>, from: usize, to: usize) {
    if from == to || from >= items.len() || to >= items.len() {
        return;
    }
    let item = items.remove(from);
    items.insert(to, item);
}

pub(crate) fn apply_action(items: &mut Vec<ItemId>, from: usize, to: usize, action: SortAction) {
    match action {
        SortAction::Move => array_move(items, from, to),
        SortAction::Swap => {
            if from < items.len() && to < items.len() {
                items.swap(from, to);
            }
        }
    }
}

impl<H> Engine<H>
where H: ElementHost + 'static
{
    pub fn add_grid(&mut self, container: ElementId, settings: GridSettings) -> Result<GridId, EngineError> {
        if self.grids.values().any(|grid| grid.container == container) {
            return Err(EngineError::InvalidContainer(container));
        }
        let issues = [
            settings.layout.validate(),
            settings.visibility.validate(),
            settings.drag.validate(),
            settings.drag_sort.validate(),
            settings.drag_sort_heuristics.validate(),
        ]
        .concat();
        for issue in issues {
            warn!(?container, issue, "Grid settings issue");
        }
        let id = self.grids.insert_with_key(|id| Grid::new(id, container, settings));
        info!(grid = ?id, ?container, "Created grid");
        Ok(id)
    }

    /// Declares the grids an item dragged out of `grid` may migrate into.
    pub fn connect_drag_sort(&mut self, grid: GridId, targets: &[GridId]) -> Result<(), EngineError> {
        for &target in targets {
            self.grid(target)?;
        }
        let grid = self.grid_mut(grid)?;
        grid.connections = targets.iter().copied().filter(|&target| target != grid.id).collect();
        Ok(())
    }

    pub fn destroy_grid(&mut self, grid: GridId, remove_elements: bool) -> Result<(), EngineError> {
        let items = self.grid(grid)?.items.clone();
        for item in items {
            self.destroy_item(item, remove_elements);
        }
        if let Some(pool) = &self.pool {
            pool.cancel(grid);
        }
        self.events.emit(GridEvent::Destroy { grid });
        if let Some(mut removed) = self.grids.remove(grid) {
            // Batches still waiting on the layout never ran; none completed.
            for batch in removed.deferred.drain(..) {
                if let Some(callback) = batch.callback {
                    callback(Vec::new());
                }
            }
            if let Some(pending) = removed.pending.take()
                && let Some(callback) = pending.callback
            {
                callback(&pending.items, true);
            }
        }
        for other in self.grids.values_mut() {
            other.connections.retain(|&target| target != grid);
        }
        self.retired.insert(grid);
        info!(?grid, "Destroyed grid");
        Ok(())
    }

    /// Creates items for `elements` and inserts them at `index` (negative
    /// counts from the end, -1 appends).
    pub fn add_items(
        &mut self,
        grid: GridId,
        elements: &[ElementId],
        index: isize,
        layout: bool,
    ) -> Result<Vec<ItemId>, EngineError> {
        let container = self.grid(grid)?.container;
        let mut seen = HashSet::default();
        for &element in elements {
            if let Some(item) = self.elements.get(element) {
                return Err(EngineError::ElementOwned { element, item });
            }
            if !seen.insert(element) {
                return Err(EngineError::DuplicateElement(element));
            }
        }

        let mut added = Vec::with_capacity(elements.len());
        for &element in elements {
            let size = self.host.measure(element);
            let id = self
                .items
                .insert_with_key(|id| Item::new(id, element, grid, container, size, true));
            if let Err(item) = self.elements.insert(element, id) {
                self.items.remove(id);
                return Err(EngineError::ElementOwned { element, item });
            }
            self.host.append_to(element, container);
            self.host.set_translate(element, Point::ZERO);
            self.host.set_flag(element, ItemFlag::Visible, true);
            if let Some(item) = self.items.get_mut(id) {
                item.positioning.skip_next_animation();
            }
            added.push(id);
        }

        let grid_ref = self.grid_mut(grid)?;
        let at = crate::actor::drag_sort::normalize_array_index(grid_ref.items.len(), index, 1);
        grid_ref.items.splice(at..at, added.iter().copied());
        debug!(?grid, count = added.len(), at, "Added items");

        self.events.emit(GridEvent::Add { grid, items: added.clone() });
        if layout && !added.is_empty() {
            self.layout(grid, false, None)?;
        }
        Ok(added)
    }

    /// Destroys `items` and returns the indices they had.
    pub fn remove_items(
        &mut self,
        grid: GridId,
        items: &[ItemId],
        remove_elements: bool,
        layout: bool,
    ) -> Result<Vec<usize>, EngineError> {
        self.grid(grid)?;
        let mut removed = Vec::new();
        let mut indices = Vec::new();
        let mut needs_layout = false;
        for &item in items {
            let Some(index) = self.grid(grid)?.index_of(item) else {
                continue;
            };
            needs_layout |= self.items.get(item).is_some_and(|item| item.active);
            indices.push(index);
            removed.push(item);
            self.destroy_item(item, remove_elements);
        }
        self.events.emit(GridEvent::Remove {
            grid,
            items: removed,
            indices: indices.clone(),
        });
        if needs_layout && layout {
            self.layout(grid, false, None)?;
        }
        Ok(indices)
    }

    /// Re-measures every item of the grid.
    pub fn refresh_items(&mut self, grid: GridId) -> Result<(), EngineError> {
        let items = self.grid(grid)?.items.clone();
        self.refresh_item_sizes(&items);
        Ok(())
    }

    pub(crate) fn refresh_item_sizes(&mut self, items: &[ItemId]) {
        for &id in items {
            if let Some(item) = self.items.get_mut(id) {
                let size = self.host.measure(item.element);
                item.refresh(size);
            }
        }
    }

    pub fn refresh_sort_data(&mut self, grid: GridId) -> Result<(), EngineError> {
        let items = self.grid(grid)?.items.clone();
        for item in items {
            self.refresh_item_sort_data(item);
        }
        Ok(())
    }

    pub(crate) fn refresh_item_sort_data(&mut self, id: ItemId) {
        let Some(item) = self.items.get(id) else {
            return;
        };
        let extractor = self.grids.get(item.grid).and_then(|grid| grid.settings.sort_data.clone());
        let data = extractor.map(|extract| extract(item.element)).unwrap_or_default();
        if let Some(item) = self.items.get_mut(id) {
            item.sort_data = Some(data);
        }
    }

    /// Reorders the grid's items. Sorting is stable; `descending` reverses
    /// the final order.
    pub fn sort(&mut self, grid: GridId, by: SortBy, descending: bool, layout: bool) -> Result<(), EngineError> {
        let previous = self.grid(grid)?.items.clone();
        let mut sorted = previous.clone();

        match by {
            SortBy::Comparator(compare) => {
                sorted.sort_by(|a, b| match (self.items.get(*a), self.items.get(*b)) {
                    (Some(a), Some(b)) => compare(a, b),
                    _ => Ordering::Equal,
                });
            }
            SortBy::Keys(keys) => {
                for &item in &previous {
                    if self.items.get(item).is_some_and(|item| item.sort_data.is_none()) {
                        self.refresh_item_sort_data(item);
                    }
                }
                sorted.sort_by(|a, b| self.compare_by_keys(*a, *b, &keys));
            }
            SortBy::Order(order) => {
                let expected: HashSet<ItemId> = previous.iter().copied().collect();
                let given: HashSet<ItemId> = order.iter().copied().collect();
                if order.len() != previous.len() || given != expected {
                    return Err(EngineError::InvalidSortOrder);
                }
                sorted = order;
            }
        }
        if descending {
            sorted.reverse();
        }

        self.grid_mut(grid)?.items = sorted.clone();
        debug!(?grid, count = sorted.len(), "Sorted items");
        self.events.emit(GridEvent::Sort { grid, items: sorted, previous });
        if layout {
            self.layout(grid, false, None)?;
        }
        Ok(())
    }

    fn compare_by_keys(&self, a: ItemId, b: ItemId, keys: &[SortKey]) -> Ordering {
        let data = |id: ItemId| self.items.get(id).and_then(|item| item.sort_data.as_ref());
        let (Some(a), Some(b)) = (data(a), data(b)) else {
            return Ordering::Equal;
        };
        for key in keys {
            let ordering = match (a.get(&key.name), b.get(&key.name)) {
                (Some(a), Some(b)) => a.compare(b),
                _ => Ordering::Equal,
            };
            let ordering = if key.descending { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Moves `item` to the place of `to`. Returns false when either position
    /// does not resolve or both name the same item.
    pub fn move_item(
        &mut self,
        grid: GridId,
        item: Position,
        to: Position,
        action: SortAction,
        layout: bool,
    ) -> Result<bool, EngineError> {
        let grid_ref = self.grid(grid)?;
        let (Some(from_item), Some(to_item)) = (grid_ref.resolve(item), grid_ref.resolve(to)) else {
            return Ok(false);
        };
        if from_item == to_item {
            return Ok(false);
        }
        let (Some(from_index), Some(to_index)) = (grid_ref.index_of(from_item), grid_ref.index_of(to_item))
        else {
            return Ok(false);
        };

        apply_action(&mut self.grid_mut(grid)?.items, from_index, to_index, action);
        self.events.emit(GridEvent::Move {
            grid,
            item: from_item,
            from_index,
            to_index,
            action,
        });
        if layout {
            self.layout(grid, false, None)?;
        }
        Ok(true)
    }

    /// Tears an item down: pending callbacks are flushed as interrupted, the
    /// element is cleared (and removed when asked) and the item leaves its
    /// grid.
    pub(crate) fn destroy_item(&mut self, id: ItemId, remove_element: bool) {
        if self.drag.as_ref().is_some_and(|drag| drag.session.item == id) {
            self.drag = None;
        }
        if self.pending_start.as_ref().is_some_and(|start| start.item() == id) {
            self.pending_start = None;
        }
        self.cancel_item_tasks(id);

        let Some(item) = self.items.get_mut(id) else {
            return;
        };
        if !item.destroy() {
            return;
        }
        let (element, grid) = (item.element, item.grid);
        if let Some(grid) = self.grids.get_mut(grid) {
            grid.items.retain(|&other| other != id);
        }
        self.elements.remove(element, id);
        self.host.clear(element);
        if remove_element {
            self.host.remove(element);
        }
        self.items.remove(id);
        debug!(item = ?id, ?element, "Destroyed item");
    }
}
