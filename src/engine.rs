//! The grid orchestrator.
//!
//! [`Engine`] owns every grid, every item and the frame ticker. Public
//! operations mutate the collections synchronously and schedule whatever
//! animation work they need; the host drives time forward by calling
//! [`Engine::tick`] once per animation frame. All element access goes
//! through the [`ElementHost`] the engine was created with.
//!
//! Grids and items reference each other by id only. A grid lists its items
//! in order; an item records the grid it belongs to. Both sides are updated
//! together inside one call so listeners never see an item in two grids or
//! in none.

mod drag;
mod error;
mod grid;
mod layout;
mod migrate;
mod visibility;

#[cfg(test)]
mod tests;

use slotmap::SlotMap;
use tracing::{debug, info, warn};

pub use self::error::EngineError;
pub use self::grid::{
    BatchCallback, Grid, GridSettings, LayoutCallback, Position, SendOptions, SortBy, SortDataFn, SortKey,
};
use crate::actor::{DragSortManager, DragStartPredicate};
use crate::common::collections::HashSet;
use crate::common::config::Config;
use crate::layout_engine::{LayoutId, Packer, PackerPool};
use crate::model::emitter::{EventBus, EventKind, GridEvent, ListenerId};
use crate::model::item::{DragSession, Item};
use crate::model::registry::{ElementIndex, GridId, ItemId};
use crate::sys::host::{ElementHost, ElementId};
use crate::sys::ticker::Ticker;

const LANE_COUNT: usize = 2;

/// What an item is waiting on in the ticker. Each kind holds at most one
/// read and one write task per item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TaskKind {
    Layout,
    Visibility,
}

pub(crate) type TaskKey = (TaskKind, ItemId);
pub(crate) type Task<H> = Box<dyn FnOnce(&mut Engine<H>)>;

/// The drag in progress together with its sort heuristics.
pub(crate) struct ActiveDrag {
    pub session: DragSession,
    pub sorter: DragSortManager,
}

pub struct Engine<H: ElementHost + 'static> {
    pub(crate) host: H,
    config: Config,
    pub(crate) grids: SlotMap<GridId, Grid>,
    pub(crate) retired: HashSet<GridId>,
    pub(crate) items: SlotMap<ItemId, Item>,
    pub(crate) elements: ElementIndex,
    pub(crate) ticker: Ticker<TaskKey, Task<H>>,
    pub(crate) events: EventBus,
    /// Frame time in milliseconds, as last passed to `tick` or a pointer call.
    pub(crate) now: f64,
    pub(crate) next_layout: LayoutId,
    pub(crate) pool: Option<PackerPool<GridId>>,
    pub(crate) packer: Packer,
    pub(crate) drag: Option<ActiveDrag>,
    pub(crate) pending_start: Option<DragStartPredicate>,
}

impl<H> Engine<H>
where H: ElementHost + 'static
{
    /// Creates an engine. `config.layout.workers > 0` spawns that many
    /// packing threads for grids above the worker threshold.
    pub fn new(host: H, config: Config) -> Result<Self, EngineError> {
        for issue in config.validate() {
            warn!(issue, "Config issue");
        }
        let pool = match config.layout.workers {
            0 => None,
            workers => Some(PackerPool::new(workers)?),
        };
        info!(workers = config.layout.workers, "Engine ready");
        Ok(Engine {
            host,
            config,
            grids: SlotMap::with_key(),
            retired: HashSet::default(),
            items: SlotMap::with_key(),
            elements: ElementIndex::default(),
            ticker: Ticker::new(LANE_COUNT),
            events: EventBus::new(),
            now: 0.0,
            next_layout: LayoutId::default(),
            pool,
            packer: Packer::new(),
            drag: None,
            pending_start: None,
        })
    }

    pub fn config(&self) -> &Config { &self.config }

    /// Settings for a new grid, taken from the engine's config.
    pub fn grid_settings(&self) -> GridSettings { GridSettings::from(&self.config) }

    pub fn host(&self) -> &H { &self.host }

    pub fn host_mut(&mut self) -> &mut H { &mut self.host }

    pub fn now(&self) -> f64 { self.now }

    pub fn grid(&self, id: GridId) -> Result<&Grid, EngineError> {
        self.grids.get(id).ok_or_else(|| self.missing_grid(id))
    }

    pub(crate) fn grid_mut(&mut self, id: GridId) -> Result<&mut Grid, EngineError> {
        if !self.grids.contains_key(id) {
            return Err(self.missing_grid(id));
        }
        self.grids.get_mut(id).ok_or(EngineError::UnknownGrid(id))
    }

    fn missing_grid(&self, id: GridId) -> EngineError {
        if self.retired.contains(&id) {
            EngineError::DestroyedGrid(id)
        } else {
            EngineError::UnknownGrid(id)
        }
    }

    pub fn grids(&self) -> impl Iterator<Item = &Grid> { self.grids.values() }

    pub fn item(&self, id: ItemId) -> Result<&Item, EngineError> {
        self.items.get(id).ok_or(EngineError::UnknownItem(id))
    }

    /// The grid's items in order.
    pub fn items_of(&self, grid: GridId) -> Result<Vec<&Item>, EngineError> {
        Ok(self.grid(grid)?.items.iter().filter_map(|&id| self.items.get(id)).collect())
    }

    pub fn item_for_element(&self, element: ElementId) -> Option<ItemId> { self.elements.get(element) }

    /// Fails unless `item` exists and belongs to `grid`.
    pub(crate) fn owned_item(&self, grid: GridId, item: ItemId) -> Result<&Item, EngineError> {
        let found = self.item(item)?;
        if found.grid != grid {
            return Err(EngineError::ForeignItem { item, grid });
        }
        Ok(found)
    }

    pub fn on(&self, kind: EventKind, listener: impl FnMut(&GridEvent) + 'static) -> ListenerId {
        self.events.on(kind, listener)
    }

    pub fn off(&self, id: ListenerId) -> bool { self.events.off(id) }

    pub fn events(&self) -> &EventBus { &self.events }

    /// Hook the ticker calls when it goes from idle to having work.
    pub fn set_frame_request(&mut self, on_request: impl FnMut() + 'static) {
        self.ticker.set_frame_request(on_request);
    }

    /// The item being dragged, if any.
    pub fn dragged_item(&self) -> Option<ItemId> { self.drag.as_ref().map(|drag| drag.session.item) }

    /// True when no frame work, worker job or drag is outstanding.
    pub fn is_idle(&self) -> bool {
        let layouts_pending = self.grids.values().any(|grid| grid.pending.is_some());
        self.ticker.pending_tasks() == 0 && !layouts_pending && self.drag.is_none() && self.pending_start.is_none()
    }

    /// Runs one animation frame at time `now` (milliseconds). Applies
    /// finished worker layouts, resolves a delayed drag start, fires a
    /// trailing sort evaluation and then every task queued for this frame,
    /// reads before writes. Returns the number of tasks run.
    pub fn tick(&mut self, now: f64) -> usize {
        self.now = now;

        if self.pending_start.as_ref().is_some_and(|start| start.on_tick(now))
            && let Some(start) = self.pending_start.take()
        {
            self.start_drag(start.item(), start.origin());
            if start.pointer() != start.origin() {
                self.pointer_move(start.pointer(), now);
            }
        }

        self.poll_layouts();

        if self.drag.as_mut().is_some_and(|drag| drag.sorter.on_tick(now)) {
            self.evaluate_sort();
        }

        let tasks = self.ticker.take_frame();
        let count = tasks.len();
        for task in tasks {
            task(self);
        }
        if count > 0 {
            debug!(now, tasks = count, "Ran frame");
        }
        count
    }

    /// Ticks every `step` milliseconds until the engine has no pending
    /// frame work, or `max_frames` frames ran. Returns the final time.
    pub fn settle(&mut self, mut now: f64, step: f64, max_frames: usize) -> f64 {
        for _ in 0..max_frames {
            let busy = self.ticker.pending_tasks() > 0
                || self.grids.values().any(|grid| grid.pending.is_some())
                || self.drag.as_ref().is_some_and(|drag| drag.sorter.is_sort_pending());
            if !busy {
                break;
            }
            now += step;
            self.tick(now);
            if self.pool.is_some() && self.ticker.pending_tasks() == 0 {
                std::thread::yield_now();
            }
        }
        now
    }
}
