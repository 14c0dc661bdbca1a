//! Engine events and the bus that delivers them.
//!
//! Listeners are snapshotted when an event is emitted: adding or removing a
//! listener from inside a callback only affects later emissions.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use strum_macros::EnumDiscriminants;
use tracing::trace;

use super::registry::{GridId, ItemId};
use crate::sys::geometry::Point;

/// How a dragged or moved item trades places with its target.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, strum_macros::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SortAction {
    /// Shift everything between the two indices by one.
    #[default]
    Move,
    /// Exchange positions with the target only.
    Swap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Migration {
    pub item: ItemId,
    pub from_grid: GridId,
    pub from_index: usize,
    pub to_grid: GridId,
    pub to_index: usize,
}

#[derive(Debug, Clone, PartialEq, EnumDiscriminants)]
#[strum_discriminants(name(EventKind))]
#[strum_discriminants(derive(
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::IntoStaticStr,
    strum_macros::VariantNames
))]
#[strum_discriminants(strum(serialize_all = "camelCase"))]
#[strum_discriminants(serde(rename_all = "camelCase"))]
pub enum GridEvent {
    Add { grid: GridId, items: Vec<ItemId> },
    Remove { grid: GridId, items: Vec<ItemId>, indices: Vec<usize> },
    ShowStart { grid: GridId, items: Vec<ItemId> },
    ShowEnd { grid: GridId, items: Vec<ItemId> },
    HideStart { grid: GridId, items: Vec<ItemId> },
    HideEnd { grid: GridId, items: Vec<ItemId> },
    Filter { grid: GridId, shown: Vec<ItemId>, hidden: Vec<ItemId> },
    Sort { grid: GridId, items: Vec<ItemId>, previous: Vec<ItemId> },
    Move { grid: GridId, item: ItemId, from_index: usize, to_index: usize, action: SortAction },
    LayoutStart { grid: GridId, items: Vec<ItemId>, instant: bool },
    LayoutEnd { grid: GridId, items: Vec<ItemId> },
    LayoutAbort { grid: GridId, items: Vec<ItemId> },
    DragInit { grid: GridId, item: ItemId, pointer: Point },
    DragStart { grid: GridId, item: ItemId, pointer: Point },
    DragMove { grid: GridId, item: ItemId, pointer: Point },
    DragEnd { grid: GridId, item: ItemId, pointer: Point },
    DragReleaseStart { grid: GridId, item: ItemId },
    DragReleaseEnd { grid: GridId, item: ItemId },
    BeforeSend(Migration),
    BeforeReceive(Migration),
    Send(Migration),
    Receive(Migration),
    Destroy { grid: GridId },
}

impl GridEvent {
    pub fn kind(&self) -> EventKind { EventKind::from(self) }

    pub fn name(&self) -> &'static str { self.kind().into() }

    /// The grid whose listeners care about this event. Migration events
    /// belong to the sending grid for `BeforeSend`/`Send` and to the
    /// receiving grid otherwise.
    pub fn grid(&self) -> GridId {
        match self {
            GridEvent::Add { grid, .. }
            | GridEvent::Remove { grid, .. }
            | GridEvent::ShowStart { grid, .. }
            | GridEvent::ShowEnd { grid, .. }
            | GridEvent::HideStart { grid, .. }
            | GridEvent::HideEnd { grid, .. }
            | GridEvent::Filter { grid, .. }
            | GridEvent::Sort { grid, .. }
            | GridEvent::Move { grid, .. }
            | GridEvent::LayoutStart { grid, .. }
            | GridEvent::LayoutEnd { grid, .. }
            | GridEvent::LayoutAbort { grid, .. }
            | GridEvent::DragInit { grid, .. }
            | GridEvent::DragStart { grid, .. }
            | GridEvent::DragMove { grid, .. }
            | GridEvent::DragEnd { grid, .. }
            | GridEvent::DragReleaseStart { grid, .. }
            | GridEvent::DragReleaseEnd { grid, .. }
            | GridEvent::Destroy { grid } => *grid,
            GridEvent::BeforeSend(m) | GridEvent::Send(m) => m.from_grid,
            GridEvent::BeforeReceive(m) | GridEvent::Receive(m) => m.to_grid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Rc<RefCell<dyn FnMut(&GridEvent)>>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(ListenerId, EventKind, Listener)>,
}

/// Cheap to clone; clones share the listener table.
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Rc<RefCell<Listeners>>,
}

impl EventBus {
    pub fn new() -> Self { Self::default() }

    pub fn on(&self, kind: EventKind, listener: impl FnMut(&GridEvent) + 'static) -> ListenerId {
        let mut listeners = self.listeners.borrow_mut();
        listeners.next_id += 1;
        let id = ListenerId(listeners.next_id);
        listeners.entries.push((id, kind, Rc::new(RefCell::new(listener))));
        id
    }

    /// Returns false if the listener was already gone.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.entries.len();
        listeners.entries.retain(|(entry, ..)| *entry != id);
        listeners.entries.len() != before
    }

    pub fn has_listeners(&self, kind: EventKind) -> bool {
        self.listeners.borrow().entries.iter().any(|(_, k, _)| *k == kind)
    }

    pub fn emit(&self, event: GridEvent) {
        let snapshot: Vec<Listener> = self
            .listeners
            .borrow()
            .entries
            .iter()
            .filter(|(_, kind, _)| *kind == event.kind())
            .map(|(.., listener)| listener.clone())
            .collect();
        trace!(event = event.name(), listeners = snapshot.len(), "Emitting");
        for listener in snapshot {
            // A listener that re-emits the event it is handling would need to
            // borrow itself again; such nested emissions skip it.
            if let Ok(mut listener) = listener.try_borrow_mut() {
                (&mut *listener)(&event);
            }
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.borrow().entries.len())
            .finish()
    }
}
