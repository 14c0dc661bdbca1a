pub mod callbacks;
pub mod emitter;
pub mod item;
pub mod registry;
pub mod tween;

pub use callbacks::{CallbackQueue, Completion};
pub use emitter::{EventBus, EventKind, GridEvent, ListenerId, Migration, SortAction};
pub use item::{Item, SortData, SortValue};
pub use registry::{ElementIndex, GridId, ItemId};
