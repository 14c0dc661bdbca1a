use thiserror::Error;

use crate::layout_engine::WorkerError;
use crate::model::registry::{GridId, ItemId};
use crate::sys::host::ElementId;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Grid not found: {0:?}")]
    UnknownGrid(GridId),
    #[error("Grid has been destroyed: {0:?}")]
    DestroyedGrid(GridId),
    #[error("Item not found: {0:?}")]
    UnknownItem(ItemId),
    #[error("Item {item:?} does not belong to grid {grid:?}")]
    ForeignItem { item: ItemId, grid: GridId },
    #[error("Element {0:?} already hosts a grid")]
    InvalidContainer(ElementId),
    #[error("Element {element:?} already belongs to item {item:?}")]
    ElementOwned { element: ElementId, item: ItemId },
    #[error("Element {0:?} was passed more than once")]
    DuplicateElement(ElementId),
    #[error("Sort order must list every item of the grid exactly once")]
    InvalidSortOrder,
    #[error("Packing workers failed: {0}")]
    Worker(#[from] WorkerError),
}
