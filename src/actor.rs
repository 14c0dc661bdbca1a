pub mod drag_sort;
pub mod drag_start;

pub use drag_sort::{DragSortManager, SortCandidate, SortCheck, SortIntent, SortPlan, SortTarget};
pub use drag_start::DragStartPredicate;
