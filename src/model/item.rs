//! Per-item state.
//!
//! An item composes four independent sub-machines (visibility, positioning,
//! drag and migration). Each one is an enum or a small struct so that
//! contradictory combinations cannot be expressed. None of them touch the
//! host: the engine reads their decisions and performs the writes.

pub mod drag;
pub mod layout;
pub mod migrate;
pub mod visibility;

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::trace;

pub use self::drag::{DragPhase, DragSession};
pub use self::layout::{PositionOutcome, Positioning};
pub use self::migrate::Migrate;
pub use self::visibility::{Visibility, VisibilityState, VisibilityStep};
use super::registry::{GridId, ItemId};
use crate::common::collections::BTreeMap;
use crate::layout_engine::ItemSize;
use crate::sys::geometry::{Point, Rect};
use crate::sys::host::ElementId;

/// A single sortable value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum SortValue {
    Number(f64),
    Text(String),
}

impl SortValue {
    /// Numbers order before text. NaN compares equal to everything.
    pub fn compare(&self, other: &SortValue) -> Ordering {
        match (self, other) {
            (SortValue::Number(a), SortValue::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
            (SortValue::Number(_), SortValue::Text(_)) => Ordering::Less,
            (SortValue::Text(_), SortValue::Number(_)) => Ordering::Greater,
        }
    }
}

impl From<f64> for SortValue {
    fn from(value: f64) -> Self { SortValue::Number(value) }
}

impl From<&str> for SortValue {
    fn from(value: &str) -> Self { SortValue::Text(value.to_string()) }
}

impl From<String> for SortValue {
    fn from(value: String) -> Self { SortValue::Text(value) }
}

pub type SortData = BTreeMap<String, SortValue>;

#[derive(Debug)]
pub struct Item {
    pub id: ItemId,
    pub element: ElementId,
    pub grid: GridId,
    /// Cached measurement. Only `refresh` updates it.
    pub size: ItemSize,
    /// Slot of the last applied layout, relative to the grid container.
    pub left: f64,
    pub top: f64,
    pub active: bool,
    pub sort_data: Option<SortData>,
    /// Translation last written to the element.
    pub translate: Point,
    /// Container the element currently lives in.
    pub container: ElementId,
    pub visibility: Visibility,
    pub positioning: Positioning,
    pub drag: DragPhase,
    pub migrate: Migrate,
    destroyed: bool,
}

impl Item {
    pub fn new(
        id: ItemId,
        element: ElementId,
        grid: GridId,
        container: ElementId,
        size: ItemSize,
        visible: bool,
    ) -> Self {
        Item {
            id,
            element,
            grid,
            size,
            left: 0.0,
            top: 0.0,
            active: visible,
            sort_data: None,
            translate: Point::ZERO,
            container,
            visibility: Visibility::new(visible),
            positioning: Positioning::default(),
            drag: DragPhase::Idle,
            migrate: Migrate::default(),
            destroyed: false,
        }
    }

    pub fn is_destroyed(&self) -> bool { self.destroyed }

    pub fn is_dragging(&self) -> bool { self.drag.is_dragging() }

    pub fn is_releasing(&self) -> bool { self.drag.is_releasing() }

    pub fn position(&self) -> Point { Point::new(self.left, self.top) }

    /// Content box at the current slot, relative to the grid container.
    pub fn slot_rect(&self) -> Rect {
        Rect::new(
            self.left + self.size.margin_left,
            self.top + self.size.margin_top,
            self.size.width,
            self.size.height,
        )
    }

    pub fn refresh(&mut self, size: ItemSize) {
        if size != self.size {
            trace!(item = ?self.id, ?size, "Refreshed item size");
        }
        self.size = size;
    }

    /// Flushes every pending callback as interrupted and leaves the item
    /// inert. Returns false if it was already destroyed.
    pub fn destroy(&mut self) -> bool {
        if self.destroyed {
            return false;
        }
        self.destroyed = true;
        self.positioning.stop(self.id, true);
        self.visibility.destroy(self.id);
        self.drag = DragPhase::Idle;
        self.migrate.stop();
        self.active = false;
        true
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use pretty_assertions::assert_eq;
    use slotmap::KeyData;

    use super::*;

    fn item(visible: bool) -> Item {
        Item::new(
            ItemId::from(KeyData::from_ffi(1)),
            ElementId(1),
            GridId::from(KeyData::from_ffi(1)),
            ElementId(100),
            ItemSize::new(50.0, 40.0),
            visible,
        )
    }

    #[test]
    fn destroy_interrupts_everything_once() {
        let interrupted = Rc::new(Cell::new(0));
        let mut item = item(true);
        for _ in 0..2 {
            let counter = interrupted.clone();
            let callback: crate::model::callbacks::Completion = Box::new(move |was_interrupted, _| {
                if was_interrupted {
                    counter.set(counter.get() + 1);
                }
            });
            item.positioning.begin(item.id, Point::new(1.0, 1.0), true, Some(callback));
        }
        let counter = interrupted.clone();
        item.visibility.hide(item.id, false, Some(Box::new(move |was_interrupted, _| {
            if was_interrupted {
                counter.set(counter.get() + 1);
            }
        })));

        assert!(item.destroy());
        assert!(!item.destroy());
        // One interrupted by the restart, one by destroy, one hide.
        assert_eq!(interrupted.get(), 3);
        assert!(!item.active);
    }

    #[test]
    fn slot_rect_includes_margins() {
        let mut item = item(true);
        item.size = ItemSize {
            margin_left: 5.0,
            margin_top: 2.0,
            ..ItemSize::new(50.0, 40.0)
        };
        item.left = 100.0;
        item.top = 10.0;
        assert_eq!(item.slot_rect(), Rect::new(105.0, 12.0, 50.0, 40.0));
    }

    #[test]
    fn sort_values_order_numbers_first() {
        let mut values = vec![
            SortValue::from("b"),
            SortValue::from(3.0),
            SortValue::from("a"),
            SortValue::from(1.0),
        ];
        values.sort_by(|a, b| a.compare(b));
        assert_eq!(
            values,
            vec![
                SortValue::from(1.0),
                SortValue::from(3.0),
                SortValue::from("a"),
                SortValue::from("b"),
            ]
        );
    }
}
