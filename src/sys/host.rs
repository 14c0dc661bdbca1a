//! Boundary between the engine and whatever renders the items.
//!
//! The engine never reads or writes element state except through
//! [`ElementHost`]. [`HeadlessHost`] keeps everything in memory and records
//! every write, which is what the binary and the tests run against.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::common::collections::{HashMap, HashSet};
use crate::layout_engine::ItemSize;
use crate::sys::geometry::{Point, Rect};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(pub u64);

/// State markers the host can reflect however it likes (CSS classes in a
/// browser).
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display,
)]
#[strum(serialize_all = "snake_case")]
pub enum ItemFlag {
    Positioning,
    Dragging,
    Releasing,
    Visible,
    Hidden,
}

pub trait ElementHost {
    /// Content size and margins of an element.
    fn measure(&self, element: ElementId) -> ItemSize;
    /// Content box of a container in client coordinates.
    fn container_rect(&self, container: ElementId) -> Rect;
    /// Translation of an element relative to its parent container.
    fn set_translate(&mut self, element: ElementId, translate: Point);
    /// 0 applies the hidden styles, 1 the visible ones.
    fn set_visibility(&mut self, element: ElementId, amount: f64);
    fn set_displayed(&mut self, element: ElementId, displayed: bool);
    fn append_to(&mut self, element: ElementId, container: ElementId);
    fn set_flag(&mut self, element: ElementId, flag: ItemFlag, on: bool);
    /// Strips everything the engine ever wrote to the element.
    fn clear(&mut self, element: ElementId);
    fn remove(&mut self, element: ElementId);
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostWrite {
    Translate(ElementId, Point),
    Visibility(ElementId, f64),
    Displayed(ElementId, bool),
    Append(ElementId, ElementId),
    Flag(ElementId, ItemFlag, bool),
    Clear(ElementId),
    Remove(ElementId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementState {
    pub translate: Point,
    pub visibility: f64,
    pub displayed: bool,
    pub parent: Option<ElementId>,
    pub flags: HashSet<ItemFlag>,
    pub removed: bool,
}

impl Default for ElementState {
    fn default() -> Self {
        ElementState {
            translate: Point::ZERO,
            visibility: 1.0,
            displayed: true,
            parent: None,
            flags: HashSet::default(),
            removed: false,
        }
    }
}

impl ElementState {
    pub fn has_flag(&self, flag: ItemFlag) -> bool { self.flags.contains(&flag) }
}

#[derive(Debug, Default)]
pub struct HeadlessHost {
    metrics: HashMap<ElementId, ItemSize>,
    containers: HashMap<ElementId, Rect>,
    elements: HashMap<ElementId, ElementState>,
    writes: Vec<HostWrite>,
}

impl HeadlessHost {
    pub fn new() -> Self { Self::default() }

    pub fn set_metrics(&mut self, element: ElementId, size: ItemSize) {
        self.metrics.insert(element, size);
    }

    pub fn set_container_rect(&mut self, container: ElementId, rect: Rect) {
        self.containers.insert(container, rect);
    }

    pub fn element(&self, element: ElementId) -> Option<&ElementState> { self.elements.get(&element) }

    pub fn translate(&self, element: ElementId) -> Option<Point> {
        self.elements.get(&element).map(|state| state.translate)
    }

    pub fn parent(&self, element: ElementId) -> Option<ElementId> {
        self.elements.get(&element).and_then(|state| state.parent)
    }

    pub fn writes(&self) -> &[HostWrite] { &self.writes }

    pub fn take_writes(&mut self) -> Vec<HostWrite> { std::mem::take(&mut self.writes) }

    fn state(&mut self, element: ElementId) -> &mut ElementState {
        self.elements.entry(element).or_default()
    }
}

impl ElementHost for HeadlessHost {
    fn measure(&self, element: ElementId) -> ItemSize {
        self.metrics.get(&element).copied().unwrap_or_default()
    }

    fn container_rect(&self, container: ElementId) -> Rect {
        self.containers.get(&container).copied().unwrap_or(Rect::ZERO)
    }

    fn set_translate(&mut self, element: ElementId, translate: Point) {
        self.state(element).translate = translate;
        self.writes.push(HostWrite::Translate(element, translate));
    }

    fn set_visibility(&mut self, element: ElementId, amount: f64) {
        self.state(element).visibility = amount;
        self.writes.push(HostWrite::Visibility(element, amount));
    }

    fn set_displayed(&mut self, element: ElementId, displayed: bool) {
        self.state(element).displayed = displayed;
        self.writes.push(HostWrite::Displayed(element, displayed));
    }

    fn append_to(&mut self, element: ElementId, container: ElementId) {
        trace!(?element, ?container, "Reparenting element");
        self.state(element).parent = Some(container);
        self.writes.push(HostWrite::Append(element, container));
    }

    fn set_flag(&mut self, element: ElementId, flag: ItemFlag, on: bool) {
        let state = self.state(element);
        let changed = if on { state.flags.insert(flag) } else { state.flags.remove(&flag) };
        if changed {
            self.writes.push(HostWrite::Flag(element, flag, on));
        }
    }

    fn clear(&mut self, element: ElementId) {
        let state = self.state(element);
        let parent = state.parent;
        *state = ElementState { parent, ..ElementState::default() };
        self.writes.push(HostWrite::Clear(element));
    }

    fn remove(&mut self, element: ElementId) {
        let state = self.state(element);
        state.parent = None;
        state.removed = true;
        self.writes.push(HostWrite::Remove(element));
    }
}
