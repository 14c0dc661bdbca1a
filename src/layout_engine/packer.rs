use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::free_space::{EPS, FreeSpaceArena, MIN_SLOT_SIZE, RectId};
use crate::sys::geometry::{Rect, Size, round_to_hundredths};

bitflags! {
    /// Packing switches. The bit values double as the options word of the
    /// worker wire format.
    #[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PackerOptions: u32 {
        const FILL_GAPS = 1;
        const HORIZONTAL = 2;
        const ALIGN_RIGHT = 4;
        const ALIGN_BOTTOM = 8;
        const ROUNDING = 16;
    }
}

/// Identifies one layout run. Ids only grow, so a result carrying an older id
/// than the latest request for the same grid is stale.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LayoutId(pub u64);

impl LayoutId {
    pub fn next(self) -> Self { LayoutId(self.0.wrapping_add(1)) }
}

/// Measured outer box of an item: content size plus margins.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(default)]
pub struct ItemSize {
    pub width: f64,
    pub height: f64,
    pub margin_left: f64,
    pub margin_right: f64,
    pub margin_top: f64,
    pub margin_bottom: f64,
}

impl ItemSize {
    pub const fn new(width: f64, height: f64) -> Self {
        ItemSize {
            width,
            height,
            margin_left: 0.0,
            margin_right: 0.0,
            margin_top: 0.0,
            margin_bottom: 0.0,
        }
    }

    pub fn outer(&self) -> Size {
        Size::new(
            self.width + self.margin_left + self.margin_right,
            self.height + self.margin_top + self.margin_bottom,
        )
    }
}

/// Everything a packer needs for one run, in the shape that crosses the
/// worker boundary: outer sizes only, margins already folded in.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct LayoutRequest {
    pub id: LayoutId,
    pub container: Size,
    pub options: PackerOptions,
    pub sizes: Vec<Size>,
}

impl LayoutRequest {
    pub fn new(id: LayoutId, items: &[ItemSize], container: Size, options: PackerOptions) -> Self {
        LayoutRequest {
            id,
            container,
            options,
            sizes: items.iter().map(ItemSize::outer).collect(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct LayoutResult {
    pub id: LayoutId,
    pub width: f64,
    pub height: f64,
    /// `slots[2 * i]` and `slots[2 * i + 1]` hold the left and top of item `i`.
    pub slots: Vec<f64>,
}

impl LayoutResult {
    pub fn len(&self) -> usize { self.slots.len() / 2 }

    pub fn is_empty(&self) -> bool { self.slots.is_empty() }

    pub fn slot(&self, index: usize) -> Option<(f64, f64)> {
        Some((*self.slots.get(index * 2)?, *self.slots.get(index * 2 + 1)?))
    }

    pub fn rects<'a>(&'a self, sizes: &'a [Size]) -> impl Iterator<Item = Rect> + 'a {
        self.slots
            .chunks_exact(2)
            .zip(sizes)
            .map(|(slot, size)| Rect::new(slot[0], slot[1], size.width, size.height))
    }

    /// Reflects every slot across the vertical center line of the layout.
    pub fn mirror_x(&self, sizes: &[Size]) -> LayoutResult {
        let mut mirrored = self.clone();
        for (slot, size) in mirrored.slots.chunks_exact_mut(2).zip(sizes) {
            slot[0] = self.width - (slot[0] + size.width);
        }
        mirrored
    }

    /// Reflects every slot across the horizontal center line of the layout.
    pub fn mirror_y(&self, sizes: &[Size]) -> LayoutResult {
        let mut mirrored = self.clone();
        for (slot, size) in mirrored.slots.chunks_exact_mut(2).zip(sizes) {
            slot[1] = self.height - (slot[1] + size.height);
        }
        mirrored
    }
}

/// Guillotine rectangle packer.
///
/// The packer is deterministic: the same sizes in the same order with the same
/// options always produce the same slots. Its scratch arena is reset at the end
/// of every call, so one instance can be reused but never shares state between
/// runs.
#[derive(Debug, Default)]
pub struct Packer {
    arena: FreeSpaceArena,
    current: Vec<RectId>,
    next: Vec<RectId>,
    shards: Vec<RectId>,
}

struct Bounds {
    width: f64,
    height: f64,
}

impl Packer {
    pub fn new() -> Self { Self::default() }

    pub fn run(&mut self, request: &LayoutRequest) -> LayoutResult {
        self.pack(request.id, &request.sizes, request.container, request.options)
    }

    pub fn compute_layout(
        &mut self,
        id: LayoutId,
        items: &[ItemSize],
        container: Size,
        options: PackerOptions,
    ) -> LayoutResult {
        let sizes: Vec<Size> = items.iter().map(ItemSize::outer).collect();
        self.pack(id, &sizes, container, options)
    }

    /// Packs pre-measured outer sizes. Sizes must be non-negative.
    pub fn pack(
        &mut self,
        id: LayoutId,
        sizes: &[Size],
        container: Size,
        options: PackerOptions,
    ) -> LayoutResult {
        let fill_gaps = options.contains(PackerOptions::FILL_GAPS);
        let horizontal = options.contains(PackerOptions::HORIZONTAL);
        let align_right = options.contains(PackerOptions::ALIGN_RIGHT);
        let align_bottom = options.contains(PackerOptions::ALIGN_BOTTOM);
        let rounding = options.contains(PackerOptions::ROUNDING);

        let mut bounds = Bounds {
            width: if horizontal { 0.0 } else { container.width },
            height: if horizontal { container.height } else { 0.0 },
        };

        if sizes.is_empty() {
            return LayoutResult {
                id,
                width: bounds.width,
                height: bounds.height,
                slots: Vec::new(),
            };
        }

        let mut slots = Vec::with_capacity(sizes.len() * 2);
        let mut slot_sizes = Vec::with_capacity(sizes.len());
        let mut cross_extent = 0.0_f64;
        for size in sizes {
            let (mut width, mut height) = (size.width, size.height);
            if rounding {
                width = round_to_hundredths(width);
                height = round_to_hundredths(height);
            }

            let slot = self.next_slot(&mut bounds, width, height, fill_gaps, horizontal);
            if horizontal {
                bounds.width = bounds.width.max(slot.right());
                cross_extent = cross_extent.max(slot.bottom());
            } else {
                bounds.height = bounds.height.max(slot.bottom());
                cross_extent = cross_extent.max(slot.right());
            }
            slots.push(slot.left);
            slots.push(slot.top);
            slot_sizes.push(slot.size());
        }

        // Items larger than the container widen its cross axis.
        if horizontal {
            bounds.height = bounds.height.max(cross_extent);
        } else {
            bounds.width = bounds.width.max(cross_extent);
        }

        if align_right {
            for (slot, size) in slots.chunks_exact_mut(2).zip(&slot_sizes) {
                slot[0] = bounds.width - (slot[0] + size.width);
            }
        }
        if align_bottom {
            for (slot, size) in slots.chunks_exact_mut(2).zip(&slot_sizes) {
                slot[1] = bounds.height - (slot[1] + size.height);
            }
        }

        trace!(
            ?id,
            items = sizes.len(),
            free_rects = self.arena.len(),
            width = bounds.width,
            height = bounds.height,
            "Packed layout"
        );
        self.reset();

        LayoutResult {
            id,
            width: bounds.width,
            height: bounds.height,
            slots,
        }
    }

    fn reset(&mut self) {
        self.arena.reset();
        self.current.clear();
        self.next.clear();
        self.shards.clear();
    }

    fn next_slot(
        &mut self,
        bounds: &mut Bounds,
        width: f64,
        height: f64,
        fill_gaps: bool,
        horizontal: bool,
    ) -> Rect {
        self.next.clear();

        // First free rect, in gravity order, that can hold the slot.
        let found = self.current.iter().position(|id| {
            let rect = self.arena.get(*id);
            width <= rect.width + EPS && height <= rect.height + EPS
        });

        let mut ignore_current = false;
        let slot = match found {
            Some(index) => {
                let rect = self.arena.get(self.current[index]);
                Rect::new(rect.left, rect.top, width, height)
            }
            None => {
                if !fill_gaps {
                    ignore_current = true;
                }
                if horizontal {
                    Rect::new(bounds.width, 0.0, width, height)
                } else {
                    Rect::new(0.0, bounds.height, width, height)
                }
            }
        };

        // Growing past the current edge opens new space beside the slot.
        if !horizontal && slot.bottom() > bounds.height + EPS {
            if slot.left > MIN_SLOT_SIZE {
                self.next.push(self.arena.add(0.0, bounds.height, slot.left, f64::INFINITY));
            }
            if slot.right() < bounds.width - MIN_SLOT_SIZE {
                self.next.push(self.arena.add(
                    slot.right(),
                    bounds.height,
                    bounds.width - slot.right(),
                    f64::INFINITY,
                ));
            }
            bounds.height = slot.bottom();
        }

        if horizontal && slot.right() > bounds.width + EPS {
            if slot.top > MIN_SLOT_SIZE {
                self.next.push(self.arena.add(bounds.width, 0.0, f64::INFINITY, slot.top));
            }
            if slot.bottom() < bounds.height - MIN_SLOT_SIZE {
                self.next.push(self.arena.add(
                    bounds.width,
                    slot.bottom(),
                    f64::INFINITY,
                    bounds.height - slot.bottom(),
                ));
            }
            bounds.width = slot.right();
        }

        if !ignore_current {
            // Without gap filling, space in front of the chosen rect is given up.
            let start = if fill_gaps { 0 } else { found.unwrap_or(self.current.len()) };
            for index in start..self.current.len() {
                self.shards.clear();
                self.arena.split(self.current[index], &slot, &mut self.shards);
                for shard in &self.shards {
                    let rect = self.arena.get(*shard);
                    let inside = if horizontal {
                        rect.left + EPS < bounds.width - EPS
                    } else {
                        rect.top + EPS < bounds.height - EPS
                    };
                    if inside {
                        self.next.push(*shard);
                    }
                }
            }
        }

        if self.next.len() > 1 {
            self.arena.purge(&mut self.next);
            self.arena.sort(&mut self.next, horizontal);
        }

        std::mem::swap(&mut self.current, &mut self.next);
        slot
    }
}

/// One-shot packing with a throwaway packer.
pub fn compute_layout(items: &[ItemSize], container: Size, options: PackerOptions) -> LayoutResult {
    Packer::new().compute_layout(LayoutId::default(), items, container, options)
}
