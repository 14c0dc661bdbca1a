//! Scratch storage for the packer's free rectangles.
//!
//! Rectangles live in a flat `f64` store, four numbers each, and are referred
//! to by index. Nothing is freed individually; the whole arena is reset at the
//! end of every packing run.

use crate::sys::geometry::Rect;

/// Tolerance for every float comparison done while packing.
pub const EPS: f64 = 0.001;
/// Free rectangles thinner than this are never tracked.
pub const MIN_SLOT_SIZE: f64 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RectId(u32);

#[derive(Debug, Default)]
pub struct FreeSpaceArena {
    store: Vec<f64>,
}

impl FreeSpaceArena {
    pub fn add(&mut self, left: f64, top: f64, width: f64, height: f64) -> RectId {
        let id = RectId((self.store.len() / 4) as u32);
        self.store.extend_from_slice(&[left, top, width, height]);
        id
    }

    pub fn get(&self, id: RectId) -> Rect {
        let base = id.0 as usize * 4;
        Rect::new(
            self.store[base],
            self.store[base + 1],
            self.store[base + 2],
            self.store[base + 3],
        )
    }

    pub fn len(&self) -> usize { self.store.len() / 4 }

    pub fn is_empty(&self) -> bool { self.store.is_empty() }

    pub fn reset(&mut self) { self.store.clear(); }

    /// Punches `hole` out of the free rectangle `id`, pushing the remaining
    /// left, right, top and bottom pieces into `out`. A rectangle that does
    /// not touch the hole is passed through untouched.
    pub fn split(&mut self, id: RectId, hole: &Rect, out: &mut Vec<RectId>) {
        let rect = self.get(id);
        if !overlaps(&rect, hole) {
            out.push(id);
            return;
        }

        if hole.left - rect.left >= MIN_SLOT_SIZE {
            out.push(self.add(rect.left, rect.top, hole.left - rect.left, rect.height));
        }

        if rect.right() - hole.right() >= MIN_SLOT_SIZE {
            out.push(self.add(hole.right(), rect.top, rect.right() - hole.right(), rect.height));
        }

        if hole.top - rect.top >= MIN_SLOT_SIZE {
            out.push(self.add(rect.left, rect.top, rect.width, hole.top - rect.top));
        }

        if rect.bottom() - hole.bottom() >= MIN_SLOT_SIZE {
            out.push(self.add(rect.left, hole.bottom(), rect.width, rect.bottom() - hole.bottom()));
        }
    }

    /// Drops every rectangle that is fully contained in another one. When two
    /// rectangles are equal the later one goes.
    pub fn purge(&self, ids: &mut Vec<RectId>) {
        let rects: Vec<Rect> = ids.iter().map(|id| self.get(*id)).collect();
        let mut alive = vec![true; ids.len()];
        for i in (0..rects.len()).rev() {
            for j in (0..rects.len()).rev() {
                if i == j || !alive[j] {
                    continue;
                }
                if is_within(&rects[i], &rects[j]) {
                    alive[i] = false;
                    break;
                }
            }
        }
        let mut index = 0;
        ids.retain(|_| {
            let keep = alive[index];
            index += 1;
            keep
        });
    }

    /// Orders free rectangles by gravity: top then left for vertical packing,
    /// left then top for horizontal packing.
    pub fn sort(&self, ids: &mut [RectId], horizontal: bool) {
        ids.sort_by(|a, b| {
            let a = self.get(*a);
            let b = self.get(*b);
            if horizontal {
                quantized(a.left)
                    .total_cmp(&quantized(b.left))
                    .then_with(|| quantized(a.top).total_cmp(&quantized(b.top)))
            } else {
                quantized(a.top)
                    .total_cmp(&quantized(b.top))
                    .then_with(|| quantized(a.left).total_cmp(&quantized(b.left)))
            }
        });
    }
}

fn overlaps(a: &Rect, b: &Rect) -> bool {
    !(a.right() <= b.left + EPS
        || b.right() <= a.left + EPS
        || a.bottom() <= b.top + EPS
        || b.bottom() <= a.top + EPS)
}

fn is_within(a: &Rect, b: &Rect) -> bool {
    a.left + EPS >= b.left
        && a.top + EPS >= b.top
        && a.right() - EPS <= b.right()
        && a.bottom() - EPS <= b.bottom()
}

// Snapped to the epsilon grid so the comparator stays a total order.
fn quantized(value: f64) -> f64 { (value / EPS).round() }
