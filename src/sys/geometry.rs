//! Rectangle math shared by the packer and the drag-sort coordinator.

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self { Point { x, y } }

    pub fn offset(self, dx: f64, dy: f64) -> Self { Point::new(self.x + dx, self.y + dy) }

    pub fn delta_to(self, other: Point) -> Point { Point::new(other.x - self.x, other.y - self.y) }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self { Size { width, height } }
}

/// Axis-aligned rectangle in pixels. Consumers treat it as an immutable
/// snapshot; recompute instead of mutating.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        left: 0.0,
        top: 0.0,
        width: 0.0,
        height: 0.0,
    };

    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Rect { left, top, width, height }
    }

    pub fn right(&self) -> f64 { self.left + self.width }

    pub fn bottom(&self) -> f64 { self.top + self.height }

    pub fn origin(&self) -> Point { Point::new(self.left, self.top) }

    pub fn size(&self) -> Size { Size::new(self.width, self.height) }

    pub fn area(&self) -> f64 { self.width * self.height }

    pub fn translate(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.left + dx, self.top + dy, self.width, self.height)
    }

    /// True when the two rectangles share a region of non-zero area.
    /// Touching edges do not count.
    pub fn overlaps(&self, other: &Rect) -> bool {
        !(self.right() <= other.left
            || other.right() <= self.left
            || self.bottom() <= other.top
            || other.bottom() <= self.top)
    }

    pub fn intersection(&self, other: &Rect) -> Rect {
        let left = f64::max(self.left, other.left);
        let right = f64::min(self.right(), other.right());
        let top = f64::max(self.top, other.top);
        let bottom = f64::min(self.bottom(), other.bottom());
        Rect::new(left, top, f64::max(right - left, 0.), f64::max(bottom - top, 0.))
    }

    /// Overlap area as a percentage (0..=100) of the smaller rectangle's area.
    pub fn intersection_score(&self, other: &Rect) -> f64 {
        if !self.overlaps(other) {
            return 0.0;
        }
        let smaller = f64::min(self.area(), other.area());
        if smaller <= 0.0 {
            return 0.0;
        }
        self.intersection(other).area() / smaller * 100.0
    }
}

/// Snaps to two decimals. The packer uses this so sub-pixel measurement noise
/// cannot change the packing between runs.
pub fn round_to_hundredths(value: f64) -> f64 { ((value * 1000.0 + 0.5).trunc() / 10.0).trunc() / 100.0 }

pub trait IsWithin {
    fn is_within(&self, how_much: f64, other: Self) -> bool;
}

impl IsWithin for f64 {
    fn is_within(&self, how_much: f64, other: Self) -> bool { (self - other).abs() < how_much }
}

impl IsWithin for Point {
    fn is_within(&self, how_much: f64, other: Self) -> bool {
        self.x.is_within(how_much, other.x) && self.y.is_within(how_much, other.y)
    }
}

pub trait SameAs: IsWithin + Sized {
    fn same_as(&self, other: Self) -> bool { self.is_within(0.001, other) }
}

impl SameAs for Point {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersection() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let b = Rect::new(50.0, 50.0, 100.0, 100.0);
        assert_eq!(a.intersection(&b), Rect::new(50.0, 50.0, 50.0, 50.0));
    }

    #[test]
    fn test_no_intersection() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let b = Rect::new(200.0, 200.0, 100.0, 100.0);
        let inter = a.intersection(&b);
        assert_eq!(inter.width, 0.0);
        assert_eq!(inter.height, 0.0);
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn test_touching_edges_do_not_overlap() {
        let a = Rect::new(0.0, 0.0, 70.0, 70.0);
        let b = Rect::new(70.0, 0.0, 70.0, 70.0);
        assert!(!a.overlaps(&b));
        assert_eq!(a.intersection_score(&b), 0.0);
    }

    #[test]
    fn test_intersection_score_uses_smaller_area() {
        let big = Rect::new(0.0, 0.0, 200.0, 200.0);
        let small = Rect::new(150.0, 0.0, 100.0, 100.0);
        // 50x100 overlap out of the 100x100 rect.
        assert_eq!(big.intersection_score(&small), 50.0);
        assert_eq!(small.intersection_score(&big), 50.0);
    }

    #[test]
    fn test_intersection_score_full_containment() {
        let outer = Rect::new(0.0, 0.0, 300.0, 300.0);
        let inner = Rect::new(10.0, 10.0, 20.0, 20.0);
        assert_eq!(outer.intersection_score(&inner), 100.0);
    }

    #[test]
    fn test_intersection_score_degenerate_rect() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let line = Rect::new(10.0, 10.0, 0.0, 50.0);
        assert_eq!(a.intersection_score(&line), 0.0);
    }

    #[test]
    fn test_round_to_hundredths() {
        assert_eq!(round_to_hundredths(70.004), 70.0);
        assert_eq!(round_to_hundredths(10.125), 10.12);
        assert_eq!(round_to_hundredths(0.75), 0.75);
        assert_eq!(round_to_hundredths(33.333333), 33.33);
    }

    #[test]
    fn test_same_as_tolerates_float_noise() {
        assert!(Point::new(10.0, 20.0).same_as(Point::new(10.0004, 19.9996)));
        assert!(!Point::new(10.0, 20.0).same_as(Point::new(10.01, 20.0)));
    }
}
