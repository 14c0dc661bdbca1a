//! Turns a stream of pointer positions into discrete sort decisions.
//!
//! [`DragSortManager`] owns the per-drag heuristic state: how far the
//! pointer moved since the last check, which direction it was heading, the
//! index the item just left (blocked until the pointer turns around) and the
//! trailing evaluation timer. [`sort_predicate`] scores the dragged rect
//! against the candidate grids and their items and returns a
//! [`SortIntent`]. [`DragSortManager::plan`] turns that intent into a
//! concrete move or migration, which the engine applies.

use tracing::{debug, trace};

use crate::common::config::{DragSortHeuristics, DragSortSettings};
use crate::model::emitter::SortAction;
use crate::model::registry::{GridId, ItemId};
use crate::sys::geometry::{Point, Rect};

/// Bounce-back detection needs a few pixels of travel to get a meaningful
/// direction.
const MIN_BOUNCE_BACK_DISTANCE: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movement {
    /// Not far enough from the last checkpoint.
    None,
    Moved,
    /// Moved, and turned by more than the bounce-back angle.
    Reversed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortCheck {
    /// Nothing to evaluate.
    Wait,
    /// An evaluation is owed but the interval has not elapsed; `on_tick`
    /// fires it later.
    Deferred,
    Evaluate,
}

/// A grid the dragged item may land in, in client coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct SortCandidate {
    pub grid: GridId,
    pub rect: Rect,
    pub items: Vec<SortTarget>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortTarget {
    pub item: ItemId,
    pub rect: Rect,
    pub active: bool,
}

/// Where the predicate wants the dragged item. `index` -1 means the end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortIntent {
    pub grid: GridId,
    pub index: isize,
    pub action: SortAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortPlan {
    Move { from: usize, to: usize, action: SortAction },
    Migrate { from: usize, to_grid: GridId, to: usize, action: SortAction },
}

#[derive(Debug, Clone)]
pub struct DragSortManager {
    heuristics: DragSortHeuristics,
    checkpoint: Point,
    direction: Option<Point>,
    blocked_index: Option<usize>,
    sort_needed: bool,
    last_evaluation: Option<f64>,
}

impl DragSortManager {
    pub fn new(heuristics: DragSortHeuristics, pointer: Point) -> Self {
        DragSortManager {
            heuristics,
            checkpoint: pointer,
            direction: None,
            blocked_index: None,
            sort_needed: false,
            last_evaluation: None,
        }
    }

    pub fn blocked_index(&self) -> Option<usize> { self.blocked_index }

    pub fn is_sort_pending(&self) -> bool { self.sort_needed }

    pub fn check_heuristics(&mut self, pointer: Point) -> Movement {
        let min_distance = self.heuristics.min_drag_distance;
        if min_distance <= 0.0 {
            self.blocked_index = None;
            return Movement::Moved;
        }

        let diff = self.checkpoint.delta_to(pointer);
        let can_bounce_back =
            min_distance > MIN_BOUNCE_BACK_DISTANCE && self.heuristics.min_bounce_back_angle > 0.0;
        if !can_bounce_back {
            self.blocked_index = None;
        }

        if diff.x.abs() <= min_distance && diff.y.abs() <= min_distance {
            return Movement::None;
        }

        let mut movement = Movement::Moved;
        if can_bounce_back {
            if let Some(previous) = self.direction {
                let angle = f64::atan2(diff.x, diff.y);
                let previous_angle = f64::atan2(previous.x, previous.y);
                let turn = f64::atan2((angle - previous_angle).sin(), (angle - previous_angle).cos());
                if turn.abs() > self.heuristics.min_bounce_back_angle {
                    trace!(turn, blocked = ?self.blocked_index, "Pointer bounced back");
                    self.blocked_index = None;
                    movement = Movement::Reversed;
                }
            }
        }
        self.direction = Some(diff);
        self.checkpoint = pointer;
        movement
    }

    pub fn on_move(&mut self, pointer: Point, now: f64) -> SortCheck {
        let movement = self.check_heuristics(pointer);
        if movement == Movement::None && !self.sort_needed {
            return SortCheck::Wait;
        }
        self.sort_needed = true;

        let interval = self.heuristics.sort_interval;
        let elapsed = self.last_evaluation.is_none_or(|last| now - last >= interval);
        if interval <= 0.0 || movement == Movement::Reversed || elapsed {
            self.mark_evaluated(now);
            SortCheck::Evaluate
        } else {
            SortCheck::Deferred
        }
    }

    /// Fires the trailing evaluation once the interval has elapsed.
    pub fn on_tick(&mut self, now: f64) -> bool {
        if !self.sort_needed {
            return false;
        }
        let interval = self.heuristics.sort_interval;
        if self.last_evaluation.is_some_and(|last| now - last < interval) {
            return false;
        }
        self.mark_evaluated(now);
        true
    }

    /// Takes the owed evaluation regardless of timing, for the drop.
    pub fn take_pending(&mut self, now: f64) -> bool {
        let pending = self.sort_needed;
        if pending {
            self.mark_evaluated(now);
        }
        pending
    }

    fn mark_evaluated(&mut self, now: f64) {
        self.sort_needed = false;
        self.last_evaluation = Some(now);
    }

    /// Resolves an intent against the current collections. `current_index`
    /// is the dragged item's index in its grid and `target_len` the length of
    /// the target grid's collection.
    pub fn plan(
        &mut self,
        intent: SortIntent,
        current_grid: GridId,
        current_index: usize,
        target_len: usize,
    ) -> Option<SortPlan> {
        let migration = intent.grid != current_grid;
        let offset = if migration && intent.action == SortAction::Move { 1 } else { 0 };
        let to = normalize_array_index(target_len, intent.index, offset);

        if !migration {
            if Some(to) == self.blocked_index || to == current_index {
                return None;
            }
            self.blocked_index = Some(current_index);
            debug!(from = current_index, to, action = ?intent.action, "Sorting dragged item");
            return Some(SortPlan::Move {
                from: current_index,
                to,
                action: intent.action,
            });
        }

        self.blocked_index = None;
        debug!(from = current_index, to_grid = ?intent.grid, to, "Migrating dragged item");
        Some(SortPlan::Migrate {
            from: current_index,
            to_grid: intent.grid,
            to,
            action: intent.action,
        })
    }
}

/// Clamps `index` into `0..=len - 1 + offset`. Negative indices count from
/// the end, -1 being the last position.
pub fn normalize_array_index(len: usize, index: isize, offset: usize) -> usize {
    let max = (len + offset).saturating_sub(1) as isize;
    let index = if index > max {
        max
    } else if index < 0 {
        (max + index + 1).max(0)
    } else {
        index
    };
    index as usize
}

/// Picks the grid and index the dragged item should move to, if any.
///
/// Grids are scored by how much of the dragged rect overlaps their container
/// and must beat `threshold` strictly; the first best grid wins ties. Inside
/// the chosen grid the best overlapping active item wins. A migration that
/// finds no item above the threshold still happens: to the front of an
/// empty grid, or to the slot of the best partial match.
pub fn sort_predicate(
    item: ItemId,
    item_rect: Rect,
    current_grid: GridId,
    candidates: &[SortCandidate],
    settings: &DragSortSettings,
) -> Option<SortIntent> {
    let threshold = settings.threshold();

    let mut best: Option<(&SortCandidate, f64)> = None;
    for candidate in candidates {
        if candidate.rect.width <= 0.0 || candidate.rect.height <= 0.0 {
            continue;
        }
        let score = item_rect.intersection_score(&candidate.rect);
        if score > threshold && best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((candidate, score));
        }
    }
    let (target, _) = best?;
    let migration = target.grid != current_grid;

    let mut match_score = 0.0;
    let mut match_index: isize = -1;
    let mut has_targets = false;
    for (index, candidate) in target.items.iter().enumerate() {
        if !candidate.active || candidate.item == item {
            continue;
        }
        has_targets = true;
        let score = item_rect.intersection_score(&candidate.rect);
        if score > match_score {
            match_score = score;
            match_index = index as isize;
        }
    }

    if migration && match_score < threshold {
        match_index = if has_targets { match_index } else { 0 };
        match_score = threshold;
    }

    if match_score < threshold {
        return None;
    }

    Some(SortIntent {
        grid: target.grid,
        index: match_index,
        action: if migration { settings.migrate_action } else { settings.action },
    })
}
