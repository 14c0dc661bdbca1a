use serde::{Deserialize, Serialize};

use crate::sys::geometry::Point;

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default, Copy, strum_macros::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Easing {
    #[default]
    Ease,
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    EaseOutCubic,
    EaseInOutCirc,
}

impl Easing {
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseIn => t * t,
            Easing::EaseOut => t * (2.0 - t),
            Easing::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
            Easing::Ease => t * t * (3.0 - 2.0 * t),
            Easing::EaseOutCubic => 1.0 - (1.0 - t).powi(3),
            // https://notes.yvt.jp/Graphics/Easing-Functions/
            Easing::EaseInOutCirc => {
                if t < 0.5 {
                    (1.0 - f64::sqrt(1.0 - f64::powi(2.0 * t, 2))) / 2.0
                } else {
                    (f64::sqrt(1.0 - f64::powi(-2.0 * t + 2.0, 2)) + 1.0) / 2.0
                }
            }
        }
    }
}

pub fn blend(a: f64, b: f64, s: f64) -> f64 { (1.0 - s) * a + s * b }

pub trait Lerp: Copy {
    fn lerp(self, to: Self, s: f64) -> Self;
}

impl Lerp for f64 {
    fn lerp(self, to: Self, s: f64) -> Self { blend(self, to, s) }
}

impl Lerp for Point {
    fn lerp(self, to: Self, s: f64) -> Self { Point::new(blend(self.x, to.x, s), blend(self.y, to.y, s)) }
}

/// A value moving from `from` to `to` over `duration` milliseconds of frame
/// time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tween<T> {
    pub from: T,
    pub to: T,
    start: f64,
    duration: f64,
    easing: Easing,
}

impl<T: Lerp> Tween<T> {
    pub fn new(from: T, to: T, start: f64, duration: f64, easing: Easing) -> Self {
        Tween { from, to, start, duration, easing }
    }

    pub fn progress(&self, now: f64) -> f64 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        ((now - self.start) / self.duration).clamp(0.0, 1.0)
    }

    pub fn value(&self, now: f64) -> T { self.from.lerp(self.to, self.easing.apply(self.progress(now))) }

    pub fn is_finished(&self, now: f64) -> bool { self.progress(now) >= 1.0 }

    /// Starts a new tween towards `to` from wherever this one is at `now`.
    pub fn retarget(&self, to: T, now: f64, duration: f64, easing: Easing) -> Self {
        Tween::new(self.value(now), to, now, duration, easing)
    }
}
