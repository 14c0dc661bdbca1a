use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::layout_engine::PackerOptions;
use crate::model::emitter::SortAction;
use crate::model::tween::Easing;

const DEFAULT_CONFIG: &str = include_str!("../../gridsort.default.toml");

const MIN_THRESHOLD: f64 = 1.0;
const MAX_THRESHOLD: f64 = 100.0;

pub fn config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("gridsort").join("config.toml"))
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub layout: LayoutSettings,
    #[serde(default)]
    pub visibility: VisibilitySettings,
    #[serde(default)]
    pub drag: DragSettings,
    #[serde(default)]
    pub drag_sort: DragSortSettings,
    #[serde(default)]
    pub drag_sort_heuristics: DragSortHeuristics,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct LayoutSettings {
    #[serde(default = "no")]
    pub fill_gaps: bool,
    /// Grow to the right instead of downwards.
    #[serde(default = "no")]
    pub horizontal: bool,
    #[serde(default = "no")]
    pub align_right: bool,
    #[serde(default = "no")]
    pub align_bottom: bool,
    /// Snap item sizes to hundredths before packing.
    #[serde(default = "no")]
    pub rounding: bool,
    /// Milliseconds.
    #[serde(default = "default_duration")]
    pub duration: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub easing: Easing,
    /// Layouts with at least this many items go to the worker pool, when
    /// there is one.
    #[serde(default = "default_worker_threshold")]
    pub worker_threshold: usize,
    /// Size of the packing worker pool. 0 packs on the calling thread.
    #[serde(default)]
    pub workers: usize,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct VisibilitySettings {
    #[serde(default = "default_duration")]
    pub show_duration: f64,
    #[serde(default = "default_duration")]
    pub hide_duration: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub easing: Easing,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct DragSettings {
    #[serde(default = "no")]
    pub enabled: bool,
    /// Pixels the pointer has to travel before a press becomes a drag.
    #[serde(default)]
    pub start_distance: f64,
    /// Milliseconds the pointer has to be held before a press becomes a drag.
    #[serde(default)]
    pub start_delay: f64,
    #[serde(default = "default_duration")]
    pub release_duration: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub release_easing: Easing,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct DragSortSettings {
    #[serde(default = "yes")]
    pub enabled: bool,
    /// Minimum overlap, in percent of the smaller rectangle, for a target to
    /// count.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub action: SortAction,
    #[serde(default, deserialize_with = "lenient")]
    pub migrate_action: SortAction,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct DragSortHeuristics {
    /// Milliseconds between two sort evaluations.
    #[serde(default = "default_sort_interval")]
    pub sort_interval: f64,
    #[serde(default = "default_min_drag_distance")]
    pub min_drag_distance: f64,
    /// Radians.
    #[serde(default = "default_min_bounce_back_angle")]
    pub min_bounce_back_angle: f64,
}

fn yes() -> bool { true }

fn no() -> bool { false }

fn default_duration() -> f64 { 300.0 }

fn default_worker_threshold() -> usize { 200 }

fn default_threshold() -> f64 { 50.0 }

fn default_sort_interval() -> f64 { 100.0 }

fn default_min_drag_distance() -> f64 { 10.0 }

fn default_min_bounce_back_angle() -> f64 { 1.0 }

/// Unrecognized values fall back to the default instead of failing the
/// whole file.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default,
    T::Err: fmt::Debug,
{
    let raw = String::deserialize(deserializer)?;
    Ok(T::from_str(&raw).unwrap_or_else(|error| {
        warn!(value = %raw, ?error, "Unrecognized setting value, using default");
        T::default()
    }))
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            fill_gaps: false,
            horizontal: false,
            align_right: false,
            align_bottom: false,
            rounding: false,
            duration: default_duration(),
            easing: Easing::default(),
            worker_threshold: default_worker_threshold(),
            workers: 0,
        }
    }
}

impl Default for VisibilitySettings {
    fn default() -> Self {
        Self {
            show_duration: default_duration(),
            hide_duration: default_duration(),
            easing: Easing::default(),
        }
    }
}

impl Default for DragSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            start_distance: 0.0,
            start_delay: 0.0,
            release_duration: default_duration(),
            release_easing: Easing::default(),
        }
    }
}

impl Default for DragSortSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: default_threshold(),
            action: SortAction::Move,
            migrate_action: SortAction::Move,
        }
    }
}

impl Default for DragSortHeuristics {
    fn default() -> Self {
        Self {
            sort_interval: default_sort_interval(),
            min_drag_distance: default_min_drag_distance(),
            min_bounce_back_angle: default_min_bounce_back_angle(),
        }
    }
}

impl LayoutSettings {
    pub fn packer_options(&self) -> PackerOptions {
        let mut options = PackerOptions::empty();
        options.set(PackerOptions::FILL_GAPS, self.fill_gaps);
        options.set(PackerOptions::HORIZONTAL, self.horizontal);
        options.set(PackerOptions::ALIGN_RIGHT, self.align_right);
        options.set(PackerOptions::ALIGN_BOTTOM, self.align_bottom);
        options.set(PackerOptions::ROUNDING, self.rounding);
        options
    }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !(self.duration >= 0.0) {
            issues.push(format!("layout.duration must be non-negative, got {}", self.duration));
        }
        if self.workers > 0 && self.worker_threshold == 0 {
            issues.push("layout.worker_threshold must be at least 1 when workers are enabled".to_string());
        }

        issues
    }
}

impl VisibilitySettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !(self.show_duration >= 0.0) {
            issues.push(format!(
                "visibility.show_duration must be non-negative, got {}",
                self.show_duration
            ));
        }
        if !(self.hide_duration >= 0.0) {
            issues.push(format!(
                "visibility.hide_duration must be non-negative, got {}",
                self.hide_duration
            ));
        }

        issues
    }
}

impl DragSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !(self.start_distance >= 0.0) {
            issues.push(format!(
                "drag.start_distance must be non-negative, got {}",
                self.start_distance
            ));
        }
        if !(self.start_delay >= 0.0) {
            issues.push(format!("drag.start_delay must be non-negative, got {}", self.start_delay));
        }
        if !(self.release_duration >= 0.0) {
            issues.push(format!(
                "drag.release_duration must be non-negative, got {}",
                self.release_duration
            ));
        }

        issues
    }
}

impl DragSortSettings {
    /// The configured threshold clamped to `[1, 100]`.
    pub fn threshold(&self) -> f64 {
        if self.threshold.is_nan() {
            return default_threshold();
        }
        self.threshold.clamp(MIN_THRESHOLD, MAX_THRESHOLD)
    }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !(MIN_THRESHOLD..=MAX_THRESHOLD).contains(&self.threshold) {
            issues.push(format!(
                "drag_sort.threshold must be between {MIN_THRESHOLD} and {MAX_THRESHOLD}, got {} (using {})",
                self.threshold,
                self.threshold()
            ));
        }

        issues
    }
}

impl DragSortHeuristics {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !(self.sort_interval >= 0.0) {
            issues.push(format!(
                "drag_sort_heuristics.sort_interval must be non-negative, got {}",
                self.sort_interval
            ));
        }
        if !(self.min_drag_distance >= 0.0) {
            issues.push(format!(
                "drag_sort_heuristics.min_drag_distance must be non-negative, got {}",
                self.min_drag_distance
            ));
        }
        if !(self.min_bounce_back_angle >= 0.0) {
            issues.push(format!(
                "drag_sort_heuristics.min_bounce_back_angle must be non-negative, got {}",
                self.min_bounce_back_angle
            ));
        }

        issues
    }
}

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let buf = std::fs::read_to_string(path)?;
        Self::parse(&buf)
    }

    pub fn parse(buf: &str) -> anyhow::Result<Config> { Ok(toml::from_str::<Config>(buf)?) }

    /// The commented default config shipped with the crate.
    pub fn default_toml() -> &'static str { DEFAULT_CONFIG }

    /// Reads `path` if it exists, the defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Config> {
        match path {
            Some(path) if path.exists() => Self::read(path),
            _ => Ok(Config::default()),
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml_string.as_bytes())?;

        Ok(())
    }

    /// Validates the entire configuration and returns a list of issues found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        issues.extend(self.layout.validate());
        issues.extend(self.visibility.validate());
        issues.extend(self.drag.validate());
        issues.extend(self.drag_sort.validate());
        issues.extend(self.drag_sort_heuristics.validate());

        issues
    }
}
