//! Bin-packed grid layout with animated visibility, drag-to-reorder and
//! cross-grid migration.
//!
//! The [`engine::Engine`] is the entry point. It renders through an
//! [`sys::host::ElementHost`]; [`sys::host::HeadlessHost`] keeps everything
//! in memory.

pub mod actor;
pub mod common;
pub mod engine;
pub mod layout_engine;
pub mod model;
pub mod sys;
