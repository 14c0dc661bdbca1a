pub mod free_space;
pub mod packer;
pub mod wire;
pub mod worker;

pub use packer::{
    ItemSize, LayoutId, LayoutRequest, LayoutResult, Packer, PackerOptions, compute_layout,
};
pub use wire::WireError;
pub use worker::{PackerPool, WorkerError};
