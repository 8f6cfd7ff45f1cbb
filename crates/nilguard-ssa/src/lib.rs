//! SSA lowering for nilguard.

pub mod build;
pub mod ir;

pub use build::{build, SsaError};
pub use ir::*;
