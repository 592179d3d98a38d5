//! Data models

mod container;
mod report;

pub use container::*;
pub use report::*;
