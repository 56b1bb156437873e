//! Connection graph orchestrator.
//!
//! The assembler traverses layouts through this module; the arena graph and
//! its iterators live in the private `core` module.

mod core;

pub use core::{EdgeBfs, EdgeIndex, EdgeVisit, LayoutGraph, NodeIndex};
