//! Change tracking for resolved poses across repeated resolutions.

mod core;

pub use core::PoseRegistry;
