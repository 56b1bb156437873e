//! Pose choreography: absolute poses for every part of an assembly tree,
//! chain by chain, with optional drift correction.

mod core;

pub use core::{ChainLink, Choreography, chains};
