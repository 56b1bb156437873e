//! Layout resolution: possibly-cyclic connection graphs plus partial
//! pre-assemblies become a deterministic forest of rooted assembly trees.

mod core;

pub use core::Assembler;
