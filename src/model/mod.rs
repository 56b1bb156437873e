//! Data model orchestrator.
//!
//! Downstream code imports the kit-of-parts value types from here while the
//! definitions live in the private `core` and `assembly` modules.

mod assembly;
mod core;

pub use assembly::{Assembly, Element, Layout, LayoutStrategy, Representation};
pub use core::{
    Connection, ConnectionEnd, ConnectionProtocol, PORT_TYPE_PARAMETER, PROTOCOL_PARAMETER,
    ParameterMap, Platform, Sobject, SobjectId, TYPE_PARAMETER, content_hash,
};
