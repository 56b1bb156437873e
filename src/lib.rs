//! Kit-of-parts assembly engine.
//!
//! A layout declares parts (sobjects), the connections between them, and
//! optionally some pre-assembled subtrees. The [`Assembler`] resolves that
//! possibly-cyclic graph into a deterministic forest of rooted assembly
//! trees, and [`Choreography`] walks each tree to compute an absolute pose
//! for every part. Geometry lives behind the [`GeometryProvider`] seam, so
//! the engine itself never touches an element catalog.

pub mod assembler;
pub mod choreography;
pub mod connect;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod provider;
pub mod registry;

pub use assembler::Assembler;
pub use choreography::{ChainLink, Choreography, chains};
pub use connect::{ConnectionResult, connect};
pub use error::{AssemblyError, Result};
pub use geometry::{Point, Pose, UNIT_NORM_TOLERANCE, Vector};
pub use graph::{EdgeBfs, EdgeIndex, EdgeVisit, LayoutGraph, NodeIndex};
pub use logging::{LogEvent, LogFields, LogLevel, Logger, LoggingError, LoggingResult};
pub use metrics::{MetricSnapshot, ResolveMetrics};
pub use model::{
    Assembly, Connection, ConnectionEnd, ConnectionProtocol, Element, Layout, LayoutStrategy,
    PORT_TYPE_PARAMETER, PROTOCOL_PARAMETER, ParameterMap, Platform, Representation, Sobject,
    SobjectId, TYPE_PARAMETER, content_hash,
};
pub use provider::{GeometryProvider, MemoizedProvider, OriginProvider};
pub use registry::PoseRegistry;
