use thiserror::Error;

use crate::model::LayoutStrategy;

/// Unified result type for the kitbash crate.
pub type Result<T> = std::result::Result<T, AssemblyError>;

/// Errors surfaced by the assembly engine.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("pose view quaternion is not unit length (norm {norm})")]
    InvalidPose { norm: f64 },
    #[error("connection attaches sobject `{0}` to itself")]
    SelfConnection(String),
    #[error("sobject `{0}` is not declared in the layout")]
    UnknownSobject(String),
    #[error("no connection declared between `{attractor}` and `{attracted}`")]
    MissingConnection { attractor: String, attracted: String },
    #[error("no port of family `{requested}` on element type `{type_key}`")]
    NoMatchingPort { type_key: String, requested: String },
    #[error("layout strategy `{0}` is not supported")]
    UnsupportedStrategy(LayoutStrategy),
    #[error("geometry provider error: {0}")]
    Provider(String),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}
