use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AssemblyError, Result};
use crate::geometry::{Point, Pose};
use crate::provider::GeometryProvider;

/// Identifier of a placed part instance, unique within a layout.
pub type SobjectId = String;

/// String parameters with deterministic iteration and serialization order.
pub type ParameterMap = BTreeMap<String, String>;

/// Target platform key for geometry requests.
pub type Platform = String;

/// Well-known sobject parameter naming the element type. Instances of the
/// same type share a port set, which is what attachment memoization keys on.
pub const TYPE_PARAMETER: &str = "type";

/// Reserved key marking the variant inside a serialized protocol map.
pub const PROTOCOL_PARAMETER: &str = "protocol";

/// Reserved key carrying the requested port family inside a serialized
/// protocol map.
pub const PORT_TYPE_PARAMETER: &str = "type";

/// Blake3 hash over a value's canonical JSON bytes.
///
/// Model maps are ordered and poses serialize through a fixed raw form, so
/// equal values hash equal across runs and processes.
pub fn content_hash<T: Serialize>(value: &T) -> Result<blake3::Hash> {
    let bytes = serde_json::to_vec(value)?;
    Ok(blake3::hash(&bytes))
}

/// A placed part instance: identity, spatial pose, free-form parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sobject {
    pub id: SobjectId,
    pub pose: Pose,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: ParameterMap,
}

impl Sobject {
    pub fn new(id: impl Into<SobjectId>, pose: Pose) -> Self {
        Self {
            id: id.into(),
            pose,
            parameters: ParameterMap::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Element type of this instance, when declared.
    pub fn type_key(&self) -> Option<&str> {
        self.parameters.get(TYPE_PARAMETER).map(String::as_str)
    }

    /// Stable identity-by-value over the canonical serialized form.
    pub fn content_hash(&self) -> Result<blake3::Hash> {
        content_hash(self)
    }
}

/// How one side of a connection attaches to its sobject.
///
/// Closed set: resolution matches exhaustively and adding a variant is a
/// deliberate API change, not a runtime registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConnectionProtocol {
    /// Attach at the element frame origin. Total and pure: resolution never
    /// consults the provider and never fails.
    Simple {
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        bias: ParameterMap,
    },
    /// Attach at a named port family declared by the element type.
    /// Resolution delegates to the geometry provider and fails with
    /// `NoMatchingPort` when the type declares nothing suitable.
    Port {
        port_type: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        parameters: ParameterMap,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        bias: ParameterMap,
    },
}

impl ConnectionProtocol {
    pub fn simple() -> Self {
        Self::Simple {
            bias: ParameterMap::new(),
        }
    }

    pub fn port(port_type: impl Into<String>) -> Self {
        Self::Port {
            port_type: port_type.into(),
            parameters: ParameterMap::new(),
            bias: ParameterMap::new(),
        }
    }

    /// Adds a bias entry. Bias entries win over every other source when the
    /// owning side resolves its attachment point.
    pub fn with_bias(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        match &mut self {
            Self::Simple { bias } | Self::Port { bias, .. } => {
                bias.insert(key.into(), value.into());
            }
        }
        self
    }

    /// Serialized form of this protocol, handed to the other side of the
    /// connection so it can bias its own resolution.
    ///
    /// Reserved keys first, then the variant parameters, then the bias
    /// overlaid on top.
    pub fn parameters(&self) -> ParameterMap {
        let mut map = ParameterMap::new();
        match self {
            Self::Simple { bias } => {
                map.insert(PROTOCOL_PARAMETER.to_string(), "simple".to_string());
                map.extend(bias.clone());
            }
            Self::Port {
                port_type,
                parameters,
                bias,
            } => {
                map.insert(PROTOCOL_PARAMETER.to_string(), "port".to_string());
                map.insert(PORT_TYPE_PARAMETER.to_string(), port_type.clone());
                map.extend(parameters.clone());
                map.extend(bias.clone());
            }
        }
        map
    }

    /// Merged map a side sends to the provider when resolving its own
    /// attachment point: peer parameters first, this protocol's serialized
    /// form overlaid. Own bias beats own fields beats peer.
    pub fn request_parameters(&self, peer: &ParameterMap) -> ParameterMap {
        let mut map = peer.clone();
        map.extend(self.parameters());
        map
    }

    /// Local attachment point on `sobject` for this side of a connection,
    /// biased by the peer side's serialized protocol.
    pub fn resolve_attachment_point(
        &self,
        sobject: &Sobject,
        peer_parameters: &ParameterMap,
        provider: &dyn GeometryProvider,
    ) -> Result<Point> {
        match self {
            Self::Simple { .. } => Ok(Point::origin()),
            Self::Port { .. } => provider.request_attachment_point(
                &sobject.parameters,
                &self.request_parameters(peer_parameters),
            ),
        }
    }
}

/// One side of a connection: which sobject, and how it attaches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEnd {
    pub sobject_id: SobjectId,
    pub protocol: ConnectionProtocol,
}

impl ConnectionEnd {
    pub fn new(sobject_id: impl Into<SobjectId>, protocol: ConnectionProtocol) -> Self {
        Self {
            sobject_id: sobject_id.into(),
            protocol,
        }
    }

    pub fn simple(sobject_id: impl Into<SobjectId>) -> Self {
        Self::new(sobject_id, ConnectionProtocol::simple())
    }
}

/// Declared connection between two sobjects. The attractor stays in place;
/// the attracted side is moved onto it when the connection resolves.
///
/// Layout resolution re-validates every connection, so values deserialized
/// or built as literals go through the same checks as [`Connection::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub attractor: ConnectionEnd,
    pub attracted: ConnectionEnd,
}

impl Connection {
    /// Fails with `SelfConnection` when both ends name the same sobject.
    pub fn new(attractor: ConnectionEnd, attracted: ConnectionEnd) -> Result<Self> {
        if attractor.sobject_id == attracted.sobject_id {
            return Err(AssemblyError::SelfConnection(attractor.sobject_id));
        }
        Ok(Self {
            attractor,
            attracted,
        })
    }

    /// Both ends attached with the simple protocol.
    pub fn simple(
        attractor: impl Into<SobjectId>,
        attracted: impl Into<SobjectId>,
    ) -> Result<Self> {
        Self::new(
            ConnectionEnd::simple(attractor),
            ConnectionEnd::simple(attracted),
        )
    }

    /// The same connection with the roles swapped.
    pub fn reversed(&self) -> Connection {
        Connection {
            attractor: self.attracted.clone(),
            attracted: self.attractor.clone(),
        }
    }
}
