//! Geometry provider boundary.
//!
//! Attachment points and platform geometry come from element type
//! definitions the engine does not own. The trait keeps that seam explicit
//! so resolution can run against a live source, a fixture table, or a
//! memoizing wrapper.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::Result;
use crate::geometry::Point;
use crate::model::{ParameterMap, Representation, TYPE_PARAMETER, content_hash};

/// Source of element-type information that resolution depends on.
///
/// Implementations may be slow or failing; every call is fallible and the
/// engine never retries within one resolution.
pub trait GeometryProvider: Send + Sync {
    /// Local attachment point for a port request against an element type's
    /// port set. Fails with `NoMatchingPort` when the type declares nothing
    /// suitable.
    fn request_attachment_point(
        &self,
        sobject_parameters: &ParameterMap,
        protocol_parameters: &ParameterMap,
    ) -> Result<Point>;

    /// Platform-keyed geometry for an element instance.
    fn request_geometry(
        &self,
        sobject_parameters: &ParameterMap,
        target_platform: &str,
    ) -> Result<Representation>;
}

/// Null provider: every attachment point is the frame origin and every
/// geometry request an empty representation.
#[derive(Debug, Default)]
pub struct OriginProvider;

impl GeometryProvider for OriginProvider {
    fn request_attachment_point(
        &self,
        _sobject_parameters: &ParameterMap,
        _protocol_parameters: &ParameterMap,
    ) -> Result<Point> {
        Ok(Point::origin())
    }

    fn request_geometry(
        &self,
        _sobject_parameters: &ParameterMap,
        target_platform: &str,
    ) -> Result<Representation> {
        Ok(Representation::empty(target_platform))
    }
}

/// Caches attachment points of an inner provider, keyed by element type
/// identity plus the protocol request map.
///
/// Instances of one type share a port set, so the `"type"` parameter scopes
/// the key; sobjects without a declared type fall back to their full
/// parameter map. Errors are not cached, and geometry requests pass through
/// uncached.
pub struct MemoizedProvider<P> {
    inner: P,
    cache: RwLock<HashMap<blake3::Hash, Point>>,
}

impl<P: GeometryProvider> MemoizedProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn cache_key(
        sobject_parameters: &ParameterMap,
        protocol_parameters: &ParameterMap,
    ) -> Result<blake3::Hash> {
        match sobject_parameters.get(TYPE_PARAMETER) {
            Some(type_key) => content_hash(&(type_key, protocol_parameters)),
            None => content_hash(&(sobject_parameters, protocol_parameters)),
        }
    }
}

impl<P: GeometryProvider> GeometryProvider for MemoizedProvider<P> {
    fn request_attachment_point(
        &self,
        sobject_parameters: &ParameterMap,
        protocol_parameters: &ParameterMap,
    ) -> Result<Point> {
        let key = Self::cache_key(sobject_parameters, protocol_parameters)?;
        if let Some(point) = self
            .cache
            .read()
            .ok()
            .and_then(|cache| cache.get(&key).copied())
        {
            return Ok(point);
        }
        let point = self
            .inner
            .request_attachment_point(sobject_parameters, protocol_parameters)?;
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(key, point);
        }
        Ok(point)
    }

    fn request_geometry(
        &self,
        sobject_parameters: &ParameterMap,
        target_platform: &str,
    ) -> Result<Representation> {
        self.inner
            .request_geometry(sobject_parameters, target_platform)
    }
}
