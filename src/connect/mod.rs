//! Connection resolution.
//!
//! Turns one declared connection plus the two sobjects' declared poses into
//! the attracted sobject's new pose, with every intermediate point kept
//! visible for drift bookkeeping and diagnostics.

use crate::error::{AssemblyError, Result};
use crate::geometry::{Point, Pose};
use crate::model::{Connection, Sobject};
use crate::provider::GeometryProvider;

/// Everything computed while resolving one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionResult {
    /// The attracted sobject's new pose: translated so the attachment points
    /// coincide, orientation unchanged.
    pub attracted_pose: Pose,
    /// Attachment point on the attractor, in its local frame.
    pub attractor_local_point: Point,
    /// The same point in world coordinates.
    pub attractor_world_point: Point,
    /// Attachment point on the attracted side, in its local frame.
    pub attracted_local_point: Point,
    /// The attracted point rotated into world orientation but not yet
    /// translated anywhere.
    pub attracted_relative_point: Point,
}

/// Resolves `connection` against the declared poses of its two sobjects.
///
/// The attractor's attachment point is resolved (biased by the attracted
/// side's serialized protocol) and taken to world space. The attracted
/// side's point is resolved the same way, then rotated into world
/// orientation without translation. The attracted sobject is finally
/// translated so the two points coincide; its declared view is kept. A
/// connection moves the attracted part, never re-orients it.
pub fn connect(
    connection: &Connection,
    attractor: &Sobject,
    attracted: &Sobject,
    provider: &dyn GeometryProvider,
) -> Result<ConnectionResult> {
    if connection.attractor.sobject_id == connection.attracted.sobject_id {
        return Err(AssemblyError::SelfConnection(
            connection.attractor.sobject_id.clone(),
        ));
    }
    if connection.attractor.sobject_id != attractor.id {
        return Err(AssemblyError::UnknownSobject(
            connection.attractor.sobject_id.clone(),
        ));
    }
    if connection.attracted.sobject_id != attracted.id {
        return Err(AssemblyError::UnknownSobject(
            connection.attracted.sobject_id.clone(),
        ));
    }

    let params_from_attracted = connection.attracted.protocol.parameters();
    let attractor_local_point = connection.attractor.protocol.resolve_attachment_point(
        attractor,
        &params_from_attracted,
        provider,
    )?;
    let attractor_world_point = attractor.pose.world_from_local(&attractor_local_point);

    let params_from_attractor = connection.attractor.protocol.parameters();
    let attracted_local_point = connection.attracted.protocol.resolve_attachment_point(
        attracted,
        &params_from_attractor,
        provider,
    )?;
    let attracted_relative_point =
        attracted
            .pose
            .world_from_local_with(&attracted_local_point, false, true);

    let point_of_view =
        Point::from(attractor_world_point.coords - attracted_relative_point.coords);
    let attracted_pose = attracted.pose.with_point_of_view(point_of_view);

    Ok(ConnectionResult {
        attracted_pose,
        attractor_local_point,
        attractor_world_point,
        attracted_local_point,
        attracted_relative_point,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::model::{
        ConnectionEnd, ConnectionProtocol, PORT_TYPE_PARAMETER, ParameterMap, Representation,
        TYPE_PARAMETER,
    };
    use crate::provider::OriginProvider;

    struct TableProvider {
        ports: HashMap<(String, String), Point>,
    }

    impl TableProvider {
        fn new(entries: &[(&str, &str, Point)]) -> Self {
            let mut ports = HashMap::new();
            for (type_key, port_type, point) in entries {
                ports.insert(((*type_key).to_string(), (*port_type).to_string()), *point);
            }
            Self { ports }
        }
    }

    impl GeometryProvider for TableProvider {
        fn request_attachment_point(
            &self,
            sobject_parameters: &ParameterMap,
            protocol_parameters: &ParameterMap,
        ) -> Result<Point> {
            let type_key = sobject_parameters
                .get(TYPE_PARAMETER)
                .cloned()
                .unwrap_or_default();
            let requested = protocol_parameters
                .get(PORT_TYPE_PARAMETER)
                .cloned()
                .unwrap_or_default();
            self.ports
                .get(&(type_key.clone(), requested.clone()))
                .copied()
                .ok_or(AssemblyError::NoMatchingPort {
                    type_key,
                    requested,
                })
        }

        fn request_geometry(
            &self,
            _sobject_parameters: &ParameterMap,
            target_platform: &str,
        ) -> Result<Representation> {
            Ok(Representation::empty(target_platform))
        }
    }

    #[test]
    fn coincident_simple_connection_is_a_no_op() {
        let pose = Pose::new(
            Point::new(240.0, 181.0, -241.0),
            [
                0.3091312646865845,
                0.6703038215637207,
                0.43299445509910583,
                0.5173455476760864,
            ],
        )
        .unwrap();
        let base = Sobject::new("base", pose);
        let panel = Sobject::new("panel", pose);
        let connection = Connection::simple("base", "panel").unwrap();

        let result = connect(&connection, &base, &panel, &OriginProvider).unwrap();
        assert!(result.attracted_pose.approx_eq(&panel.pose, 1e-9));
    }

    #[test]
    fn simple_connection_translates_onto_the_attractor() {
        let base = Sobject::new(
            "base",
            Pose::new(Point::new(10.0, 0.0, 0.0), [1.0, 0.0, 0.0, 0.0]).unwrap(),
        );
        let panel = Sobject::new(
            "panel",
            Pose::new(Point::new(0.0, 0.0, 5.0), [1.0, 0.0, 0.0, 0.0]).unwrap(),
        );
        let connection = Connection::simple("base", "panel").unwrap();

        let result = connect(&connection, &base, &panel, &OriginProvider).unwrap();
        assert_eq!(result.attractor_world_point, Point::new(10.0, 0.0, 0.0));
        assert_eq!(result.attracted_relative_point, Point::origin());
        assert!(
            result
                .attracted_pose
                .approx_eq(&panel.pose.with_point_of_view(Point::new(10.0, 0.0, 0.0)), 1e-12)
        );
    }

    #[test]
    fn resolved_ports_end_up_coincident_in_world_space() {
        let provider = TableProvider::new(&[
            ("beam-200", "slot", Point::new(0.0, 0.0, 100.0)),
            ("bracket", "tab", Point::new(0.0, 0.0, 1.0)),
        ]);
        let beam = Sobject::new(
            "beam",
            Pose::new(Point::new(3.0, -2.0, 7.0), [1.0, 0.0, 0.0, 0.0]).unwrap(),
        )
        .with_parameter("type", "beam-200");
        // quarter turn about x
        let bracket = Sobject::new(
            "bracket",
            Pose::new(
                Point::new(50.0, 50.0, 50.0),
                [
                    0.7071067811865476,
                    0.7071067811865476,
                    0.0,
                    0.0,
                ],
            )
            .unwrap(),
        )
        .with_parameter("type", "bracket");
        let connection = Connection::new(
            ConnectionEnd::new("beam", ConnectionProtocol::port("slot")),
            ConnectionEnd::new("bracket", ConnectionProtocol::port("tab")),
        )
        .unwrap();

        let result = connect(&connection, &beam, &bracket, &provider).unwrap();

        let attached = result
            .attracted_pose
            .world_from_local(&result.attracted_local_point);
        let gap = attached - result.attractor_world_point;
        assert!(gap.norm() < 1e-9, "ports should coincide, gap {gap}");
        // orientation untouched
        assert_eq!(result.attracted_pose.view_wxyz(), bracket.pose.view_wxyz());
    }

    #[test]
    fn missing_port_propagates_unchanged() {
        let provider = TableProvider::new(&[]);
        let beam = Sobject::new("beam", Pose::identity()).with_parameter("type", "beam-200");
        let bracket = Sobject::new("bracket", Pose::identity()).with_parameter("type", "bracket");
        let connection = Connection::new(
            ConnectionEnd::new("beam", ConnectionProtocol::port("slot")),
            ConnectionEnd::simple("bracket"),
        )
        .unwrap();

        let result = connect(&connection, &beam, &bracket, &provider);
        assert!(matches!(
            result,
            Err(AssemblyError::NoMatchingPort { type_key, requested })
                if type_key == "beam-200" && requested == "slot"
        ));
    }

    #[test]
    fn mismatched_sobjects_are_rejected() {
        let base = Sobject::new("base", Pose::identity());
        let other = Sobject::new("other", Pose::identity());
        let connection = Connection::simple("base", "panel").unwrap();
        let result = connect(&connection, &base, &other, &OriginProvider);
        assert!(matches!(
            result,
            Err(AssemblyError::UnknownSobject(id)) if id == "panel"
        ));
    }

    #[test]
    fn peer_protocol_parameters_reach_the_provider() {
        struct CapturingProvider {
            seen: Mutex<Option<ParameterMap>>,
        }

        impl GeometryProvider for CapturingProvider {
            fn request_attachment_point(
                &self,
                _sobject_parameters: &ParameterMap,
                protocol_parameters: &ParameterMap,
            ) -> Result<Point> {
                *self.seen.lock().unwrap() = Some(protocol_parameters.clone());
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

        let provider = CapturingProvider {
            seen: Mutex::new(None),
        };
        let beam = Sobject::new("beam", Pose::identity());
        let bracket = Sobject::new("bracket", Pose::identity());
        let connection = Connection::new(
            ConnectionEnd::new("beam", ConnectionProtocol::port("slot")),
            ConnectionEnd::new(
                "bracket",
                ConnectionProtocol::simple().with_bias("grip", "soft"),
            ),
        )
        .unwrap();

        connect(&connection, &beam, &bracket, &provider).unwrap();
        let seen = provider.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.get("protocol").map(String::as_str), Some("port"));
        assert_eq!(seen.get("type").map(String::as_str), Some("slot"));
        assert_eq!(seen.get("grip").map(String::as_str), Some("soft"));
    }
}
