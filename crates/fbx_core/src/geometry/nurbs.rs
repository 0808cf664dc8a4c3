//! NURBS curve geometry, sampled to a polyline.

use fbx_math::{NurbsCurve, Vec4};

use super::{Geometry, GeometryKind};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::document::Node;

/// Samples per control point.
const SAMPLES_PER_POINT: usize = 7;

/// Read the curve definition. Errors describe the missing or invalid field.
fn read_curve(node: &Node) -> Result<NurbsCurve, String> {
    let order = node
        .i64("Order")
        .ok_or_else(|| format!("invalid Order {:?}", node.value("Order")))?;
    if order < 1 {
        return Err(format!("invalid Order {}", order));
    }
    let degree = (order - 1) as usize;

    let knots = node
        .child_array("KnotVector")
        .ok_or("missing KnotVector")?
        .into_owned();
    let points = node.child_array("Points").ok_or("missing Points")?;

    let mut control_points: Vec<Vec4> = points
        .chunks_exact(4)
        .map(|c| Vec4::new(c[0] as f32, c[1] as f32, c[2] as f32, c[3] as f32))
        .collect();
    if control_points.is_empty() {
        return Err("no control points".to_string());
    }

    let form = node.str("Form").unwrap_or_default();
    let curve = match form {
        "Closed" => {
            control_points.push(control_points[0]);
            NurbsCurve::new(degree, knots, control_points)
        }
        "Periodic" => {
            let end_knot = knots
                .len()
                .checked_sub(1 + degree)
                .ok_or("knot vector shorter than degree")?;
            for i in 0..degree {
                let wrapped = control_points[i % control_points.len()];
                control_points.push(wrapped);
            }
            NurbsCurve::new(degree, knots, control_points).with_knot_range(degree, end_knot)
        }
        _ => NurbsCurve::new(degree, knots, control_points),
    };

    if !curve.is_valid() {
        return Err("knot vector and control points disagree".to_string());
    }
    Ok(curve)
}

/// Build a line geometry from a `NurbsCurve` geometry node.
///
/// Invalid curves produce an empty line and a diagnostic.
pub fn build_curve(node: &Node, id: i64, diagnostics: &mut Diagnostics) -> Geometry {
    let mut geometry = Geometry::empty(id, node.attr_name.clone(), GeometryKind::Line);

    match read_curve(node) {
        Ok(curve) => {
            let divisions = curve.control_points.len() * SAMPLES_PER_POINT;
            geometry.positions = curve.points(divisions);
        }
        Err(reason) => diagnostics.warn(
            DiagnosticKind::Schema,
            format!("NURBS geometry {}: {}, leaving it empty", id, reason),
        ),
    }
    geometry
}
