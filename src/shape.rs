//! Shape factory: declarative descriptors to engine collision shapes.
//!
//! [`ShapeDesc`] is a tagged union over every shape kind the scene supports.
//! Making each variant carry exactly its required fields keeps "missing
//! field" states unrepresentable; anything left to check at runtime (value
//! ranges, degenerate geometry) is validated by [`build_shape`], which
//! either returns a usable [`SharedShape`] or a descriptive error — never a
//! degenerate shape.
//!
//! Conventions
//! - Units are meters.
//! - Capsules, cylinders, and tapered capsules are aligned with local +Y.
//! - Compound children own their sub-descriptors and carry a local pose.
//!
//! [`shape_to_triangles`] extracts a renderable triangulation of any shape
//! built by this factory. It exists for debug visualization and for mesh or
//! convex shapes where the caller has no native geometry of their own.

use nalgebra as na;
use rapier3d::parry::shape::{SharedShape, TypedShape};

use crate::error::{PhysicsError, PhysicsResult};
use crate::{Quat, Vec3};

/// Subdivision counts used when triangulating curved shapes.
const BALL_SUBDIV: u32 = 16;
const CYLINDER_SUBDIV: u32 = 16;

/// Latitude/longitude sampling used to approximate a tapered capsule as a
/// convex hull of its two cap spheres.
const TAPERED_LAT_STEPS: u32 = 8;
const TAPERED_LON_STEPS: u32 = 16;

/// A child entry of a compound shape: a sub-descriptor plus its local pose.
#[derive(Clone, Debug)]
pub struct CompoundChild {
    pub shape: ShapeDesc,
    pub position: Vec3,
    pub rotation: Quat,
}

impl CompoundChild {
    #[inline]
    pub fn new(shape: ShapeDesc, position: Vec3) -> Self {
        Self {
            shape,
            position,
            rotation: Quat::identity(),
        }
    }
}

/// Declarative collision shape descriptor.
///
/// Immutable once built into a concrete shape; compound descriptors own
/// their children.
#[derive(Clone, Debug)]
pub enum ShapeDesc {
    /// Axis-aligned box given by half-extents (meters).
    Box { half_extents: Vec3 },

    /// Sphere (meters).
    Sphere { radius: f32 },

    /// Y-aligned capsule. `half_height` is half the cylinder section, so
    /// the total height is `2 * half_height + 2 * radius`.
    Capsule { half_height: f32, radius: f32 },

    /// Y-aligned cylinder with a rounding (convex) radius on its edges.
    /// `convex_radius` must be smaller than both `half_height` and
    /// `radius`; zero disables the rounding.
    Cylinder {
        half_height: f32,
        radius: f32,
        convex_radius: f32,
    },

    /// Y-aligned capsule whose two caps have different radii.
    TaperedCapsule {
        half_height: f32,
        top_radius: f32,
        bottom_radius: f32,
    },

    /// Convex hull of a point cloud (needs at least 4 non-degenerate points).
    ConvexHull { points: Vec<na::Point3<f32>> },

    /// Triangle mesh given by vertices and a flat index buffer
    /// (`indices.len()` must be a non-zero multiple of 3).
    TriangleMesh {
        vertices: Vec<na::Point3<f32>>,
        indices: Vec<u32>,
    },

    /// Compound of posed sub-shapes.
    Compound { children: Vec<CompoundChild> },
}

/// Build an engine shape from a descriptor.
///
/// Pure function of its input: no world state is consulted. Compound
/// descriptors recurse through their children.
pub fn build_shape(desc: &ShapeDesc) -> PhysicsResult<SharedShape> {
    match desc {
        ShapeDesc::Box { half_extents } => {
            if half_extents.iter().any(|&e| e <= 0.0) {
                return Err(PhysicsError::invalid_shape(format!(
                    "box half-extents must be positive, got {half_extents:?}"
                )));
            }
            Ok(SharedShape::cuboid(
                half_extents.x,
                half_extents.y,
                half_extents.z,
            ))
        }

        ShapeDesc::Sphere { radius } => {
            if *radius <= 0.0 {
                return Err(PhysicsError::invalid_shape(format!(
                    "sphere radius must be positive, got {radius}"
                )));
            }
            Ok(SharedShape::ball(*radius))
        }

        ShapeDesc::Capsule {
            half_height,
            radius,
        } => {
            if *half_height <= 0.0 || *radius <= 0.0 {
                return Err(PhysicsError::invalid_shape(format!(
                    "capsule half-height and radius must be positive, got ({half_height}, {radius})"
                )));
            }
            Ok(SharedShape::capsule_y(*half_height, *radius))
        }

        ShapeDesc::Cylinder {
            half_height,
            radius,
            convex_radius,
        } => {
            if *half_height <= 0.0 || *radius <= 0.0 {
                return Err(PhysicsError::invalid_shape(format!(
                    "cylinder half-height and radius must be positive, got ({half_height}, {radius})"
                )));
            }
            if *convex_radius < 0.0 || *convex_radius >= half_height.min(*radius) {
                return Err(PhysicsError::invalid_shape(format!(
                    "cylinder convex radius must be in [0, min(half_height, radius)), got {convex_radius}"
                )));
            }
            if *convex_radius == 0.0 {
                Ok(SharedShape::cylinder(*half_height, *radius))
            } else {
                // Shrink the core so the rounded silhouette keeps the
                // requested outer dimensions.
                Ok(SharedShape::round_cylinder(
                    half_height - convex_radius,
                    radius - convex_radius,
                    *convex_radius,
                ))
            }
        }

        ShapeDesc::TaperedCapsule {
            half_height,
            top_radius,
            bottom_radius,
        } => build_tapered_capsule(*half_height, *top_radius, *bottom_radius),

        ShapeDesc::ConvexHull { points } => {
            if points.len() < 4 {
                return Err(PhysicsError::invalid_shape(format!(
                    "convex hull needs at least 4 points, got {}",
                    points.len()
                )));
            }
            // The engine accepts flat point sets, so degeneracy has to be
            // checked here: a hull without volume is not a usable shape.
            if !points_span_volume(points) {
                return Err(PhysicsError::shape_construction(
                    "convex hull points are degenerate (coplanar or coincident)",
                ));
            }
            SharedShape::convex_hull(points).ok_or_else(|| {
                PhysicsError::shape_construction("convex hull construction failed")
            })
        }

        ShapeDesc::TriangleMesh { vertices, indices } => {
            if vertices.len() < 3 {
                return Err(PhysicsError::invalid_shape(format!(
                    "triangle mesh needs at least 3 vertices, got {}",
                    vertices.len()
                )));
            }
            if indices.is_empty() || indices.len() % 3 != 0 {
                return Err(PhysicsError::invalid_shape(format!(
                    "triangle mesh index count must be a non-zero multiple of 3, got {}",
                    indices.len()
                )));
            }
            if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
                return Err(PhysicsError::invalid_shape(format!(
                    "triangle mesh index {bad} is out of bounds for {} vertices",
                    vertices.len()
                )));
            }

            let triangles: Vec<[u32; 3]> = indices
                .chunks_exact(3)
                .map(|tri| [tri[0], tri[1], tri[2]])
                .collect();

            SharedShape::trimesh(vertices.clone(), triangles)
                .map_err(|e| PhysicsError::shape_construction(format!("triangle mesh: {e}")))
        }

        ShapeDesc::Compound { children } => {
            if children.is_empty() {
                return Err(PhysicsError::invalid_shape(
                    "compound shape needs at least one child",
                ));
            }

            let mut parts = Vec::with_capacity(children.len());
            for child in children {
                let sub = build_shape(&child.shape)?;
                let iso = na::Isometry3::from_parts(
                    na::Translation3::from(child.position),
                    child.rotation,
                );
                parts.push((iso, sub));
            }
            Ok(SharedShape::compound(parts))
        }
    }
}

/// True when the point cloud spans an actual volume: there is an edge, a
/// point off that edge's line, and a point off the plane of the first
/// three.
fn points_span_volume(points: &[na::Point3<f32>]) -> bool {
    const EPS: f32 = 1.0e-6;
    let origin = points[0];

    let Some(edge) = points
        .iter()
        .map(|p| p - origin)
        .find(|v| v.norm_squared() > EPS)
    else {
        return false;
    };
    let Some(normal) = points
        .iter()
        .map(|p| edge.cross(&(p - origin)))
        .find(|n| n.norm_squared() > EPS)
    else {
        return false;
    };
    points.iter().any(|p| normal.dot(&(p - origin)).abs() > EPS)
}

/// Build a tapered capsule as the convex hull of points sampled on its two
/// cap spheres. The engine has no native tapered capsule; the hull inscribes
/// the exact shape (all hull vertices lie on the cap spheres).
fn build_tapered_capsule(
    half_height: f32,
    top_radius: f32,
    bottom_radius: f32,
) -> PhysicsResult<SharedShape> {
    if half_height <= 0.0 || top_radius <= 0.0 || bottom_radius <= 0.0 {
        return Err(PhysicsError::invalid_shape(format!(
            "tapered capsule dimensions must be positive, got ({half_height}, {top_radius}, {bottom_radius})"
        )));
    }
    // If one cap sphere contains the other, the side surface vanishes and
    // the descriptor does not describe a tapered capsule.
    if (top_radius - bottom_radius).abs() >= 2.0 * half_height {
        return Err(PhysicsError::invalid_shape(
            "tapered capsule taper is too extreme: one cap sphere contains the other",
        ));
    }

    let mut points = Vec::with_capacity(2 * (TAPERED_LAT_STEPS as usize + 1) * TAPERED_LON_STEPS as usize);
    sample_sphere(&mut points, na::Point3::new(0.0, half_height, 0.0), top_radius);
    sample_sphere(
        &mut points,
        na::Point3::new(0.0, -half_height, 0.0),
        bottom_radius,
    );

    SharedShape::convex_hull(&points)
        .ok_or_else(|| PhysicsError::shape_construction("tapered capsule hull is degenerate"))
}

/// Push a latitude/longitude sampling of a sphere's surface (poles included).
fn sample_sphere(out: &mut Vec<na::Point3<f32>>, center: na::Point3<f32>, radius: f32) {
    out.push(center + Vec3::new(0.0, radius, 0.0));
    out.push(center + Vec3::new(0.0, -radius, 0.0));

    for lat in 1..TAPERED_LAT_STEPS {
        let theta = std::f32::consts::PI * lat as f32 / TAPERED_LAT_STEPS as f32;
        let (sin_t, cos_t) = theta.sin_cos();
        for lon in 0..TAPERED_LON_STEPS {
            let phi = std::f32::consts::TAU * lon as f32 / TAPERED_LON_STEPS as f32;
            let (sin_p, cos_p) = phi.sin_cos();
            out.push(center + radius * Vec3::new(sin_t * cos_p, cos_t, sin_t * sin_p));
        }
    }
}

/// Extract a renderable triangulation of a shape's surface.
///
/// Returns `(vertices, triangle indices)`. Compound shapes recurse through
/// their children, transforming each child's vertices by its local pose.
/// Shapes this factory cannot produce (e.g. half-spaces) are rejected.
pub fn shape_to_triangles(
    shape: &SharedShape,
) -> PhysicsResult<(Vec<na::Point3<f32>>, Vec<[u32; 3]>)> {
    match shape.as_typed_shape() {
        TypedShape::Ball(ball) => Ok(ball.to_trimesh(BALL_SUBDIV, BALL_SUBDIV)),
        TypedShape::Cuboid(cuboid) => Ok(cuboid.to_trimesh()),
        TypedShape::Capsule(capsule) => Ok(capsule.to_trimesh(BALL_SUBDIV, BALL_SUBDIV)),
        TypedShape::Cylinder(cylinder) => Ok(cylinder.to_trimesh(CYLINDER_SUBDIV)),
        TypedShape::RoundCylinder(round) => {
            // Triangulate the inner core; the rounding margin is a
            // collision-only detail not worth meshing for debug views.
            Ok(round.inner_shape.to_trimesh(CYLINDER_SUBDIV))
        }
        TypedShape::ConvexPolyhedron(hull) => Ok(hull.to_trimesh()),
        TypedShape::TriMesh(mesh) => Ok((mesh.vertices().to_vec(), mesh.indices().to_vec())),
        TypedShape::Compound(compound) => {
            let mut vertices = Vec::new();
            let mut indices = Vec::new();
            for (iso, sub) in compound.shapes() {
                let (sub_vertices, sub_indices) = shape_to_triangles(sub)?;
                let base = vertices.len() as u32;
                vertices.extend(sub_vertices.iter().map(|v| iso * v));
                indices.extend(
                    sub_indices
                        .iter()
                        .map(|tri| [tri[0] + base, tri[1] + base, tri[2] + base]),
                );
            }
            Ok((vertices, indices))
        }
        _ => Err(PhysicsError::invalid_shape(
            "shape kind has no surface triangulation",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Axis-aligned bounds of a triangulation, as (min, max) corners.
    fn bounds(vertices: &[na::Point3<f32>]) -> (Vec3, Vec3) {
        let mut min = Vec3::repeat(f32::MAX);
        let mut max = Vec3::repeat(f32::MIN);
        for v in vertices {
            min = min.inf(&v.coords);
            max = max.sup(&v.coords);
        }
        (min, max)
    }

    #[test]
    fn box_triangulation_matches_half_extents() {
        let shape = build_shape(&ShapeDesc::Box {
            half_extents: Vec3::new(1.0, 2.0, 3.0),
        })
        .unwrap();

        let (vertices, indices) = shape_to_triangles(&shape).unwrap();
        assert!(!indices.is_empty());

        let (min, max) = bounds(&vertices);
        assert_relative_eq!(min, -Vec3::new(1.0, 2.0, 3.0), epsilon = 1.0e-6);
        assert_relative_eq!(max, Vec3::new(1.0, 2.0, 3.0), epsilon = 1.0e-6);
    }

    #[test]
    fn box_rejects_non_positive_extent() {
        let err = build_shape(&ShapeDesc::Box {
            half_extents: Vec3::new(1.0, 0.0, 1.0),
        });
        assert!(matches!(err, Err(PhysicsError::InvalidShape(_))));
    }

    #[test]
    fn convex_hull_needs_four_points() {
        let err = build_shape(&ShapeDesc::ConvexHull {
            points: vec![
                na::Point3::origin(),
                na::Point3::new(1.0, 0.0, 0.0),
                na::Point3::new(0.0, 1.0, 0.0),
            ],
        });
        assert!(matches!(err, Err(PhysicsError::InvalidShape(_))));
    }

    #[test]
    fn coplanar_hull_points_are_rejected() {
        // Four points, but all in the y = 0 plane: the hull has no volume.
        let err = build_shape(&ShapeDesc::ConvexHull {
            points: vec![
                na::Point3::origin(),
                na::Point3::new(1.0, 0.0, 0.0),
                na::Point3::new(0.0, 0.0, 1.0),
                na::Point3::new(1.0, 0.0, 1.0),
            ],
        });
        assert!(matches!(err, Err(PhysicsError::ShapeConstruction(_))));
    }

    #[test]
    fn collinear_and_coincident_hull_points_are_rejected() {
        let err = build_shape(&ShapeDesc::ConvexHull {
            points: (0..4).map(|i| na::Point3::new(i as f32, 0.0, 0.0)).collect(),
        });
        assert!(matches!(err, Err(PhysicsError::ShapeConstruction(_))));

        let err = build_shape(&ShapeDesc::ConvexHull {
            points: vec![na::Point3::new(1.0, 2.0, 3.0); 4],
        });
        assert!(matches!(err, Err(PhysicsError::ShapeConstruction(_))));
    }

    #[test]
    fn non_degenerate_hull_is_accepted() {
        let shape = build_shape(&ShapeDesc::ConvexHull {
            points: vec![
                na::Point3::origin(),
                na::Point3::new(1.0, 0.0, 0.0),
                na::Point3::new(0.0, 1.0, 0.0),
                na::Point3::new(0.0, 0.0, 1.0),
            ],
        });
        assert!(shape.is_ok());
    }

    #[test]
    fn trimesh_index_count_must_be_multiple_of_three() {
        let vertices = vec![
            na::Point3::origin(),
            na::Point3::new(1.0, 0.0, 0.0),
            na::Point3::new(0.0, 1.0, 0.0),
        ];

        let err = build_shape(&ShapeDesc::TriangleMesh {
            vertices: vertices.clone(),
            indices: vec![0, 1],
        });
        assert!(matches!(err, Err(PhysicsError::InvalidShape(_))));

        let err = build_shape(&ShapeDesc::TriangleMesh {
            vertices,
            indices: vec![0, 1, 7],
        });
        assert!(matches!(err, Err(PhysicsError::InvalidShape(_))));
    }

    #[test]
    fn tapered_capsule_bounds_reflect_cap_radii() {
        let shape = build_shape(&ShapeDesc::TaperedCapsule {
            half_height: 1.0,
            top_radius: 0.25,
            bottom_radius: 0.5,
        })
        .unwrap();

        let (vertices, _) = shape_to_triangles(&shape).unwrap();
        let (min, max) = bounds(&vertices);

        // Top cap peaks at half_height + top_radius, bottom cap at
        // -(half_height + bottom_radius); lateral extent is the larger cap.
        assert_relative_eq!(max.y, 1.25, epsilon = 1.0e-3);
        assert_relative_eq!(min.y, -1.5, epsilon = 1.0e-3);
        assert!(max.x <= 0.5 + 1.0e-3);
    }

    #[test]
    fn tapered_capsule_rejects_extreme_taper() {
        let err = build_shape(&ShapeDesc::TaperedCapsule {
            half_height: 0.1,
            top_radius: 1.0,
            bottom_radius: 0.2,
        });
        assert!(matches!(err, Err(PhysicsError::InvalidShape(_))));
    }

    #[test]
    fn compound_translates_child_triangulations() {
        let shape = build_shape(&ShapeDesc::Compound {
            children: vec![
                CompoundChild::new(
                    ShapeDesc::Box {
                        half_extents: Vec3::repeat(0.5),
                    },
                    Vec3::new(-2.0, 0.0, 0.0),
                ),
                CompoundChild::new(
                    ShapeDesc::Box {
                        half_extents: Vec3::repeat(0.5),
                    },
                    Vec3::new(2.0, 0.0, 0.0),
                ),
            ],
        })
        .unwrap();

        let (vertices, indices) = shape_to_triangles(&shape).unwrap();
        assert!(!indices.is_empty());

        let (min, max) = bounds(&vertices);
        assert_relative_eq!(min.x, -2.5, epsilon = 1.0e-6);
        assert_relative_eq!(max.x, 2.5, epsilon = 1.0e-6);
    }

    #[test]
    fn empty_compound_is_rejected() {
        let err = build_shape(&ShapeDesc::Compound { children: vec![] });
        assert!(matches!(err, Err(PhysicsError::InvalidShape(_))));
    }
}
