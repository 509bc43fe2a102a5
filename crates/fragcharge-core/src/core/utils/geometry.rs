use nalgebra::{Point3, Rotation3, Unit, Vector3};

/// Ideal tetrahedral angle in degrees.
pub const TETRAHEDRAL_ANGLE: f64 = 109.471_220_634_490_7;

pub fn rotation_from_axis_angle(axis: &Vector3<f64>, angle_degrees: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Unit::new_normalize(*axis), angle_degrees.to_radians())
}

/// Angle `a-vertex-b` in degrees.
pub fn bond_angle(a: &Point3<f64>, vertex: &Point3<f64>, b: &Point3<f64>) -> f64 {
    let u = a - vertex;
    let v = b - vertex;
    u.angle(&v).to_degrees()
}

fn any_perpendicular(n: &Vector3<f64>) -> Vector3<f64> {
    let seed = if n.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    (seed - n * n.dot(&seed)).normalize()
}

/// Places the hydrogens that complete a tetrahedral center.
///
/// `neighbors` are the existing heavy-atom partners of `base_pos`; one, two,
/// or three of them yield three, two, or one hydrogens respectively. Any
/// other count, or a degenerate (collinear) arrangement, yields no hydrogens.
pub fn generate_sp3_hydrogens(
    base_pos: &Point3<f64>,
    neighbors: &[Point3<f64>],
    bond_length: f64,
) -> Vec<Point3<f64>> {
    let neighbor_vecs: Vec<Vector3<f64>> = neighbors
        .iter()
        .map(|p| (p - base_pos).normalize())
        .collect();

    match neighbor_vecs.as_slice() {
        [n1] => {
            let perp = any_perpendicular(n1);
            let h1_dir =
                rotation_from_axis_angle(&n1.cross(&perp), TETRAHEDRAL_ANGLE) * n1;
            let rot = rotation_from_axis_angle(n1, 120.0);
            let h2_dir = rot * h1_dir;
            let h3_dir = rot * h2_dir;
            [h1_dir, h2_dir, h3_dir]
                .iter()
                .map(|d| base_pos + d.normalize() * bond_length)
                .collect()
        }
        [n1, n2] => {
            let sum = n1 + n2;
            let normal = n1.cross(n2);
            if sum.norm() < 1e-6 || normal.norm() < 1e-6 {
                return Vec::new();
            }
            let bisector = -sum.normalize();
            let normal = normal.normalize();
            let half = (TETRAHEDRAL_ANGLE / 2.0).to_radians();
            [1.0, -1.0]
                .iter()
                .map(|sign| {
                    let dir = bisector * half.cos() + normal * (sign * half.sin());
                    base_pos + dir.normalize() * bond_length
                })
                .collect()
        }
        [n1, n2, n3] => {
            let sum = n1 + n2 + n3;
            if sum.norm() < 1e-6 {
                return Vec::new();
            }
            vec![base_pos - sum.normalize() * bond_length]
        }
        _ => Vec::new(),
    }
}

/// Places the hydrogens that complete a trigonal planar center.
///
/// With two neighbors the hydrogen lies on the external bisector. With one
/// neighbor two hydrogens are placed at 120 degrees in an arbitrary plane
/// containing the bond.
pub fn generate_sp2_hydrogens(
    base_pos: &Point3<f64>,
    neighbors: &[Point3<f64>],
    bond_length: f64,
) -> Vec<Point3<f64>> {
    let neighbor_vecs: Vec<Vector3<f64>> = neighbors
        .iter()
        .map(|p| (p - base_pos).normalize())
        .collect();

    match neighbor_vecs.as_slice() {
        [n1] => {
            let axis = n1.cross(&any_perpendicular(n1));
            [120.0, -120.0]
                .iter()
                .map(|angle| {
                    let dir = rotation_from_axis_angle(&axis, *angle) * n1;
                    base_pos + dir.normalize() * bond_length
                })
                .collect()
        }
        [n1, n2] => {
            let sum = n1 + n2;
            if sum.norm() < 1e-6 {
                return Vec::new();
            }
            vec![base_pos - sum.normalize() * bond_length]
        }
        _ => Vec::new(),
    }
}
