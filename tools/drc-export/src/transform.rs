//! World-space transform of vertex attributes
//!
//! Positions go through the model-to-world matrix. Normals go through its
//! inverse-transpose so they stay perpendicular to surfaces under non-uniform
//! scale, and are renormalized afterwards.

use glam::{Mat3, Mat4, Vec3};

/// Below this ratio of |det| to the product of the column lengths, the
/// linear part is treated as singular. The ratio is scale-free, so tiny but
/// well-conditioned transforms are accepted.
const DEGENERATE_VOLUME_RATIO: f32 = 1e-6;

/// Returned when a transform collapses a dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DegenerateTransform;

/// Position and normal matrices of one scene object
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectTransform {
    position: Mat4,
    normal: Mat4,
}

impl ObjectTransform {
    /// Derive the normal matrix from the position matrix
    pub fn new(position: Mat4) -> Result<Self, DegenerateTransform> {
        let linear = checked_linear(position)?;
        let normal = Mat4::from_mat3(linear.inverse().transpose());
        Ok(Self { position, normal })
    }

    /// Use a host-supplied normal matrix
    ///
    /// Both matrices must be invertible.
    pub fn with_normal_matrix(position: Mat4, normal: Mat4) -> Result<Self, DegenerateTransform> {
        checked_linear(position)?;
        checked_linear(normal)?;
        Ok(Self { position, normal })
    }

    #[inline]
    pub fn apply_position(&self, position: [f32; 3]) -> [f32; 3] {
        self.position.transform_point3(Vec3::from(position)).to_array()
    }

    /// Transform and renormalize a normal
    ///
    /// Fails if the result has no direction (zero input normal).
    #[inline]
    pub fn apply_normal(&self, normal: [f32; 3]) -> Result<[f32; 3], DegenerateTransform> {
        self.normal
            .transform_vector3(Vec3::from(normal))
            .try_normalize()
            .map(|n| n.to_array())
            .ok_or(DegenerateTransform)
    }
}

/// Upper-left 3x3 of `matrix`, if it does not collapse a dimension
fn checked_linear(matrix: Mat4) -> Result<Mat3, DegenerateTransform> {
    let linear = Mat3::from_mat4(matrix);
    let volume = linear.x_axis.length() * linear.y_axis.length() * linear.z_axis.length();
    let det = linear.determinant();
    if !det.is_finite() || !volume.is_finite() || det.abs() <= DEGENERATE_VOLUME_RATIO * volume {
        return Err(DegenerateTransform);
    }
    Ok(linear)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec4};

    fn length(v: [f32; 3]) -> f32 {
        Vec3::from(v).length()
    }

    #[test]
    fn test_position_translation() {
        let t = ObjectTransform::new(Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0))).unwrap();
        assert_eq!(t.apply_position([1.0, 1.0, 1.0]), [2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_normal_ignores_translation() {
        let t = ObjectTransform::new(Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0))).unwrap();
        assert_eq!(t.apply_normal([0.0, 1.0, 0.0]).unwrap(), [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_normal_unit_length_under_non_uniform_scale() {
        let matrix = Mat4::from_scale_rotation_translation(
            Vec3::new(4.0, 0.25, 9.0),
            Quat::from_rotation_y(0.7),
            Vec3::new(-3.0, 1.0, 2.0),
        );
        let t = ObjectTransform::new(matrix).unwrap();
        for n in [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.577, 0.577, 0.577], [0.0, -3.0, 4.0]] {
            let out = t.apply_normal(n).unwrap();
            assert!((length(out) - 1.0).abs() < 1e-5, "normal {:?} -> {:?}", n, out);
        }
    }

    #[test]
    fn test_normal_stays_perpendicular_to_scaled_surface() {
        // Plane x + y = 0 squashed along x: its normal must follow the inverse scale
        let t = ObjectTransform::new(Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0))).unwrap();
        let tangent = Vec3::from(t.apply_position([1.0, -1.0, 0.0]));
        let normal = Vec3::from(t.apply_normal([1.0, 1.0, 0.0]).unwrap());
        assert!(tangent.dot(normal).abs() < 1e-5);
    }

    #[test]
    fn test_zero_scale_is_degenerate() {
        let matrix = Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0));
        assert_eq!(ObjectTransform::new(matrix), Err(DegenerateTransform));
    }

    #[test]
    fn test_zero_normal_is_degenerate() {
        let t = ObjectTransform::new(Mat4::IDENTITY).unwrap();
        assert_eq!(t.apply_normal([0.0, 0.0, 0.0]), Err(DegenerateTransform));
    }

    #[test]
    fn test_tiny_uniform_scale_is_accepted() {
        let t = ObjectTransform::new(Mat4::from_scale(Vec3::splat(1e-5))).unwrap();
        let p = t.apply_position([1.0, 2.0, 3.0]);
        assert!((Vec3::from(p) - Vec3::new(1e-5, 2e-5, 3e-5)).length() < 1e-10);
        assert_eq!(t.apply_normal([0.0, 0.0, 2.0]).unwrap(), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_flattening_shear_is_degenerate() {
        // Two columns pointing the same way
        let matrix = Mat4::from_cols(Vec4::X, Vec4::X, Vec4::Z, Vec4::W);
        assert_eq!(ObjectTransform::new(matrix), Err(DegenerateTransform));
    }

    #[test]
    fn test_singular_normal_matrix_is_degenerate() {
        let normal = Mat4::from_scale(Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(
            ObjectTransform::with_normal_matrix(Mat4::IDENTITY, normal),
            Err(DegenerateTransform)
        );
        assert!(ObjectTransform::with_normal_matrix(Mat4::IDENTITY, Mat4::IDENTITY).is_ok());
    }
}
